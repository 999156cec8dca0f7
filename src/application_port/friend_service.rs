use crate::application_port::RelationError;
use crate::domain_model::*;

#[async_trait::async_trait]
pub trait FriendService: Send + Sync {
    /// Exact lookup by username or phone among enabled accounts.
    async fn search(&self, keywords: &str) -> Result<FriendInfo, RelationError>;
    /// Public projection of one user, enabled or not.
    async fn profile(&self, user_id: &UserId) -> Result<FriendInfo, RelationError>;
    /// Counterparts with mutual `Subscribed` status.
    async fn my_friend_list(&self, user_id: &UserId) -> Result<Vec<FriendInfo>, RelationError>;
    /// Every other relationship the user is part of.
    async fn quasi_friend_list(&self, user_id: &UserId)
    -> Result<Vec<QuasiFriend>, RelationError>;
    async fn add(&self, from: &UserId, to: &UserId) -> Result<FriendRelationship, RelationError>;
    async fn ignore(&self, from: &UserId, to: &UserId)
    -> Result<FriendRelationship, RelationError>;
    async fn refuse(&self, from: &UserId, to: &UserId)
    -> Result<FriendRelationship, RelationError>;
    /// Removes the record; the returned value reflects the reset state.
    async fn delete(&self, from: &UserId, to: &UserId)
    -> Result<FriendRelationship, RelationError>;
}
