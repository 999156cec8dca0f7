use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::repo_tx::StorageTx;

#[async_trait::async_trait]
pub trait FriendshipRepo: Send + Sync {
    async fn get_in_tx(
        &self,
        tx: &mut dyn StorageTx<'_>,
        id: &RelationshipId,
    ) -> Result<Option<FriendRelationship>, RelationError>;
    /// Inserts the record, or overwrites both status slots when it exists.
    async fn save_in_tx(
        &self,
        tx: &mut dyn StorageTx<'_>,
        relationship: &FriendRelationship,
    ) -> Result<(), RelationError>;
    async fn delete_in_tx(
        &self,
        tx: &mut dyn StorageTx<'_>,
        id: &RelationshipId,
    ) -> Result<(), RelationError>;
    /// Every record where `user_id` sits on either side.
    async fn list_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<FriendRelationship>, RelationError>;
}
