use crate::application_port::*;
use crate::domain_model::*;

/// Read-only view over the user directory owned by the admin side.
#[async_trait::async_trait]
pub trait UserRepo: Send + Sync {
    async fn get(&self, user_id: &UserId) -> Result<Option<UserProfile>, RelationError>;
    async fn list_by_ids(&self, user_ids: &[UserId]) -> Result<Vec<UserProfile>, RelationError>;
    /// Enabled accounts whose username or phone equals `keywords` exactly.
    async fn precise_search(&self, keywords: &str) -> Result<Vec<UserProfile>, RelationError>;
}
