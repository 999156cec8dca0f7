use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::repo_tx::StorageTx;

#[async_trait::async_trait]
pub trait GroupRepo: Send + Sync {
    async fn get(&self, group_id: &GroupId) -> Result<Option<GroupRecord>, RelationError>;
    async fn get_in_tx(
        &self,
        tx: &mut dyn StorageTx<'_>,
        group_id: &GroupId,
    ) -> Result<Option<GroupRecord>, RelationError>;
    async fn insert_in_tx(
        &self,
        tx: &mut dyn StorageTx<'_>,
        group: &GroupRecord,
    ) -> Result<(), RelationError>;
    /// Overwrites name, brief, avatar and owner.
    async fn update_in_tx(
        &self,
        tx: &mut dyn StorageTx<'_>,
        group: &GroupRecord,
    ) -> Result<(), RelationError>;
    async fn delete_in_tx(
        &self,
        tx: &mut dyn StorageTx<'_>,
        group_id: &GroupId,
    ) -> Result<(), RelationError>;
    /// Groups that have `user_id` among their members, newest first.
    async fn list_by_member(&self, user_id: &UserId) -> Result<Vec<GroupRecord>, RelationError>;
}
