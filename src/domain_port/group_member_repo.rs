use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::repo_tx::StorageTx;

#[async_trait::async_trait]
pub trait GroupMemberRepo: Send + Sync {
    async fn list_by_groups(
        &self,
        group_ids: &[GroupId],
    ) -> Result<Vec<GroupMember>, RelationError>;
    async fn list_in_tx(
        &self,
        tx: &mut dyn StorageTx<'_>,
        group_id: &GroupId,
    ) -> Result<Vec<GroupMember>, RelationError>;
    /// Fails with `AlreadyMember` when the (group, user) pair already exists.
    async fn insert_in_tx(
        &self,
        tx: &mut dyn StorageTx<'_>,
        member: &GroupMember,
    ) -> Result<(), RelationError>;
    async fn delete_in_tx(
        &self,
        tx: &mut dyn StorageTx<'_>,
        member_id: &str,
    ) -> Result<(), RelationError>;
    async fn delete_by_group_in_tx(
        &self,
        tx: &mut dyn StorageTx<'_>,
        group_id: &GroupId,
    ) -> Result<(), RelationError>;
}
