use crate::application_port::RelationError;
use crate::domain_model::*;

#[async_trait::async_trait]
pub trait GroupService: Send + Sync {
    /// Groups the user belongs to, each with its member ids.
    async fn query(&self, user_id: &UserId) -> Result<Vec<Group>, RelationError>;
    async fn get(&self, group_id: &GroupId) -> Result<Group, RelationError>;
    async fn create(&self, caller: &UserId, group: GroupPayload) -> Result<Group, RelationError>;
    /// Owner only. Replaces the member set with `group.member_ids` when present.
    async fn update(
        &self,
        caller: &UserId,
        group: GroupPayload,
    ) -> Result<GroupUpdateOutcome, RelationError>;
    /// Owner only. Returns the group as it was before deletion.
    async fn delete(&self, caller: &UserId, group_id: &GroupId) -> Result<Group, RelationError>;
    async fn add_members(
        &self,
        caller: &UserId,
        change: &MemberChangeParams,
    ) -> Result<MemberChangeOutcome, RelationError>;
    async fn del_members(
        &self,
        caller: &UserId,
        change: &MemberChangeParams,
    ) -> Result<MemberChangeOutcome, RelationError>;
    /// Removes the single listed member, who must be the caller.
    async fn exit_group(
        &self,
        caller: &UserId,
        change: &MemberChangeParams,
    ) -> Result<MemberChangeOutcome, RelationError>;
}
