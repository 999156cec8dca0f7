use super::store::{MemoryStore, tables};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;

pub struct MemoryGroupMemberRepo {
    store: MemoryStore,
}

impl MemoryGroupMemberRepo {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl GroupMemberRepo for MemoryGroupMemberRepo {
    async fn list_by_groups(
        &self,
        group_ids: &[GroupId],
    ) -> Result<Vec<GroupMember>, RelationError> {
        Ok(self
            .store
            .read(|t| {
                t.members
                    .values()
                    .filter(|m| group_ids.contains(&m.group_id))
                    .cloned()
                    .collect()
            })
            .await)
    }

    async fn list_in_tx(
        &self,
        tx: &mut dyn StorageTx<'_>,
        group_id: &GroupId,
    ) -> Result<Vec<GroupMember>, RelationError> {
        Ok(tables(tx)?
            .members
            .values()
            .filter(|m| &m.group_id == group_id)
            .cloned()
            .collect())
    }

    async fn insert_in_tx(
        &self,
        tx: &mut dyn StorageTx<'_>,
        member: &GroupMember,
    ) -> Result<(), RelationError> {
        let tables = tables(tx)?;
        // unique (group_id, user_id)
        if tables
            .members
            .values()
            .any(|m| m.group_id == member.group_id && m.user_id == member.user_id)
        {
            return Err(RelationError::AlreadyMember);
        }
        tables.members.insert(member.id.clone(), member.clone());
        Ok(())
    }

    async fn delete_in_tx(
        &self,
        tx: &mut dyn StorageTx<'_>,
        member_id: &str,
    ) -> Result<(), RelationError> {
        tables(tx)?.members.remove(member_id);
        Ok(())
    }

    async fn delete_by_group_in_tx(
        &self,
        tx: &mut dyn StorageTx<'_>,
        group_id: &GroupId,
    ) -> Result<(), RelationError> {
        tables(tx)?.members.retain(|_, m| &m.group_id != group_id);
        Ok(())
    }
}
