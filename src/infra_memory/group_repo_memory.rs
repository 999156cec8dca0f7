use super::store::{MemoryStore, tables};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use std::collections::HashSet;

pub struct MemoryGroupRepo {
    store: MemoryStore,
}

impl MemoryGroupRepo {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl GroupRepo for MemoryGroupRepo {
    async fn get(&self, group_id: &GroupId) -> Result<Option<GroupRecord>, RelationError> {
        Ok(self.store.read(|t| t.groups.get(group_id).cloned()).await)
    }

    async fn get_in_tx(
        &self,
        tx: &mut dyn StorageTx<'_>,
        group_id: &GroupId,
    ) -> Result<Option<GroupRecord>, RelationError> {
        Ok(tables(tx)?.groups.get(group_id).cloned())
    }

    async fn insert_in_tx(
        &self,
        tx: &mut dyn StorageTx<'_>,
        group: &GroupRecord,
    ) -> Result<(), RelationError> {
        let tables = tables(tx)?;
        if tables.groups.contains_key(&group.id) {
            return Err(RelationError::Store(format!("duplicate group id {}", group.id)));
        }
        tables.groups.insert(group.id.clone(), group.clone());
        Ok(())
    }

    async fn update_in_tx(
        &self,
        tx: &mut dyn StorageTx<'_>,
        group: &GroupRecord,
    ) -> Result<(), RelationError> {
        let row = tables(tx)?
            .groups
            .get_mut(&group.id)
            .ok_or(RelationError::GroupNotFound)?;
        row.name = group.name.clone();
        row.brief = group.brief.clone();
        row.avatar = group.avatar.clone();
        row.owner = group.owner.clone();
        Ok(())
    }

    async fn delete_in_tx(
        &self,
        tx: &mut dyn StorageTx<'_>,
        group_id: &GroupId,
    ) -> Result<(), RelationError> {
        tables(tx)?.groups.remove(group_id);
        Ok(())
    }

    async fn list_by_member(&self, user_id: &UserId) -> Result<Vec<GroupRecord>, RelationError> {
        Ok(self
            .store
            .read(|t| {
                let joined: HashSet<&GroupId> = t
                    .members
                    .values()
                    .filter(|m| &m.user_id == user_id)
                    .map(|m| &m.group_id)
                    .collect();
                let mut groups: Vec<GroupRecord> = t
                    .groups
                    .values()
                    .filter(|g| joined.contains(&g.id))
                    .cloned()
                    .collect();
                groups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                groups
            })
            .await)
    }
}
