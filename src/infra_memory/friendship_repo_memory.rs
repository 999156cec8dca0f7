use super::store::{MemoryStore, tables};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;

pub struct MemoryFriendshipRepo {
    store: MemoryStore,
}

impl MemoryFriendshipRepo {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl FriendshipRepo for MemoryFriendshipRepo {
    async fn get_in_tx(
        &self,
        tx: &mut dyn StorageTx<'_>,
        id: &RelationshipId,
    ) -> Result<Option<FriendRelationship>, RelationError> {
        Ok(tables(tx)?.friendships.get(id).cloned())
    }

    async fn save_in_tx(
        &self,
        tx: &mut dyn StorageTx<'_>,
        relationship: &FriendRelationship,
    ) -> Result<(), RelationError> {
        tables(tx)?
            .friendships
            .insert(relationship.id.clone(), relationship.clone());
        Ok(())
    }

    async fn delete_in_tx(
        &self,
        tx: &mut dyn StorageTx<'_>,
        id: &RelationshipId,
    ) -> Result<(), RelationError> {
        tables(tx)?.friendships.remove(id);
        Ok(())
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<FriendRelationship>, RelationError> {
        Ok(self
            .store
            .read(|t| {
                t.friendships
                    .values()
                    .filter(|r| r.involves(user_id))
                    .cloned()
                    .collect()
            })
            .await)
    }
}
