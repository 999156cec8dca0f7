use super::store::MemoryStore;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;

pub struct MemoryUserRepo {
    store: MemoryStore,
}

impl MemoryUserRepo {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl UserRepo for MemoryUserRepo {
    async fn get(&self, user_id: &UserId) -> Result<Option<UserProfile>, RelationError> {
        Ok(self.store.read(|t| t.users.get(user_id).cloned()).await)
    }

    async fn list_by_ids(&self, user_ids: &[UserId]) -> Result<Vec<UserProfile>, RelationError> {
        Ok(self
            .store
            .read(|t| {
                user_ids
                    .iter()
                    .filter_map(|id| t.users.get(id).cloned())
                    .collect()
            })
            .await)
    }

    async fn precise_search(&self, keywords: &str) -> Result<Vec<UserProfile>, RelationError> {
        Ok(self
            .store
            .read(|t| {
                t.users
                    .values()
                    .filter(|u| u.is_enabled())
                    .filter(|u| u.user_name == keywords || (!u.phone.is_empty() && u.phone == keywords))
                    .cloned()
                    .collect()
            })
            .await)
    }
}
