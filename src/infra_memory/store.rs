use crate::application_port::RelationError;
use crate::domain_model::*;
use crate::domain_port::{StorageTx, TxManager};
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub users: BTreeMap<UserId, UserProfile>,
    pub friendships: BTreeMap<RelationshipId, FriendRelationship>,
    pub groups: BTreeMap<GroupId, GroupRecord>,
    pub members: BTreeMap<String, GroupMember>,
}

/// Process-local store. Transactions serialize on one lock and publish their
/// working copy only on commit.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> R {
        let tables = self.tables.lock().await;
        f(&tables)
    }

    pub async fn insert_user(&self, profile: UserProfile) {
        let mut tables = self.tables.lock().await;
        tables.users.insert(profile.id.clone(), profile);
    }
}

pub struct MemoryTxManager {
    store: MemoryStore,
}

impl MemoryTxManager {
    pub fn new(store: MemoryStore) -> Self {
        MemoryTxManager { store }
    }
}

#[async_trait::async_trait]
impl TxManager for MemoryTxManager {
    async fn begin<'t>(&'t self) -> anyhow::Result<Box<dyn StorageTx<'t> + 't>> {
        let guard = self.store.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

impl MemoryTx {
    pub fn tables(&mut self) -> &mut Tables {
        &mut self.working
    }
}

#[async_trait::async_trait]
impl<'t> StorageTx<'t> for MemoryTx {
    async fn commit(self: Box<Self>) -> anyhow::Result<()> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> anyhow::Result<()> {
        Ok(())
    }

    fn as_any_mut(&mut self) -> Option<&mut (dyn Any + Send)> {
        Some(self)
    }
}

pub(super) fn tables<'a>(tx: &'a mut dyn StorageTx<'_>) -> Result<&'a mut Tables, RelationError> {
    tx.as_any_mut()
        .and_then(|any| any.downcast_mut::<MemoryTx>())
        .map(MemoryTx::tables)
        .ok_or_else(|| RelationError::Store("memory repo used with a foreign transaction".into()))
}
