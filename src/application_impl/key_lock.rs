use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-key async mutex. Slots are created on demand and dropped once the
/// last holder or waiter releases them.
#[derive(Default)]
pub struct KeyedLock {
    slots: DashMap<String, Arc<Mutex<()>>>,
}

pub struct KeyGuard<'a> {
    owner: &'a KeyedLock,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyedLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: &str) -> KeyGuard<'_> {
        let slot = Arc::clone(&*self.slots.entry(key.to_owned()).or_default());
        let guard = slot.lock_owned().await;
        KeyGuard {
            owner: self,
            key: key.to_owned(),
            guard: Some(guard),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // waiters hold their own clone of the slot
        self.owner
            .slots
            .remove_if(&self.key, |_, slot| Arc::strong_count(slot) == 1);
    }
}
