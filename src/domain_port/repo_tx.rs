use std::any::Any;

#[async_trait::async_trait]
pub trait TxManager: Send + Sync {
    async fn begin<'t>(&'t self) -> anyhow::Result<Box<dyn StorageTx<'t> + 't>>;
}

#[async_trait::async_trait]
pub trait StorageTx<'t>: Send {
    async fn commit(self: Box<Self>) -> anyhow::Result<()>;
    async fn rollback(self: Box<Self>) -> anyhow::Result<()>;

    /// Owned transactions expose themselves for adapters that need the
    /// concrete type back. Borrowing ones (tied to a pool) return `None`.
    fn as_any_mut(&mut self) -> Option<&mut (dyn Any + Send)> {
        None
    }
}
