use std::sync::Arc;

/// Fire-and-forget publish. Delivery is at most once and nothing is
/// retained for late subscribers.
#[async_trait::async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: &[u8]) -> anyhow::Result<()>;
}

#[async_trait::async_trait]
pub trait EventConsumer: Send + Sync {
    /// Subscribes to `patterns` (MQTT wildcard syntax) and feeds every
    /// message to `handler` until cancelled.
    async fn run(&self, patterns: &[String], handler: Arc<dyn EventHandler>)
    -> anyhow::Result<()>;
}

#[async_trait::async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, topic: &str, payload: &[u8]) -> anyhow::Result<()>;
}
