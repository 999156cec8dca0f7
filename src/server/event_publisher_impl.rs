use crate::server::EventPublisher;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

pub struct RedisPublisher {
    conn: ConnectionManager,
}

impl RedisPublisher {
    pub async fn connect(dsn: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(dsn)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }
}

#[async_trait::async_trait]
impl EventPublisher for RedisPublisher {
    async fn publish(&self, topic: &str, payload: &[u8]) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        // receiver count is irrelevant at most once
        let _: i64 = conn
            .publish(topic, payload)
            .await
            .map_err(|e| anyhow::anyhow!("publish to {topic}: {e}"))?;
        Ok(())
    }
}
