use crate::logger::*;
use crate::server::topic::to_glob;
use crate::server::{EventConsumer, EventHandler};
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub struct RedisConsumer {
    client: redis::Client,
    client_id: String,
    cancellation_token: CancellationToken,
}

impl RedisConsumer {
    pub fn new(
        dsn: &str,
        client_id: &str,
        cancellation_token: CancellationToken,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            client: redis::Client::open(dsn)?,
            client_id: client_id.to_owned(),
            cancellation_token,
        })
    }
}

#[async_trait::async_trait]
impl EventConsumer for RedisConsumer {
    async fn run(
        &self,
        patterns: &[String],
        handler: Arc<dyn EventHandler>,
    ) -> anyhow::Result<()> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        for pattern in patterns {
            pubsub.psubscribe(to_glob(pattern)).await?;
        }
        info!(client_id = %self.client_id, patterns = patterns.len(), "redis consumer subscribed");

        let mut in_flight = JoinSet::new();
        let mut stream = pubsub.on_message();

        loop {
            let message = tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => {
                    info!("redis consumer shutting down...");
                    break;
                }
                Some(done) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = done {
                        error!(error = ?e, "message task panicked");
                    }
                    continue;
                }
                message = stream.next() => message,
            };

            let Some(message) = message else {
                error!("redis pub/sub stream terminated");
                break;
            };

            let topic = message.get_channel_name().to_owned();
            let payload = message.get_payload_bytes().to_vec();
            let handler = handler.clone();
            in_flight.spawn(async move {
                if let Err(e) = handler.handle(&topic, &payload).await {
                    warn!(%topic, error = %e, "handler failed");
                }
            });
        }

        // let accepted messages finish
        while let Some(done) = in_flight.join_next().await {
            if let Err(e) = done {
                error!(error = ?e, "message task panicked");
            }
        }

        Ok(())
    }
}
