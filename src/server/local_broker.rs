use crate::logger::*;
use crate::server::topic::matches;
use crate::server::{EventConsumer, EventHandler, EventPublisher};
use std::sync::Arc;
use tokio::sync::{Notify, broadcast};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct BrokerMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// In-process broker with MQTT wildcard subscriptions. Messages published
/// while nobody is subscribed are gone, same as on a real broker.
pub struct LocalBroker {
    sender: broadcast::Sender<BrokerMessage>,
    consumer_subscribed: Notify,
    cancellation_token: CancellationToken,
}

impl LocalBroker {
    pub fn new(capacity: usize, cancellation_token: CancellationToken) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            consumer_subscribed: Notify::new(),
            cancellation_token,
        }
    }

    pub fn subscribe(&self, pattern: &str) -> LocalSubscription {
        LocalSubscription {
            pattern: pattern.to_owned(),
            receiver: self.sender.subscribe(),
        }
    }

    /// Resolves once `run` holds its receiver. Nothing published before that
    /// reaches the consumer.
    pub async fn consumer_ready(&self) {
        self.consumer_subscribed.notified().await;
    }
}

pub struct LocalSubscription {
    pattern: String,
    receiver: broadcast::Receiver<BrokerMessage>,
}

impl LocalSubscription {
    /// Next matching message, or `None` once the broker is gone.
    pub async fn recv(&mut self) -> Option<BrokerMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(m) if matches(&self.pattern, &m.topic) => return Some(m),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(pattern = %self.pattern, skipped, "subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Every matching message already queued, without waiting.
    pub fn drain(&mut self) -> Vec<BrokerMessage> {
        let mut out = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(m) if matches(&self.pattern, &m.topic) => out.push(m),
                Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty | TryRecvError::Closed) => return out,
            }
        }
    }
}

#[async_trait::async_trait]
impl EventPublisher for LocalBroker {
    async fn publish(&self, topic: &str, payload: &[u8]) -> anyhow::Result<()> {
        let message = BrokerMessage {
            topic: topic.to_owned(),
            payload: payload.to_vec(),
        };
        if self.sender.send(message).is_err() {
            trace!(topic, "no subscribers");
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl EventConsumer for LocalBroker {
    async fn run(
        &self,
        patterns: &[String],
        handler: Arc<dyn EventHandler>,
    ) -> anyhow::Result<()> {
        let mut receiver = self.sender.subscribe();
        // stores a permit when nobody waits yet
        self.consumer_subscribed.notify_one();
        let mut in_flight = JoinSet::new();
        info!(patterns = patterns.len(), "local consumer subscribed");

        loop {
            let received = tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => {
                    info!("local consumer shutting down...");
                    break;
                }
                Some(done) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = done {
                        error!(error = ?e, "message task panicked");
                    }
                    continue;
                }
                received = receiver.recv() => received,
            };

            let message = match received {
                Ok(message) => message,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "local consumer lagged");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            if !patterns.iter().any(|p| matches(p, &message.topic)) {
                continue;
            }

            let handler = handler.clone();
            in_flight.spawn(async move {
                if let Err(e) = handler.handle(&message.topic, &message.payload).await {
                    warn!(topic = %message.topic, error = %e, "handler failed");
                }
            });
        }

        while let Some(done) = in_flight.join_next().await {
            if let Err(e) = done {
                error!(error = ?e, "message task panicked");
            }
        }
        Ok(())
    }
}
