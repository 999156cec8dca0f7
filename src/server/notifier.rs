use crate::application_port::RelationError;
use crate::domain_model::*;
use crate::logger::*;
use crate::server::EventPublisher;
use crate::server::topic;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

/// Turns committed mutations into addressed messages and pushes them out,
/// one publish per recipient. A failed publish is logged and skipped.
pub struct Notifier {
    event_publisher: Arc<dyn EventPublisher>,
}

impl Notifier {
    pub fn new(event_publisher: Arc<dyn EventPublisher>) -> Self {
        Self { event_publisher }
    }

    pub fn group_events<T: Serialize>(
        kind: GroupEventKind,
        group_id: &GroupId,
        recipients: &[UserId],
        body: &T,
    ) -> anyhow::Result<Vec<NotificationEvent>> {
        let payload = serde_json::to_vec(body)?;
        Ok(recipients
            .iter()
            .map(|recipient| NotificationEvent {
                recipient: recipient.clone(),
                kind: EventKind::Group(kind),
                topic: topic::group_event(recipient, kind, group_id),
                payload: payload.clone(),
            })
            .collect())
    }

    pub fn friend_change_event(
        recipient: &UserId,
        body: &QuasiFriend,
    ) -> anyhow::Result<NotificationEvent> {
        Ok(NotificationEvent {
            recipient: recipient.clone(),
            kind: EventKind::FriendChange,
            topic: topic::friend_change(recipient, Utc::now().timestamp_millis()),
            payload: serde_json::to_vec(body)?,
        })
    }

    /// Returns how many events reached the broker.
    pub async fn dispatch(&self, events: Vec<NotificationEvent>) -> usize {
        let mut delivered = 0;
        for event in events {
            match self
                .event_publisher
                .publish(&event.topic, &event.payload)
                .await
            {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(
                        recipient = %event.recipient,
                        kind = ?event.kind,
                        error = %e,
                        "notification dropped"
                    );
                }
            }
        }
        delivered
    }

    pub async fn reply_success<T: Serialize + Sync>(
        &self,
        caller: &UserId,
        request_id: &str,
        body: &T,
    ) {
        let payload = match serde_json::to_vec(body) {
            Ok(payload) => payload,
            Err(e) => {
                error!(%caller, request_id, error = %e, "reply body not serializable");
                return self
                    .reply_error(caller, request_id, &RelationError::store("encode reply", e))
                    .await;
            }
        };
        let topic = topic::reply_success(caller, request_id);
        if let Err(e) = self.event_publisher.publish(&topic, &payload).await {
            warn!(%topic, error = %e, "reply dropped");
        }
    }

    pub async fn reply_error(&self, caller: &UserId, request_id: &str, err: &RelationError) {
        debug!(%caller, request_id, kind = ?err.kind(), error = %err, "replying with error");
        let topic = topic::reply_error(caller, request_id);
        if let Err(e) = self
            .event_publisher
            .publish(&topic, err.to_string().as_bytes())
            .await
        {
            warn!(%topic, error = %e, "error reply dropped");
        }
    }
}
