use crate::application_port::*;
use crate::domain_model::*;
use crate::logger::*;
use crate::server::topic::{Action, InboundTopic};
use crate::server::{EventHandler, Notifier};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::Instrument;

/// Dispatches inbound request topics to the friend and group services,
/// fans out the resulting notifications and replies to the caller.
pub struct TopicRouter {
    prefix: String,
    routes: HashSet<Action>,
    friend_service: Arc<dyn FriendService>,
    group_service: Arc<dyn GroupService>,
    notifier: Arc<Notifier>,
}

fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, RelationError> {
    serde_json::from_slice(payload)
        .map_err(|e| RelationError::BadRequest(format!("malformed payload: {e}")))
}

fn text(payload: &[u8]) -> Result<String, RelationError> {
    let text = std::str::from_utf8(payload)
        .map_err(|e| RelationError::BadRequest(format!("payload is not utf-8: {e}")))?
        .trim();
    if text.is_empty() {
        return Err(RelationError::BadRequest("empty payload".to_owned()));
    }
    Ok(text.to_owned())
}

impl TopicRouter {
    pub fn new(
        prefix: &str,
        routes: &[Action],
        friend_service: Arc<dyn FriendService>,
        group_service: Arc<dyn GroupService>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            prefix: prefix.to_owned(),
            routes: routes.iter().copied().collect(),
            friend_service,
            group_service,
            notifier,
        }
    }

    /// One subscription pattern per registered route.
    pub fn patterns(&self) -> Vec<String> {
        let mut patterns: Vec<String> = self.routes.iter().map(|a| a.pattern(&self.prefix)).collect();
        patterns.sort();
        patterns
    }

    async fn route(&self, request: &InboundTopic, payload: &[u8]) -> Result<(), RelationError> {
        let caller = &request.caller;
        let rid = request.request_id.as_str();

        match request.action {
            Action::FriendSearch => {
                let found = self.friend_service.search(&text(payload)?).await?;
                self.notifier.reply_success(caller, rid, &found).await;
            }
            Action::FriendMyFriends => {
                let friends = self.friend_service.my_friend_list(caller).await?;
                self.notifier.reply_success(caller, rid, &friends).await;
            }
            Action::FriendQuasiFriends => {
                let pending = self.friend_service.quasi_friend_list(caller).await?;
                self.notifier.reply_success(caller, rid, &pending).await;
            }
            Action::FriendAdd
            | Action::FriendIgnore
            | Action::FriendRefuse
            | Action::FriendDelete => {
                let params: FriendOperateParams = decode(payload)?;
                if &params.from_user_id != caller {
                    return Err(RelationError::Forbidden("fromUserId must be the caller"));
                }
                let (from, to) = (&params.from_user_id, &params.to_user_id);
                let relationship = match request.action {
                    Action::FriendAdd => self.friend_service.add(from, to).await?,
                    Action::FriendIgnore => self.friend_service.ignore(from, to).await?,
                    Action::FriendRefuse => self.friend_service.refuse(from, to).await?,
                    _ => self.friend_service.delete(from, to).await?,
                };
                self.fan_out_friend_change(&relationship).await?;
                self.notifier.reply_success(caller, rid, &relationship).await;
            }
            Action::GroupQuery => {
                let groups = self.group_service.query(caller).await?;
                self.notifier.reply_success(caller, rid, &groups).await;
            }
            Action::GroupGet => {
                let group_id = GroupId(text(payload)?);
                let group = self.group_service.get(&group_id).await?;
                self.notifier.reply_success(caller, rid, &group).await;
            }
            Action::GroupCreate => {
                let group = self.group_service.create(caller, decode(payload)?).await?;
                if let Some(group_id) = &group.id {
                    self.fan_out_group(GroupEventKind::Create, group_id, &group.member_ids, &group)
                        .await?;
                }
                self.notifier.reply_success(caller, rid, &group).await;
            }
            Action::GroupUpdate => {
                let outcome = self.group_service.update(caller, decode(payload)?).await?;
                if let Some(group_id) = &outcome.group.id {
                    self.fan_out_group(
                        GroupEventKind::Update,
                        group_id,
                        &outcome.recipients(),
                        &outcome.group,
                    )
                    .await?;
                }
                self.notifier.reply_success(caller, rid, &outcome.group).await;
            }
            Action::GroupDelete => {
                let group_id = GroupId(text(payload)?);
                let group = self.group_service.delete(caller, &group_id).await?;
                self.fan_out_group(GroupEventKind::Delete, &group_id, &group.member_ids, &group)
                    .await?;
                self.notifier.reply_success(caller, rid, &group).await;
            }
            Action::GroupAddMembers | Action::GroupDelMembers | Action::GroupExitGroup => {
                let mut change: MemberChangeParams = decode(payload)?;
                let (kind, outcome) = match request.action {
                    Action::GroupAddMembers => (
                        GroupEventKind::AddMembers,
                        self.group_service.add_members(caller, &change).await?,
                    ),
                    Action::GroupDelMembers => (
                        GroupEventKind::DelMembers,
                        self.group_service.del_members(caller, &change).await?,
                    ),
                    _ => (
                        GroupEventKind::ExitGroup,
                        self.group_service.exit_group(caller, &change).await?,
                    ),
                };

                // recipients see who acted and who actually changed
                change.from_id = Some(caller.clone());
                change.list = outcome.changed;
                if !change.list.is_empty() {
                    self.fan_out_group(kind, &change.group_id, &outcome.recipients, &change)
                        .await?;
                }
                self.notifier.reply_success(caller, rid, &change).await;
            }
        }

        Ok(())
    }

    /// Each side receives the record merged with the other side's profile.
    async fn fan_out_friend_change(
        &self,
        relationship: &FriendRelationship,
    ) -> Result<(), RelationError> {
        let a = self.friend_service.profile(&relationship.user_a).await?;
        let b = self.friend_service.profile(&relationship.user_b).await?;

        let mut events = Vec::with_capacity(2);
        for (recipient, counterpart) in [(&relationship.user_a, b), (&relationship.user_b, a)] {
            let body = QuasiFriend {
                info: counterpart,
                status: relationship.clone(),
            };
            events.push(
                Notifier::friend_change_event(recipient, &body)
                    .map_err(|e| RelationError::store("encode friend change", e))?,
            );
        }

        let total = events.len();
        let delivered = self.notifier.dispatch(events).await;
        debug!(id = %relationship.id, delivered, total, "friend change fanned out");
        Ok(())
    }

    async fn fan_out_group<T: serde::Serialize + Sync>(
        &self,
        kind: GroupEventKind,
        group_id: &GroupId,
        recipients: &[UserId],
        body: &T,
    ) -> Result<(), RelationError> {
        let events = Notifier::group_events(kind, group_id, recipients, body)
            .map_err(|e| RelationError::store("encode group event", e))?;
        let total = events.len();
        let delivered = self.notifier.dispatch(events).await;
        debug!(%group_id, %kind, delivered, total, "group event fanned out");
        Ok(())
    }
}

#[async_trait::async_trait]
impl EventHandler for TopicRouter {
    async fn handle(&self, topic: &str, payload: &[u8]) -> anyhow::Result<()> {
        let request = match InboundTopic::parse(&self.prefix, topic) {
            Ok(request) if self.routes.contains(&request.action) => request,
            Ok(request) => {
                let err = RelationError::BadRequest(format!("{} is not served", request.action));
                self.notifier
                    .reply_error(&request.caller, &request.request_id, &err)
                    .await;
                return Ok(());
            }
            Err(e) => {
                warn!(%topic, error = %e, "unroutable topic");
                if let Some((caller, request_id)) = InboundTopic::reply_address(topic) {
                    let err = RelationError::BadRequest(e.to_string());
                    self.notifier.reply_error(&caller, &request_id, &err).await;
                }
                return Ok(());
            }
        };

        let span = tracing::info_span!(
            "request",
            action = %request.action,
            caller = %request.caller,
            request_id = %request.request_id,
        );
        async {
            debug!(bytes = payload.len(), "handling");
            if let Err(err) = self.route(&request, payload).await {
                match err.kind() {
                    ErrorKind::Internal => error!(error = %err, "request failed"),
                    _ => info!(error = %err, "request rejected"),
                }
                self.notifier
                    .reply_error(&request.caller, &request.request_id, &err)
                    .await;
            }
        }
        .instrument(span)
        .await;

        Ok(())
    }
}
