//! Topic addressing for the pub/sub boundary.
//!
//! Inbound requests arrive on `<prefix>/<domain>/<verb>/<caller>/<request-id>`.
//! Replies and fan-out messages are addressed to the recipient's own
//! namespace so a client only needs to subscribe to `<user-id>/#`.

use crate::domain_model::*;
use std::fmt;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Action {
    FriendSearch,
    FriendMyFriends,
    FriendQuasiFriends,
    FriendAdd,
    FriendIgnore,
    FriendRefuse,
    FriendDelete,
    GroupQuery,
    GroupGet,
    GroupCreate,
    GroupUpdate,
    GroupDelete,
    GroupAddMembers,
    GroupDelMembers,
    GroupExitGroup,
}

impl Action {
    pub const ALL: [Action; 15] = [
        Action::FriendSearch,
        Action::FriendMyFriends,
        Action::FriendQuasiFriends,
        Action::FriendAdd,
        Action::FriendIgnore,
        Action::FriendRefuse,
        Action::FriendDelete,
        Action::GroupQuery,
        Action::GroupGet,
        Action::GroupCreate,
        Action::GroupUpdate,
        Action::GroupDelete,
        Action::GroupAddMembers,
        Action::GroupDelMembers,
        Action::GroupExitGroup,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Action::FriendSearch => "friend/search",
            Action::FriendMyFriends => "friend/myFriends",
            Action::FriendQuasiFriends => "friend/quasiFriends",
            Action::FriendAdd => "friend/add",
            Action::FriendIgnore => "friend/ignore",
            Action::FriendRefuse => "friend/refuse",
            Action::FriendDelete => "friend/delete",
            Action::GroupQuery => "group/query",
            Action::GroupGet => "group/get",
            Action::GroupCreate => "group/create",
            Action::GroupUpdate => "group/update",
            Action::GroupDelete => "group/delete",
            Action::GroupAddMembers => "group/addMembers",
            Action::GroupDelMembers => "group/delMembers",
            Action::GroupExitGroup => "group/exitGroup",
        }
    }

    pub fn from_path(path: &str) -> Option<Action> {
        Action::ALL.into_iter().find(|a| a.path() == path)
    }

    /// Subscription pattern in MQTT wildcard syntax.
    pub fn pattern(&self, prefix: &str) -> String {
        join_prefix(prefix, &format!("{}/+/+", self.path()))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
pub enum TopicError {
    #[error("topic {0:?} is outside prefix {1:?}")]
    ForeignPrefix(String, String),
    #[error("topic {0:?} needs exactly 4 levels below the prefix")]
    BadDepth(String),
    #[error("topic {0:?} has an empty level")]
    EmptyLevel(String),
    #[error("unknown action {0:?}")]
    UnknownAction(String),
}

/// A parsed request topic.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct InboundTopic {
    pub action: Action,
    pub caller: UserId,
    pub request_id: String,
}

impl InboundTopic {
    pub fn parse(prefix: &str, topic: &str) -> Result<InboundTopic, TopicError> {
        let rest = if prefix.is_empty() {
            topic
        } else {
            topic
                .strip_prefix(prefix)
                .and_then(|r| r.strip_prefix('/'))
                .ok_or_else(|| TopicError::ForeignPrefix(topic.to_owned(), prefix.to_owned()))?
        };

        let levels: Vec<&str> = rest.split('/').collect();
        let [domain, verb, caller, request_id] = levels.as_slice() else {
            return Err(TopicError::BadDepth(topic.to_owned()));
        };
        if levels.iter().any(|l| l.is_empty()) {
            return Err(TopicError::EmptyLevel(topic.to_owned()));
        }

        let path = format!("{domain}/{verb}");
        let action = Action::from_path(&path).ok_or(TopicError::UnknownAction(path))?;

        Ok(InboundTopic {
            action,
            caller: UserId::from(*caller),
            request_id: (*request_id).to_owned(),
        })
    }

    /// Caller and request id taken from the last two levels, for replying to
    /// requests whose action could not be resolved.
    pub fn reply_address(topic: &str) -> Option<(UserId, String)> {
        let mut levels = topic.rsplit('/');
        let request_id = levels.next().filter(|l| !l.is_empty())?;
        let caller = levels.next().filter(|l| !l.is_empty())?;
        // <domain>/<verb> must precede them
        if levels.count() < 2 {
            return None;
        }
        Some((UserId::from(caller), request_id.to_owned()))
    }
}

fn join_prefix(prefix: &str, rest: &str) -> String {
    if prefix.is_empty() {
        rest.to_owned()
    } else {
        format!("{prefix}/{rest}")
    }
}

pub fn reply_success(caller: &UserId, request_id: &str) -> String {
    format!("{caller}/reply/success/{request_id}")
}

pub fn reply_error(caller: &UserId, request_id: &str) -> String {
    format!("{caller}/reply/error/{request_id}")
}

pub fn friend_change(recipient: &UserId, timestamp_ms: i64) -> String {
    format!("{recipient}/friend/change/{timestamp_ms}")
}

pub fn group_event(recipient: &UserId, kind: GroupEventKind, group_id: &GroupId) -> String {
    format!("{recipient}/group/{kind}/{group_id}")
}

/// MQTT-style match: `+` takes one level, a trailing `#` takes the rest.
pub fn matches(pattern: &str, topic: &str) -> bool {
    let mut topic_levels = topic.split('/');
    for p in pattern.split('/') {
        match p {
            "#" => return true,
            "+" => {
                if topic_levels.next().is_none() {
                    return false;
                }
            }
            literal => {
                if topic_levels.next() != Some(literal) {
                    return false;
                }
            }
        }
    }
    topic_levels.next().is_none()
}

/// Redis `PSUBSCRIBE` globs have no level semantics, so both wildcards
/// widen to `*` and the router re-validates the topic.
pub fn to_glob(pattern: &str) -> String {
    pattern
        .split('/')
        .map(|level| match level {
            "+" | "#" => "*",
            literal => literal,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_request_topics() {
        let parsed = InboundTopic::parse("social", "social/friend/add/u1/r-42").unwrap();
        assert_eq!(parsed.action, Action::FriendAdd);
        assert_eq!(parsed.caller.as_str(), "u1");
        assert_eq!(parsed.request_id, "r-42");

        let parsed = InboundTopic::parse("", "group/exitGroup/u9/7").unwrap();
        assert_eq!(parsed.action, Action::GroupExitGroup);
    }

    #[test]
    fn rejects_malformed_topics() {
        assert_eq!(
            InboundTopic::parse("social", "social/friend/add/u1"),
            Err(TopicError::BadDepth("social/friend/add/u1".to_owned()))
        );
        assert!(matches!(
            InboundTopic::parse("social", "other/friend/add/u1/r1"),
            Err(TopicError::ForeignPrefix(..))
        ));
        assert!(matches!(
            InboundTopic::parse("social", "social/friend/poke/u1/r1"),
            Err(TopicError::UnknownAction(_))
        ));
        assert!(matches!(
            InboundTopic::parse("social", "social/friend/add//r1"),
            Err(TopicError::EmptyLevel(_))
        ));
    }

    #[test]
    fn reply_address_uses_last_two_levels() {
        assert_eq!(
            InboundTopic::reply_address("social/friend/poke/u1/r1"),
            Some(("u1".into(), "r1".to_owned()))
        );
        assert_eq!(InboundTopic::reply_address("u1/r1"), None);
    }

    #[test]
    fn every_action_round_trips_through_its_path() {
        for action in Action::ALL {
            assert_eq!(Action::from_path(action.path()), Some(action));
            let topic = format!("p/{}/caller/rid", action.path());
            assert!(matches(&action.pattern("p"), &topic));
        }
    }

    #[test]
    fn outbound_addresses() {
        let u: UserId = "u1".into();
        assert_eq!(reply_success(&u, "r1"), "u1/reply/success/r1");
        assert_eq!(reply_error(&u, "r1"), "u1/reply/error/r1");
        assert_eq!(friend_change(&u, 1700000000000), "u1/friend/change/1700000000000");
        assert_eq!(
            group_event(&u, GroupEventKind::AddMembers, &"g1".into()),
            "u1/group/addMembers/g1"
        );
    }

    #[test]
    fn wildcard_matching() {
        assert!(matches("u1/#", "u1/reply/success/r1"));
        assert!(matches("+/group/+/g1", "u2/group/update/g1"));
        assert!(!matches("+/group/+/g1", "u2/group/update/g2"));
        assert!(!matches("a/+", "a/b/c"));
        assert!(!matches("a/+/c", "a/b"));
        assert_eq!(to_glob("social/friend/add/+/+"), "social/friend/add/*/*");
    }
}
