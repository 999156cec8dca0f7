use crate::domain_model::{FriendInfo, UserId, UserPair};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One user's disposition toward the other side of a relationship.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum FriendStatus {
    None,
    Subscribed,
    Unsubscribed,
    Refused,
    Ignored,
}

impl From<FriendStatus> for u8 {
    fn from(status: FriendStatus) -> u8 {
        match status {
            FriendStatus::None => 0,
            FriendStatus::Subscribed => 1,
            FriendStatus::Unsubscribed => 2,
            FriendStatus::Refused => 3,
            FriendStatus::Ignored => 4,
        }
    }
}

impl TryFrom<u8> for FriendStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(FriendStatus::None),
            1 => Ok(FriendStatus::Subscribed),
            2 => Ok(FriendStatus::Unsubscribed),
            3 => Ok(FriendStatus::Refused),
            4 => Ok(FriendStatus::Ignored),
            other => Err(format!("invalid friend status: {other}")),
        }
    }
}

#[derive(
    Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
pub struct RelationshipId(pub String);

impl RelationshipId {
    pub fn of(pair: &UserPair) -> Self {
        RelationshipId(format!("{}{}", pair.greater(), pair.lesser()))
    }
}

impl fmt::Display for RelationshipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The single record describing two users. `user_a` is always the
/// lexicographically greater id.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRelationship {
    pub id: RelationshipId,
    pub user_a: UserId,
    pub user_b: UserId,
    pub status_a: FriendStatus,
    pub status_b: FriendStatus,
    pub updated_at: DateTime<Utc>,
}

impl FriendRelationship {
    /// Builds the canonical record for `from -> to` with each side's status.
    pub fn canonical(
        from: &UserId,
        to: &UserId,
        from_status: FriendStatus,
        to_status: FriendStatus,
        now: DateTime<Utc>,
    ) -> Self {
        let pair = UserPair::new(from.clone(), to.clone());
        let (status_a, status_b) = if pair.greater() == from {
            (from_status, to_status)
        } else {
            (to_status, from_status)
        };
        FriendRelationship {
            id: RelationshipId::of(&pair),
            user_a: pair.greater().clone(),
            user_b: pair.lesser().clone(),
            status_a,
            status_b,
            updated_at: now,
        }
    }

    pub fn involves(&self, user: &UserId) -> bool {
        &self.user_a == user || &self.user_b == user
    }

    /// Status held by `user`. Users outside the pair read as `None`.
    pub fn status_of(&self, user: &UserId) -> FriendStatus {
        if &self.user_a == user {
            self.status_a
        } else if &self.user_b == user {
            self.status_b
        } else {
            FriendStatus::None
        }
    }

    pub fn set_status_of(&mut self, user: &UserId, status: FriendStatus) {
        if &self.user_a == user {
            self.status_a = status;
        } else if &self.user_b == user {
            self.status_b = status;
        }
    }

    pub fn counterpart_of(&self, user: &UserId) -> &UserId {
        if &self.user_a == user {
            &self.user_b
        } else {
            &self.user_a
        }
    }

    pub fn is_mutual(&self) -> bool {
        self.status_a == FriendStatus::Subscribed && self.status_b == FriendStatus::Subscribed
    }
}

/// A counterpart profile merged with the relationship it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuasiFriend {
    pub info: FriendInfo,
    pub status: FriendRelationship,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn canonical_id_ignores_direction() {
        let x: UserId = "alice".into();
        let y: UserId = "bob".into();
        let forward =
            FriendRelationship::canonical(&x, &y, FriendStatus::Subscribed, FriendStatus::None, now());
        let backward =
            FriendRelationship::canonical(&y, &x, FriendStatus::Subscribed, FriendStatus::None, now());

        assert_eq!(forward.id, backward.id);
        assert_eq!(forward.id.0, "bobalice");
        assert_eq!(forward.user_a, y);
        assert_eq!(forward.status_of(&x), FriendStatus::Subscribed);
        assert_eq!(forward.status_of(&y), FriendStatus::None);
        assert_eq!(backward.status_of(&y), FriendStatus::Subscribed);
    }

    #[test]
    fn counterpart_and_mutual() {
        let x: UserId = "u2".into();
        let y: UserId = "u1".into();
        let mut rel =
            FriendRelationship::canonical(&x, &y, FriendStatus::Subscribed, FriendStatus::None, now());
        assert_eq!(rel.counterpart_of(&x), &y);
        assert_eq!(rel.counterpart_of(&y), &x);
        assert!(!rel.is_mutual());

        rel.set_status_of(&y, FriendStatus::Subscribed);
        assert!(rel.is_mutual());
        assert_eq!(rel.status_of(&"u3".into()), FriendStatus::None);
    }

    #[test]
    fn status_round_trips_through_code() {
        let json = serde_json::to_string(&FriendStatus::Ignored).unwrap();
        assert_eq!(json, "4");
        assert_eq!(
            serde_json::from_str::<FriendStatus>("3").unwrap(),
            FriendStatus::Refused
        );
    }
}
