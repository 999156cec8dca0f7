use crate::domain_model::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

#[derive(
    Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
pub struct GroupId(pub String);

impl GroupId {
    pub fn generate() -> Self {
        GroupId(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GroupId {
    fn from(s: &str) -> Self {
        GroupId(s.to_owned())
    }
}

/// The group row as persisted, without its members.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct GroupRecord {
    pub id: GroupId,
    pub name: String,
    pub brief: String,
    pub avatar: String,
    pub owner: UserId,
    pub creator: UserId,
    pub created_at: DateTime<Utc>,
}

impl GroupRecord {
    pub fn with_members(self, member_ids: Vec<UserId>) -> Group {
        Group {
            id: Some(self.id),
            name: self.name,
            brief: self.brief,
            avatar: self.avatar,
            owner: Some(self.owner),
            creator: Some(self.creator),
            created_at: Some(self.created_at),
            member_ids,
        }
    }
}

/// Body of a create or update request.
///
/// `member_ids` stays `None` when the body omits it, which an update reads as
/// "keep the roster". An explicit empty list removes every member.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupPayload {
    #[serde(default)]
    pub id: Option<GroupId>,
    #[serde(alias = "groupName")]
    pub name: String,
    #[serde(default)]
    pub brief: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub owner: Option<UserId>,
    #[serde(default)]
    pub creator: Option<UserId>,
    #[serde(default, alias = "memberIDs", skip_serializing_if = "Option::is_none")]
    pub member_ids: Option<Vec<UserId>>,
}

/// A group as sent to clients: always carries its member ids.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    #[serde(default)]
    pub id: Option<GroupId>,
    #[serde(alias = "groupName")]
    pub name: String,
    #[serde(default)]
    pub brief: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub owner: Option<UserId>,
    #[serde(default)]
    pub creator: Option<UserId>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "memberIDs")]
    pub member_ids: Vec<UserId>,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    pub id: String,
    pub group_id: GroupId,
    pub user_id: UserId,
}

impl GroupMember {
    pub fn new(group_id: GroupId, user_id: UserId) -> Self {
        GroupMember {
            id: uuid::Uuid::new_v4().to_string(),
            group_id,
            user_id,
        }
    }
}

pub fn member_ids(members: &[GroupMember]) -> Vec<UserId> {
    members.iter().map(|m| m.user_id.clone()).collect()
}

/// Membership delta between the stored rows and a desired id list.
#[derive(Debug, Default, Eq, PartialEq)]
pub struct MemberDiff {
    pub to_add: Vec<UserId>,
    pub to_remove: Vec<GroupMember>,
}

impl MemberDiff {
    /// Compares by `user_id` on both sides. Repeated ids in `desired` are only
    /// added once; rows present in both sets are left alone.
    pub fn compute(existing: &[GroupMember], desired: &[UserId]) -> Self {
        let current: HashSet<&UserId> = existing.iter().map(|m| &m.user_id).collect();
        let wanted: HashSet<&UserId> = desired.iter().collect();

        let mut seen = HashSet::new();
        let to_add = desired
            .iter()
            .filter(|id| !current.contains(id) && seen.insert(*id))
            .cloned()
            .collect();
        let to_remove = existing
            .iter()
            .filter(|m| !wanted.contains(&m.user_id))
            .cloned()
            .collect();

        MemberDiff { to_add, to_remove }
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// One entry of an explicit add/remove change-list.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct MemberChangeEntry {
    pub id: UserId,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberChangeParams {
    #[serde(default)]
    pub from_id: Option<UserId>,
    #[serde(default)]
    pub from_name: String,
    pub group_id: GroupId,
    #[serde(default)]
    pub list: Vec<MemberChangeEntry>,
}

/// Result of a change-list operation: the entries actually applied, the
/// roster afterwards and everyone that has to hear about it.
#[derive(Debug, Clone)]
pub struct MemberChangeOutcome {
    pub changed: Vec<MemberChangeEntry>,
    pub member_ids: Vec<UserId>,
    pub recipients: Vec<UserId>,
}

#[derive(Debug, Clone)]
pub struct GroupUpdateOutcome {
    pub group: Group,
    pub removed: Vec<UserId>,
}

impl GroupUpdateOutcome {
    /// Current members plus the ones just removed.
    pub fn recipients(&self) -> Vec<UserId> {
        union_ids(&self.group.member_ids, &self.removed)
    }
}

/// Order-preserving union without duplicates.
pub fn union_ids(first: &[UserId], second: &[UserId]) -> Vec<UserId> {
    let mut seen = HashSet::new();
    first
        .iter()
        .chain(second.iter())
        .filter(|id| seen.insert(*id))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(group: &str, users: &[&str]) -> Vec<GroupMember> {
        users
            .iter()
            .map(|u| GroupMember::new(group.into(), (*u).into()))
            .collect()
    }

    fn ids(users: &[&str]) -> Vec<UserId> {
        users.iter().map(|u| (*u).into()).collect()
    }

    #[test]
    fn diff_touches_only_the_delta() {
        let old = rows("g1", &["a", "b", "c"]);
        let diff = MemberDiff::compute(&old, &ids(&["b", "c", "d"]));

        assert_eq!(diff.to_add, ids(&["d"]));
        assert_eq!(diff.to_remove.len(), 1);
        assert_eq!(diff.to_remove[0].user_id.as_str(), "a");
        assert_eq!(diff.to_remove[0].id, old[0].id);
    }

    #[test]
    fn diff_compares_user_ids_not_row_ids() {
        let old = rows("g1", &["a", "b"]);
        let desired: Vec<UserId> = old.iter().map(|m| m.user_id.clone()).collect();
        assert!(MemberDiff::compute(&old, &desired).is_empty());
    }

    #[test]
    fn diff_is_order_insensitive_and_collapses_repeats() {
        let old = rows("g1", &["a"]);
        let diff = MemberDiff::compute(&old, &ids(&["c", "a", "c", "b"]));
        assert_eq!(diff.to_add, ids(&["c", "b"]));
        assert!(diff.to_remove.is_empty());
    }

    #[test]
    fn diff_against_empty_sets() {
        let diff = MemberDiff::compute(&[], &ids(&["a", "b"]));
        assert_eq!(diff.to_add, ids(&["a", "b"]));

        let old = rows("g1", &["a", "b"]);
        let diff = MemberDiff::compute(&old, &[]);
        assert!(diff.to_add.is_empty());
        assert_eq!(diff.to_remove.len(), 2);
    }

    #[test]
    fn union_keeps_first_occurrence() {
        let merged = union_ids(&ids(&["b", "c", "d"]), &ids(&["a", "c"]));
        assert_eq!(merged, ids(&["b", "c", "d", "a"]));
    }

    #[test]
    fn payload_accepts_legacy_field_names() {
        let payload: GroupPayload = serde_json::from_str(
            r#"{"groupName":"hikers","memberIDs":["a","b"]}"#,
        )
        .unwrap();
        assert_eq!(payload.name, "hikers");
        assert_eq!(payload.member_ids, Some(ids(&["a", "b"])));
        assert!(payload.id.is_none());
    }

    #[test]
    fn payload_tells_missing_roster_from_empty_roster() {
        let missing: GroupPayload = serde_json::from_str(r#"{"name":"hikers"}"#).unwrap();
        assert_eq!(missing.member_ids, None);

        let empty: GroupPayload =
            serde_json::from_str(r#"{"name":"hikers","memberIds":[]}"#).unwrap();
        assert_eq!(empty.member_ids, Some(Vec::new()));
    }
}
