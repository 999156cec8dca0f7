use crate::domain_model::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Friend operations carry the acting user and the counterpart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendOperateParams {
    #[serde(alias = "formUserId")]
    pub from_user_id: UserId,
    pub to_user_id: UserId,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GroupEventKind {
    Create,
    Update,
    Delete,
    AddMembers,
    DelMembers,
    ExitGroup,
}

impl GroupEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupEventKind::Create => "create",
            GroupEventKind::Update => "update",
            GroupEventKind::Delete => "delete",
            GroupEventKind::AddMembers => "addMembers",
            GroupEventKind::DelMembers => "delMembers",
            GroupEventKind::ExitGroup => "exitGroup",
        }
    }
}

impl fmt::Display for GroupEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum EventKind {
    Group(GroupEventKind),
    FriendChange,
}

/// One addressed notification, produced after a committed mutation and
/// consumed immediately by the dispatcher.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub recipient: UserId,
    pub kind: EventKind,
    pub topic: String,
    pub payload: Vec<u8>,
}
