use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(
    Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        UserId(s.to_owned())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        UserId(s)
    }
}

/// Two users in canonical order: `greater` sorts lexicographically after `lesser`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct UserPair(UserId, UserId);

impl UserPair {
    pub fn new(a: UserId, b: UserId) -> Self {
        if a > b { Self(a, b) } else { Self(b, a) }
    }

    pub fn greater(&self) -> &UserId {
        &self.0
    }

    pub fn lesser(&self) -> &UserId {
        &self.1
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum UserStatus {
    Enabled,
    Disabled,
}

impl From<UserStatus> for u8 {
    fn from(status: UserStatus) -> u8 {
        match status {
            UserStatus::Enabled => 1,
            UserStatus::Disabled => 2,
        }
    }
}

impl TryFrom<u8> for UserStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(UserStatus::Enabled),
            2 => Ok(UserStatus::Disabled),
            other => Err(format!("invalid user status: {other}")),
        }
    }
}

/// A user as seen through the external user directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub user_name: String,
    #[serde(default)]
    pub real_name: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    pub status: UserStatus,
}

impl UserProfile {
    pub fn is_enabled(&self) -> bool {
        self.status == UserStatus::Enabled
    }

    pub fn to_friend_info(&self) -> FriendInfo {
        FriendInfo {
            id: self.id.clone(),
            user_name: self.user_name.clone(),
            real_name: self.real_name.clone(),
            avatar: self.avatar.clone(),
            phone: self.phone.clone(),
            email: self.email.clone(),
        }
    }
}

/// Public projection of a profile, safe to hand to other users.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendInfo {
    pub id: UserId,
    pub user_name: String,
    pub real_name: String,
    pub avatar: String,
    pub phone: String,
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_orders_greater_first() {
        let pair = UserPair::new("u1".into(), "u2".into());
        assert_eq!(pair.greater().as_str(), "u2");
        assert_eq!(pair.lesser().as_str(), "u1");
        assert_eq!(pair, UserPair::new("u2".into(), "u1".into()));
    }

    #[test]
    fn status_serializes_as_code() {
        assert_eq!(serde_json::to_string(&UserStatus::Disabled).unwrap(), "2");
        assert!(serde_json::from_str::<UserStatus>("7").is_err());
    }
}
