use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum RelationError {
    #[error("user not found")]
    UserNotFound,
    #[error("group not found")]
    GroupNotFound,
    #[error("member not found")]
    MemberNotFound,
    #[error("already a member")]
    AlreadyMember,
    #[error("not an owner")]
    NotOwner,
    #[error("permission denied: {0}")]
    Forbidden(&'static str),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("store error: {0}")]
    Store(String),
}

/// Coarse classification handed back to callers.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    NotFound,
    PermissionDenied,
    BadRequest,
    Internal,
}

impl RelationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelationError::UserNotFound | RelationError::GroupNotFound => ErrorKind::NotFound,
            RelationError::NotOwner | RelationError::Forbidden(_) => ErrorKind::PermissionDenied,
            RelationError::MemberNotFound
            | RelationError::AlreadyMember
            | RelationError::BadRequest(_) => ErrorKind::BadRequest,
            RelationError::Store(_) => ErrorKind::Internal,
        }
    }

    pub fn store(context: &str, e: impl std::fmt::Display) -> Self {
        RelationError::Store(format!("{context}: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy() {
        assert_eq!(RelationError::GroupNotFound.kind(), ErrorKind::NotFound);
        assert_eq!(RelationError::NotOwner.kind(), ErrorKind::PermissionDenied);
        assert_eq!(RelationError::MemberNotFound.kind(), ErrorKind::BadRequest);
        assert_eq!(
            RelationError::store("insert group", "deadlock").to_string(),
            "store error: insert group: deadlock"
        );
        assert_eq!(RelationError::Store(String::new()).kind(), ErrorKind::Internal);
    }
}
