mod friend_service;
mod group_service;
mod relation_error;

pub use friend_service::*;
pub use group_service::*;
pub use relation_error::*;
