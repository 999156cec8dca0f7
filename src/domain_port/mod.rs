mod friendship_repo;
mod group_member_repo;
mod group_repo;
mod user_repo;

mod repo_tx;

pub use friendship_repo::*;
pub use group_member_repo::*;
pub use group_repo::*;
pub use user_repo::*;

pub use repo_tx::*;
