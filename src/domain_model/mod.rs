mod event;
mod friend;
mod group;
mod user;

pub use event::*;
pub use friend::*;
pub use group::*;
pub use user::*;
