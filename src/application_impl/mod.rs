mod friend_service_impl;
mod group_service_impl;
mod key_lock;

pub use friend_service_impl::*;
pub use group_service_impl::*;
pub use key_lock::*;
