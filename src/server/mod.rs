mod server;
mod port;
mod notifier;
mod event_publisher_impl;
mod event_consumer_impl;
mod event_handler_impl;
mod local_broker;
pub mod topic;

pub use server::*;
pub use port::*;
pub use notifier::*;
pub use event_publisher_impl::*;
pub use event_consumer_impl::*;
pub use event_handler_impl::*;
pub use local_broker::*;
