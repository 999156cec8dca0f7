//! In-process adapters for the storage ports. Used by the `memory` backend,
//! the demo binary and the test suites.

mod friendship_repo_memory;
mod group_member_repo_memory;
mod group_repo_memory;
mod user_repo_memory;

pub use friendship_repo_memory::*;
pub use group_member_repo_memory::*;
pub use group_repo_memory::*;
pub use user_repo_memory::*;

mod store;

pub use store::{MemoryStore, MemoryTx, MemoryTxManager, Tables};
