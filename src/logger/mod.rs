//! Global `tracing` subscriber with a filter that can be swapped once the
//! settings are loaded. Code elsewhere logs through the re-exported macros.

mod logger;
pub use logger::*;

pub use tracing::{debug, error, info, trace, warn};
