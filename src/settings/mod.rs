//! Layered settings: a TOML file picked by build profile (or `--settings`),
//! overridden by `PEACHY__*` environment variables.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;
