use super::Parser;

/// Social graph and notification server.
#[derive(Parser, Debug)]
#[command(version)]
pub struct Cli {
    /// Settings file, defaults to settings/dev.toml or settings/release.toml
    #[arg(long)]
    pub settings: Option<String>,
    /// Overrides `log.filter` from the settings file
    #[arg(long)]
    pub log_filter: Option<String>,
}
