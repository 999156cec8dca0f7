use crate::domain_model::{UserProfile, UserStatus};
use anyhow::{Result, anyhow};
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub log: Log,
    pub store: Store,
    pub broker: Broker,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[derive(Debug, Deserialize)]
pub struct Store {
    pub backend: String, // "memory" or "mysql"
    #[serde(default)]
    pub dsn: String,
    /// Users loaded into the memory backend at startup.
    #[serde(default)]
    pub seed_users: Vec<SeedUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedUser {
    pub id: String,
    pub user_name: String,
    #[serde(default)]
    pub real_name: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
}

impl From<SeedUser> for UserProfile {
    fn from(seed: SeedUser) -> Self {
        UserProfile {
            id: seed.id.into(),
            user_name: seed.user_name,
            real_name: seed.real_name,
            avatar: seed.avatar,
            phone: seed.phone,
            email: seed.email,
            status: UserStatus::Enabled,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Broker {
    pub backend: String, // "local" or "redis"
    #[serde(default)]
    pub dsn: String,
    pub topic_prefix: String,
    pub client_id: String,
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

/// Loads the TOML file, then lets `PEACHY__SECTION__KEY` variables
/// override single values.
pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .add_source(Environment::with_prefix("PEACHY").separator("__"))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    #[test]
    fn deserializes_all_sections() {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(
                r#"
[log]
filter = "debug"

[store]
backend = "memory"

[[store.seed_users]]
id = "u1"
user_name = "alice"
phone = "13800000000"

[broker]
backend = "local"
topic_prefix = "social"
client_id = "peachy"
"#,
                FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.store.backend, "memory");
        assert!(settings.store.dsn.is_empty());
        let profile = UserProfile::from(settings.store.seed_users[0].clone());
        assert_eq!(profile.id.as_str(), "u1");
        assert!(profile.is_enabled());
        assert_eq!(settings.broker.topic_prefix, "social");
    }
}
