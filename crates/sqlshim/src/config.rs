use std::path::Path;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use sqlshim_pg::PgConfig;
use tracing::warn;

use crate::error::{Error, Result};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_USER: &str = "postgres";

/// Connection settings read from the "database file" handed to `open`.
///
/// The file is a JSON object:
///
/// ```json
/// { "host": "db.local", "user": "app", "pass": "secret", "db": "cars", "port": 5432 }
/// ```
///
/// Every field is optional. Absent fields, and fields of the wrong JSON type
/// (`{"host": 5}`), fall back to the server defaults when the config is
/// turned into a [`PgConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server host (default: localhost)
    #[serde(deserialize_with = "lenient_string")]
    pub host: Option<String>,

    /// Server port (default: 5432)
    #[serde(deserialize_with = "lenient_port")]
    pub port: Option<u16>,

    /// Login role (default: postgres)
    #[serde(deserialize_with = "lenient_string")]
    pub user: Option<String>,

    /// Password (default: empty)
    #[serde(deserialize_with = "lenient_string")]
    pub pass: Option<String>,

    /// Database to select, created on first open if missing (default: the user name)
    #[serde(deserialize_with = "lenient_string")]
    pub db: Option<String>,
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Null => None,
        other => {
            warn!(value = %other, "config field is not a string, using the default");
            None
        }
    })
}

fn lenient_port<'de, D>(deserializer: D) -> std::result::Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let port = value.as_u64().and_then(|p| u16::try_from(p).ok());
    if port.is_none() && !value.is_null() {
        warn!(%value, "config port is not a valid port number, using the default");
    }
    Ok(port)
}

impl Config {
    /// Load a config file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    /// Parse a config from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.port == Some(0) {
            return Err(Error::Config("port must be non-zero".to_string()));
        }
        for (field, value) in [("host", &self.host), ("user", &self.user), ("db", &self.db)] {
            if value.as_deref() == Some("") {
                return Err(Error::Config(format!("{field} must not be empty")));
            }
        }
        Ok(())
    }

    /// Resolve defaults into wire-driver settings.
    pub fn to_pg_config(&self) -> PgConfig {
        let user = self.user.as_deref().unwrap_or(DEFAULT_USER);
        PgConfig::new(
            self.host.as_deref().unwrap_or(DEFAULT_HOST),
            self.port.unwrap_or(DEFAULT_PORT),
            user,
            self.pass.as_deref().unwrap_or(""),
            self.db.as_deref().unwrap_or(user),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config() {
        let config = Config::from_json(
            r#"{"host": "db.local", "user": "app", "pass": "pw", "db": "cars", "port": 6000}"#,
        )
        .unwrap();
        assert_eq!(
            config.to_pg_config(),
            PgConfig::new("db.local", 6000, "app", "pw", "cars")
        );
    }

    #[test]
    fn test_defaults_for_absent_fields() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(
            config.to_pg_config(),
            PgConfig::new("localhost", 5432, "postgres", "", "postgres")
        );

        let config = Config::from_json(r#"{"user": "wes"}"#).unwrap();
        assert_eq!(config.to_pg_config().database, "wes");
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let config = Config::from_json(r#"{"db": "cars", "comment": "dev box"}"#).unwrap();
        assert_eq!(config.db.as_deref(), Some("cars"));
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(Config::from_json("not json"), Err(Error::Json(_))));
        assert!(matches!(Config::from_json(r#"{"port": 0}"#), Err(Error::Config(_))));
        assert!(matches!(Config::from_json(r#"{"db": ""}"#), Err(Error::Config(_))));
    }

    #[test]
    fn test_wrong_field_types_fall_back_to_defaults() {
        let config =
            Config::from_json(r#"{"host": 5, "user": ["x"], "pass": null, "db": "cars", "port": "6000"}"#)
                .unwrap();
        assert_eq!(config.host, None);
        assert_eq!(config.user, None);
        assert_eq!(config.port, None);
        assert_eq!(
            config.to_pg_config(),
            PgConfig::new("localhost", 5432, "postgres", "", "cars")
        );

        let config = Config::from_json(r#"{"port": 70000}"#).unwrap();
        assert_eq!(config.to_pg_config().port, 5432);
        let config = Config::from_json(r#"{"port": 6543}"#).unwrap();
        assert_eq!(config.port, Some(6543));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
