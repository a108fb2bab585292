use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

use crate::shared::ValidationError;

/// Connection parameters of a SQL destination.
///
/// Every field has a default so that a minimal configuration only names what differs from a
/// local MySQL server with a `logs` database.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SqlConnectionConfig {
    /// Database type, such as `mysql`, `pgsql`, `sqlite3`, `oracle` or `freetds`.
    #[serde(rename = "type", default = "default_driver_type")]
    pub driver_type: String,
    /// Host name of the database server. Empty means the driver default.
    #[serde(default)]
    pub host: String,
    /// Port of the database server as a string of digits. Empty means the driver default.
    #[serde(default, deserialize_with = "deserialize_port")]
    pub port: String,
    #[serde(default = "default_username", alias = "user")]
    pub username: String,
    /// Password for [`SqlConnectionConfig::username`]. Redacted in debug output.
    #[serde(default)]
    pub password: Option<SecretString>,
    /// Database name, or the database file path for SQLite.
    #[serde(default = "default_database")]
    pub database: String,
    /// Client character encoding.
    #[serde(default = "default_encoding")]
    pub encoding: String,
}

impl SqlConnectionConfig {
    pub const DEFAULT_DRIVER_TYPE: &'static str = "mysql";

    pub const DEFAULT_USERNAME: &'static str = "syslog-ng";

    pub const DEFAULT_DATABASE: &'static str = "logs";

    pub const DEFAULT_ENCODING: &'static str = "UTF-8";

    /// Validates the connection parameters.
    ///
    /// The port must be empty or consist of ASCII digits only.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.driver_type.trim().is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "type".to_string(),
                constraint: "must not be empty".to_string(),
            });
        }

        if !self.port.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::InvalidFieldValue {
                field: "port".to_string(),
                constraint: "must contain digits only".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for SqlConnectionConfig {
    fn default() -> Self {
        Self {
            driver_type: default_driver_type(),
            host: String::new(),
            port: String::new(),
            username: default_username(),
            password: None,
            database: default_database(),
            encoding: default_encoding(),
        }
    }
}

fn default_driver_type() -> String {
    SqlConnectionConfig::DEFAULT_DRIVER_TYPE.to_string()
}

fn default_username() -> String {
    SqlConnectionConfig::DEFAULT_USERNAME.to_string()
}

fn default_database() -> String {
    SqlConnectionConfig::DEFAULT_DATABASE.to_string()
}

fn default_encoding() -> String {
    SqlConnectionConfig::DEFAULT_ENCODING.to_string()
}

/// Accepts the port either as a string or as an integer.
fn deserialize_port<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Text(String),
        Number(u64),
    }

    Ok(match Port::deserialize(deserializer)? {
        Port::Text(text) => text,
        Port::Number(number) => number.to_string(),
    })
}
