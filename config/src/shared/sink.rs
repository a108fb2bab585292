use serde::Deserialize;

use crate::load::Config;
use crate::shared::{SqlDestinationConfig, StateStoreConfig, ValidationError};

/// Top-level configuration of a SQL sink process.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SqlSinkConfig {
    #[serde(default)]
    pub destination: SqlDestinationConfig,
    #[serde(default)]
    pub state_store: StateStoreConfig,
}

impl SqlSinkConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.destination.validate()
    }
}

impl Config for SqlSinkConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[
        "destination.columns",
        "destination.values",
        "destination.indexes",
        "destination.flags",
    ];
}
