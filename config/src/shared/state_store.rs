use std::path::PathBuf;

use serde::Deserialize;

/// Where the sink keeps state that must survive a restart.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StateStoreConfig {
    /// State lives in memory and is lost on exit.
    #[default]
    Memory,
    /// State is written as JSON to a file.
    File { path: PathBuf },
}
