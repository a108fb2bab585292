use config::shared::{DestinationFlag, SqlDestinationConfig};

use crate::destination::DestinationOptions;

/// Builds a configuration for an SQLite-typed destination with two columns, `host` and `msg`,
/// writing into table `messages` without indexes.
pub fn test_destination_config() -> SqlDestinationConfig {
    let mut config: SqlDestinationConfig = serde_json::from_value(serde_json::json!({
        "type": "sqlite3",
        "database": "logs.db",
        "columns": ["host", "msg"],
        "values": ["${HOST}", "${MSG}"],
        "indexes": [],
        "time_reopen_ms": 1000,
    }))
    .unwrap_or_else(|err| panic!("invalid test destination config: {err}"));
    config.table = "messages".to_string();

    config
}

/// Same as [`test_destination_config`] with explicit commits every `flush_lines` rows.
pub fn batched_destination_config(flush_lines: i32) -> SqlDestinationConfig {
    let mut config = test_destination_config();
    config.flags.push(DestinationFlag::ExplicitCommits);
    config.flush_lines = flush_lines;

    config
}

pub fn destination_options(config: &SqlDestinationConfig) -> DestinationOptions {
    DestinationOptions::from_config(config)
        .unwrap_or_else(|err| panic!("invalid test destination options: {err}"))
}
