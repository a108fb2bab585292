use chrono::FixedOffset;
use serde::{Deserialize, Deserializer};

use crate::shared::{SqlConnectionConfig, ValidationError};

/// Keyword that marks a column as filled by the database default.
pub const DEFAULT_VALUE_KEYWORD: &str = "default";

/// Value source of a single column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnValue {
    /// A template rendered for every message.
    Template(String),
    /// The column is left out of INSERT statements so the database fills in its default.
    Default,
}

impl<'de> Deserialize<'de> for ColumnValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        if value == DEFAULT_VALUE_KEYWORD {
            Ok(ColumnValue::Default)
        } else {
            Ok(ColumnValue::Template(value))
        }
    }
}

/// Behavior flags of a SQL destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum DestinationFlag {
    /// Group inserts into explicit transactions of `flush_lines` rows.
    #[serde(rename = "explicit-commits", alias = "explicit_commits")]
    ExplicitCommits,
    /// Never probe, create or alter the target tables.
    #[serde(rename = "dont-create-tables", alias = "dont_create_tables")]
    DontCreateTables,
}

/// Configuration of a SQL destination.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SqlDestinationConfig {
    #[serde(flatten)]
    pub connection: SqlConnectionConfig,
    /// Template of the target table name.
    #[serde(default = "default_table")]
    pub table: String,
    /// Column specifications, each `name` or `name type`.
    #[serde(default = "default_columns")]
    pub columns: Vec<String>,
    /// One value per column, either a template or `default`.
    #[serde(default = "default_values")]
    pub values: Vec<ColumnValue>,
    /// Columns that get an index when the table or column is created.
    #[serde(default = "default_indexes")]
    pub indexes: Vec<String>,
    /// Rendered value that is stored as SQL `NULL`.
    #[serde(default)]
    pub null_value: Option<String>,
    /// Attempts made for a single message before it is dropped.
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Rows per explicit transaction. Only used with the `explicit-commits` flag.
    #[serde(default = "default_flush_lines")]
    pub flush_lines: i32,
    /// Time to wait, in milliseconds, before reconnecting after a failure.
    #[serde(default = "default_time_reopen_ms")]
    pub time_reopen_ms: u64,
    #[serde(default)]
    pub flags: Vec<DestinationFlag>,
    /// Statements executed right after every successful connect.
    #[serde(default)]
    pub session_statements: Vec<String>,
    /// Digits of fractional seconds in rendered timestamps.
    #[serde(default)]
    pub frac_digits: u8,
    /// Time zone used when rendering column values.
    #[serde(default, deserialize_with = "deserialize_time_zone")]
    pub send_time_zone: Option<FixedOffset>,
    /// Time zone used when rendering the table name.
    #[serde(default, deserialize_with = "deserialize_time_zone")]
    pub local_time_zone: Option<FixedOffset>,
}

impl SqlDestinationConfig {
    pub const DEFAULT_TABLE: &'static str = "messages";

    pub const DEFAULT_RETRIES: u32 = 3;

    /// Batching is disabled unless `flush_lines` is positive.
    pub const DEFAULT_FLUSH_LINES: i32 = -1;

    pub const DEFAULT_TIME_REOPEN_MS: u64 = 60_000;

    pub const MAX_FRAC_DIGITS: u8 = 6;

    /// Returns `true` when `flag` is set.
    pub fn has_flag(&self, flag: DestinationFlag) -> bool {
        self.flags.contains(&flag)
    }

    /// Validates the destination configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.connection.validate()?;

        if self.columns.is_empty() {
            return Err(ValidationError::NoColumns);
        }

        if self.columns.len() != self.values.len() {
            return Err(ValidationError::ColumnValueCountMismatch {
                columns: self.columns.len(),
                values: self.values.len(),
            });
        }

        if self.table.trim().is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "table".to_string(),
                constraint: "must not be empty".to_string(),
            });
        }

        if self.frac_digits > Self::MAX_FRAC_DIGITS {
            return Err(ValidationError::InvalidFieldValue {
                field: "frac_digits".to_string(),
                constraint: format!("must be at most {}", Self::MAX_FRAC_DIGITS),
            });
        }

        Ok(())
    }
}

impl Default for SqlDestinationConfig {
    fn default() -> Self {
        Self {
            connection: SqlConnectionConfig::default(),
            table: default_table(),
            columns: default_columns(),
            values: default_values(),
            indexes: default_indexes(),
            null_value: None,
            retries: default_retries(),
            flush_lines: default_flush_lines(),
            time_reopen_ms: default_time_reopen_ms(),
            flags: Vec::new(),
            session_statements: Vec::new(),
            frac_digits: 0,
            send_time_zone: None,
            local_time_zone: None,
        }
    }
}

fn default_table() -> String {
    SqlDestinationConfig::DEFAULT_TABLE.to_string()
}

fn default_columns() -> Vec<String> {
    ["date", "facility", "level", "host", "program", "pid", "message"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn default_values() -> Vec<ColumnValue> {
    [
        "${R_YEAR}-${R_MONTH}-${R_DAY} ${R_HOUR}:${R_MIN}:${R_SEC}",
        "${FACILITY}",
        "${LEVEL}",
        "${HOST}",
        "${PROGRAM}",
        "${PID}",
        "${MSG}",
    ]
    .into_iter()
    .map(|value| ColumnValue::Template(value.to_string()))
    .collect()
}

fn default_indexes() -> Vec<String> {
    ["date", "facility", "host", "program"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn default_retries() -> u32 {
    SqlDestinationConfig::DEFAULT_RETRIES
}

fn default_flush_lines() -> i32 {
    SqlDestinationConfig::DEFAULT_FLUSH_LINES
}

fn default_time_reopen_ms() -> u64 {
    SqlDestinationConfig::DEFAULT_TIME_REOPEN_MS
}

/// Parses fixed offsets written as `+02:00` or `-0530`.
fn deserialize_time_zone<'de, D>(deserializer: D) -> Result<Option<FixedOffset>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(value) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };

    value
        .parse::<FixedOffset>()
        .map(Some)
        .map_err(|e| serde::de::Error::custom(format!("invalid time zone `{value}`: {e}")))
}
