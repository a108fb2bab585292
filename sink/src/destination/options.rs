use std::time::Duration;

use config::shared::{DestinationFlag, SqlDestinationConfig};
use tracing::warn;

use crate::client::{ConnectOptions, Dialect, PortOption};
use crate::destination::Field;
use crate::error::{ErrorKind, SinkResult};
use crate::sink_error;
use crate::template::{Template, TemplateOptions};

/// Runtime options of a destination, derived once from its configuration.
#[derive(Debug, Clone)]
pub struct DestinationOptions {
    pub dialect: Dialect,
    pub connect_options: ConnectOptions,
    pub table: Template,
    pub fields: Vec<Field>,
    pub indexes: Vec<String>,
    pub null_value: Option<String>,
    /// Attempts per message, at least 1.
    pub retries: u32,
    pub flush_lines: i32,
    pub time_reopen: Duration,
    pub explicit_commits: bool,
    pub dont_create_tables: bool,
    pub session_statements: Vec<String>,
    pub template_options: TemplateOptions,
}

impl DestinationOptions {
    /// Validates `config` and compiles its templates.
    pub fn from_config(config: &SqlDestinationConfig) -> SinkResult<Self> {
        config.validate()?;

        let connection = &config.connection;
        let dialect = Dialect::from_driver_type(&connection.driver_type);

        let fields = config
            .columns
            .iter()
            .zip(&config.values)
            .map(|(spec, value)| Field::parse(spec, value))
            .collect::<SinkResult<Vec<_>>>()?;

        let port = if connection.port.is_empty() {
            None
        } else if dialect.port_option_is_numeric() {
            let port = connection.port.parse().map_err(|e| {
                sink_error!(
                    ErrorKind::ConfigError,
                    "Database port is not a valid port number",
                    connection.port,
                    source: e
                )
            })?;
            Some(PortOption::Numeric(port))
        } else {
            Some(PortOption::Text(connection.port.clone()))
        };

        let explicit_commits = config.has_flag(DestinationFlag::ExplicitCommits);

        let connect_options = ConnectOptions {
            dialect,
            driver_type: connection.driver_type.clone(),
            host: connection.host.clone(),
            port,
            username: connection.username.clone(),
            password: connection.password.clone(),
            database: connection.database.clone(),
            encoding: connection.encoding.clone(),
            auto_commit: !explicit_commits,
        };

        let retries = if config.retries == 0 {
            warn!("retries must be at least 1, using 1");
            1
        } else {
            config.retries
        };

        Ok(Self {
            dialect,
            connect_options,
            table: Template::compile(&config.table)?,
            fields,
            indexes: config.indexes.clone(),
            null_value: config.null_value.clone(),
            retries,
            flush_lines: config.flush_lines,
            time_reopen: Duration::from_millis(config.time_reopen_ms),
            explicit_commits,
            dont_create_tables: config.has_flag(DestinationFlag::DontCreateTables),
            session_statements: config.session_statements.clone(),
            template_options: TemplateOptions {
                frac_digits: config.frac_digits,
                send_time_zone: config.send_time_zone,
                local_time_zone: config.local_time_zone,
            },
        })
    }

    /// Rows per explicit transaction, or `None` when every insert commits on its own.
    pub fn flush_threshold(&self) -> Option<usize> {
        if self.explicit_commits && self.flush_lines > 0 {
            Some(self.flush_lines as usize)
        } else {
            None
        }
    }

    pub fn batching_enabled(&self) -> bool {
        self.flush_threshold().is_some()
    }

    /// Delivered messages stay in the queue backlog until committed.
    pub fn uses_backlog(&self) -> bool {
        self.explicit_commits
    }

    pub fn is_index_column(&self, column: &str) -> bool {
        self.indexes.iter().any(|index| index == column)
    }

    fn identity(&self, with_table: bool) -> String {
        let options = &self.connect_options;
        let port = options
            .port
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();

        let mut identity = format!(
            "{},{},{},{}",
            options.driver_type, options.host, port, options.database
        );
        if with_table {
            identity.push(',');
            identity.push_str(self.table.source());
        }

        identity
    }

    /// Instance label used for statistics and metrics.
    pub fn stats_instance(&self) -> String {
        self.identity(true)
    }

    /// Key of the persisted sequence number.
    pub fn sequence_persist_name(&self) -> String {
        format!("sql_sequence_number({})", self.identity(true))
    }

    /// Key of the persisted undelivered messages.
    pub fn queue_persist_name(&self) -> String {
        format!("sql_queue({})", self.identity(true))
    }

    /// Queue key used before the table became part of the destination identity.
    pub fn legacy_queue_persist_name(&self) -> String {
        format!("sql_queue({})", self.identity(false))
    }
}
