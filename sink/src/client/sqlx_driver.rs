use secrecy::ExposeSecret;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{Column, Connection, Executor, Statement};
use tracing::{debug, warn};

use crate::bail;
use crate::client::{ConnectOptions, Dialect, PortOption, SqlConnection, SqlDriver};
use crate::error::{ErrorKind, SinkResult};
use crate::sink_error;

/// [`SqlDriver`] backed by sqlx connections.
///
/// Serves PostgreSQL, MySQL and SQLite. Other database types fail to connect with
/// [`ErrorKind::DriverUnavailable`].
#[derive(Debug, Clone, Default)]
pub struct SqlxDriver;

impl SqlxDriver {
    pub fn new() -> Self {
        Self
    }
}

impl SqlDriver for SqlxDriver {
    type Connection = SqlxConnection;

    async fn connect(&self, options: &ConnectOptions) -> SinkResult<SqlxConnection> {
        let inner = match options.dialect {
            Dialect::Postgres => {
                let mut connect_options = PgConnectOptions::new()
                    .username(&options.username)
                    .database(&options.database);
                if !options.host.is_empty() {
                    connect_options = connect_options.host(&options.host);
                }
                if let Some(port) = &options.port {
                    connect_options = connect_options.port(numeric_port(port)?);
                }
                if let Some(password) = &options.password {
                    connect_options = connect_options.password(password.expose_secret());
                }
                if !is_utf8(&options.encoding) {
                    warn!(
                        encoding = %options.encoding,
                        "postgres connections always use UTF8, ignoring configured encoding"
                    );
                }

                Inner::Postgres(PgConnection::connect_with(&connect_options).await?)
            }
            Dialect::MySql => {
                let mut connect_options = MySqlConnectOptions::new()
                    .username(&options.username)
                    .database(&options.database)
                    .charset(&mysql_charset(&options.encoding));
                if !options.host.is_empty() {
                    connect_options = connect_options.host(&options.host);
                }
                if let Some(port) = &options.port {
                    connect_options = connect_options.port(numeric_port(port)?);
                }
                if let Some(password) = &options.password {
                    connect_options = connect_options.password(password.expose_secret());
                }

                Inner::MySql(MySqlConnection::connect_with(&connect_options).await?)
            }
            Dialect::Sqlite => {
                let connect_options = SqliteConnectOptions::new()
                    .filename(&options.database)
                    .create_if_missing(true);

                Inner::Sqlite(SqliteConnection::connect_with(&connect_options).await?)
            }
            Dialect::Oracle | Dialect::FreeTds | Dialect::Generic => {
                bail!(
                    ErrorKind::DriverUnavailable,
                    "No database driver available for the configured type",
                    options.driver_type
                );
            }
        };

        debug!(dialect = %options.dialect, host = %options.host, "connected to database");

        Ok(SqlxConnection {
            dialect: options.dialect,
            inner,
        })
    }
}

enum Inner {
    Postgres(PgConnection),
    MySql(MySqlConnection),
    Sqlite(SqliteConnection),
}

/// A sqlx connection to one of the supported databases.
pub struct SqlxConnection {
    dialect: Dialect,
    inner: Inner,
}

impl SqlConnection for SqlxConnection {
    async fn execute(&mut self, sql: &str) -> SinkResult<()> {
        match &mut self.inner {
            Inner::Postgres(conn) => {
                conn.execute(sql).await?;
            }
            Inner::MySql(conn) => {
                conn.execute(sql).await?;
            }
            Inner::Sqlite(conn) => {
                conn.execute(sql).await?;
            }
        }

        Ok(())
    }

    async fn probe_columns(&mut self, sql: &str) -> SinkResult<Vec<String>> {
        let columns = match &mut self.inner {
            Inner::Postgres(conn) => column_names(conn.prepare(sql).await?.columns()),
            Inner::MySql(conn) => column_names(conn.prepare(sql).await?.columns()),
            Inner::Sqlite(conn) => column_names(conn.prepare(sql).await?.columns()),
        };

        Ok(columns)
    }

    fn quote_string(&self, value: &str) -> Option<String> {
        self.dialect.quote_string(value)
    }

    async fn ping(&mut self) -> bool {
        let result = match &mut self.inner {
            Inner::Postgres(conn) => conn.ping().await,
            Inner::MySql(conn) => conn.ping().await,
            Inner::Sqlite(conn) => conn.ping().await,
        };

        result.is_ok()
    }

    async fn close(self) {
        let result = match self.inner {
            Inner::Postgres(conn) => conn.close().await,
            Inner::MySql(conn) => conn.close().await,
            Inner::Sqlite(conn) => conn.close().await,
        };

        if let Err(e) = result {
            debug!(error = %e, "error while closing database connection");
        }
    }
}

fn column_names<C: Column>(columns: &[C]) -> Vec<String> {
    columns
        .iter()
        .map(|column| column.name().to_string())
        .collect()
}

fn numeric_port(port: &PortOption) -> SinkResult<u16> {
    match port {
        PortOption::Numeric(port) => Ok(*port),
        PortOption::Text(port) => port.parse().map_err(|e| {
            sink_error!(
                ErrorKind::ConfigError,
                "Database port is not a valid port number",
                port,
                source: e
            )
        }),
    }
}

fn is_utf8(encoding: &str) -> bool {
    matches!(encoding.to_ascii_lowercase().as_str(), "utf-8" | "utf8")
}

fn mysql_charset(encoding: &str) -> String {
    if is_utf8(encoding) {
        "utf8mb4".to_string()
    } else {
        encoding.to_ascii_lowercase()
    }
}
