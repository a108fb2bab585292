use std::fmt;
use std::future::Future;

use secrecy::SecretString;

use crate::client::Dialect;
use crate::error::SinkResult;

/// Port setting as handed to the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortOption {
    Numeric(u16),
    Text(String),
}

impl fmt::Display for PortOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortOption::Numeric(port) => write!(f, "{port}"),
            PortOption::Text(port) => f.write_str(port),
        }
    }
}

/// Everything a driver needs to open a connection.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub dialect: Dialect,
    /// Driver type as configured, kept for diagnostics.
    pub driver_type: String,
    pub host: String,
    /// `None` leaves the port to the driver default.
    pub port: Option<PortOption>,
    pub username: String,
    pub password: Option<SecretString>,
    /// Database name, or the database file path for SQLite. SQLite paths are used as given.
    pub database: String,
    pub encoding: String,
    /// Whether statements commit on their own. `false` when the destination manages
    /// transactions explicitly.
    pub auto_commit: bool,
}

/// Factory for database connections.
///
/// A driver is constructed explicitly at startup and injected into every destination that uses
/// it, so any driver-wide initialization happens exactly once and without global state.
pub trait SqlDriver: Send + Sync + 'static {
    type Connection: SqlConnection;

    /// Opens a new connection. Fails with [`crate::error::ErrorKind::DriverUnavailable`] when the
    /// driver cannot serve the requested database type.
    fn connect(
        &self,
        options: &ConnectOptions,
    ) -> impl Future<Output = SinkResult<Self::Connection>> + Send;
}

/// An open database connection.
pub trait SqlConnection: Send + 'static {
    /// Executes a statement and discards any result rows. Errors carry the driver's message.
    fn execute(&mut self, sql: &str) -> impl Future<Output = SinkResult<()>> + Send;

    /// Prepares a query and returns the names of its result columns.
    ///
    /// Used with zero-row queries to inspect the shape of a table.
    fn probe_columns(&mut self, sql: &str) -> impl Future<Output = SinkResult<Vec<String>>> + Send;

    /// Quotes `value` as a string literal, or returns `None` when it cannot be quoted.
    fn quote_string(&self, value: &str) -> Option<String>;

    /// Returns `true` when the server still answers on this connection.
    fn ping(&mut self) -> impl Future<Output = bool> + Send;

    /// Closes the connection.
    fn close(self) -> impl Future<Output = ()> + Send;
}
