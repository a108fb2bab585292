use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;

use crate::client::{ConnectOptions, Dialect, SqlConnection, SqlDriver};
use crate::error::{ErrorKind, SinkResult};
use crate::sink_error;
use crate::test_utils::notify::{DEFAULT_NOTIFY_TIMEOUT, with_timeout};

/// Interaction observed by a [`FakeDriver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    Connect,
    ConnectFailed,
    Statement(String),
    Ping(bool),
    Close,
}

#[derive(Debug)]
struct FailureRule {
    prefix: String,
    skip: usize,
    remaining: usize,
}

/// Observable state of the in-memory database.
#[derive(Debug)]
pub struct FakeDatabase {
    pub events: Vec<DriverEvent>,
    /// Existing tables and their columns.
    pub tables: BTreeMap<String, Vec<String>>,
    /// INSERT statements that were committed, in commit order.
    pub committed: Vec<String>,
    /// INSERT statements of the open transaction.
    pub uncommitted: Vec<String>,
    pub in_transaction: bool,
    pub alive: bool,
    failures: Vec<FailureRule>,
    connect_failures: usize,
    pings: VecDeque<bool>,
}

impl Default for FakeDatabase {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            tables: BTreeMap::new(),
            committed: Vec::new(),
            uncommitted: Vec::new(),
            in_transaction: false,
            alive: true,
            failures: Vec::new(),
            connect_failures: 0,
            pings: VecDeque::new(),
        }
    }
}

impl FakeDatabase {
    /// Every statement sent to the database, in order.
    pub fn statements(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|event| match event {
                DriverEvent::Statement(sql) => Some(sql.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn count_statements(&self, prefix: &str) -> usize {
        self.statements()
            .iter()
            .filter(|sql| sql.starts_with(prefix))
            .count()
    }

    pub fn count_events(&self, event: &DriverEvent) -> usize {
        self.events.iter().filter(|e| *e == event).count()
    }

    fn take_failure(&mut self, sql: &str) -> bool {
        let rule = self
            .failures
            .iter_mut()
            .find(|rule| rule.remaining > 0 && sql.starts_with(&rule.prefix));

        match rule {
            Some(rule) if rule.skip > 0 => {
                rule.skip -= 1;
                false
            }
            Some(rule) => {
                rule.remaining -= 1;
                true
            }
            None => false,
        }
    }

    fn apply(&mut self, sql: &str) -> SinkResult<()> {
        self.events.push(DriverEvent::Statement(sql.to_string()));

        if !self.alive {
            return Err(sink_error!(
                ErrorKind::ConnectionFailed,
                "Fake database is unreachable",
                sql
            ));
        }
        if self.take_failure(sql) {
            return Err(sink_error!(
                ErrorKind::QueryFailed,
                "Injected statement failure",
                sql
            ));
        }

        if sql == "BEGIN" || sql == "BEGIN TRANSACTION" {
            self.in_transaction = true;
        } else if sql == "COMMIT" {
            self.committed.append(&mut self.uncommitted);
            self.in_transaction = false;
        } else if sql == "ROLLBACK" {
            self.uncommitted.clear();
            self.in_transaction = false;
        } else if sql.starts_with("INSERT INTO ") {
            if self.in_transaction {
                self.uncommitted.push(sql.to_string());
            } else {
                self.committed.push(sql.to_string());
            }
        } else if let Some(definition) = sql.strip_prefix("CREATE TABLE ") {
            let (table, columns) = definition.split_once(" (").unwrap_or((definition, ""));
            if self.tables.contains_key(table) {
                return Err(sink_error!(
                    ErrorKind::QueryFailed,
                    "Table already exists",
                    table
                ));
            }
            let columns = columns
                .trim_end_matches(')')
                .split(", ")
                .filter_map(|column| column.split(' ').next())
                .map(ToString::to_string)
                .collect();
            self.tables.insert(table.to_string(), columns);
        } else if let Some(definition) = sql.strip_prefix("ALTER TABLE ") {
            let mut parts = definition.split(' ');
            let (Some(table), Some("ADD"), Some(column)) = (parts.next(), parts.next(), parts.next())
            else {
                return Err(sink_error!(ErrorKind::QueryFailed, "Syntax error", sql));
            };
            let Some(columns) = self.tables.get_mut(table) else {
                return Err(sink_error!(ErrorKind::QueryFailed, "No such table", table));
            };
            columns.push(column.to_string());
        }

        Ok(())
    }

    fn probe(&mut self, sql: &str) -> SinkResult<Vec<String>> {
        self.events.push(DriverEvent::Statement(sql.to_string()));

        if !self.alive {
            return Err(sink_error!(
                ErrorKind::ConnectionFailed,
                "Fake database is unreachable",
                sql
            ));
        }
        if self.take_failure(sql) {
            return Err(sink_error!(
                ErrorKind::QueryFailed,
                "Injected statement failure",
                sql
            ));
        }

        let table = sql
            .strip_prefix("SELECT * FROM ")
            .and_then(|rest| rest.split(' ').next())
            .unwrap_or_default();

        self.tables
            .get(table)
            .cloned()
            .ok_or_else(|| sink_error!(ErrorKind::QueryFailed, "No such table", table))
    }

    fn close(&mut self) {
        self.events.push(DriverEvent::Close);
        self.uncommitted.clear();
        self.in_transaction = false;
    }
}

#[derive(Debug, Default)]
struct Shared {
    database: Mutex<FakeDatabase>,
    changed: Notify,
}

/// Scripted [`SqlDriver`] backed by an in-memory table catalog.
///
/// Understands enough SQL to track tables, columns and transactions, and records every
/// interaction. Clones share the same database, so a test keeps one clone to inspect what the
/// destination did and to inject failures.
#[derive(Debug, Clone)]
pub struct FakeDriver {
    shared: Arc<Shared>,
    dialect: Dialect,
}

impl Default for FakeDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDriver {
    /// Creates a driver quoting values like SQLite.
    pub fn new() -> Self {
        Self::with_dialect(Dialect::Sqlite)
    }

    pub fn with_dialect(dialect: Dialect) -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            dialect,
        }
    }

    fn lock(&self) -> MutexGuard<'_, FakeDatabase> {
        self.shared
            .database
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn update<R>(&self, f: impl FnOnce(&mut FakeDatabase) -> R) -> R {
        let result = f(&mut self.lock());
        self.shared.changed.notify_waiters();
        result
    }

    /// Runs `f` on the current database state.
    pub fn inspect<R>(&self, f: impl FnOnce(&FakeDatabase) -> R) -> R {
        f(&self.lock())
    }

    pub fn statements(&self) -> Vec<String> {
        self.inspect(FakeDatabase::statements)
    }

    pub fn committed(&self) -> Vec<String> {
        self.inspect(|database| database.committed.clone())
    }

    pub fn count_statements(&self, prefix: &str) -> usize {
        self.inspect(|database| database.count_statements(prefix))
    }

    pub fn count_events(&self, event: &DriverEvent) -> usize {
        self.inspect(|database| database.count_events(event))
    }

    /// Adds an existing table with `columns`.
    pub fn create_table(&self, table: &str, columns: &[&str]) {
        self.update(|database| {
            database.tables.insert(
                table.to_string(),
                columns.iter().map(ToString::to_string).collect(),
            )
        });
    }

    pub fn table_columns(&self, table: &str) -> Option<Vec<String>> {
        self.inspect(|database| database.tables.get(table).cloned())
    }

    /// Makes the next `times` statements starting with `prefix` fail.
    pub fn fail_statements(&self, prefix: &str, times: usize) {
        self.fail_statements_after(prefix, 0, times);
    }

    /// Lets `skip` statements starting with `prefix` pass, then fails the next `times` ones.
    pub fn fail_statements_after(&self, prefix: &str, skip: usize, times: usize) {
        self.update(|database| {
            database.failures.push(FailureRule {
                prefix: prefix.to_string(),
                skip,
                remaining: times,
            })
        });
    }

    /// Makes the next `times` connection attempts fail.
    pub fn fail_connects(&self, times: usize) {
        self.update(|database| database.connect_failures += times);
    }

    /// Queues results for the next pings. Without queued results a ping reports liveness.
    pub fn script_pings(&self, results: &[bool]) {
        self.update(|database| database.pings.extend(results));
    }

    /// Takes the database down or brings it back up.
    ///
    /// While down, connects, statements and pings fail. Taking it down discards the open
    /// transaction.
    pub fn set_alive(&self, alive: bool) {
        self.update(|database| {
            database.alive = alive;
            if !alive {
                database.uncommitted.clear();
                database.in_transaction = false;
            }
        });
    }

    /// Waits until `condition` holds for the database state.
    ///
    /// # Panics
    ///
    /// Panics when the condition does not hold within [`DEFAULT_NOTIFY_TIMEOUT`].
    pub async fn wait_until(&self, condition: impl Fn(&FakeDatabase) -> bool) {
        self.wait_until_with_timeout(DEFAULT_NOTIFY_TIMEOUT, condition)
            .await;
    }

    pub async fn wait_until_with_timeout(
        &self,
        timeout_duration: Duration,
        condition: impl Fn(&FakeDatabase) -> bool,
    ) {
        with_timeout(timeout_duration, async {
            loop {
                let changed = self.shared.changed.notified();
                tokio::pin!(changed);
                changed.as_mut().enable();

                if self.inspect(&condition) {
                    return;
                }

                changed.await;
            }
        })
        .await;
    }
}

impl SqlDriver for FakeDriver {
    type Connection = FakeConnection;

    async fn connect(&self, options: &ConnectOptions) -> SinkResult<FakeConnection> {
        let connected = self.update(|database| {
            if !database.alive || database.connect_failures > 0 {
                database.connect_failures = database.connect_failures.saturating_sub(1);
                database.events.push(DriverEvent::ConnectFailed);
                false
            } else {
                database.events.push(DriverEvent::Connect);
                true
            }
        });

        if !connected {
            return Err(sink_error!(
                ErrorKind::ConnectionFailed,
                "Fake database refused the connection",
                options.database
            ));
        }

        Ok(FakeConnection {
            driver: self.clone(),
        })
    }
}

/// Connection handed out by [`FakeDriver`].
#[derive(Debug)]
pub struct FakeConnection {
    driver: FakeDriver,
}

impl SqlConnection for FakeConnection {
    async fn execute(&mut self, sql: &str) -> SinkResult<()> {
        self.driver.update(|database| database.apply(sql))
    }

    async fn probe_columns(&mut self, sql: &str) -> SinkResult<Vec<String>> {
        self.driver.update(|database| database.probe(sql))
    }

    fn quote_string(&self, value: &str) -> Option<String> {
        self.driver.dialect.quote_string(value)
    }

    async fn ping(&mut self) -> bool {
        self.driver.update(|database| {
            let alive = database.pings.pop_front().unwrap_or(database.alive);
            database.events.push(DriverEvent::Ping(alive));
            alive
        })
    }

    async fn close(self) {
        self.driver.update(FakeDatabase::close);
    }
}
