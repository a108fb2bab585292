//! SQL delivery sink for log messages.
//!
//! Messages handed to a [`destination::SqlDestinationHandle`] are queued and written by a
//! background worker, one INSERT per message, into tables rendered from a name template. Missing
//! tables and columns are created on the fly. With explicit commits the worker groups inserts
//! into transactions of `flush_lines` rows and keeps delivered messages in the queue backlog
//! until their transaction commits, so a failed commit replays them.
//!
//! Failed rows are retried a bounded number of times and then dropped. Connection failures make
//! the worker close the connection and wait `time_reopen` before reconnecting. On shutdown the
//! worker drains the queue, and whatever is left is persisted together with the sequence number
//! in a [`store::StateStore`].
//!
//! ```rust,no_run
//! use sink::client::sqlx_driver::SqlxDriver;
//! use sink::destination::SqlDestination;
//! use sink::store::memory::MemoryStateStore;
//! use sink::types::LogMessage;
//!
//! # async fn example(config: config::shared::SqlDestinationConfig) -> sink::error::SinkResult<()> {
//! let destination: SqlDestination<_, _> =
//!     SqlDestination::from_config(&config, SqlxDriver::new(), MemoryStateStore::new())?;
//! let handle = destination.start().await?;
//!
//! handle.queue(LogMessage::new(chrono::Utc::now()).with_value("MSG", "hello"));
//! handle.shutdown_and_wait().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod concurrency;
pub mod destination;
pub mod error;
mod macros;
pub mod metrics;
pub mod queue;
pub mod stats;
pub mod store;
pub mod template;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
pub mod workers;
