use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::bail;
use crate::client::{SqlConnection, SqlDriver};
use crate::destination::DestinationOptions;
use crate::error::{ErrorKind, SinkResult};
use crate::queue::DeliveryQueue;
use crate::stats::DestinationStats;
use crate::types::SequenceNumber;

/// Transaction bookkeeping of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct TransactionState {
    pub(super) active: bool,
    /// Rows inserted since the last `BEGIN`, `None` when batching is disabled.
    pub(super) batched_rows: Option<usize>,
}

impl TransactionState {
    pub(super) fn new(batching_enabled: bool) -> Self {
        Self {
            active: false,
            batched_rows: batching_enabled.then_some(0),
        }
    }

    pub(super) fn reset_batch(&mut self) {
        if let Some(rows) = self.batched_rows.as_mut() {
            *rows = 0;
        }
    }
}

/// Database-facing state of a destination worker.
///
/// Owns the connection, the cache of tables whose schema was reconciled during the current
/// connection and the state of the open transaction. The operations are split over the
/// `connection`, `schema`, `transaction` and `insert` modules.
pub struct SqlSession<D: SqlDriver, Q> {
    pub(super) options: Arc<DestinationOptions>,
    pub(super) driver: D,
    pub(super) queue: Arc<Q>,
    pub(super) stats: DestinationStats,
    pub(super) connection: Option<D::Connection>,
    pub(super) validated_tables: HashSet<String>,
    pub(super) transaction: TransactionState,
    /// Sequence number of the next committed row.
    pub(super) seq_num: SequenceNumber,
    /// Rewound rows still queued ahead of any message not written before.
    pub(super) replayed_rows: usize,
}

impl<D, Q> SqlSession<D, Q>
where
    D: SqlDriver,
    Q: DeliveryQueue,
{
    pub fn new(
        options: Arc<DestinationOptions>,
        driver: D,
        queue: Arc<Q>,
        stats: DestinationStats,
    ) -> Self {
        let transaction = TransactionState::new(options.batching_enabled());

        Self {
            options,
            driver,
            queue,
            stats,
            connection: None,
            validated_tables: HashSet::new(),
            transaction,
            seq_num: SequenceNumber::default(),
            replayed_rows: 0,
        }
    }

    /// Continues numbering rows from a restored sequence number.
    pub fn with_seq_num(mut self, seq_num: SequenceNumber) -> Self {
        self.seq_num = seq_num;
        self
    }

    pub fn options(&self) -> &Arc<DestinationOptions> {
        &self.options
    }

    pub fn queue(&self) -> &Arc<Q> {
        &self.queue
    }

    pub fn stats(&self) -> &DestinationStats {
        &self.stats
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction.active
    }

    pub fn batching_enabled(&self) -> bool {
        self.transaction.batched_rows.is_some()
    }

    /// Rows inserted into the open batch and not yet committed.
    pub fn batched_rows(&self) -> usize {
        self.transaction.batched_rows.unwrap_or(0)
    }

    /// Sequence number following the last committed row.
    pub fn seq_num(&self) -> SequenceNumber {
        self.seq_num
    }

    /// Sequence number of the next row to insert, counting the rows of the open batch.
    pub fn next_seq_num(&self) -> SequenceNumber {
        self.seq_num.advanced_by(self.batched_rows())
    }

    /// Steps the sequence number after a row committed on its own.
    pub fn step_seq_num(&mut self) {
        self.seq_num.step();
    }

    /// Marks the message just taken from the queue as delivered.
    ///
    /// Returns `true` when it is a row of a rewound batch being written again.
    pub fn take_replayed_row(&mut self) -> bool {
        if self.replayed_rows == 0 {
            return false;
        }
        self.replayed_rows -= 1;

        true
    }

    /// Returns every backlog row to the head of the queue, remembering them as replays.
    pub(super) fn rewind_backlog(&mut self) {
        self.replayed_rows += self.queue.backlog_length();
        self.queue.rewind_backlog_all();
    }

    pub fn is_table_validated(&self, table: &str) -> bool {
        self.validated_tables.contains(table)
    }

    /// Counts an inserted row towards the open batch.
    ///
    /// Returns `true` when the batch reached the flush threshold and must be committed.
    pub fn record_batched_row(&mut self) -> bool {
        let Some(rows) = self.transaction.batched_rows.as_mut() else {
            return false;
        };
        *rows += 1;

        self.options
            .flush_threshold()
            .is_some_and(|threshold| *rows >= threshold)
    }

    /// Runs `sql` on the open connection.
    pub async fn run_query(&mut self, sql: &str) -> SinkResult<()> {
        let Some(connection) = self.connection.as_mut() else {
            bail!(
                ErrorKind::ConnectionFailed,
                "No open database connection",
                sql
            );
        };

        debug!(sql, "running sql query");
        connection.execute(sql).await
    }

    pub(super) async fn probe_columns(&mut self, sql: &str) -> SinkResult<Vec<String>> {
        let Some(connection) = self.connection.as_mut() else {
            bail!(
                ErrorKind::ConnectionFailed,
                "No open database connection",
                sql
            );
        };

        debug!(sql, "probing table columns");
        connection.probe_columns(sql).await
    }

    /// Returns `true` when the server still answers on the open connection.
    pub async fn ping(&mut self) -> bool {
        match self.connection.as_mut() {
            Some(connection) => connection.ping().await,
            None => false,
        }
    }
}
