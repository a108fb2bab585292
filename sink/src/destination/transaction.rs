use tracing::{error, warn};

use crate::client::SqlDriver;
use crate::destination::SqlSession;
use crate::error::{ErrorKind, SinkResult};
use crate::queue::DeliveryQueue;
use crate::sink_error;

impl<D, Q> SqlSession<D, Q>
where
    D: SqlDriver,
    Q: DeliveryQueue,
{
    /// Opens a transaction. The transaction counts as active even when `BEGIN` fails.
    pub async fn begin(&mut self) -> SinkResult<()> {
        let result = match self.options.dialect.begin_statement() {
            Some(statement) => self.run_query(statement).await,
            None => Ok(()),
        };
        self.transaction.active = true;

        result.map_err(|err| {
            sink_error!(
                ErrorKind::TransactionFailed,
                "Starting sql transaction failed",
                source: err
            )
        })
    }

    /// Commits the open transaction and acknowledges the rows of its batch.
    ///
    /// When the commit fails the whole backlog is rewound into the queue.
    pub async fn commit(&mut self) -> SinkResult<()> {
        if !self.transaction.active {
            return Ok(());
        }

        if let Err(err) = self.run_query("COMMIT").await {
            error!(error = %err, "sql transaction commit failed, rewinding backlog");
            self.handle_transaction_error();
            return Err(sink_error!(
                ErrorKind::TransactionFailed,
                "Committing sql transaction failed",
                source: err
            ));
        }

        let rows = self.batched_rows();
        self.queue.ack_backlog(rows);
        self.stats.record_stored(rows as u64);
        self.seq_num = self.seq_num.advanced_by(rows);
        self.transaction.reset_batch();
        self.transaction.active = false;

        Ok(())
    }

    /// Rolls back the open transaction.
    pub async fn rollback(&mut self) -> SinkResult<()> {
        if !self.transaction.active {
            return Ok(());
        }
        self.transaction.active = false;

        self.run_query("ROLLBACK").await.map_err(|err| {
            sink_error!(
                ErrorKind::TransactionFailed,
                "Rolling back sql transaction failed",
                source: err
            )
        })
    }

    /// Commits any open transaction and begins a new one.
    ///
    /// A failed commit is rolled back and reported without beginning.
    pub async fn begin_new(&mut self) -> SinkResult<()> {
        if self.transaction.active {
            if let Err(err) = self.commit().await {
                if let Err(rollback_err) = self.rollback().await {
                    warn!(error = %rollback_err, "rollback after failed commit failed");
                }
                return Err(err);
            }
        }

        self.begin().await
    }

    /// Returns every row of the failed batch to the queue.
    pub fn handle_transaction_error(&mut self) {
        self.rewind_backlog();
        self.transaction.reset_batch();
    }

    /// Whether an insert must be preceded by `BEGIN`.
    pub fn should_begin(&self) -> bool {
        self.batching_enabled() && self.batched_rows() == 0 && !self.transaction.active
    }
}
