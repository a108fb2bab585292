use std::sync::Arc;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{Instrument, debug, error, info, warn};

use crate::client::SqlDriver;
use crate::concurrency::shutdown::ShutdownRx;
use crate::destination::SqlSession;
use crate::error::{ErrorKind, SinkError, SinkResult};
use crate::queue::DeliveryQueue;
use crate::sink_error;
use crate::template::TimeZoneRole;
use crate::types::{AckType, LogMessage, SequenceNumber};

/// State handed back by a destination worker when it exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerOutcome {
    pub seq_num: SequenceNumber,
}

/// Handle to a running destination worker.
#[derive(Debug)]
pub struct DestinationWorkerHandle {
    handle: Option<JoinHandle<WorkerOutcome>>,
}

impl DestinationWorkerHandle {
    /// Waits for the worker to exit and returns its final state.
    pub async fn wait(mut self) -> SinkResult<WorkerOutcome> {
        let Some(handle) = self.handle.take() else {
            return Err(sink_error!(
                ErrorKind::InvalidState,
                "Destination worker was already awaited"
            ));
        };

        handle.await.map_err(|err| {
            if err.is_cancelled() {
                sink_error!(
                    ErrorKind::WorkerCancelled,
                    "Destination worker was cancelled",
                    err
                )
            } else {
                sink_error!(
                    ErrorKind::WorkerPanic,
                    "Destination worker panicked",
                    err
                )
            }
        })
    }
}

/// Why inserting a message failed.
enum InsertFailure {
    /// The row could not be written. Subject to the retry policy.
    Row(SinkError),
    /// The batch commit after a successful insert failed. The batch was rewound.
    Commit(SinkError),
}

/// Worker moving messages from a queue into a SQL database.
///
/// The worker waits for messages, writes them one at a time and batches them into explicit
/// transactions when configured. After a failure it drops the connection and sleeps for
/// `time_reopen` before reconnecting. On shutdown it drains the queue as far as the database
/// allows.
pub struct DestinationWorker<D: SqlDriver, Q> {
    session: SqlSession<D, Q>,
    wakeup: Arc<Notify>,
    shutdown_rx: ShutdownRx,
    failed_message_counter: u32,
    suspended_until: Option<Instant>,
}

impl<D, Q> DestinationWorker<D, Q>
where
    D: SqlDriver,
    Q: DeliveryQueue,
{
    pub fn new(session: SqlSession<D, Q>, shutdown_rx: ShutdownRx) -> Self {
        Self {
            session,
            wakeup: Arc::new(Notify::new()),
            shutdown_rx,
            failed_message_counter: 0,
            suspended_until: None,
        }
    }

    /// Spawns the worker on the current runtime.
    pub fn start(self) -> DestinationWorkerHandle {
        let span = tracing::info_span!(
            "sql_destination_worker",
            destination = %self.session.stats().instance()
        );
        let handle = tokio::spawn(self.run().instrument(span.or_current()));

        DestinationWorkerHandle {
            handle: Some(handle),
        }
    }

    async fn run(mut self) -> WorkerOutcome {
        info!("starting sql destination worker");

        while !self.shutdown_rx.is_shutdown() {
            if let Some(deadline) = self.suspended_until.take() {
                // Only shutdown interrupts a suspension, new messages do not.
                tokio::select! {
                    _ = sleep_until(deadline) => {}
                    _ = self.shutdown_rx.wait_for_shutdown() => {}
                }
                continue;
            }

            if !self.check_items() {
                if self.session.batched_rows() > 0 {
                    self.flush_idle_batch().await;
                    continue;
                }

                tokio::select! {
                    _ = self.wakeup.notified() => {}
                    _ = self.shutdown_rx.wait_for_shutdown() => {}
                }
                continue;
            }

            if let Err(err) = self.insert_one().await {
                warn!(error = %err, "inserting message failed");
                self.session.disconnect().await;
                self.suspend();
            }
        }

        self.drain().await;

        let seq_num = self.session.seq_num();
        info!(seq_num = seq_num.get(), "sql destination worker stopped");

        WorkerOutcome { seq_num }
    }

    fn check_items(&self) -> bool {
        let wakeup = self.wakeup.clone();
        self.session
            .queue()
            .check_items(Box::new(move || wakeup.notify_one()))
    }

    /// Commits the open batch once the queue ran dry.
    async fn flush_idle_batch(&mut self) {
        if self.session.commit().await.is_ok() {
            return;
        }

        if let Err(err) = self.session.rollback().await {
            error!(error = %err, "rolling back failed batch failed");
            self.session.disconnect().await;
            self.suspend();
        }
    }

    fn suspend(&mut self) {
        let time_reopen = self.session.options().time_reopen;
        info!(
            time_reopen_ms = time_reopen.as_millis() as u64,
            "suspending sql destination worker"
        );

        self.session.stats().record_suspension();
        self.suspended_until = Some(Instant::now() + time_reopen);
    }

    /// Writes as many queued messages as possible before exiting.
    async fn drain(&mut self) {
        let mut drained = true;
        while self.session.queue().length() > 0 {
            if let Err(err) = self.insert_one().await {
                warn!(
                    error = %err,
                    remaining = self.session.queue().length(),
                    "stopped draining queue after a failure"
                );
                drained = false;
                break;
            }
        }

        if drained && self.session.batched_rows() > 0 {
            if let Err(err) = self.session.commit().await {
                warn!(error = %err, "committing final batch failed");
                if let Err(err) = self.session.rollback().await {
                    warn!(error = %err, "rolling back final batch failed");
                }
            }
        }

        self.session.disconnect().await;
    }

    /// Writes the message at the head of the queue.
    ///
    /// Returns an error when the worker should disconnect and suspend. A message that exhausted
    /// its retries is dropped and counts as handled.
    async fn insert_one(&mut self) -> SinkResult<()> {
        self.session.ensure_connection().await?;

        let Some(message) = self.session.queue().pop_front() else {
            return Ok(());
        };
        let replayed = self.session.take_replayed_row();

        match self.write_message(&message).await {
            Ok(()) => {
                self.message_stored(message, replayed);
                Ok(())
            }
            Err(InsertFailure::Commit(err)) => Err(err),
            Err(InsertFailure::Row(err)) => self.message_failed(message, err).await,
        }
    }

    async fn write_message(&mut self, message: &LogMessage) -> Result<(), InsertFailure> {
        let options = self.session.options().clone();
        let seq_num = self.session.next_seq_num().get();

        let table = options.table.render(
            message,
            &options.template_options,
            TimeZoneRole::Local,
            seq_num,
        );
        let table = self
            .session
            .validate_table(&table)
            .await
            .map_err(InsertFailure::Row)?;

        if self.session.should_begin() {
            self.session.begin().await.map_err(InsertFailure::Row)?;
        }

        let insert = self
            .session
            .build_insert(&table, message, seq_num)
            .map_err(InsertFailure::Row)?;
        self.session
            .run_query(&insert)
            .await
            .map_err(InsertFailure::Row)?;

        if self.session.record_batched_row() {
            if let Err(err) = self.session.commit().await {
                if let Err(rollback_err) = self.session.rollback().await {
                    warn!(error = %rollback_err, "rolling back failed batch failed");
                }
                return Err(InsertFailure::Commit(err));
            }
        }

        Ok(())
    }

    /// Books a written row. Batched rows are acknowledged and numbered by their commit.
    ///
    /// Rows of a rewound batch keep the retry counter, which belongs to the failing message
    /// queued behind them.
    fn message_stored(&mut self, message: LogMessage, replayed: bool) {
        if !self.session.batching_enabled() {
            let queue = self.session.queue();
            if queue.uses_backlog() {
                queue.ack_backlog(1);
            } else {
                message.ack(AckType::Processed);
            }
            self.session.stats().record_stored(1);
            self.session.step_seq_num();
        }

        if !replayed {
            self.failed_message_counter = 0;
        }
    }

    async fn message_failed(&mut self, message: LogMessage, err: SinkError) -> SinkResult<()> {
        let retries = self.session.options().retries;

        if self.failed_message_counter + 1 < retries {
            if !self.session.ping().await {
                if self.session.batching_enabled() {
                    error!(
                        error = %err,
                        "sql connection lost in the middle of a transaction, rewinding backlog"
                    );
                    self.session.handle_transaction_error();
                } else {
                    error!(error = %err, "no sql connection after failed query attempt");
                    self.session.requeue_message(message);
                }

                return Err(sink_error!(
                    ErrorKind::ConnectionFailed,
                    "Database connection lost after a failed insert",
                    source: err
                ));
            }

            self.session.requeue_message(message);
            self.failed_message_counter += 1;
            debug!(
                attempt = self.failed_message_counter,
                retries, "message requeued after failed insert"
            );

            return Err(err);
        }

        error!(
            error = %err,
            attempts = retries,
            "multiple failures while inserting this record into the database, message dropped"
        );
        self.session.stats().record_dropped();
        if self.session.queue().uses_backlog() {
            self.session.queue().discard_backlog_newest();
        }
        message.ack(AckType::Dropped);
        self.failed_message_counter = 0;

        Ok(())
    }
}
