use std::sync::Arc;

use config::shared::SqlDestinationConfig;
use tracing::{info, warn};

use crate::client::SqlDriver;
use crate::concurrency::shutdown::{ShutdownTx, create_shutdown_channel};
use crate::destination::{DestinationOptions, SqlSession};
use crate::error::SinkResult;
use crate::queue::DeliveryQueue;
use crate::queue::memory::MemoryQueue;
use crate::stats::{DestinationStats, StatsSnapshot};
use crate::store::StateStore;
use crate::types::{LogMessage, SequenceNumber};
use crate::workers::destination::{DestinationWorker, DestinationWorkerHandle};

/// A configured SQL destination that has not been started yet.
///
/// Starting restores the persisted sequence number and undelivered messages and spawns the
/// worker. The returned [`SqlDestinationHandle`] accepts messages until it is shut down.
pub struct SqlDestination<D, S, Q = MemoryQueue> {
    options: Arc<DestinationOptions>,
    driver: D,
    store: S,
    queue: Arc<Q>,
    stats: DestinationStats,
}

impl<D, S, Q> SqlDestination<D, S, Q>
where
    D: SqlDriver,
    S: StateStore,
    Q: DeliveryQueue,
{
    pub fn new(options: DestinationOptions, driver: D, store: S) -> Self
    where
        Q: Default,
    {
        Self::with_queue(options, driver, store, Arc::new(Q::default()))
    }

    pub fn with_queue(options: DestinationOptions, driver: D, store: S, queue: Arc<Q>) -> Self {
        let stats = DestinationStats::new(options.stats_instance());

        Self {
            options: Arc::new(options),
            driver,
            store,
            queue,
            stats,
        }
    }

    /// Validates `config` and builds a destination from it.
    pub fn from_config(config: &SqlDestinationConfig, driver: D, store: S) -> SinkResult<Self>
    where
        Q: Default,
    {
        Ok(Self::new(DestinationOptions::from_config(config)?, driver, store))
    }

    pub fn options(&self) -> &DestinationOptions {
        &self.options
    }

    pub fn queue(&self) -> &Arc<Q> {
        &self.queue
    }

    pub async fn start(self) -> SinkResult<SqlDestinationHandle<S, Q>> {
        info!(destination = %self.stats.instance(), "starting sql destination");

        self.queue.set_use_backlog(self.options.uses_backlog());

        let seq_num = self.restore_seq_num().await?;
        self.restore_queue().await?;

        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
        let session = SqlSession::new(
            self.options.clone(),
            self.driver,
            self.queue.clone(),
            self.stats.clone(),
        )
        .with_seq_num(seq_num);
        let worker = DestinationWorker::new(session, shutdown_rx).start();

        Ok(SqlDestinationHandle {
            options: self.options,
            store: self.store,
            queue: self.queue,
            stats: self.stats,
            shutdown_tx,
            worker,
        })
    }

    async fn restore_seq_num(&self) -> SinkResult<SequenceNumber> {
        let name = self.options.sequence_persist_name();
        let Some(value) = self.store.get(&name).await? else {
            return Ok(SequenceNumber::default());
        };

        match value.parse::<i32>() {
            Ok(value) => Ok(SequenceNumber::new(value)),
            Err(err) => {
                warn!(error = %err, value = %value, "ignoring invalid persisted sequence number");
                Ok(SequenceNumber::default())
            }
        }
    }

    async fn restore_queue(&self) -> SinkResult<()> {
        let name = self.options.queue_persist_name();
        let legacy_name = self.options.legacy_queue_persist_name();
        if self.store.rename(&legacy_name, &name).await? {
            info!(from = %legacy_name, to = %name, "renamed persisted queue");
        }

        let Some(contents) = self.store.get(&name).await? else {
            return Ok(());
        };

        let messages: Vec<LogMessage> = serde_json::from_str(&contents)?;
        info!(count = messages.len(), "restoring persisted messages");
        for message in messages {
            self.queue.push_tail(message);
        }
        self.store.remove(&name).await?;

        Ok(())
    }
}

/// A running SQL destination.
pub struct SqlDestinationHandle<S, Q = MemoryQueue> {
    options: Arc<DestinationOptions>,
    store: S,
    queue: Arc<Q>,
    stats: DestinationStats,
    shutdown_tx: ShutdownTx,
    worker: DestinationWorkerHandle,
}

impl<S, Q> SqlDestinationHandle<S, Q>
where
    S: StateStore,
    Q: DeliveryQueue,
{
    /// Hands a message to the destination.
    pub fn queue(&self, message: LogMessage) {
        self.stats.record_queued();
        self.queue.push_tail(message);
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn shutdown_tx(&self) -> ShutdownTx {
        self.shutdown_tx.clone()
    }

    /// Stops the worker and persists the state needed to resume later.
    ///
    /// The worker first writes whatever the database accepts. Messages still queued afterwards
    /// are saved to the state store together with the sequence number.
    pub async fn shutdown_and_wait(self) -> SinkResult<()> {
        let Self {
            options,
            store,
            queue,
            shutdown_tx,
            worker,
            ..
        } = self;

        info!("shutting down sql destination");
        shutdown_tx.shutdown();

        let mut errors = vec![];

        match worker.wait().await {
            Ok(outcome) => {
                let name = options.sequence_persist_name();
                if let Err(err) = store.set(&name, outcome.seq_num.get().to_string()).await {
                    errors.push(err);
                }
            }
            Err(err) => errors.push(err),
        }

        if let Err(err) = persist_queue(&options, &store, queue.as_ref()).await {
            errors.push(err);
        }

        if !errors.is_empty() {
            return Err(errors.into());
        }

        Ok(())
    }
}

/// Saves the messages left in `queue` under the queue persist name, or clears it when none are
/// left.
async fn persist_queue<S, Q>(options: &DestinationOptions, store: &S, queue: &Q) -> SinkResult<()>
where
    S: StateStore,
    Q: DeliveryQueue,
{
    let name = options.queue_persist_name();
    let messages = queue.take_all();
    if messages.is_empty() {
        return store.remove(&name).await;
    }

    info!(count = messages.len(), "persisting undelivered messages");
    let contents = serde_json::to_string(&messages)?;
    store.set(&name, contents).await
}
