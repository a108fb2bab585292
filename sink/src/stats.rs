//! Per-destination counters, mirrored to the `metrics` recorder.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::counter;

use crate::metrics::{
    DESTINATION_LABEL, SQL_SINK_DROPPED_MESSAGES_TOTAL, SQL_SINK_QUEUED_MESSAGES_TOTAL,
    SQL_SINK_STORED_MESSAGES_TOTAL, SQL_SINK_SUSPENSIONS_TOTAL,
};

#[derive(Debug, Default)]
struct Counters {
    queued: AtomicU64,
    stored: AtomicU64,
    dropped: AtomicU64,
    suspensions: AtomicU64,
}

/// Point-in-time copy of a destination's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub queued: u64,
    pub stored: u64,
    pub dropped: u64,
    pub suspensions: u64,
}

/// Counters of a single destination. Clones share the same counters.
#[derive(Debug, Clone)]
pub struct DestinationStats {
    instance: Arc<str>,
    counters: Arc<Counters>,
}

impl DestinationStats {
    pub fn new(instance: impl Into<Arc<str>>) -> Self {
        Self {
            instance: instance.into(),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub(crate) fn record_queued(&self) {
        self.counters.queued.fetch_add(1, Ordering::Relaxed);
        counter!(
            SQL_SINK_QUEUED_MESSAGES_TOTAL,
            DESTINATION_LABEL => self.instance.to_string()
        )
        .increment(1);
    }

    pub(crate) fn record_stored(&self, count: u64) {
        if count == 0 {
            return;
        }

        self.counters.stored.fetch_add(count, Ordering::Relaxed);
        counter!(
            SQL_SINK_STORED_MESSAGES_TOTAL,
            DESTINATION_LABEL => self.instance.to_string()
        )
        .increment(count);
    }

    pub(crate) fn record_dropped(&self) {
        self.counters.dropped.fetch_add(1, Ordering::Relaxed);
        counter!(
            SQL_SINK_DROPPED_MESSAGES_TOTAL,
            DESTINATION_LABEL => self.instance.to_string()
        )
        .increment(1);
    }

    pub(crate) fn record_suspension(&self) {
        self.counters.suspensions.fetch_add(1, Ordering::Relaxed);
        counter!(
            SQL_SINK_SUSPENSIONS_TOTAL,
            DESTINATION_LABEL => self.instance.to_string()
        )
        .increment(1);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            queued: self.counters.queued.load(Ordering::Relaxed),
            stored: self.counters.stored.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            suspensions: self.counters.suspensions.load(Ordering::Relaxed),
        }
    }
}
