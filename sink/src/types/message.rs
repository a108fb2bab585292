use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome reported back to the producer of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckType {
    /// The message was written to the database.
    Processed,
    /// The message was given up on after exhausting its retries.
    Dropped,
}

/// Callback invoked when a message is acknowledged.
pub type AckCallback = Arc<dyn Fn(AckType) + Send + Sync>;

/// A log record handed to the sink.
///
/// Values are addressed by name from templates. The acknowledgment callback is not persisted, so
/// messages restored after a restart are acknowledged to nobody.
#[derive(Clone, Serialize, Deserialize)]
pub struct LogMessage {
    values: BTreeMap<String, String>,
    timestamp: DateTime<Utc>,
    received: DateTime<Utc>,
    #[serde(skip)]
    acker: Option<AckCallback>,
}

impl LogMessage {
    /// Creates a message stamped with `timestamp` and received now.
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self::with_received(timestamp, Utc::now())
    }

    /// Creates a message with explicit event and receive timestamps.
    pub fn with_received(timestamp: DateTime<Utc>, received: DateTime<Utc>) -> Self {
        Self {
            values: BTreeMap::new(),
            timestamp,
            received,
            acker: None,
        }
    }

    /// Sets a value and returns the message.
    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_value(name, value);
        self
    }

    /// Registers the callback that receives this message's acknowledgment.
    pub fn with_acker(mut self, acker: AckCallback) -> Self {
        self.acker = Some(acker);
        self
    }

    pub fn set_value(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    /// Time the event happened.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Time the message entered the pipeline.
    pub fn received(&self) -> DateTime<Utc> {
        self.received
    }

    /// Acknowledges the message to its producer, if anyone is listening.
    pub fn ack(self, ack_type: AckType) {
        if let Some(acker) = self.acker {
            acker(ack_type);
        }
    }
}

impl PartialEq for LogMessage {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
            && self.timestamp == other.timestamp
            && self.received == other.received
    }
}

impl fmt::Debug for LogMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogMessage")
            .field("values", &self.values)
            .field("timestamp", &self.timestamp)
            .field("received", &self.received)
            .field("acker", &self.acker.is_some())
            .finish()
    }
}
