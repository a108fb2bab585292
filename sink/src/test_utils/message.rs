use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};

use crate::types::{AckCallback, AckType, LogMessage};

/// Builds a message with `MSG` set to `text` and a few fixed values.
pub fn test_message(text: &str) -> LogMessage {
    let at = Utc
        .with_ymd_and_hms(2024, 3, 1, 10, 30, 45)
        .single()
        .unwrap_or_default();

    LogMessage::with_received(at, at)
        .with_value("HOST", "web-1")
        .with_value("PROGRAM", "sshd")
        .with_value("PID", "4242")
        .with_value("FACILITY", "auth")
        .with_value("LEVEL", "info")
        .with_value("MSG", text)
}

/// Records acknowledgments of messages, keyed by their `MSG` value.
#[derive(Debug, Clone, Default)]
pub struct AckLog {
    acks: Arc<Mutex<Vec<(String, AckType)>>>,
}

impl AckLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a message like [`test_message`] whose acknowledgment is recorded here.
    pub fn message(&self, text: &str) -> LogMessage {
        test_message(text).with_acker(self.acker(text))
    }

    pub fn acker(&self, text: &str) -> AckCallback {
        let acks = self.acks.clone();
        let text = text.to_string();

        Arc::new(move |ack_type| {
            if let Ok(mut acks) = acks.lock() {
                acks.push((text.clone(), ack_type));
            }
        })
    }

    pub fn acks(&self) -> Vec<(String, AckType)> {
        self.acks.lock().map(|acks| acks.clone()).unwrap_or_default()
    }

    pub fn count(&self, ack_type: AckType) -> usize {
        self.acks()
            .iter()
            .filter(|(_, recorded)| *recorded == ack_type)
            .count()
    }
}
