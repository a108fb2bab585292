use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::queue::{DeliveryQueue, WakeCallback};
use crate::types::{AckType, LogMessage};

struct Inner {
    pending: VecDeque<LogMessage>,
    backlog: VecDeque<LogMessage>,
    use_backlog: bool,
    wake: Option<WakeCallback>,
}

/// In-memory [`DeliveryQueue`].
///
/// All operations hold a standard mutex for a few pointer moves only. Wake callbacks and
/// acknowledgments run after the lock is released.
pub struct MemoryQueue {
    inner: Mutex<Inner>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                pending: VecDeque::new(),
                backlog: VecDeque::new(),
                use_backlog: false,
                wake: None,
            }),
        }
    }

    /// Creates a queue holding `messages` in order.
    pub fn with_messages(messages: impl IntoIterator<Item = LogMessage>) -> Self {
        let queue = Self::new();
        queue.lock().pending.extend(messages);
        queue
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Critical sections never leave the queue half-updated.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("MemoryQueue")
            .field("pending", &inner.pending.len())
            .field("backlog", &inner.backlog.len())
            .field("use_backlog", &inner.use_backlog)
            .finish()
    }
}

impl DeliveryQueue for MemoryQueue {
    fn push_tail(&self, message: LogMessage) {
        let wake = {
            let mut inner = self.lock();
            inner.pending.push_back(message);
            inner.wake.take()
        };

        if let Some(wake) = wake {
            wake();
        }
    }

    fn push_front(&self, message: LogMessage) {
        self.lock().pending.push_front(message);
    }

    fn pop_front(&self) -> Option<LogMessage> {
        let mut inner = self.lock();
        let message = inner.pending.pop_front()?;
        if inner.use_backlog {
            inner.backlog.push_back(message.clone());
        }

        Some(message)
    }

    fn rewind_backlog(&self, count: usize) {
        let mut inner = self.lock();
        for _ in 0..count {
            let Some(message) = inner.backlog.pop_back() else {
                break;
            };
            inner.pending.push_front(message);
        }
    }

    fn rewind_backlog_all(&self) {
        let mut inner = self.lock();
        while let Some(message) = inner.backlog.pop_back() {
            inner.pending.push_front(message);
        }
    }

    fn ack_backlog(&self, count: usize) {
        let acked: Vec<LogMessage> = {
            let mut inner = self.lock();
            let count = count.min(inner.backlog.len());
            inner.backlog.drain(..count).collect()
        };

        for message in acked {
            message.ack(AckType::Processed);
        }
    }

    fn discard_backlog_newest(&self) -> Option<LogMessage> {
        self.lock().backlog.pop_back()
    }

    fn length(&self) -> usize {
        self.lock().pending.len()
    }

    fn backlog_length(&self) -> usize {
        self.lock().backlog.len()
    }

    fn check_items(&self, wake: WakeCallback) -> bool {
        let mut inner = self.lock();
        if !inner.pending.is_empty() {
            return true;
        }

        inner.wake = Some(wake);
        false
    }

    fn set_use_backlog(&self, use_backlog: bool) {
        self.lock().use_backlog = use_backlog;
    }

    fn uses_backlog(&self) -> bool {
        self.lock().use_backlog
    }

    fn take_all(&self) -> Vec<LogMessage> {
        let mut inner = self.lock();
        let mut messages: Vec<LogMessage> = inner.backlog.drain(..).collect();
        messages.extend(inner.pending.drain(..));
        messages
    }
}
