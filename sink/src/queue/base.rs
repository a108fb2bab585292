use crate::types::LogMessage;

/// One-shot callback fired when a message becomes available.
pub type WakeCallback = Box<dyn FnOnce() + Send>;

/// FIFO of pending messages with an optional backlog of delivered but unacknowledged ones.
///
/// With the backlog enabled, [`DeliveryQueue::pop_front`] keeps a copy of every delivered message
/// until it is acknowledged with [`DeliveryQueue::ack_backlog`] or returned to the head of the
/// queue with one of the rewind operations. Acknowledgment removes the oldest backlog entries;
/// rewinding returns the newest ones, preserving their order.
///
/// Implementations synchronize internally and never block for long, so producers may call them
/// from any thread.
pub trait DeliveryQueue: Send + Sync + 'static {
    /// Appends a message and fires the registered wake callback, if any.
    fn push_tail(&self, message: LogMessage);

    /// Puts a message back at the head of the queue.
    fn push_front(&self, message: LogMessage);

    /// Removes the head of the queue, recording it in the backlog when enabled.
    fn pop_front(&self) -> Option<LogMessage>;

    /// Returns the `count` newest backlog entries to the head of the queue.
    fn rewind_backlog(&self, count: usize);

    /// Returns the whole backlog to the head of the queue.
    fn rewind_backlog_all(&self);

    /// Acknowledges the `count` oldest backlog entries as processed.
    fn ack_backlog(&self, count: usize);

    /// Removes the newest backlog entry without acknowledging it.
    fn discard_backlog_newest(&self) -> Option<LogMessage>;

    /// Number of pending messages, not counting the backlog.
    fn length(&self) -> usize;

    /// Number of delivered but unacknowledged messages.
    fn backlog_length(&self) -> usize;

    /// Returns `true` when messages are pending. Otherwise registers `wake` to be fired once by
    /// the next push and returns `false`.
    fn check_items(&self, wake: WakeCallback) -> bool;

    fn set_use_backlog(&self, use_backlog: bool);

    fn uses_backlog(&self) -> bool;

    /// Rewinds the backlog and removes every message from the queue.
    fn take_all(&self) -> Vec<LogMessage>;
}
