use std::future::Future;

use crate::error::SinkResult;

/// Key/value store for state that must survive restarts.
///
/// Destinations keep their sequence number and undelivered messages here, keyed by persist
/// names derived from their identity. Values are opaque strings.
pub trait StateStore: Send + Sync + 'static {
    /// Returns the value stored under `key`.
    fn get(&self, key: &str) -> impl Future<Output = SinkResult<Option<String>>> + Send;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: String) -> impl Future<Output = SinkResult<()>> + Send;

    /// Removes `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> impl Future<Output = SinkResult<()>> + Send;

    /// Moves the value stored under `from` to `to`.
    ///
    /// Returns `false` when `from` does not exist. An existing value under `to` is kept.
    fn rename(&self, from: &str, to: &str) -> impl Future<Output = SinkResult<bool>> + Send;
}
