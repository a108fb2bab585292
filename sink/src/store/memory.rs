use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::SinkResult;
use crate::store::StateStore;

/// [`StateStore`] that keeps entries in memory. State is lost when the process exits.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every stored entry.
    pub async fn entries(&self) -> BTreeMap<String, String> {
        self.inner.lock().await.clone()
    }
}

impl StateStore for MemoryStateStore {
    async fn get(&self, key: &str) -> SinkResult<Option<String>> {
        Ok(self.inner.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> SinkResult<()> {
        self.inner.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> SinkResult<()> {
        self.inner.lock().await.remove(key);
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> SinkResult<bool> {
        let mut inner = self.inner.lock().await;
        let Some(value) = inner.remove(from) else {
            return Ok(false);
        };
        inner.entry(to.to_string()).or_insert(value);

        Ok(true)
    }
}
