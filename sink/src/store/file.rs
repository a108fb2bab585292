use std::collections::BTreeMap;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{ErrorKind, SinkResult};
use crate::sink_error;
use crate::store::StateStore;

/// [`StateStore`] backed by a JSON file.
///
/// The whole map is cached in memory and rewritten on every change. Writes go to a sibling
/// temporary file first and are moved into place, so a crash never leaves a truncated file.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: Arc<PathBuf>,
    inner: Arc<Mutex<BTreeMap<String, String>>>,
}

impl FileStateStore {
    /// Opens the store at `path`, starting empty when the file does not exist yet.
    pub async fn open(path: impl AsRef<Path>) -> SinkResult<Self> {
        let path = path.as_ref().to_path_buf();

        let entries: BTreeMap<String, String> = match tokio::fs::read(&path).await {
            Ok(contents) => serde_json::from_slice(&contents).map_err(|e| {
                sink_error!(
                    ErrorKind::StateStoreError,
                    "State file is corrupted",
                    path.display(),
                    source: e
                )
            })?,
            Err(e) if e.kind() == IoErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        debug!(path = %path.display(), entries = entries.len(), "opened state file");

        Ok(Self {
            path: Arc::new(path),
            inner: Arc::new(Mutex::new(entries)),
        })
    }

    async fn persist(&self, entries: &BTreeMap<String, String>) -> SinkResult<()> {
        let contents = serde_json::to_vec_pretty(entries)?;
        let temporary = self.path.with_extension("tmp");

        tokio::fs::write(&temporary, contents).await?;
        tokio::fs::rename(&temporary, self.path.as_ref()).await?;

        Ok(())
    }
}

impl StateStore for FileStateStore {
    async fn get(&self, key: &str) -> SinkResult<Option<String>> {
        Ok(self.inner.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> SinkResult<()> {
        let mut inner = self.inner.lock().await;
        inner.insert(key.to_string(), value);
        self.persist(&inner).await
    }

    async fn remove(&self, key: &str) -> SinkResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.remove(key).is_some() {
            self.persist(&inner).await?;
        }

        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> SinkResult<bool> {
        let mut inner = self.inner.lock().await;
        let Some(value) = inner.remove(from) else {
            return Ok(false);
        };
        inner.entry(to.to_string()).or_insert(value);
        self.persist(&inner).await?;

        Ok(true)
    }
}
