mod config;
pub mod database;
pub mod memory;
pub mod migrations;

pub use config::{CelebrationConfig, Config, GoalConfig};
pub use database::Database;
pub use memory::MemoryStore;

use std::path::PathBuf;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ConfigError, CoreError, Result};

/// Returns `~/.config/stride[-dev]/` based on STRIDE_ENV.
///
/// Set STRIDE_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the data directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("STRIDE_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("stride-dev")
    } else {
        base_dir.join("stride")
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}

/// Durable key-value store backing all persisted state.
///
/// Each `set` must be atomic for its key. No multi-key transaction is assumed.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Write several keys as one unit.
    ///
    /// The default writes them one by one in order, so a failure can leave a
    /// prefix applied. Stores that can commit atomically override this.
    fn set_many(&self, entries: &[(&str, &[u8])]) -> Result<()> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }
}

/// JSON-encoded view over a shared [`KvStore`] that never drops a write.
///
/// Values are staged, then committed together through
/// [`KvStore::set_many`]. A commit that fails keeps everything queued, in the
/// order it was staged, and is retried on the next write or explicit
/// [`StateStore::flush`].
pub struct StateStore {
    store: Arc<dyn KvStore>,
    pending: Vec<(String, Vec<u8>)>,
}

impl StateStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            pending: Vec::new(),
        }
    }

    /// Read and decode `key`. Undecodable bytes are an `InvariantViolation`.
    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let queued = self.pending.iter().find(|(k, _)| k == key);
        let bytes = match queued {
            Some((_, queued)) => Some(queued.clone()),
            None => self.store.get(key)?,
        };
        match bytes {
            None => Ok(None),
            Some(bytes) => serde_json::from_slice(&bytes).map(Some).map_err(|e| {
                CoreError::InvariantViolation {
                    key: key.to_string(),
                    message: format!("undecodable value: {e}"),
                }
            }),
        }
    }

    /// Like [`read`](Self::read), but an undecodable value is logged and
    /// replaced by `None`. Store failures still propagate.
    pub fn read_or_recover<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read(key) {
            Err(CoreError::InvariantViolation { key, message }) => {
                tracing::warn!(key = %key, "discarding persisted value: {}", message);
                Ok(None)
            }
            other => other,
        }
    }

    /// Queue `value` under `key` without writing. A key staged again moves
    /// to the end of the queue with its new value.
    pub fn stage<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.pending.retain(|(k, _)| k != key);
        self.pending.push((key.to_string(), bytes));
        Ok(())
    }

    /// Stage `value` under `key` and flush everything queued.
    pub fn write<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        self.stage(key, value)?;
        self.flush()
    }

    /// [`write`](Self::write) for callers that keep going on failure. The value
    /// stays queued; returns whether everything queued is now durable.
    pub fn write_or_defer<T: Serialize>(&mut self, key: &str, value: &T) -> bool {
        if let Err(e) = self.stage(key, value) {
            tracing::warn!(key = %key, "value not staged: {}", e);
            return false;
        }
        self.commit_or_defer()
    }

    /// [`flush`](Self::flush), logging instead of failing.
    pub fn commit_or_defer(&mut self) -> bool {
        match self.flush() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("write deferred: {}", e);
                false
            }
        }
    }

    /// Commit every queued write as one batch. On failure the whole batch
    /// stays queued.
    pub fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let entries: Vec<(&str, &[u8])> = self
            .pending
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
            .collect();
        match self.store.set_many(&entries) {
            Ok(()) => {
                self.pending.clear();
                Ok(())
            }
            Err(e) => Err(CoreError::StoreWriteFailure {
                key: self
                    .pending
                    .iter()
                    .map(|(k, _)| k.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                message: e.to_string(),
            }),
        }
    }

    pub fn has_pending_writes(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_back() {
        let mut state = StateStore::new(Arc::new(MemoryStore::new()));
        state.write("streak.count", &4u32).unwrap();
        assert_eq!(state.read::<u32>("streak.count").unwrap(), Some(4));
        assert_eq!(state.read::<u32>("missing").unwrap(), None);
    }

    #[test]
    fn undecodable_value_is_invariant_violation() {
        let store = Arc::new(MemoryStore::new());
        store.set("passes.balance", b"not json").unwrap();
        let state = StateStore::new(store);

        let err = state.read::<i64>("passes.balance").unwrap_err();
        assert!(matches!(err, CoreError::InvariantViolation { .. }));
        assert_eq!(state.read_or_recover::<i64>("passes.balance").unwrap(), None);
    }

    #[test]
    fn failed_write_stays_queued_until_flushed() {
        let store = Arc::new(MemoryStore::new());
        let mut state = StateStore::new(store.clone());

        store.fail_writes(true);
        let err = state.write("streak.count", &2u32).unwrap_err();
        assert!(matches!(err, CoreError::StoreWriteFailure { ref key, .. } if key == "streak.count"));
        assert!(state.has_pending_writes());
        assert!(store.get("streak.count").unwrap().is_none());
        // Reads see the queued value.
        assert_eq!(state.read::<u32>("streak.count").unwrap(), Some(2));

        store.fail_writes(false);
        state.write("streak.lastExtensionDay", &"2024-01-02").unwrap();
        assert!(!state.has_pending_writes());
        assert_eq!(store.get("streak.count").unwrap().as_deref(), Some(&b"2"[..]));
    }

    /// Records every batch it receives.
    #[derive(Default)]
    struct Recording {
        inner: MemoryStore,
        batches: std::sync::Mutex<Vec<Vec<String>>>,
    }

    impl KvStore for Recording {
        fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &[u8]) -> Result<()> {
            self.inner.set(key, value)
        }

        fn set_many(&self, entries: &[(&str, &[u8])]) -> Result<()> {
            self.batches
                .lock()
                .unwrap()
                .push(entries.iter().map(|(k, _)| k.to_string()).collect());
            self.inner.set_many(entries)
        }
    }

    #[test]
    fn retry_keeps_staging_order() {
        let store = Arc::new(Recording::default());
        let mut state = StateStore::new(store.clone());

        store.inner.fail_writes(true);
        state.stage("passes.usedDates", &["2024-01-02"]).unwrap();
        state.stage("passes.balance", &1u8).unwrap();
        assert!(!state.commit_or_defer());

        store.inner.fail_writes(false);
        state.flush().unwrap();
        let batches = store.batches.lock().unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1], vec!["passes.usedDates", "passes.balance"]);
    }

    #[test]
    fn restaged_key_moves_to_the_end() {
        let store = Arc::new(MemoryStore::new());
        let mut state = StateStore::new(store.clone());
        store.fail_writes(true);
        state.write_or_defer("a", &1u8);
        state.write_or_defer("b", &2u8);
        state.write_or_defer("a", &3u8);

        let order: Vec<&str> = state.pending.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(order, vec!["b", "a"]);
        assert_eq!(state.read::<u8>("a").unwrap(), Some(3));
    }
}
