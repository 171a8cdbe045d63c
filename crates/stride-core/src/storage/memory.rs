//! In-memory key-value store.
//!
//! Backs tests and ephemeral sessions. Writes can be made to fail on demand to
//! exercise the retry path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use super::KvStore;
use crate::error::{CoreError, Result};

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Vec<u8>>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `set` fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Keys currently held, sorted.
    pub fn keys(&self) -> Vec<String> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<String> = values.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CoreError::StoreWriteFailure {
                key: key.to_string(),
                message: "memory store rejecting writes".into(),
            });
        }
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn set_many(&self, entries: &[(&str, &[u8])]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CoreError::StoreWriteFailure {
                key: entries.first().map(|(k, _)| k.to_string()).unwrap_or_default(),
                message: "memory store rejecting writes".into(),
            });
        }
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        for (key, value) in entries {
            values.insert(key.to_string(), value.to_vec());
        }
        Ok(())
    }
}
