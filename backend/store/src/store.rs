use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use concierge_core::{ConciergeError, Result};

/// A stored value with its write counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
    pub value: String,
    /// Starts at 1 on first write and increases by one on every write.
    pub version: u64,
}

/// Write precondition for [`KeyValueStore::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// Unconditional overwrite.
    Any,
    /// Only write if the current version matches. `Version(0)` means the key
    /// must be absent.
    Version(u64),
}

/// Abstract interface for the shared session store.
///
/// Keys are flat strings; callers namespace them by session id.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a key.
    async fn get(&self, key: &str) -> Result<Option<Versioned>>;

    /// Write a key and return the new version.
    ///
    /// Fails with [`ConciergeError::VersionConflict`] when `expect` does not
    /// hold.
    async fn put(&self, key: &str, value: String, expect: Expect) -> Result<u64>;

    /// All keys starting with `prefix`, sorted.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

pub(crate) fn check_expect(key: &str, expect: Expect, current: u64) -> Result<()> {
    match expect {
        Expect::Version(expected) if expected != current => Err(ConciergeError::VersionConflict {
            key: key.to_string(),
            expected,
            actual: current,
        }),
        _ => Ok(()),
    }
}

/// Process-local store for tests and single-process deployments.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    entries: Arc<RwLock<HashMap<String, Versioned>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Versioned>> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).cloned())
    }

    async fn put(&self, key: &str, value: String, expect: Expect) -> Result<u64> {
        let mut entries = self.entries.write().await;
        let current = entries.get(key).map(|e| e.version).unwrap_or(0);
        check_expect(key, expect, current)?;
        let version = current + 1;
        entries.insert(key.to_string(), Versioned { value, version });
        debug!(key = %key, version, "Stored entry");
        Ok(version)
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let entries = self.entries.read().await;
        let mut keys: Vec<String> = entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}
