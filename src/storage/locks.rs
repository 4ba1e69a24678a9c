//! Per-key serialization of fetch/promote sequences.
//!
//! One async mutex per `(user, owner/repo, branch)` key keeps concurrent
//! requests for the same artifact from racing each other, while unrelated
//! keys proceed in parallel. The table itself is guarded by a plain mutex
//! held only for lookup/insert, never across I/O. Entries are never removed;
//! the table is bounded by the set of keys ever requested in this process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;

#[derive(Default)]
pub(crate) struct KeyLocks {
    table: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyLocks {
    /// Look up (or lazily create) the lock for a key. The caller awaits the
    /// returned mutex outside of the table lock.
    pub(crate) fn entry(&self, user: &str, owner_repo: &str, branch: &str) -> Arc<AsyncMutex<()>> {
        let key = format!("{user}|{owner_repo}|{branch}");
        let mut table = self.table.lock().expect("lock table poisoned");
        table.entry(key).or_default().clone()
    }
}
