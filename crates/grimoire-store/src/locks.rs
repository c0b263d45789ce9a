use dashmap::DashMap;
use grimoire_canonical::ContentHash;
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};
use std::fmt;
use std::sync::Arc;

/// Key of a shared mutable entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LockKey {
    /// A record row, by id.
    Record(i64),
    /// A vault entry, by content hash.
    Hash(ContentHash),
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockKey::Record(id) => write!(f, "record:{}", id),
            LockKey::Hash(hash) => write!(f, "hash:{}", hash),
        }
    }
}

/// Held lock on one key. Released on drop.
pub struct KeyGuard {
    _guard: ArcMutexGuard<RawMutex, ()>,
}

/// Single-writer-per-key lock table.
///
/// Writers to the same key serialize; writers to different keys proceed
/// concurrently.
#[derive(Default)]
pub struct KeyedLocks {
    slots: DashMap<LockKey, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &LockKey) -> Arc<Mutex<()>> {
        self.slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Blocks until `key` is free and returns its guard.
    pub fn lock(&self, key: LockKey) -> KeyGuard {
        let slot = self.slot(&key);
        KeyGuard {
            _guard: slot.lock_arc(),
        }
    }

    /// Locks every key in sorted order, so two callers with overlapping
    /// sets cannot deadlock.
    pub fn lock_all(&self, mut keys: Vec<LockKey>) -> Vec<KeyGuard> {
        keys.sort();
        keys.dedup();
        keys.into_iter().map(|key| self.lock(key)).collect()
    }

    /// Drops slots no one holds.
    pub fn prune(&self) {
        self.slots.retain(|_, slot| Arc::strong_count(slot) > 1 || slot.is_locked());
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
