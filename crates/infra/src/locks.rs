//! Keyed exclusive locks with ordered acquisition and bounded waits.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use stockroom_core::{ItemId, PlacementKey};

use crate::error::{LedgerError, LedgerResult};

/// A lockable resource.
///
/// The derived `Ord` is the global acquisition order: recipe locks, then item
/// locks, then placement rows by (item, location).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockKey {
    Bom(ItemId),
    Item(ItemId),
    Placement(PlacementKey),
}

impl core::fmt::Display for LockKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LockKey::Bom(product) => write!(f, "bom {product}"),
            LockKey::Item(item) => write!(f, "item {item}"),
            LockKey::Placement(key) => write!(f, "placement {}@{}", key.item, key.location),
        }
    }
}

/// Table of currently held keys.
#[derive(Debug, Default)]
pub struct KeyLocks {
    held: Mutex<HashSet<LockKey>>,
    released: Condvar,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire every key, in sorted order, waiting at most `timeout` overall.
    ///
    /// On timeout the keys taken so far are released and `Busy` is returned.
    pub fn acquire(
        &self,
        keys: impl IntoIterator<Item = LockKey>,
        timeout: Duration,
    ) -> LedgerResult<LockSet<'_>> {
        let mut keys: Vec<LockKey> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();

        let deadline = Instant::now() + timeout;
        let mut set = LockSet {
            locks: self,
            keys: Vec::with_capacity(keys.len()),
        };

        for key in keys {
            let mut held = self.held.lock().map_err(|_| LedgerError::poisoned())?;
            while held.contains(&key) {
                let now = Instant::now();
                if now >= deadline {
                    drop(held);
                    tracing::warn!(%key, "lock wait timed out");
                    return Err(LedgerError::Busy(format!("timed out waiting for {key}")));
                }
                let (guard, _) = self
                    .released
                    .wait_timeout(held, deadline - now)
                    .map_err(|_| LedgerError::poisoned())?;
                held = guard;
            }
            held.insert(key);
            set.keys.push(key);
        }

        Ok(set)
    }

    pub fn is_held(&self, key: &LockKey) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }

    fn release(&self, keys: &[LockKey]) {
        if keys.is_empty() {
            return;
        }
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        for key in keys {
            held.remove(key);
        }
        drop(held);
        self.released.notify_all();
    }
}

/// Keys held by one transaction. Released on drop, including during unwinding.
#[derive(Debug)]
pub struct LockSet<'a> {
    locks: &'a KeyLocks,
    keys: Vec<LockKey>,
}

impl LockSet<'_> {
    pub fn keys(&self) -> &[LockKey] {
        &self.keys
    }

    pub fn covers(&self, key: &LockKey) -> bool {
        self.keys.binary_search(key).is_ok()
    }
}

impl Drop for LockSet<'_> {
    fn drop(&mut self) {
        self.locks.release(&self.keys);
    }
}
