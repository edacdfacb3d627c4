//! Per-entity cooldown windows for chance processors.
//!
//! Entries are swept at most once per [`SWEEP_INTERVAL_MS`], evicting any
//! entry older than twice the cooldown, so the cache stays bounded by the
//! number of entities hit within that window.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::host::EntityId;
use crate::shard::ShardedMap;

/// Minimum time between sweeps.
pub const SWEEP_INTERVAL_MS: u64 = 60_000;

/// Last application time per entity.
pub struct CooldownCache {
    cooldown_ms: u64,
    last_applied: ShardedMap<EntityId, u64>,
    last_sweep_ms: AtomicU64,
}

impl CooldownCache {
    /// Creates a cache with the given window. A zero window never blocks.
    #[must_use]
    pub fn new(cooldown_ms: u64) -> Self {
        Self {
            cooldown_ms,
            last_applied: ShardedMap::new(),
            last_sweep_ms: AtomicU64::new(0),
        }
    }

    /// Cooldown window in milliseconds.
    #[inline]
    #[must_use]
    pub const fn cooldown_ms(&self) -> u64 {
        self.cooldown_ms
    }

    /// Whether `entity` is still inside its window at `now_ms`.
    #[must_use]
    pub fn is_on_cooldown(&self, entity: EntityId, now_ms: u64) -> bool {
        if self.cooldown_ms == 0 {
            return false;
        }
        self.last_applied
            .get(&entity)
            .is_some_and(|last| now_ms.saturating_sub(last) < self.cooldown_ms)
    }

    /// Starts a new window for `entity`.
    pub fn record(&self, entity: EntityId, now_ms: u64) {
        if self.cooldown_ms > 0 {
            self.last_applied.insert(entity, now_ms);
        }
    }

    /// Sweeps stale entries if the sweep interval has elapsed.
    ///
    /// Returns whether a sweep ran.
    pub fn maybe_sweep(&self, now_ms: u64) -> bool {
        let last = self.last_sweep_ms.load(Ordering::Relaxed);
        if now_ms.saturating_sub(last) <= SWEEP_INTERVAL_MS {
            return false;
        }
        // Only the caller that wins the swap sweeps
        if self
            .last_sweep_ms
            .compare_exchange(last, now_ms, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            return false;
        }
        let horizon = self.cooldown_ms.saturating_mul(2);
        self.last_applied
            .retain(|_, applied| now_ms.saturating_sub(*applied) <= horizon);
        true
    }

    /// Number of tracked entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.last_applied.len()
    }

    /// Whether nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.last_applied.is_empty()
    }
}
