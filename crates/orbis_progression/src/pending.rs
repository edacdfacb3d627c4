//! # Pending Progress
//!
//! **Per-hit XP accumulation ahead of an item write**
//!
//! Rewriting an item record on every hit is too expensive, so XP accrues
//! here keyed by `(player, slot)` and is merged into the item at a natural
//! boundary (level-up, idle gap, explicit flush).
//!
//! ## Exactly-once flush
//!
//! [`PendingProgressTracker::flush_pending_xp`] takes the entry's XP under the
//! shard lock and adds it to the item in the same call. A second flush before
//! new accrual finds nothing and returns the item unchanged. The flushed
//! entry keeps only its hit clock (`last_hit_ms`), which the idle and
//! rapid-hit gap checks read; its XP and owning item id are cleared.
//!
//! ## Slot identity
//!
//! Entries remember the item id that accrued them. A flush against a
//! different item id discards the stale XP instead of crediting the wrong
//! item, and hosts should call [`PendingProgressTracker::clear_slot`] when a
//! slot's contents change.
//!
//! Embue credits are not tracked here: they live on the item record so they
//! follow the item between slots.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::item::{keys, ItemRecord, MetaValue};
use crate::shard::ShardedMap;

/// Player identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Inventory slot that holds a progressing item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotRef {
    /// Hotbar slot (held weapons and tools).
    Hotbar(u16),
    /// Bauble slot (rings).
    Bauble(u16),
}

impl fmt::Display for SlotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hotbar(slot) => write!(f, "{slot}"),
            Self::Bauble(slot) => write!(f, "ring:{slot}"),
        }
    }
}

/// `(player, slot)` key for pending progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProgressKey {
    /// Owning player.
    pub player: PlayerId,
    /// Slot holding the item.
    pub slot: SlotRef,
}

impl ProgressKey {
    /// Key for a hotbar slot.
    #[inline]
    #[must_use]
    pub const fn hotbar(player: PlayerId, slot: u16) -> Self {
        Self {
            player,
            slot: SlotRef::Hotbar(slot),
        }
    }

    /// Key for a bauble (ring) slot.
    #[inline]
    #[must_use]
    pub const fn bauble(player: PlayerId, slot: u16) -> Self {
        Self {
            player,
            slot: SlotRef::Bauble(slot),
        }
    }
}

impl fmt::Display for ProgressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.player, self.slot)
    }
}

#[derive(Clone, Debug, Default)]
struct PendingEntry {
    xp: f64,
    item_id: Option<String>,
    last_hit_ms: Option<u64>,
}

/// Accrued-but-unwritten XP per `(player, slot)`, plus the per-key hit clock.
pub struct PendingProgressTracker {
    entries: ShardedMap<ProgressKey, PendingEntry>,
}

impl PendingProgressTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: ShardedMap::new(),
        }
    }

    /// Adds `amount` to the pending XP for `key`.
    ///
    /// Callers filter non-positive amounts; they are ignored here as well.
    pub fn add_pending_xp(&self, key: ProgressKey, amount: f64) {
        if amount.is_nan() || amount <= 0.0 {
            return;
        }
        self.entries
            .update(key, PendingEntry::default, |entry| entry.xp += amount);
    }

    /// Adds XP and tags the entry with the accruing item id.
    ///
    /// If the slot still holds XP from a different item id, that XP is
    /// discarded first and its amount returned.
    pub fn add_pending_xp_for(&self, key: ProgressKey, item: &ItemRecord, amount: f64) -> f64 {
        if amount.is_nan() || amount <= 0.0 {
            return 0.0;
        }
        self.entries.update(key, PendingEntry::default, |entry| {
            let stale = entry
                .item_id
                .as_deref()
                .is_some_and(|owner| owner != item.item_id());
            let discarded = if stale { std::mem::take(&mut entry.xp) } else { 0.0 };
            if stale {
                tracing::debug!(
                    "Discarding {:.1} pending XP for {} (slot now holds {})",
                    discarded,
                    key,
                    item.item_id()
                );
            }
            if stale || entry.item_id.is_none() {
                entry.item_id = Some(item.item_id().to_string());
            }
            entry.xp += amount;
            discarded
        })
    }

    /// Pending XP for `key`, zero when nothing accrued.
    #[must_use]
    pub fn pending_xp(&self, key: ProgressKey) -> f64 {
        self.entries.get(&key).map_or(0.0, |entry| entry.xp)
    }

    /// Stored XP on the item plus pending XP for `key`.
    #[must_use]
    pub fn total_xp_with_pending(&self, item: &ItemRecord, key: ProgressKey) -> f64 {
        item.stored_xp() + self.pending_xp(key)
    }

    /// Merges pending XP into the item and resets the key.
    ///
    /// The entry stays behind holding only `last_hit_ms`, so the next hit
    /// still measures its gap. [`Self::clear_slot`] and
    /// [`Self::clear_player`] remove entries outright.
    ///
    /// Returns the item unchanged when nothing is pending, or when the
    /// pending XP was accrued by a different item id (that XP is dropped).
    #[must_use]
    pub fn flush_pending_xp(&self, item: &ItemRecord, key: ProgressKey) -> ItemRecord {
        let taken = self.entries.update_existing(&key, |entry| {
            let owner = entry.item_id.take();
            let xp = std::mem::take(&mut entry.xp);
            (xp, owner)
        });
        let Some(taken) = taken else {
            return item.clone();
        };
        match taken {
            (xp, _) if xp <= 0.0 => item.clone(),
            (xp, Some(owner)) if owner != item.item_id() => {
                tracing::warn!(
                    "Dropped {:.1} pending XP for {}: accrued by {}, flushed against {}",
                    xp,
                    key,
                    owner,
                    item.item_id()
                );
                item.clone()
            }
            (xp, _) => {
                tracing::debug!("Flushed {:.1} XP into {} for {}", xp, item.item_id(), key);
                item.with_stored_xp(item.stored_xp() + xp)
            }
        }
    }

    /// Records a hit at `now_ms` and returns the previous hit time for `key`.
    pub fn record_hit(&self, key: ProgressKey, now_ms: u64) -> Option<u64> {
        self.entries
            .update(key, PendingEntry::default, |entry| entry.last_hit_ms.replace(now_ms))
    }

    /// Last recorded hit time for `key`.
    #[must_use]
    pub fn last_hit_ms(&self, key: ProgressKey) -> Option<u64> {
        self.entries.get(&key).and_then(|entry| entry.last_hit_ms)
    }

    /// Drops everything tracked for `key` (slot contents changed).
    pub fn clear_slot(&self, key: ProgressKey) {
        self.entries.remove(&key);
    }

    /// Drops everything tracked for `player` (disconnect).
    pub fn clear_player(&self, player: PlayerId) {
        self.entries.retain(|key, _| key.player != player);
    }

    /// Number of tracked keys.
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.entries.len()
    }

    // =========================================================================
    // Embue credits (stored on the item)
    // =========================================================================

    /// Unspent embue credits on the item.
    #[must_use]
    pub fn get_pending_embues(item: &ItemRecord) -> i32 {
        item.metadata_i32(keys::PENDING_EMBUES).unwrap_or(0).max(0)
    }

    /// Adds `count` embue credits. Non-positive counts leave the item unchanged.
    #[must_use]
    pub fn add_pending_embues(item: &ItemRecord, count: i32) -> ItemRecord {
        if count <= 0 {
            return item.clone();
        }
        let total = Self::get_pending_embues(item).saturating_add(count);
        item.with_metadata(keys::PENDING_EMBUES, MetaValue::Int(total))
    }

    /// Spends exactly one embue credit, never going below zero.
    #[must_use]
    pub fn consume_pending_embue(item: &ItemRecord) -> ItemRecord {
        let remaining = (Self::get_pending_embues(item) - 1).max(0);
        item.with_metadata(keys::PENDING_EMBUES, MetaValue::Int(remaining))
    }
}

impl Default for PendingProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemClass;

    const ALICE: PlayerId = PlayerId(1);
    const BOB: PlayerId = PlayerId(2);

    fn sword() -> ItemRecord {
        ItemRecord::new("Weapon_Sword_Iron", ItemClass::Weapon).with_stored_xp(100.0)
    }

    #[test]
    fn test_flush_is_exactly_once() {
        let tracker = PendingProgressTracker::new();
        let key = ProgressKey::hotbar(ALICE, 0);
        tracker.add_pending_xp(key, 12.5);
        tracker.add_pending_xp(key, 7.5);

        let item = sword();
        let flushed = tracker.flush_pending_xp(&item, key);
        assert!((flushed.stored_xp() - 120.0).abs() < 1e-9);
        assert!(tracker.pending_xp(key).abs() < f64::EPSILON, "pending resets after flush");

        let again = tracker.flush_pending_xp(&flushed, key);
        assert_eq!(again, flushed, "second flush is a no-op");
    }

    #[test]
    fn test_total_includes_pending() {
        let tracker = PendingProgressTracker::new();
        let key = ProgressKey::hotbar(ALICE, 3);
        tracker.add_pending_xp(key, 40.0);
        assert!((tracker.total_xp_with_pending(&sword(), key) - 140.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_positive_amounts_ignored() {
        let tracker = PendingProgressTracker::new();
        let key = ProgressKey::hotbar(ALICE, 0);
        tracker.add_pending_xp(key, 0.0);
        tracker.add_pending_xp(key, -5.0);
        tracker.add_pending_xp(key, f64::NAN);
        assert_eq!(tracker.tracked_keys(), 0);
    }

    #[test]
    fn test_keys_are_independent() {
        let tracker = PendingProgressTracker::new();
        tracker.add_pending_xp(ProgressKey::hotbar(ALICE, 0), 5.0);
        tracker.add_pending_xp(ProgressKey::hotbar(ALICE, 1), 6.0);
        tracker.add_pending_xp(ProgressKey::bauble(ALICE, 0), 7.0);
        tracker.add_pending_xp(ProgressKey::hotbar(BOB, 0), 8.0);

        assert!((tracker.pending_xp(ProgressKey::hotbar(ALICE, 1)) - 6.0).abs() < 1e-9);
        assert!((tracker.pending_xp(ProgressKey::bauble(ALICE, 0)) - 7.0).abs() < 1e-9);

        tracker.clear_player(ALICE);
        assert_eq!(tracker.tracked_keys(), 1);
        assert!((tracker.pending_xp(ProgressKey::hotbar(BOB, 0)) - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_flush_against_other_item_drops_stale_xp() {
        let tracker = PendingProgressTracker::new();
        let key = ProgressKey::hotbar(ALICE, 0);
        tracker.add_pending_xp_for(key, &sword(), 30.0);

        let axe = ItemRecord::new("Weapon_Axe_Copper", ItemClass::Weapon);
        let result = tracker.flush_pending_xp(&axe, key);
        assert!(result.stored_xp().abs() < f64::EPSILON, "axe must not receive sword XP");
        assert!(tracker.pending_xp(key).abs() < f64::EPSILON);
    }

    #[test]
    fn test_accrual_for_new_item_discards_previous() {
        let tracker = PendingProgressTracker::new();
        let key = ProgressKey::hotbar(ALICE, 0);
        tracker.add_pending_xp_for(key, &sword(), 30.0);

        let axe = ItemRecord::new("Weapon_Axe_Copper", ItemClass::Weapon);
        let discarded = tracker.add_pending_xp_for(key, &axe, 4.0);
        assert!((discarded - 30.0).abs() < 1e-9);
        assert!((tracker.pending_xp(key) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_flush_clears_xp_but_keeps_hit_clock() {
        let tracker = PendingProgressTracker::new();
        let key = ProgressKey::hotbar(ALICE, 0);
        let item = sword();
        tracker.record_hit(key, 2_000);
        tracker.add_pending_xp_for(key, &item, 12.0);

        let flushed = tracker.flush_pending_xp(&item, key);
        assert!((flushed.stored_xp() - 112.0).abs() < 1e-9);
        assert!(tracker.pending_xp(key).abs() < f64::EPSILON);
        assert_eq!(tracker.last_hit_ms(key), Some(2_000), "gap checks still see the last hit");

        let other = ItemRecord::new("Weapon_Mace_Iron", ItemClass::Weapon);
        tracker.add_pending_xp_for(key, &other, 3.0);
        assert!((tracker.pending_xp(key) - 3.0).abs() < 1e-9, "no owner left to discard against");
    }

    #[test]
    fn test_hit_clock() {
        let tracker = PendingProgressTracker::new();
        let key = ProgressKey::hotbar(ALICE, 0);
        assert_eq!(tracker.record_hit(key, 1_000), None);
        assert_eq!(tracker.record_hit(key, 1_250), Some(1_000));
        assert_eq!(tracker.last_hit_ms(key), Some(1_250));
        tracker.clear_slot(key);
        assert_eq!(tracker.last_hit_ms(key), None);
    }

    #[test]
    fn test_embue_credits_live_on_item() {
        let item = sword();
        assert_eq!(PendingProgressTracker::get_pending_embues(&item), 0);

        let item = PendingProgressTracker::add_pending_embues(&item, 2);
        assert_eq!(PendingProgressTracker::get_pending_embues(&item), 2);

        let item = PendingProgressTracker::consume_pending_embue(&item);
        assert_eq!(PendingProgressTracker::get_pending_embues(&item), 1);

        let item = PendingProgressTracker::consume_pending_embue(&item);
        let item = PendingProgressTracker::consume_pending_embue(&item);
        assert_eq!(PendingProgressTracker::get_pending_embues(&item), 0, "never negative");
    }
}
