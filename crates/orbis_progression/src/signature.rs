//! Signature energy preservation across hotbar swaps.
//!
//! The game resets a player's signature energy when the active weapon
//! changes. The keeper watches the per-tick `(slot, energy)` pair, reports
//! the swap together with the energy the player had *before* the reset,
//! lets the host stash that value on the weapon being put away, and
//! schedules the restore for the weapon being drawn.

use std::time::Duration;

use crate::config::ProgressionConfig;
use crate::deferred::{DeferredScheduler, LivenessHandle, TaskHandle};
use crate::error::ProgressionResult;
use crate::item::{keys, ItemRecord, MetaValue};
use crate::pending::PlayerId;
use crate::shard::ShardedMap;

/// A detected change of active hotbar slot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SlotSwap {
    /// Slot the player left.
    pub from: u16,
    /// Slot the player switched to.
    pub to: u16,
    /// Energy observed on the tick before the swap.
    pub energy_before_reset: f64,
}

#[derive(Clone, Copy, Debug)]
struct Observed {
    slot: u16,
    energy: f64,
}

/// Per-player slot and energy tracking.
pub struct SignatureEnergyKeeper {
    enabled: bool,
    restore_delay: Duration,
    players: ShardedMap<PlayerId, Observed>,
}

impl SignatureEnergyKeeper {
    /// Creates a keeper.
    #[must_use]
    pub fn new(enabled: bool, restore_delay_ms: u64) -> Self {
        Self {
            enabled,
            restore_delay: Duration::from_millis(restore_delay_ms),
            players: ShardedMap::new(),
        }
    }

    /// Creates a keeper from the config flags.
    #[must_use]
    pub fn from_config(config: &ProgressionConfig) -> Self {
        Self::new(config.preserve_signature_energy, config.signature_restore_delay_ms)
    }

    /// Whether preservation is on.
    #[inline]
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Records this tick's state and reports a swap if the slot changed.
    pub fn observe_tick(&self, player: PlayerId, slot: u16, energy: f64) -> Option<SlotSwap> {
        if !self.enabled {
            return None;
        }
        let current = Observed { slot, energy };
        self.players.update(
            player,
            || current,
            |observed| {
                let swap = (observed.slot != slot).then_some(SlotSwap {
                    from: observed.slot,
                    to: slot,
                    energy_before_reset: observed.energy,
                });
                *observed = current;
                swap
            },
        )
    }

    /// Stores `energy` on the weapon being put away.
    ///
    /// Non-positive energy and items that cannot progress are left unchanged.
    #[must_use]
    pub fn save_energy(&self, item: &ItemRecord, energy: f64) -> ItemRecord {
        if !self.enabled || energy.is_nan() || energy <= 0.0 || !item.can_gain_xp() {
            return item.clone();
        }
        item.with_metadata(keys::SAVED_SIGNATURE_ENERGY, MetaValue::Double(energy))
    }

    /// Energy stashed on the item, if any.
    #[must_use]
    pub fn saved_energy(item: &ItemRecord) -> Option<f64> {
        item.metadata_f64(keys::SAVED_SIGNATURE_ENERGY)
            .filter(|energy| *energy > 0.0)
    }

    /// Removes the stashed energy once restored.
    #[must_use]
    pub fn clear_saved(item: &ItemRecord) -> ItemRecord {
        item.without_metadata(keys::SAVED_SIGNATURE_ENERGY)
    }

    /// Schedules `restore` after the configured delay.
    ///
    /// Returns `Ok(None)` when preservation is disabled.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::ProgressionError::SchedulerClosed`].
    pub fn schedule_restore<W: 'static>(
        &self,
        scheduler: &DeferredScheduler<W>,
        player: &LivenessHandle,
        restore: impl FnOnce(&mut W) + Send + 'static,
    ) -> ProgressionResult<Option<TaskHandle>> {
        if !self.enabled {
            return Ok(None);
        }
        scheduler
            .schedule(self.restore_delay, player, restore)
            .map(Some)
    }

    /// Forgets a player (disconnect).
    pub fn cleanup_player(&self, player: PlayerId) {
        self.players.remove(&player);
    }

    /// Number of tracked players.
    #[must_use]
    pub fn tracked_players(&self) -> usize {
        self.players.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemClass;

    const BOB: PlayerId = PlayerId(2);

    #[test]
    fn test_swap_reports_energy_before_reset() {
        let keeper = SignatureEnergyKeeper::new(true, 100);
        assert_eq!(keeper.observe_tick(BOB, 0, 10.0), None);
        assert_eq!(keeper.observe_tick(BOB, 0, 40.0), None);

        let swap = keeper.observe_tick(BOB, 3, 0.0).unwrap();
        assert_eq!(swap.from, 0);
        assert_eq!(swap.to, 3);
        assert!((swap.energy_before_reset - 40.0).abs() < f64::EPSILON);
        assert_eq!(keeper.observe_tick(BOB, 3, 5.0), None);
    }

    #[test]
    fn test_save_only_positive_energy_on_progressing_items() {
        let keeper = SignatureEnergyKeeper::new(true, 100);
        let sword = ItemRecord::new("Weapon_Sword_Iron", ItemClass::Weapon);
        let food = ItemRecord::new("Food_Bread", ItemClass::Other).with_max_stack(25);

        let saved = keeper.save_energy(&sword, 33.0);
        assert_eq!(SignatureEnergyKeeper::saved_energy(&saved), Some(33.0));
        assert_eq!(keeper.save_energy(&sword, 0.0), sword);
        assert_eq!(keeper.save_energy(&food, 12.0), food);

        let cleared = SignatureEnergyKeeper::clear_saved(&saved);
        assert_eq!(SignatureEnergyKeeper::saved_energy(&cleared), None);
    }

    #[test]
    fn test_disabled_keeper_does_nothing() {
        let keeper = SignatureEnergyKeeper::new(false, 100);
        let sword = ItemRecord::new("Weapon_Sword_Iron", ItemClass::Weapon);
        keeper.observe_tick(BOB, 0, 50.0);
        assert_eq!(keeper.observe_tick(BOB, 1, 0.0), None);
        assert_eq!(keeper.tracked_players(), 0);
        assert_eq!(keeper.save_energy(&sword, 20.0), sword);

        let scheduler: DeferredScheduler<u32> = DeferredScheduler::new();
        let handle = keeper
            .schedule_restore(&scheduler, &LivenessHandle::new(), |_| {})
            .unwrap();
        assert!(handle.is_none());
    }

    #[test]
    fn test_cleanup_forgets_player() {
        let keeper = SignatureEnergyKeeper::new(true, 100);
        keeper.observe_tick(BOB, 0, 1.0);
        keeper.cleanup_player(BOB);
        assert_eq!(keeper.tracked_players(), 0);
        assert_eq!(keeper.observe_tick(BOB, 4, 1.0), None, "first tick after rejoin");
    }
}
