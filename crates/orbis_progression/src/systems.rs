//! # Progression Service
//!
//! **Event entry points: combat hits, block harvests, slot and session changes**
//!
//! The service owns every engine component and is passed explicitly to the
//! host's event callbacks. It never reaches the world itself: items come in
//! as values, updated items go out in the outcome, and world-side effects go
//! through the [`EffectHost`] passed per call.
//!
//! ## Hit flow
//!
//! ```text
//! filter (bonus tag, cancelled, non-positive, non-player, ineligible item)
//!   -> dispatch on-damage effects on the item as held
//!   -> idle gap? flush rings and held item
//!   -> accrue pending XP (held item and every ring)
//!   -> level boundary crossed? flush now, or defer while hits are rapid
//! ```
//!
//! A level-up flush is the only place the held item changes: stored XP,
//! the bonus-damage effect, embue credits and durability are written
//! together in one new record.

use crate::catalog::{EffectType, WeaponCategory};
use crate::config::ProgressionConfig;
use crate::curve::LevelCurve;
use crate::dispatcher::{DispatchReport, EffectDispatcher};
use crate::effects::EffectInstanceStore;
use crate::error::ProgressionResult;
use crate::host::{DamageTag, EffectHost, EntityId};
use crate::item::{ItemClass, ItemRecord};
use crate::pending::{PendingProgressTracker, PlayerId, ProgressKey, SlotRef};
use crate::processors::EffectContext;
use crate::signature::SignatureEnergyKeeper;
use crate::upgrade::{UpgradeOption, UpgradeSelector};

// =============================================================================
// Events
// =============================================================================

/// Who dealt a hit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DamageSource {
    /// A player's entity.
    Player {
        /// Player identity.
        player: PlayerId,
        /// The player's entity in the world.
        entity: EntityId,
    },
    /// Mobs, falls, environment.
    Other,
}

/// One hit as seen by the engine.
#[derive(Clone, Debug, PartialEq)]
pub struct DamageEvent {
    /// Damage amount.
    pub amount: f64,
    /// Damage cause id.
    pub cause: Option<String>,
    /// Attacker.
    pub source: DamageSource,
    /// Entity hit.
    pub target: EntityId,
    /// Primary or engine-emitted bonus damage.
    pub tag: DamageTag,
    /// Whether another system cancelled the hit.
    pub cancelled: bool,
    /// Whether the hit costs the weapon durability.
    pub causes_durability_loss: bool,
    /// Whether the hit came from a multishot projectile.
    pub is_extra_projectile: bool,
    /// Server time of the hit.
    pub now_ms: u64,
}

impl DamageEvent {
    /// A primary hit by a player.
    #[must_use]
    pub fn player_hit(player: PlayerId, entity: EntityId, target: EntityId, amount: f64, now_ms: u64) -> Self {
        Self {
            amount,
            cause: None,
            source: DamageSource::Player { player, entity },
            target,
            tag: DamageTag::Primary,
            cancelled: false,
            causes_durability_loss: true,
            is_extra_projectile: false,
            now_ms,
        }
    }

    /// Sets the damage cause.
    #[must_use]
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Tags the hit as engine-emitted bonus damage.
    #[must_use]
    pub fn as_bonus(mut self) -> Self {
        self.tag = DamageTag::Bonus;
        self
    }

    /// Marks the hit cancelled.
    #[must_use]
    pub fn cancelled(mut self) -> Self {
        self.cancelled = true;
        self
    }

    /// Marks the hit as coming from a multishot projectile.
    #[must_use]
    pub fn from_extra_projectile(mut self) -> Self {
        self.is_extra_projectile = true;
        self
    }

    /// Sets whether the hit costs durability.
    #[must_use]
    pub fn with_durability_loss(mut self, causes_durability_loss: bool) -> Self {
        self.causes_durability_loss = causes_durability_loss;
        self
    }
}

/// What the attacking player carries.
#[derive(Clone, Debug, PartialEq)]
pub struct Loadout {
    /// Active hotbar slot.
    pub slot: u16,
    /// Item in that slot.
    pub held: ItemRecord,
    /// Rings by bauble slot.
    pub rings: Vec<(u16, ItemRecord)>,
}

impl Loadout {
    /// A loadout with no rings.
    #[must_use]
    pub fn new(slot: u16, held: ItemRecord) -> Self {
        Self {
            slot,
            held,
            rings: Vec::new(),
        }
    }

    /// Adds a ring.
    #[must_use]
    pub fn with_ring(mut self, slot: u16, ring: ItemRecord) -> Self {
        self.rings.push((slot, ring));
        self
    }
}

/// Result of one processed hit. The host writes `item` and `rings` back.
#[derive(Clone, Debug, PartialEq)]
pub struct HitOutcome {
    /// Held item after the hit.
    pub item: ItemRecord,
    /// Rings after the hit, same order as the loadout.
    pub rings: Vec<(u16, ItemRecord)>,
    /// XP accrued by the held item.
    pub xp_gained: f64,
    /// Level from stored XP before the hit.
    pub level_before: i32,
    /// Level from stored plus pending XP after the hit.
    pub level_after: i32,
    /// Embue credits written onto the held item.
    pub embues_granted: i32,
    /// Whether pending XP was merged into the held item.
    pub flushed: bool,
    /// A level boundary was crossed during rapid hits; the flush waits.
    pub level_up_deferred: bool,
    /// Whether the host should show an XP notification.
    pub notify_xp: bool,
    /// Signature energy the host should add, from equipped rings.
    pub signature_energy_bonus: f64,
    /// Effect dispatch counts.
    pub dispatch: DispatchReport,
}

impl HitOutcome {
    /// Whether the held item gained a level and was written.
    ///
    /// Also true when an idle flush wrote a level-up that rapid hits had
    /// deferred earlier.
    #[inline]
    #[must_use]
    pub const fn leveled_up(&self) -> bool {
        self.embues_granted > 0 || (self.flushed && self.level_after > self.level_before)
    }
}

/// Result of one harvested block.
#[derive(Clone, Debug, PartialEq)]
pub struct HarvestOutcome {
    /// Tool after the harvest.
    pub item: ItemRecord,
    /// XP accrued.
    pub xp_gained: f64,
    /// Level from stored XP before the harvest.
    pub level_before: i32,
    /// Level from stored plus pending XP after the harvest.
    pub level_after: i32,
    /// Embue credits written onto the tool.
    pub embues_granted: i32,
    /// Extra drop fraction from `tool_drop_bonus`.
    pub drop_bonus: f64,
}

// =============================================================================
// Service
// =============================================================================

/// Owns the engine and handles host events.
pub struct ProgressionService {
    config: ProgressionConfig,
    curve: LevelCurve,
    tracker: PendingProgressTracker,
    dispatcher: EffectDispatcher,
    selector: UpgradeSelector,
    signature: SignatureEnergyKeeper,
}

impl ProgressionService {
    /// Builds the engine from a validated config with the standard catalogue.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ProgressionError::InvalidConfig`] if validation fails.
    pub fn new(config: ProgressionConfig) -> ProgressionResult<Self> {
        config.validate()?;
        let service = Self {
            curve: LevelCurve::from_config(&config),
            tracker: PendingProgressTracker::new(),
            dispatcher: EffectDispatcher::standard(config.rng_seed),
            selector: UpgradeSelector::from_config(&config),
            signature: SignatureEnergyKeeper::from_config(&config),
            config,
        };
        tracing::info!(
            "Progression ready: max level {}, {} effects",
            service.curve.effective_max_level(),
            service.dispatcher.catalog().len()
        );
        Ok(service)
    }

    /// Replaces the dispatcher (custom processors or definitions).
    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: EffectDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Active config.
    #[must_use]
    pub const fn config(&self) -> &ProgressionConfig {
        &self.config
    }

    /// Level curve.
    #[must_use]
    pub const fn curve(&self) -> &LevelCurve {
        &self.curve
    }

    /// Pending progress.
    #[must_use]
    pub const fn tracker(&self) -> &PendingProgressTracker {
        &self.tracker
    }

    /// Effect registry.
    #[must_use]
    pub const fn dispatcher(&self) -> &EffectDispatcher {
        &self.dispatcher
    }

    /// Upgrade selection.
    #[must_use]
    pub const fn selector(&self) -> &UpgradeSelector {
        &self.selector
    }

    /// Signature energy tracking.
    #[must_use]
    pub const fn signature(&self) -> &SignatureEnergyKeeper {
        &self.signature
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Level of the item in `key`, counting pending XP.
    #[must_use]
    pub fn item_level(&self, item: &ItemRecord, key: ProgressKey) -> i32 {
        self.curve
            .level_from_xp(self.tracker.total_xp_with_pending(item, key))
    }

    /// Progress line for the item in `key`, counting pending XP.
    #[must_use]
    pub fn progress_string(&self, item: &ItemRecord, key: ProgressKey) -> String {
        self.curve
            .progress_string(self.tracker.total_xp_with_pending(item, key))
    }

    /// Effects line for the item.
    #[must_use]
    pub fn effects_summary(&self, item: &ItemRecord) -> String {
        self.dispatcher.effects_summary(item)
    }

    // =========================================================================
    // Combat
    // =========================================================================

    /// Handles one hit. Returns `None` when the hit is not relevant.
    pub fn on_damage_dealt(&self, event: &DamageEvent, loadout: &Loadout, host: &dyn EffectHost) -> Option<HitOutcome> {
        if event.tag == DamageTag::Bonus || event.cancelled || event.amount.is_nan() || event.amount <= 0.0 {
            return None;
        }
        let DamageSource::Player { player, entity } = event.source else {
            return None;
        };
        let held = &loadout.held;
        if !held.can_gain_xp() {
            return None;
        }
        let key = ProgressKey::hotbar(player, loadout.slot);

        let mut context = EffectContext::new(host, held, entity, event.target, event.amount)
            .with_level(self.item_level(held, key))
            .with_time(event.now_ms)
            .with_player(player)
            .with_durability_loss(event.causes_durability_loss);
        if let Some(cause) = event.cause.as_deref() {
            context = context.with_cause(cause);
        }
        if event.is_extra_projectile {
            context = context.as_extra_projectile();
        }
        let dispatch = self.dispatcher.apply_on_damage_effects(&context);

        let mut rings = loadout.rings.clone();
        let stored_level = self.curve.level_from_xp(held.stored_xp());
        let mut outcome = HitOutcome {
            item: held.clone(),
            rings: Vec::new(),
            xp_gained: 0.0,
            level_before: stored_level,
            level_after: stored_level,
            embues_granted: 0,
            flushed: false,
            level_up_deferred: false,
            notify_xp: false,
            signature_energy_bonus: self
                .dispatcher
                .sum_effect_value(rings.iter().map(|(_, ring)| ring), EffectType::RingSignatureEnergy),
            dispatch,
        };

        let xp = if self.curve.is_max_level(self.item_level(held, key)) {
            0.0
        } else {
            self.curve.xp_from_damage(event.amount)
        };
        if xp <= 0.0 {
            outcome.rings = rings;
            return Some(outcome);
        }

        let gap = self
            .tracker
            .record_hit(key, event.now_ms)
            .map(|last| event.now_ms.saturating_sub(last));
        let mut item = held.clone();

        if gap.is_some_and(|gap| gap >= self.config.combat_idle_flush_ms) {
            self.flush_rings(player, &mut rings);
            if self.tracker.pending_xp(key) > 0.0 {
                let (flushed, embues) = self.flush_into(&item, key);
                item = flushed;
                outcome.embues_granted += embues;
                outcome.flushed = true;
                tracing::debug!("Idle flush for {}", key);
            }
        }

        let level_before = self.curve.level_from_xp(item.stored_xp());
        self.tracker.add_pending_xp_for(key, &item, xp);
        let level_after = self.item_level(&item, key);
        self.award_ring_xp(player, &mut rings, xp);

        outcome.xp_gained = xp;
        outcome.level_before = level_before;
        outcome.level_after = level_after;
        outcome.notify_xp = self.config.show_xp_notifications && xp >= self.config.min_xp_for_notification;

        if level_after > level_before {
            if gap.is_some_and(|gap| gap < self.config.level_up_delay_threshold_ms) {
                outcome.level_up_deferred = true;
                tracing::debug!(
                    "Level up {} -> {} queued for {} (rapid hits)",
                    level_before,
                    level_after,
                    key
                );
            } else {
                self.flush_rings(player, &mut rings);
                let (leveled, embues) = self.flush_into(&item, key);
                item = leveled;
                outcome.embues_granted += embues;
                outcome.flushed = true;
                tracing::info!(
                    "{} leveled {} -> {} | {}",
                    item.item_id(),
                    level_before,
                    level_after,
                    self.dispatcher.effects_summary(&item)
                );
            }
        }

        outcome.item = item;
        outcome.rings = rings;
        Some(outcome)
    }

    // =========================================================================
    // Harvesting
    // =========================================================================

    /// Handles a block broken with a tool.
    ///
    /// Returns `None` for non-tools and non-positive XP.
    pub fn on_block_harvested(
        &self,
        player: PlayerId,
        slot: u16,
        tool: &ItemRecord,
        xp: f64,
        now_ms: u64,
    ) -> Option<HarvestOutcome> {
        if xp.is_nan() || xp <= 0.0 || tool.class() != ItemClass::Tool || !tool.can_gain_xp() {
            return None;
        }
        let key = ProgressKey::hotbar(player, slot);
        let mut item = tool.clone();
        let mut embues_granted = 0;

        let gap = self
            .tracker
            .record_hit(key, now_ms)
            .map(|last| now_ms.saturating_sub(last));
        if gap.is_some_and(|gap| gap >= self.config.combat_idle_flush_ms) && self.tracker.pending_xp(key) > 0.0 {
            let (flushed, embues) = self.flush_into(&item, key);
            item = flushed;
            embues_granted += embues;
        }

        let level_before = self.curve.level_from_xp(item.stored_xp());
        let xp_gained = if self.curve.is_max_level(self.item_level(&item, key)) {
            0.0
        } else {
            self.tracker.add_pending_xp_for(key, &item, xp);
            xp
        };
        let level_after = self.item_level(&item, key);
        if level_after > level_before {
            let (leveled, embues) = self.flush_into(&item, key);
            item = leveled;
            embues_granted += embues;
            tracing::info!("{} leveled {} -> {}", item.item_id(), level_before, level_after);
        }

        Some(HarvestOutcome {
            drop_bonus: self.dispatcher.effect_value(&item, EffectType::ToolDropBonus),
            item,
            xp_gained,
            level_before,
            level_after,
            embues_granted,
        })
    }

    // =========================================================================
    // Slots and sessions
    // =========================================================================

    /// Merges pending XP for `key` into `item` now.
    #[must_use]
    pub fn flush_slot(&self, item: &ItemRecord, key: ProgressKey) -> ItemRecord {
        self.flush_into(item, key).0
    }

    /// Drops pending XP for a slot whose item changed before it was flushed.
    pub fn on_slot_contents_changed(&self, player: PlayerId, slot: SlotRef) {
        self.tracker.clear_slot(ProgressKey { player, slot });
    }

    /// Forgets everything tracked for a player.
    pub fn on_player_disconnect(&self, player: PlayerId) {
        self.tracker.clear_player(player);
        self.signature.cleanup_player(player);
        tracing::info!("Cleared progression state for player {}", player);
    }

    // =========================================================================
    // Upgrade selection
    // =========================================================================

    /// Opens the selection for `item`: the persisted options, or a new roll.
    #[must_use]
    pub fn open_upgrade_selection(&self, item: &ItemRecord) -> (ItemRecord, Vec<UpgradeOption>) {
        let category = WeaponCategory::resolve(item, None);
        self.selector
            .get_or_create_pending_upgrade_options(item, category, self.dispatcher.catalog())
    }

    /// Selects the option at `index`. Invalid input returns `None`.
    #[must_use]
    pub fn select_upgrade(&self, item: &ItemRecord, index: usize) -> Option<ItemRecord> {
        self.selector
            .select_index(item, index, self.dispatcher.catalog())
    }

    /// Closes the selection without choosing. The persisted options and the
    /// embue stay on the item.
    #[must_use]
    pub fn cancel_upgrade_selection(&self, item: &ItemRecord) -> ItemRecord {
        tracing::debug!("Upgrade selection closed for {}", item.item_id());
        UpgradeSelector::cancel(item)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Flushes `key` into `item` and applies what the crossed levels grant.
    ///
    /// Every crossed level is a level-up, whichever path flushed it.
    fn flush_into(&self, item: &ItemRecord, key: ProgressKey) -> (ItemRecord, i32) {
        let level_before = self.curve.level_from_xp(item.stored_xp());
        let mut updated = self.tracker.flush_pending_xp(item, key);
        let level_after = self.curve.level_from_xp(updated.stored_xp());

        if EffectType::DamagePercent.applies_to(WeaponCategory::resolve(&updated, None)) {
            updated = EffectInstanceStore::update_effect_for_level(&updated, EffectType::DamagePercent, level_after);
        }
        let crossed = (level_after - level_before).max(0);
        updated = PendingProgressTracker::add_pending_embues(&updated, crossed);
        if crossed > 0 {
            updated = updated.with_durability_restored();
        }
        (updated, crossed)
    }

    fn award_ring_xp(&self, player: PlayerId, rings: &mut [(u16, ItemRecord)], xp: f64) {
        for (slot, ring) in rings.iter_mut() {
            if !ring_can_progress(ring) {
                continue;
            }
            let key = ProgressKey::bauble(player, *slot);
            if self.curve.is_max_level(self.item_level(ring, key)) {
                continue;
            }
            self.tracker.add_pending_xp_for(key, ring, xp);
            let before = self.curve.level_from_xp(ring.stored_xp());
            let after = self.item_level(ring, key);
            if after > before {
                let (leveled, _) = self.flush_into(ring, key);
                tracing::info!("{} leveled {} -> {}", leveled.item_id(), before, after);
                *ring = leveled;
            }
        }
    }

    fn flush_rings(&self, player: PlayerId, rings: &mut [(u16, ItemRecord)]) {
        for (slot, ring) in rings.iter_mut() {
            let key = ProgressKey::bauble(player, *slot);
            if ring_can_progress(ring) && self.tracker.pending_xp(key) > 0.0 {
                *ring = self.flush_into(ring, key).0;
            }
        }
    }
}

/// Rings progress through bauble slots, separate from held items.
fn ring_can_progress(ring: &ItemRecord) -> bool {
    ring.class() == ItemClass::Ring && !ring.is_empty() && ring.max_stack() <= 1
}
