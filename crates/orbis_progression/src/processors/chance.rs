//! # Chance Processors
//!
//! **Roll, check cooldown, ask the host, record**
//!
//! The effect value at the instance level is the proc probability. A proc
//! only starts a cooldown window when the host actually applied the result,
//! so an immune target does not burn the window.
//!
//! ## Determinism
//!
//! Every processor owns a `ChaCha8Rng` seeded from the configured seed, on a
//! stream selected by its effect type. Two engines built with the same seed
//! roll the same sequence per effect.

use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::catalog::{EffectDefinition, EffectType};
use crate::effects::EffectInstance;
use crate::error::ProgressionResult;
use crate::host::EntityId;

use super::{CooldownCache, EffectContext, EffectProcessor};

/// Status ids tried for burning, in preference order.
pub const BURN_STATUSES: &[&str] = &["Burn", "Flame_Staff_Burn"];
/// Status ids tried for poison, in preference order.
pub const POISON_STATUSES: &[&str] = &["Poison_T1", "Poison_T2", "Poison"];
/// Status ids tried for slow.
pub const SLOW_STATUSES: &[&str] = &["Slow"];
/// Status ids tried for freeze.
pub const FREEZE_STATUSES: &[&str] = &["Freeze"];

/// What a successful roll asks the host to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChanceAction {
    /// Apply the first available status of the list to the target.
    Status(&'static [&'static str]),
    /// Fire one extra projectile at the target.
    ExtraProjectile,
    /// Refund the durability cost of the hit.
    SaveDurability,
}

/// Which entity a cooldown window belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CooldownScope {
    /// One window per hit entity.
    Target,
    /// One window per attacker.
    Attacker,
}

/// Probability-gated effect with a cooldown window.
pub struct ChanceProcessor {
    effect: EffectType,
    action: ChanceAction,
    scope: CooldownScope,
    cooldowns: CooldownCache,
    rng: Mutex<ChaCha8Rng>,
}

impl ChanceProcessor {
    /// Creates a processor with its own RNG stream.
    #[must_use]
    pub fn new(effect: EffectType, action: ChanceAction, scope: CooldownScope, cooldown_ms: u64, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(effect as u64);
        Self {
            effect,
            action,
            scope,
            cooldowns: CooldownCache::new(cooldown_ms),
            rng: Mutex::new(rng),
        }
    }

    /// Burn on hit, 3 s per target.
    #[must_use]
    pub fn fire(seed: u64) -> Self {
        Self::new(EffectType::FireOnHit, ChanceAction::Status(BURN_STATUSES), CooldownScope::Target, 3_000, seed)
    }

    /// Poison on hit, 8 s per target.
    #[must_use]
    pub fn poison(seed: u64) -> Self {
        Self::new(EffectType::PoisonOnHit, ChanceAction::Status(POISON_STATUSES), CooldownScope::Target, 8_000, seed)
    }

    /// Slow on hit, 5 s per target.
    #[must_use]
    pub fn slow(seed: u64) -> Self {
        Self::new(EffectType::SlowOnHit, ChanceAction::Status(SLOW_STATUSES), CooldownScope::Target, 5_000, seed)
    }

    /// Freeze on hit, 10 s per target.
    #[must_use]
    pub fn freeze(seed: u64) -> Self {
        Self::new(EffectType::FreezeOnHit, ChanceAction::Status(FREEZE_STATUSES), CooldownScope::Target, 10_000, seed)
    }

    /// Extra projectile, 500 ms per shooter.
    #[must_use]
    pub fn multishot(seed: u64) -> Self {
        Self::new(EffectType::Multishot, ChanceAction::ExtraProjectile, CooldownScope::Attacker, 500, seed)
    }

    /// Durability refund, no cooldown.
    #[must_use]
    pub fn durability_save(seed: u64) -> Self {
        Self::new(EffectType::DurabilitySave, ChanceAction::SaveDurability, CooldownScope::Attacker, 0, seed)
    }

    /// Effect this processor handles.
    #[inline]
    #[must_use]
    pub const fn effect(&self) -> EffectType {
        self.effect
    }

    /// Action taken on a successful roll.
    #[inline]
    #[must_use]
    pub const fn action(&self) -> ChanceAction {
        self.action
    }

    /// Cooldown state, exposed for inspection.
    #[inline]
    #[must_use]
    pub const fn cooldowns(&self) -> &CooldownCache {
        &self.cooldowns
    }

    fn roll(&self) -> f64 {
        self.rng.lock().gen::<f64>()
    }

    fn cooldown_entity(&self, context: &EffectContext<'_>) -> EntityId {
        match self.scope {
            CooldownScope::Target => context.target,
            CooldownScope::Attacker => context.attacker,
        }
    }
}

impl EffectProcessor for ChanceProcessor {
    fn on_damage_dealt(
        &self,
        context: &EffectContext<'_>,
        instance: &EffectInstance,
        definition: &EffectDefinition,
    ) -> ProgressionResult<()> {
        let chance = definition.calculate_value(instance.level);
        if chance.is_nan() || chance <= 0.0 {
            return Ok(());
        }
        match self.action {
            ChanceAction::SaveDurability if !context.causes_durability_loss => return Ok(()),
            // Extra arrows never chain into more extra arrows
            ChanceAction::ExtraProjectile if context.is_extra_projectile => return Ok(()),
            _ => {}
        }
        if self.roll() >= chance {
            return Ok(());
        }

        self.cooldowns.maybe_sweep(context.now_ms);
        let entity = self.cooldown_entity(context);
        if self.cooldowns.is_on_cooldown(entity, context.now_ms) {
            return Ok(());
        }

        let applied = match self.action {
            ChanceAction::Status(statuses) => {
                context
                    .host
                    .apply_status(context.target, statuses, definition.duration_secs)
            }
            ChanceAction::ExtraProjectile => context
                .host
                .spawn_extra_projectile(context.attacker, context.target),
            ChanceAction::SaveDurability => {
                context.host.save_durability(context.attacker);
                true
            }
        };
        if applied {
            self.cooldowns.record(entity, context.now_ms);
            tracing::debug!(
                "{} L{} procced ({:.0}% chance) on {:?}",
                self.effect,
                instance.level,
                chance * 100.0,
                context.target
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostRequest, RecordingHost};
    use crate::item::{ItemClass, ItemRecord};

    fn always(effect: EffectType) -> EffectDefinition {
        EffectDefinition::new(effect, 1.0, 0.0).with_duration(3.0)
    }

    fn never(effect: EffectType) -> EffectDefinition {
        EffectDefinition::new(effect, 0.0, 0.0)
    }

    #[test]
    fn test_certain_proc_applies_status() {
        let host = RecordingHost::new();
        let sword = ItemRecord::new("Weapon_Sword_Iron", ItemClass::Weapon);
        let ctx = EffectContext::new(&host, &sword, EntityId(1), EntityId(2), 10.0).with_time(1_000);
        let processor = ChanceProcessor::fire(7);

        processor
            .on_damage_dealt(&ctx, &EffectInstance::unlocked(EffectType::FireOnHit), &always(EffectType::FireOnHit))
            .unwrap();

        assert_eq!(
            host.requests(),
            vec![HostRequest::Status {
                target: EntityId(2),
                status: "Burn",
            }]
        );
    }

    #[test]
    fn test_zero_chance_never_rolls() {
        let host = RecordingHost::new();
        let sword = ItemRecord::new("Weapon_Sword_Iron", ItemClass::Weapon);
        let ctx = EffectContext::new(&host, &sword, EntityId(1), EntityId(2), 10.0);
        let processor = ChanceProcessor::poison(7);

        for _ in 0..100 {
            processor
                .on_damage_dealt(&ctx, &EffectInstance::unlocked(EffectType::PoisonOnHit), &never(EffectType::PoisonOnHit))
                .unwrap();
        }
        assert!(host.requests().is_empty());
    }

    #[test]
    fn test_cooldown_blocks_second_proc_on_same_target() {
        let host = RecordingHost::new();
        let sword = ItemRecord::new("Weapon_Sword_Iron", ItemClass::Weapon);
        let processor = ChanceProcessor::fire(7);
        let instance = EffectInstance::unlocked(EffectType::FireOnHit);
        let definition = always(EffectType::FireOnHit);

        for now in [1_000, 2_000, 3_999] {
            let ctx = EffectContext::new(&host, &sword, EntityId(1), EntityId(2), 10.0).with_time(now);
            processor.on_damage_dealt(&ctx, &instance, &definition).unwrap();
        }
        assert_eq!(host.status_count(), 1, "window is 3s");

        let other = EffectContext::new(&host, &sword, EntityId(1), EntityId(3), 10.0).with_time(2_500);
        processor.on_damage_dealt(&other, &instance, &definition).unwrap();
        assert_eq!(host.status_count(), 2, "another target has its own window");

        let later = EffectContext::new(&host, &sword, EntityId(1), EntityId(2), 10.0).with_time(4_000);
        processor.on_damage_dealt(&later, &instance, &definition).unwrap();
        assert_eq!(host.status_count(), 3);
    }

    #[test]
    fn test_rejected_status_does_not_start_window() {
        let host = RecordingHost::new();
        host.make_immune(EntityId(2));
        let sword = ItemRecord::new("Weapon_Sword_Iron", ItemClass::Weapon);
        let ctx = EffectContext::new(&host, &sword, EntityId(1), EntityId(2), 10.0).with_time(1_000);
        let processor = ChanceProcessor::slow(7);

        processor
            .on_damage_dealt(&ctx, &EffectInstance::unlocked(EffectType::SlowOnHit), &always(EffectType::SlowOnHit))
            .unwrap();

        assert!(host.requests().is_empty());
        assert!(processor.cooldowns().is_empty());
    }

    #[test]
    fn test_multishot_skips_extra_projectiles() {
        let host = RecordingHost::new();
        let bow = ItemRecord::new("Weapon_Shortbow_Iron", ItemClass::Weapon);
        let processor = ChanceProcessor::multishot(7);
        let instance = EffectInstance::unlocked(EffectType::Multishot);
        let definition = always(EffectType::Multishot);

        let extra = EffectContext::new(&host, &bow, EntityId(1), EntityId(2), 10.0).as_extra_projectile();
        processor.on_damage_dealt(&extra, &instance, &definition).unwrap();
        assert!(host.requests().is_empty());

        let primary = EffectContext::new(&host, &bow, EntityId(1), EntityId(2), 10.0);
        processor.on_damage_dealt(&primary, &instance, &definition).unwrap();
        assert_eq!(
            host.requests(),
            vec![HostRequest::ExtraProjectile {
                attacker: EntityId(1),
                target: EntityId(2),
            }]
        );
    }

    #[test]
    fn test_durability_save_requires_durability_loss() {
        let host = RecordingHost::new();
        let pick = ItemRecord::new("Tool_Pickaxe_Iron", ItemClass::Tool);
        let processor = ChanceProcessor::durability_save(7);
        let instance = EffectInstance::unlocked(EffectType::DurabilitySave);
        let definition = always(EffectType::DurabilitySave);

        let free_hit = EffectContext::new(&host, &pick, EntityId(1), EntityId(2), 10.0).with_durability_loss(false);
        processor.on_damage_dealt(&free_hit, &instance, &definition).unwrap();
        assert!(host.requests().is_empty());

        let costly = EffectContext::new(&host, &pick, EntityId(1), EntityId(2), 10.0);
        processor.on_damage_dealt(&costly, &instance, &definition).unwrap();
        processor.on_damage_dealt(&costly, &instance, &definition).unwrap();
        assert_eq!(host.requests().len(), 2, "no cooldown on durability refunds");
    }

    #[test]
    fn test_same_seed_rolls_same_sequence() {
        let a = ChanceProcessor::freeze(42);
        let b = ChanceProcessor::freeze(42);
        let rolls_a: Vec<f64> = (0..8).map(|_| a.roll()).collect();
        let rolls_b: Vec<f64> = (0..8).map(|_| b.roll()).collect();
        assert_eq!(rolls_a, rolls_b);

        let fire = ChanceProcessor::fire(42);
        assert_ne!(fire.roll(), ChanceProcessor::freeze(42).roll(), "streams differ per effect");
    }
}
