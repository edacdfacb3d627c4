//! # Effect Processors
//!
//! One behaviour unit per effect type, all behind [`EffectProcessor`].
//!
//! ## Families
//!
//! - [`damage`]: derive a secondary amount (bonus damage, heal) from the
//!   original hit and emit it synchronously.
//! - [`chance`]: roll the effect value as a probability and ask the host to
//!   apply a status, an extra projectile or a durability refund, gated by a
//!   per-target or per-attacker [`CooldownCache`].
//! - [`passive`]: no-op on hit; ring and armor values are summed elsewhere.
//!
//! Chance processors own their RNG and cooldown cache, so the dispatcher
//! holds exactly one processor per effect type.

pub mod chance;
pub mod cooldown;
pub mod damage;
pub mod passive;

use std::sync::Arc;

pub use chance::{ChanceAction, ChanceProcessor, CooldownScope};
pub use cooldown::CooldownCache;
pub use damage::{DamagePercentProcessor, LifeLeechProcessor, MIN_COMPOSED_AMOUNT};
pub use passive::PassiveProcessor;

use crate::catalog::{EffectBehavior, EffectDefinition, EffectType, WeaponCategory};
use crate::effects::EffectInstance;
use crate::error::ProgressionResult;
use crate::host::{EffectHost, EntityId};
use crate::item::ItemRecord;
use crate::pending::PlayerId;

/// Everything a processor may read about the hit being processed.
pub struct EffectContext<'a> {
    /// World collaborator.
    pub host: &'a dyn EffectHost,
    /// Item that dealt the hit.
    pub weapon: &'a ItemRecord,
    /// Level of that item, derived from stored plus pending XP.
    pub weapon_level: i32,
    /// Category of the hit.
    pub category: WeaponCategory,
    /// Attacking entity.
    pub attacker: EntityId,
    /// Attacking player, when the attacker is a player.
    pub attacker_player: Option<PlayerId>,
    /// Entity that was hit.
    pub target: EntityId,
    /// Damage of the original hit, before any bonus.
    pub original_damage: f64,
    /// Damage cause id of the original hit.
    pub damage_cause: Option<&'a str>,
    /// Server time of the hit in milliseconds.
    pub now_ms: u64,
    /// Whether the hit costs the weapon durability.
    pub causes_durability_loss: bool,
    /// Whether the hit came from an extra projectile spawned by multishot.
    pub is_extra_projectile: bool,
}

impl<'a> EffectContext<'a> {
    /// Creates a context for a level 1 weapon hit at time 0.
    #[must_use]
    pub fn new(
        host: &'a dyn EffectHost,
        weapon: &'a ItemRecord,
        attacker: EntityId,
        target: EntityId,
        original_damage: f64,
    ) -> Self {
        Self {
            host,
            weapon,
            weapon_level: 1,
            category: WeaponCategory::resolve(weapon, None),
            attacker,
            attacker_player: None,
            target,
            original_damage,
            damage_cause: None,
            now_ms: 0,
            causes_durability_loss: true,
            is_extra_projectile: false,
        }
    }

    /// Sets the weapon level.
    #[must_use]
    pub fn with_level(mut self, weapon_level: i32) -> Self {
        self.weapon_level = weapon_level;
        self
    }

    /// Sets the damage cause and re-resolves the category.
    #[must_use]
    pub fn with_cause(mut self, cause: &'a str) -> Self {
        self.damage_cause = Some(cause);
        self.category = WeaponCategory::resolve(self.weapon, Some(cause));
        self
    }

    /// Overrides the category.
    #[must_use]
    pub fn with_category(mut self, category: WeaponCategory) -> Self {
        self.category = category;
        self
    }

    /// Sets the hit time.
    #[must_use]
    pub fn with_time(mut self, now_ms: u64) -> Self {
        self.now_ms = now_ms;
        self
    }

    /// Sets the attacking player.
    #[must_use]
    pub fn with_player(mut self, player: PlayerId) -> Self {
        self.attacker_player = Some(player);
        self
    }

    /// Sets whether the hit costs durability.
    #[must_use]
    pub fn with_durability_loss(mut self, causes_durability_loss: bool) -> Self {
        self.causes_durability_loss = causes_durability_loss;
        self
    }

    /// Marks the hit as coming from a multishot projectile.
    #[must_use]
    pub fn as_extra_projectile(mut self) -> Self {
        self.is_extra_projectile = true;
        self
    }
}

/// Behaviour bound to one effect type.
pub trait EffectProcessor: Send + Sync {
    /// Handles a hit dealt with an item carrying `instance`.
    ///
    /// # Errors
    ///
    /// Implementations report failures as [`crate::ProgressionError::ProcessorFailed`];
    /// the dispatcher logs them and continues with the next instance.
    fn on_damage_dealt(
        &self,
        context: &EffectContext<'_>,
        instance: &EffectInstance,
        definition: &EffectDefinition,
    ) -> ProgressionResult<()>;

    /// Called when an item carrying `instance` starts being held or worn.
    fn on_equipped(&self, _holder: EntityId, _instance: &EffectInstance, _definition: &EffectDefinition) {}

    /// Called when an item carrying `instance` stops being held or worn.
    fn on_unequipped(&self, _holder: EntityId, _instance: &EffectInstance, _definition: &EffectDefinition) {}
}

/// The standard processor for `effect`.
///
/// Chance processors get their own RNG stream derived from `seed`.
#[must_use]
pub fn standard_processor(effect: EffectType, seed: u64) -> Arc<dyn EffectProcessor> {
    match effect {
        EffectType::DamagePercent => Arc::new(DamagePercentProcessor),
        EffectType::LifeLeech => Arc::new(LifeLeechProcessor),
        EffectType::FireOnHit => Arc::new(ChanceProcessor::fire(seed)),
        EffectType::PoisonOnHit => Arc::new(ChanceProcessor::poison(seed)),
        EffectType::SlowOnHit => Arc::new(ChanceProcessor::slow(seed)),
        EffectType::FreezeOnHit => Arc::new(ChanceProcessor::freeze(seed)),
        EffectType::Multishot => Arc::new(ChanceProcessor::multishot(seed)),
        EffectType::DurabilitySave => Arc::new(ChanceProcessor::durability_save(seed)),
        other => {
            debug_assert_eq!(other.behavior(), EffectBehavior::Passive);
            Arc::new(PassiveProcessor::new(other))
        }
    }
}
