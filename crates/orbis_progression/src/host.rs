//! # Host Collaborators
//!
//! The engine never touches the game world directly. Everything an effect
//! does to the world goes through [`EffectHost`], implemented by the server.
//!
//! [`RecordingHost`] is an in-memory implementation that records every
//! request; it backs this crate's tests and is useful for host-side tests.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// World entity identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

/// Tag carried by damage the engine itself emits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageTag {
    /// Ordinary damage from the game.
    Primary,
    /// Synthetic bonus damage. Never re-enters the effect pipeline.
    Bonus,
}

/// A synthetic damage request.
#[derive(Clone, Debug, PartialEq)]
pub struct BonusDamage {
    /// Attacker credited with the damage.
    pub source: EntityId,
    /// Entity receiving the damage.
    pub target: EntityId,
    /// Damage amount.
    pub amount: f64,
    /// Damage cause of the original hit.
    pub cause: Option<String>,
    /// Always [`DamageTag::Bonus`] for engine-emitted damage.
    pub tag: DamageTag,
}

/// World-side operations requested by effect processors.
///
/// Calls are synchronous and fire-and-forget; boolean results report whether
/// the host accepted the request (e.g. a target immune to burning rejects it).
pub trait EffectHost {
    /// Deals tagged bonus damage.
    fn emit_bonus_damage(&self, damage: BonusDamage);

    /// Heals `entity` by `amount`.
    fn heal(&self, entity: EntityId, amount: f64);

    /// Applies the first available status from `status_ids` (preference
    /// order) to `target`.
    fn apply_status(&self, target: EntityId, status_ids: &[&'static str], duration_secs: f64) -> bool;

    /// Fires an extra projectile from `attacker` toward `target`.
    fn spawn_extra_projectile(&self, attacker: EntityId, target: EntityId) -> bool;

    /// Flags that the durability loss of the current hit should be refunded.
    fn save_durability(&self, attacker: EntityId);
}

/// Requests captured by [`RecordingHost`].
#[derive(Clone, Debug, PartialEq)]
pub enum HostRequest {
    /// [`EffectHost::emit_bonus_damage`].
    BonusDamage(BonusDamage),
    /// [`EffectHost::heal`].
    Heal {
        /// Healed entity.
        entity: EntityId,
        /// Heal amount.
        amount: f64,
    },
    /// [`EffectHost::apply_status`] that was accepted.
    Status {
        /// Target entity.
        target: EntityId,
        /// Status id that was applied.
        status: &'static str,
    },
    /// [`EffectHost::spawn_extra_projectile`].
    ExtraProjectile {
        /// Shooter.
        attacker: EntityId,
        /// Target.
        target: EntityId,
    },
    /// [`EffectHost::save_durability`].
    DurabilitySaved {
        /// Wielder.
        attacker: EntityId,
    },
}

/// Host that records every request in memory.
#[derive(Default)]
pub struct RecordingHost {
    requests: Mutex<Vec<HostRequest>>,
    immune: Mutex<HashSet<EntityId>>,
}

impl RecordingHost {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `entity` reject every status request.
    pub fn make_immune(&self, entity: EntityId) {
        self.immune.lock().insert(entity);
    }

    /// Snapshot of recorded requests.
    #[must_use]
    pub fn requests(&self) -> Vec<HostRequest> {
        self.requests.lock().clone()
    }

    /// Clears recorded requests.
    pub fn clear(&self) {
        self.requests.lock().clear();
    }

    /// Total bonus damage emitted.
    #[must_use]
    pub fn total_bonus_damage(&self) -> f64 {
        self.requests
            .lock()
            .iter()
            .filter_map(|request| match request {
                HostRequest::BonusDamage(damage) => Some(damage.amount),
                _ => None,
            })
            .sum()
    }

    /// Number of accepted status applications.
    #[must_use]
    pub fn status_count(&self) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|request| matches!(request, HostRequest::Status { .. }))
            .count()
    }

    fn record(&self, request: HostRequest) {
        self.requests.lock().push(request);
    }
}

impl EffectHost for RecordingHost {
    fn emit_bonus_damage(&self, damage: BonusDamage) {
        self.record(HostRequest::BonusDamage(damage));
    }

    fn heal(&self, entity: EntityId, amount: f64) {
        self.record(HostRequest::Heal { entity, amount });
    }

    fn apply_status(&self, target: EntityId, status_ids: &[&'static str], _duration_secs: f64) -> bool {
        if self.immune.lock().contains(&target) {
            return false;
        }
        let Some(status) = status_ids.first().copied() else {
            return false;
        };
        self.record(HostRequest::Status { target, status });
        true
    }

    fn spawn_extra_projectile(&self, attacker: EntityId, target: EntityId) -> bool {
        self.record(HostRequest::ExtraProjectile { attacker, target });
        true
    }

    fn save_durability(&self, attacker: EntityId) {
        self.record(HostRequest::DurabilitySaved { attacker });
    }
}
