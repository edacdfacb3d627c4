//! # Orbis Progression
//!
//! Item experience, weapon effects and upgrade selection for Echoes of Orbis.
//!
//! ## Design Principles
//!
//! 1. **Level is derived** - only XP is persisted; the level always comes from the curve
//! 2. **Batched writes** - hit XP accrues in memory and is written at level-ups or idle gaps
//! 3. **Isolated effects** - a failing processor never blocks the others or the hit
//! 4. **Idempotent selection** - a rolled option set is persisted and reopened unchanged
//! 5. **External configuration** - curve and timings come from a TOML file
//!
//! ## Thread Safety
//!
//! [`ProgressionService`] is `Sync`: pending progress and cooldowns live in
//! sharded `parking_lot` maps and RNGs sit behind mutexes. World mutation is
//! never done here. Items go in and out as values and world effects go through
//! an [`EffectHost`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use orbis_progression::{DamageEvent, Loadout, ProgressionConfig, ProgressionService};
//!
//! let config = ProgressionConfig::from_file("data/progression.toml")?;
//! let service = ProgressionService::new(config)?;
//!
//! let hit = DamageEvent::player_hit(player, attacker, target, 12.5, now_ms);
//! if let Some(outcome) = service.on_damage_dealt(&hit, &loadout, &host) {
//!     inventory.write(loadout.slot, outcome.item);
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod catalog;
pub mod config;
pub mod curve;
pub mod deferred;
pub mod dispatcher;
pub mod effects;
pub mod error;
pub mod host;
pub mod item;
pub mod material;
pub mod pending;
pub mod processors;
pub mod shard;
pub mod signature;
pub mod systems;
pub mod upgrade;

pub use catalog::{
    CategorySet, EffectBehavior, EffectCatalog, EffectDefinition, EffectType, ValueDisplayFormat,
    WeaponCategory,
};
pub use config::ProgressionConfig;
pub use curve::LevelCurve;
pub use deferred::{DeferredScheduler, LivenessHandle, TaskHandle};
pub use dispatcher::{DispatchReport, EffectDispatcher};
pub use effects::{EffectInstance, EffectInstanceStore};
pub use error::{ProgressionError, ProgressionResult};
pub use host::{BonusDamage, DamageTag, EffectHost, EntityId, HostRequest, RecordingHost};
pub use item::{ItemClass, ItemRecord, MetaValue};
pub use material::MaterialTiers;
pub use pending::{PendingProgressTracker, PlayerId, ProgressKey, SlotRef};
pub use processors::{EffectContext, EffectProcessor};
pub use signature::{SignatureEnergyKeeper, SlotSwap};
pub use systems::{DamageEvent, DamageSource, HarvestOutcome, HitOutcome, Loadout, ProgressionService};
pub use upgrade::{UpgradeOption, UpgradeSelector};
