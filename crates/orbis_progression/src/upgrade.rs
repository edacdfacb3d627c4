//! # Upgrade Selection
//!
//! **Three options per embue, rolled once, persisted until spent**
//!
//! ## State machine (per item)
//!
//! ```text
//! NoPendingEmbue -> HasPendingEmbue(n) -> OptionsGenerated -> Selected
//!                          ^                                     |
//!                          +-------------------------------------+
//! ```
//!
//! - Opening the selection with options already persisted returns them
//!   unchanged. Closing without choosing keeps them, so reopening cannot
//!   re-roll.
//! - Selecting spends exactly one embue and clears the persisted set; the
//!   next open rolls a fresh one. Only an option from the persisted set can
//!   be selected.
//!
//! ## Candidate pool
//!
//! - `Boost` for every applicable effect on the item below its max level.
//! - `New` for every selectable, applicable type not currently on the item,
//!   only while the item has free boost slots.
//!
//! Up to `count` distinct candidates are drawn uniformly without replacement.

use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::fmt;

use crate::catalog::{EffectCatalog, EffectType, WeaponCategory};
use crate::config::ProgressionConfig;
use crate::effects::{EffectInstance, EffectInstanceStore};
use crate::error::{ProgressionError, ProgressionResult};
use crate::item::{keys, ItemRecord, MetaValue};
use crate::material::MaterialTiers;
use crate::pending::PendingProgressTracker;

/// RNG stream reserved for option rolls, clear of the per-effect streams.
const OPTION_STREAM: u64 = 0x5550_4752;

const FIELD_KIND: &str = "Kind";
const FIELD_TYPE: &str = "Type";
const FIELD_LEVEL: &str = "Level";
const KIND_BOOST: &str = "Boost";
const KIND_NEW: &str = "New";

// =============================================================================
// Options
// =============================================================================

/// One choice offered by the selection UI.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UpgradeOption {
    /// Raise an existing effect from `level` to `level + 1`.
    Boost {
        /// Effect on the item.
        effect: EffectType,
        /// Its level when the option was rolled.
        level: i32,
    },
    /// Unlock a new effect at level 1.
    New {
        /// Effect to add.
        effect: EffectType,
    },
}

impl UpgradeOption {
    /// Effect the option touches.
    #[inline]
    #[must_use]
    pub const fn effect(self) -> EffectType {
        match self {
            Self::Boost { effect, .. } | Self::New { effect } => effect,
        }
    }

    /// Card text for the selection UI.
    #[must_use]
    pub fn describe(self, catalog: &EffectCatalog) -> String {
        let Some(definition) = catalog.definition(self.effect()) else {
            return self.to_string();
        };
        match self {
            Self::Boost { level, .. } => format!(
                "Boost {}: {} -> {}",
                catalog.short_description(self.effect()),
                definition.format_value(level),
                definition.format_value(level + 1)
            ),
            Self::New { .. } => format!(
                "New: {} ({})",
                catalog.short_description(self.effect()),
                definition.format_value(1)
            ),
        }
    }

    fn to_meta(self) -> MetaValue {
        let mut doc = BTreeMap::new();
        let (kind, level) = match self {
            Self::Boost { level, .. } => (KIND_BOOST, level),
            Self::New { .. } => (KIND_NEW, 0),
        };
        doc.insert(FIELD_KIND.to_string(), MetaValue::Str(kind.to_string()));
        doc.insert(
            FIELD_TYPE.to_string(),
            MetaValue::Str(self.effect().id().to_string()),
        );
        doc.insert(FIELD_LEVEL.to_string(), MetaValue::Int(level));
        MetaValue::Doc(doc)
    }

    fn from_meta(value: &MetaValue) -> Option<Self> {
        let doc = value.as_doc()?;
        let effect = EffectType::from_id(doc.get(FIELD_TYPE)?.as_str()?)?;
        match doc.get(FIELD_KIND)?.as_str()? {
            KIND_BOOST => {
                let level = doc.get(FIELD_LEVEL)?.as_i32()?;
                (level >= 1).then_some(Self::Boost { effect, level })
            }
            KIND_NEW => Some(Self::New { effect }),
            _ => None,
        }
    }
}

impl fmt::Display for UpgradeOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boost { effect, level } => write!(f, "boost {effect} L{level}"),
            Self::New { effect } => write!(f, "new {effect}"),
        }
    }
}

/// Options persisted on the item, empty when none.
#[must_use]
pub fn persisted_options(item: &ItemRecord) -> Vec<UpgradeOption> {
    item.metadata(keys::PENDING_UPGRADE_OPTIONS)
        .and_then(MetaValue::as_list)
        .map(|entries| entries.iter().filter_map(UpgradeOption::from_meta).collect())
        .unwrap_or_default()
}

fn persist_options(item: &ItemRecord, options: &[UpgradeOption]) -> ItemRecord {
    let encoded = options.iter().map(|option| option.to_meta()).collect();
    item.with_metadata(keys::PENDING_UPGRADE_OPTIONS, MetaValue::List(encoded))
}

// =============================================================================
// Selector
// =============================================================================

/// Rolls, persists and resolves upgrade options.
pub struct UpgradeSelector {
    rng: Mutex<ChaCha8Rng>,
    tiers: MaterialTiers,
    option_count: usize,
}

impl UpgradeSelector {
    /// Creates a selector.
    #[must_use]
    pub fn new(seed: u64, tiers: MaterialTiers, option_count: usize) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(OPTION_STREAM);
        Self {
            rng: Mutex::new(rng),
            tiers,
            option_count,
        }
    }

    /// Creates a selector with the standard tier table.
    #[must_use]
    pub fn from_config(config: &ProgressionConfig) -> Self {
        Self::new(config.rng_seed, MaterialTiers::standard(), config.upgrade_option_count)
    }

    /// Options rolled per embue.
    #[inline]
    #[must_use]
    pub const fn option_count(&self) -> usize {
        self.option_count
    }

    /// Boost slot table.
    #[inline]
    #[must_use]
    pub const fn tiers(&self) -> &MaterialTiers {
        &self.tiers
    }

    /// Every option the item could be offered right now.
    #[must_use]
    pub fn candidate_pool(
        &self,
        item: &ItemRecord,
        category: WeaponCategory,
        catalog: &EffectCatalog,
    ) -> Vec<UpgradeOption> {
        let effects = EffectInstanceStore::get_effects(item);
        let mut pool: Vec<UpgradeOption> = effects
            .iter()
            .filter(|instance| instance.effect.applies_to(category))
            .filter(|instance| {
                catalog
                    .definition(instance.effect)
                    .is_some_and(|definition| definition.can_boost(instance.level))
            })
            .map(|instance| UpgradeOption::Boost {
                effect: instance.effect,
                level: instance.level,
            })
            .collect();

        if effects.len() < self.tiers.boost_slots(item) {
            pool.extend(
                EffectType::ALL
                    .into_iter()
                    .filter(|effect| effect.is_selectable() && effect.applies_to(category))
                    .filter(|effect| !effects.iter().any(|e| e.effect == *effect))
                    .filter(|effect| catalog.definition(*effect).is_some())
                    .map(|effect| UpgradeOption::New { effect }),
            );
        }
        pool
    }

    /// Returns the persisted options, rolling and persisting a new set first
    /// when there is none.
    ///
    /// Without a pending embue nothing is rolled and the list is empty.
    #[must_use]
    pub fn get_or_create_pending_upgrade_options(
        &self,
        item: &ItemRecord,
        category: WeaponCategory,
        catalog: &EffectCatalog,
    ) -> (ItemRecord, Vec<UpgradeOption>) {
        self.get_or_create_with_count(item, category, catalog, self.option_count)
    }

    /// [`Self::get_or_create_pending_upgrade_options`] with an explicit count.
    #[must_use]
    pub fn get_or_create_with_count(
        &self,
        item: &ItemRecord,
        category: WeaponCategory,
        catalog: &EffectCatalog,
        count: usize,
    ) -> (ItemRecord, Vec<UpgradeOption>) {
        let existing = persisted_options(item);
        if !existing.is_empty() {
            return (item.clone(), existing);
        }
        if PendingProgressTracker::get_pending_embues(item) == 0 {
            return (item.clone(), Vec::new());
        }

        let mut pool = self.candidate_pool(item, category, catalog);
        if pool.is_empty() {
            tracing::debug!("No upgrade candidates for {}", item.item_id());
            return (item.clone(), pool);
        }
        pool.shuffle(&mut *self.rng.lock());
        pool.truncate(count);

        tracing::debug!(
            "Rolled {} upgrade options for {}: {:?}",
            pool.len(),
            item.item_id(),
            pool
        );
        (persist_options(item, &pool), pool)
    }

    /// Applies `option`, spends one embue and clears the persisted set.
    ///
    /// # Errors
    ///
    /// - [`ProgressionError::NoPendingEmbue`] when the item has no credit
    /// - [`ProgressionError::InvalidUpgradeOption`] when `option` is not in the
    ///   persisted set, a boost targets an absent or maxed effect, or a new
    ///   effect is already present
    pub fn select_upgrade(
        &self,
        item: &ItemRecord,
        option: UpgradeOption,
        catalog: &EffectCatalog,
    ) -> ProgressionResult<ItemRecord> {
        if PendingProgressTracker::get_pending_embues(item) == 0 {
            return Err(ProgressionError::NoPendingEmbue(item.item_id().to_string()));
        }
        if !persisted_options(item).contains(&option) {
            return Err(ProgressionError::InvalidUpgradeOption(option.to_string()));
        }

        let upgraded = match option {
            UpgradeOption::Boost { effect, .. } => {
                let current = EffectInstanceStore::get_effect(item, effect)
                    .ok_or_else(|| ProgressionError::InvalidUpgradeOption(option.to_string()))?;
                let boostable = catalog
                    .definition(effect)
                    .is_some_and(|definition| definition.can_boost(current.level));
                if !boostable {
                    return Err(ProgressionError::InvalidUpgradeOption(option.to_string()));
                }
                EffectInstanceStore::set_effect(item, current.boosted())
            }
            UpgradeOption::New { effect } => {
                if EffectInstanceStore::has_effect(item, effect) {
                    return Err(ProgressionError::InvalidUpgradeOption(option.to_string()));
                }
                let unlocked = EffectInstanceStore::unlock_effect(item, effect);
                EffectInstanceStore::set_effect(&unlocked, EffectInstance::unlocked(effect))
            }
        };

        let spent = PendingProgressTracker::consume_pending_embue(&upgraded);
        tracing::info!(
            "Applied {} to {}, {} embues left",
            option,
            item.item_id(),
            PendingProgressTracker::get_pending_embues(&spent)
        );
        Ok(spent.without_metadata(keys::PENDING_UPGRADE_OPTIONS))
    }

    /// Selects the persisted option at `index`.
    ///
    /// Out-of-range indices and rejected options leave the item untouched
    /// and return `None`.
    #[must_use]
    pub fn select_index(&self, item: &ItemRecord, index: usize, catalog: &EffectCatalog) -> Option<ItemRecord> {
        let Some(option) = persisted_options(item).get(index).copied() else {
            tracing::debug!("Ignoring option index {} for {}", index, item.item_id());
            return None;
        };
        match self.select_upgrade(item, option, catalog) {
            Ok(updated) => Some(updated),
            Err(error) => {
                tracing::warn!("Selection rejected: {}", error);
                None
            }
        }
    }

    /// Closes the selection without choosing. The persisted set and the
    /// embue stay, so the same options come back on reopen.
    #[must_use]
    pub fn cancel(item: &ItemRecord) -> ItemRecord {
        item.clone()
    }
}
