//! # Effect Instance Store
//!
//! Reads and writes the ordered set of `(effect, level)` instances kept in an
//! item's metadata under [`keys::EFFECTS`].
//!
//! ## Invariants
//!
//! - At most one instance per effect type per item. `set_effect` upserts.
//! - Decoding is lenient: entries with unknown ids or a level below 1 are
//!   dropped, never reported.
//! - Every write returns a new [`ItemRecord`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::catalog::EffectType;
use crate::error::{ProgressionError, ProgressionResult};
use crate::item::{keys, ItemRecord, MetaValue};

const FIELD_TYPE: &str = "Type";
const FIELD_LEVEL: &str = "Level";

/// An effect attached to an item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EffectInstance {
    /// Effect type.
    pub effect: EffectType,
    /// Effect level, at least 1.
    pub level: i32,
}

impl EffectInstance {
    /// Creates a validated instance.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressionError::InvalidEffectLevel`] when `level < 1`.
    pub fn new(effect: EffectType, level: i32) -> ProgressionResult<Self> {
        if level < 1 {
            return Err(ProgressionError::InvalidEffectLevel {
                effect: effect.id(),
                level,
            });
        }
        Ok(Self { effect, level })
    }

    /// A fresh level 1 instance.
    #[inline]
    #[must_use]
    pub const fn unlocked(effect: EffectType) -> Self {
        Self { effect, level: 1 }
    }

    /// The same effect one level higher.
    #[inline]
    #[must_use]
    pub const fn boosted(self) -> Self {
        Self {
            effect: self.effect,
            level: self.level + 1,
        }
    }

    fn to_meta(self) -> MetaValue {
        let mut doc = BTreeMap::new();
        doc.insert(
            FIELD_TYPE.to_string(),
            MetaValue::Str(self.effect.id().to_string()),
        );
        doc.insert(FIELD_LEVEL.to_string(), MetaValue::Int(self.level));
        MetaValue::Doc(doc)
    }

    fn from_meta(value: &MetaValue) -> Option<Self> {
        let doc = value.as_doc()?;
        let effect = EffectType::from_id(doc.get(FIELD_TYPE)?.as_str()?)?;
        let level = doc.get(FIELD_LEVEL)?.as_i32()?;
        (level >= 1).then_some(Self { effect, level })
    }
}

/// Encodes an instance list for the metadata blob.
#[must_use]
pub fn encode_effects(effects: &[EffectInstance]) -> MetaValue {
    MetaValue::List(effects.iter().map(|e| e.to_meta()).collect())
}

/// Decodes an instance list, dropping unknown or malformed entries and
/// keeping the first entry of any duplicated type.
#[must_use]
pub fn decode_effects(value: &MetaValue) -> Vec<EffectInstance> {
    let Some(entries) = value.as_list() else {
        return Vec::new();
    };
    let mut effects: Vec<EffectInstance> = Vec::with_capacity(entries.len());
    for instance in entries.iter().filter_map(EffectInstance::from_meta) {
        if !effects.iter().any(|e| e.effect == instance.effect) {
            effects.push(instance);
        }
    }
    effects
}

/// Effect reads and copy-on-write updates on item metadata.
#[derive(Clone, Copy, Debug, Default)]
pub struct EffectInstanceStore;

impl EffectInstanceStore {
    /// All effects on the item in persisted order.
    #[must_use]
    pub fn get_effects(item: &ItemRecord) -> Vec<EffectInstance> {
        item.metadata(keys::EFFECTS)
            .map(decode_effects)
            .unwrap_or_default()
    }

    /// The instance of `effect`, if present.
    #[must_use]
    pub fn get_effect(item: &ItemRecord, effect: EffectType) -> Option<EffectInstance> {
        Self::get_effects(item)
            .into_iter()
            .find(|instance| instance.effect == effect)
    }

    /// Whether the item carries `effect`.
    #[must_use]
    pub fn has_effect(item: &ItemRecord, effect: EffectType) -> bool {
        Self::get_effect(item, effect).is_some()
    }

    /// Replaces the instance of the same type, or appends.
    #[must_use]
    pub fn set_effect(item: &ItemRecord, instance: EffectInstance) -> ItemRecord {
        let mut effects = Self::get_effects(item);
        match effects.iter_mut().find(|e| e.effect == instance.effect) {
            Some(existing) => *existing = instance,
            None => effects.push(instance),
        }
        item.with_metadata(keys::EFFECTS, encode_effects(&effects))
    }

    /// Removes the instance of `effect`. Unchanged if absent.
    #[must_use]
    pub fn remove_effect(item: &ItemRecord, effect: EffectType) -> ItemRecord {
        let mut effects = Self::get_effects(item);
        let before = effects.len();
        effects.retain(|e| e.effect != effect);
        if effects.len() == before {
            return item.clone();
        }
        item.with_metadata(keys::EFFECTS, encode_effects(&effects))
    }

    /// Sets `effect` to `item_level - 1`. Below item level 2 the item is
    /// returned unchanged.
    #[must_use]
    pub fn update_effect_for_level(
        item: &ItemRecord,
        effect: EffectType,
        item_level: i32,
    ) -> ItemRecord {
        let effect_level = item_level - 1;
        if effect_level < 1 {
            return item.clone();
        }
        Self::set_effect(
            item,
            EffectInstance {
                effect,
                level: effect_level,
            },
        )
    }

    /// Effect types ever unlocked through selection.
    #[must_use]
    pub fn unlocked_effects(item: &ItemRecord) -> Vec<EffectType> {
        item.metadata(keys::UNLOCKED_EFFECTS)
            .and_then(MetaValue::as_list)
            .map(|ids| {
                ids.iter()
                    .filter_map(MetaValue::as_str)
                    .filter_map(EffectType::from_id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether `effect` has been unlocked.
    #[must_use]
    pub fn is_unlocked(item: &ItemRecord, effect: EffectType) -> bool {
        Self::unlocked_effects(item).contains(&effect)
    }

    /// Records `effect` as unlocked. Unchanged if already present.
    #[must_use]
    pub fn unlock_effect(item: &ItemRecord, effect: EffectType) -> ItemRecord {
        let mut unlocked = Self::unlocked_effects(item);
        if unlocked.contains(&effect) {
            return item.clone();
        }
        unlocked.push(effect);
        let ids = unlocked
            .into_iter()
            .map(|e| MetaValue::Str(e.id().to_string()))
            .collect();
        item.with_metadata(keys::UNLOCKED_EFFECTS, MetaValue::List(ids))
    }
}
