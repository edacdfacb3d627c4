//! # Material Tiers
//!
//! Maps weapon/tool item ids to the number of effect slots ("boost slots")
//! the item supports. Material is suffix based: `Weapon_Sword_Iron` and
//! `Weapon_Bow_Iron` are both `Iron`.
//!
//! Primary materials are checked before enemy-drop variants; anything
//! unrecognized gets [`DEFAULT_BOOST_SLOTS`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{ProgressionError, ProgressionResult};
use crate::item::ItemRecord;

/// Slots for unknown materials and non-weapon items.
pub const DEFAULT_BOOST_SLOTS: usize = 2;

/// Material → boost slot table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialTiers {
    /// Primary crafting materials.
    #[serde(default)]
    pub primary: HashMap<String, usize>,
    /// Enemy drop and variant fallbacks.
    #[serde(default)]
    pub variants: HashMap<String, usize>,
}

impl MaterialTiers {
    /// The standard tier table.
    #[must_use]
    pub fn standard() -> Self {
        let primary = [
            ("Crude", 2),
            ("Copper", 3),
            ("Iron", 4),
            ("Thorium", 5),
            ("Cobalt", 6),
            ("Adamantite", 7),
            ("Mithril", 8),
        ];
        let variants = [
            ("Scrap", 2),
            ("Bone", 2),
            ("Stone_Trork", 2),
            ("Wood", 2),
            ("Tribal", 2),
            ("Fishbone", 2),
            ("Leaf", 2),
            ("Claw_Bone", 2),
            ("Gun", 2),
            ("Blunderbuss", 2),
            ("Blunderbuss_Rusty", 2),
            ("Bronze", 3),
            ("Bronze_Ancient", 3),
            ("Cutlass", 3),
            ("Steel", 4),
            ("Steel_Rusty", 4),
            ("Steel_Incandescent", 4),
            ("Iron_Rusty", 4),
            ("Ancient_Steel", 4),
            ("Doomed", 5),
            ("Frost", 5),
            ("Onyxium", 5),
            ("Runic", 5),
            ("Nexus", 5),
            ("Silversteel", 5),
            ("Scarab", 5),
            ("Claw_Tribal", 5),
        ];
        Self {
            primary: primary
                .into_iter()
                .map(|(name, slots)| (name.to_string(), slots))
                .collect(),
            variants: variants
                .into_iter()
                .map(|(name, slots)| (name.to_string(), slots))
                .collect(),
        }
    }

    /// Loads a tier table from TOML (`[primary]` and `[variants]` tables).
    ///
    /// # Errors
    ///
    /// Returns [`ProgressionError::ConfigParse`] on malformed TOML.
    pub fn from_toml_str(text: &str) -> ProgressionResult<Self> {
        toml::from_str(text).map_err(|e| ProgressionError::ConfigParse(e.to_string()))
    }

    /// Boost slots for an item.
    #[must_use]
    pub fn boost_slots(&self, item: &ItemRecord) -> usize {
        if item.is_empty() {
            return DEFAULT_BOOST_SLOTS;
        }
        self.boost_slots_for_id(item.item_id())
    }

    /// Boost slots for an item id, e.g. `hytale:Weapon_Sword_Iron`.
    #[must_use]
    pub fn boost_slots_for_id(&self, item_id: &str) -> usize {
        let Some(suffix) = extract_material_suffix(item_id) else {
            return DEFAULT_BOOST_SLOTS;
        };
        self.primary
            .get(suffix)
            .or_else(|| self.variants.get(suffix))
            .copied()
            .unwrap_or(DEFAULT_BOOST_SLOTS)
    }
}

impl Default for MaterialTiers {
    fn default() -> Self {
        Self::standard()
    }
}

/// Material part of a weapon/tool id.
///
/// `Weapon_Sword_Crude` → `Crude`, `Weapon_Axe_Iron_Rusty` → `Iron_Rusty`.
/// Ids without a `Weapon_`/`Tool_` prefix have no material.
#[must_use]
pub fn extract_material_suffix(item_id: &str) -> Option<&str> {
    let cleaned = item_id.split_once(':').map_or(item_id, |(_, rest)| rest);
    let rest = cleaned
        .strip_prefix("Weapon_")
        .or_else(|| cleaned.strip_prefix("Tool_"))?;
    let suffix = rest.split_once('_').map_or(rest, |(_, material)| material);
    if suffix.is_empty() {
        None
    } else {
        Some(suffix)
    }
}
