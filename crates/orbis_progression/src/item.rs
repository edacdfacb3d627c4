//! # Item Records
//!
//! Immutable inventory stacks with an attached typed metadata blob.
//!
//! Every write (`with_metadata`, `with_durability_restored`, ...) returns a
//! new [`ItemRecord`]; the original is never touched. All progression state
//! lives in the metadata blob under the keys in [`keys`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stable metadata field keys.
pub mod keys {
    /// Stored XP (`Double`).
    pub const XP: &str = "ItemExp_XP";
    /// Unspent embue credits (`Int`).
    pub const PENDING_EMBUES: &str = "ItemExp_PendingEmbues";
    /// Effect ids ever unlocked through selection (`List<Str>`).
    pub const UNLOCKED_EFFECTS: &str = "ItemExp_UnlockedEffects";
    /// Effect instance list (`List<Doc{Type, Level}>`).
    pub const EFFECTS: &str = "ItemExp_Effects";
    /// Upgrade options generated but not yet chosen (`List<Doc{Kind, Type, Level}>`).
    pub const PENDING_UPGRADE_OPTIONS: &str = "ItemExp_PendingUpgradeOptions";
    /// Signature energy parked on the item during a hotbar swap (`Double`).
    pub const SAVED_SIGNATURE_ENERGY: &str = "EOO_SavedSignatureEnergy";
}

/// A typed metadata value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MetaValue {
    /// 32-bit integer.
    Int(i32),
    /// Double precision float.
    Double(f64),
    /// UTF-8 string.
    Str(String),
    /// Ordered list.
    List(Vec<MetaValue>),
    /// Nested document.
    Doc(BTreeMap<String, MetaValue>),
}

impl MetaValue {
    /// Numeric view, widening `Int`.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            Self::Int(v) => Some(f64::from(*v)),
            _ => None,
        }
    }

    /// Integer view.
    #[must_use]
    pub const fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// String view.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }

    /// List view.
    #[must_use]
    pub fn as_list(&self) -> Option<&[MetaValue]> {
        match self {
            Self::List(v) => Some(v),
            _ => None,
        }
    }

    /// Document view.
    #[must_use]
    pub const fn as_doc(&self) -> Option<&BTreeMap<String, MetaValue>> {
        match self {
            Self::Doc(v) => Some(v),
            _ => None,
        }
    }
}

/// What kind of item this is, as far as progression cares.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ItemClass {
    /// Melee, ranged or magic weapon.
    Weapon = 0,
    /// Harvesting tool.
    Tool = 1,
    /// Worn armor piece.
    Armor = 2,
    /// Ring worn in a bauble slot.
    Ring = 3,
    /// Anything else (ammo, blocks, consumables).
    Other = 4,
}

/// One inventory stack plus its metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    item_id: String,
    class: ItemClass,
    quantity: u32,
    max_stack: u32,
    durability: f64,
    max_durability: f64,
    metadata: BTreeMap<String, MetaValue>,
}

impl ItemRecord {
    /// Creates a single, full-durability item with empty metadata.
    #[must_use]
    pub fn new(item_id: impl Into<String>, class: ItemClass) -> Self {
        Self {
            item_id: item_id.into(),
            class,
            quantity: 1,
            max_stack: 1,
            durability: 100.0,
            max_durability: 100.0,
            metadata: BTreeMap::new(),
        }
    }

    /// Sets the stack size.
    #[must_use]
    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    /// Sets the maximum stack size of the item type.
    #[must_use]
    pub fn with_max_stack(mut self, max_stack: u32) -> Self {
        self.max_stack = max_stack;
        self
    }

    /// Sets current and maximum durability.
    #[must_use]
    pub fn with_durability(mut self, durability: f64, max_durability: f64) -> Self {
        self.durability = durability;
        self.max_durability = max_durability;
        self
    }

    /// Item type id, e.g. `Weapon_Sword_Iron`.
    #[inline]
    #[must_use]
    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    /// Item class.
    #[inline]
    #[must_use]
    pub const fn class(&self) -> ItemClass {
        self.class
    }

    /// Stack size.
    #[inline]
    #[must_use]
    pub const fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Maximum stack size.
    #[inline]
    #[must_use]
    pub const fn max_stack(&self) -> u32 {
        self.max_stack
    }

    /// Current durability.
    #[inline]
    #[must_use]
    pub const fn durability(&self) -> f64 {
        self.durability
    }

    /// Maximum durability.
    #[inline]
    #[must_use]
    pub const fn max_durability(&self) -> f64 {
        self.max_durability
    }

    /// An empty stack holds nothing.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.quantity == 0
    }

    /// Only non-stackable weapons and tools level up. Stackable items are ammo.
    #[must_use]
    pub fn can_gain_xp(&self) -> bool {
        !self.is_empty()
            && self.max_stack <= 1
            && matches!(self.class, ItemClass::Weapon | ItemClass::Tool)
    }

    /// Raw metadata lookup.
    #[must_use]
    pub fn metadata(&self, key: &str) -> Option<&MetaValue> {
        self.metadata.get(key)
    }

    /// Numeric metadata lookup.
    #[must_use]
    pub fn metadata_f64(&self, key: &str) -> Option<f64> {
        self.metadata(key).and_then(MetaValue::as_f64)
    }

    /// Integer metadata lookup.
    #[must_use]
    pub fn metadata_i32(&self, key: &str) -> Option<i32> {
        self.metadata(key).and_then(MetaValue::as_i32)
    }

    /// Returns a copy with `key` set to `value`.
    #[must_use]
    pub fn with_metadata(&self, key: &str, value: MetaValue) -> Self {
        let mut next = self.clone();
        next.metadata.insert(key.to_string(), value);
        next
    }

    /// Returns a copy with `key` removed.
    #[must_use]
    pub fn without_metadata(&self, key: &str) -> Self {
        if !self.metadata.contains_key(key) {
            return self.clone();
        }
        let mut next = self.clone();
        next.metadata.remove(key);
        next
    }

    /// Stored XP, zero when absent.
    #[must_use]
    pub fn stored_xp(&self) -> f64 {
        self.metadata_f64(keys::XP).unwrap_or(0.0)
    }

    /// Returns a copy with the stored XP replaced.
    #[must_use]
    pub fn with_stored_xp(&self, xp: f64) -> Self {
        self.with_metadata(keys::XP, MetaValue::Double(xp))
    }

    /// Returns a copy at full durability.
    #[must_use]
    pub fn with_durability_restored(&self) -> Self {
        let mut next = self.clone();
        next.durability = next.max_durability;
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_return_new_record() {
        let sword = ItemRecord::new("Weapon_Sword_Iron", ItemClass::Weapon);
        let leveled = sword.with_stored_xp(120.0);

        assert!(sword.stored_xp().abs() < f64::EPSILON, "original must be untouched");
        assert!((leveled.stored_xp() - 120.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_can_gain_xp_rules() {
        let sword = ItemRecord::new("Weapon_Sword_Iron", ItemClass::Weapon);
        let pick = ItemRecord::new("Tool_Pickaxe_Copper", ItemClass::Tool);
        let arrows = ItemRecord::new("Weapon_Arrow_Crude", ItemClass::Weapon)
            .with_max_stack(100)
            .with_quantity(30);
        let ring = ItemRecord::new("EOO_Ring_Stamina", ItemClass::Ring);
        let empty = sword.clone().with_quantity(0);

        assert!(sword.can_gain_xp());
        assert!(pick.can_gain_xp());
        assert!(!arrows.can_gain_xp(), "stackable ammo never levels");
        assert!(!ring.can_gain_xp(), "rings level through their own path");
        assert!(!empty.can_gain_xp());
    }

    #[test]
    fn test_metadata_views() {
        let item = ItemRecord::new("Weapon_Staff_Cobalt", ItemClass::Weapon)
            .with_metadata(keys::PENDING_EMBUES, MetaValue::Int(2))
            .with_metadata("Label", MetaValue::Str("Mine".to_string()));

        assert_eq!(item.metadata_i32(keys::PENDING_EMBUES), Some(2));
        assert_eq!(item.metadata_f64(keys::PENDING_EMBUES), Some(2.0));
        assert_eq!(item.metadata("Label").and_then(MetaValue::as_str), Some("Mine"));
        assert_eq!(item.metadata_i32("Label"), None);
        assert!(item.without_metadata("Label").metadata("Label").is_none());
    }

    #[test]
    fn test_durability_restore() {
        let worn = ItemRecord::new("Tool_Hatchet_Iron", ItemClass::Tool).with_durability(12.0, 80.0);
        let restored = worn.with_durability_restored();
        assert!((restored.durability() - 80.0).abs() < f64::EPSILON);
        assert!((worn.durability() - 12.0).abs() < f64::EPSILON);
    }
}
