//! # Effect Catalogue
//!
//! **Closed set of effect types with per-type scaling definitions**
//!
//! Every [`EffectType`] knows its persisted id, the [`WeaponCategory`] set it
//! may attach to and the behaviour family its processor belongs to. The
//! numeric tuning lives in [`EffectDefinition`], and [`EffectCatalog`] holds
//! the standard definition set built once at startup.
//!
//! ## Scaling
//!
//! `value(level) = min(cap, base + (level - 1) * per_level)` for `level >= 1`,
//! `0` below. A cap of `0` means uncapped.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::item::{ItemClass, ItemRecord};

// =============================================================================
// Categories
// =============================================================================

/// Classification axis gating which effects may attach to an item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum WeaponCategory {
    /// Swords, axes, maces.
    Physical = 0,
    /// Bows, crossbows, guns.
    Projectile = 1,
    /// Staves, wands, tomes.
    Magic = 2,
    /// Rings in bauble slots.
    Ring = 3,
    /// Worn armor.
    Armor = 4,
    /// Harvesting tools.
    Tool = 5,
}

const MAGIC_PATTERNS: [&str; 6] = ["wand", "staff", "stave", "scepter", "orb", "tome"];
const RANGED_PATTERNS: [&str; 6] = ["bow", "crossbow", "gun", "rifle", "pistol", "launcher"];

impl WeaponCategory {
    /// Every category.
    pub const ALL: [Self; 6] = [
        Self::Physical,
        Self::Projectile,
        Self::Magic,
        Self::Ring,
        Self::Armor,
        Self::Tool,
    ];

    /// Lowercase id.
    #[inline]
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Physical => "physical",
            Self::Projectile => "projectile",
            Self::Magic => "magic",
            Self::Ring => "ring",
            Self::Armor => "armor",
            Self::Tool => "tool",
        }
    }

    /// Case-insensitive lookup by id.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|category| category.id().eq_ignore_ascii_case(id))
    }

    /// Classifies an item for a hit.
    ///
    /// Item class wins first (ring, armor, tool), then magic id patterns,
    /// then the damage cause, then ranged id patterns. Anything left is
    /// physical.
    #[must_use]
    pub fn resolve(item: &ItemRecord, damage_cause: Option<&str>) -> Self {
        match item.class() {
            ItemClass::Ring => return Self::Ring,
            ItemClass::Armor => return Self::Armor,
            ItemClass::Tool => return Self::Tool,
            ItemClass::Weapon | ItemClass::Other => {}
        }

        let id = item.item_id().to_ascii_lowercase();
        if MAGIC_PATTERNS.iter().any(|p| id.contains(p)) {
            return Self::Magic;
        }

        if let Some(cause) = damage_cause {
            let cause = cause.to_ascii_lowercase();
            if cause.contains("projectile") {
                return Self::Projectile;
            }
            if cause.contains("magic") || cause.contains("spell") {
                return Self::Magic;
            }
        }

        if RANGED_PATTERNS.iter().any(|p| id.contains(p)) {
            return Self::Projectile;
        }
        Self::Physical
    }

    #[inline]
    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for WeaponCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Small bitset of categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct CategorySet(u8);

impl CategorySet {
    /// No categories.
    pub const EMPTY: Self = Self(0);
    /// Every category.
    pub const ALL: Self = Self(0b11_1111);
    /// Physical weapons.
    pub const MELEE: Self = Self::EMPTY.with(WeaponCategory::Physical);
    /// Projectile and magic weapons.
    pub const RANGED: Self = Self::EMPTY
        .with(WeaponCategory::Projectile)
        .with(WeaponCategory::Magic);
    /// All three weapon categories.
    pub const WEAPONS: Self = Self::MELEE
        .with(WeaponCategory::Projectile)
        .with(WeaponCategory::Magic);
    /// Rings only.
    pub const RING: Self = Self::EMPTY.with(WeaponCategory::Ring);
    /// Armor only.
    pub const ARMOR: Self = Self::EMPTY.with(WeaponCategory::Armor);
    /// Rings and armor.
    pub const RING_AND_ARMOR: Self = Self::RING.with(WeaponCategory::Armor);
    /// Tools only.
    pub const TOOL: Self = Self::EMPTY.with(WeaponCategory::Tool);

    /// Adds a category.
    #[inline]
    #[must_use]
    pub const fn with(self, category: WeaponCategory) -> Self {
        Self(self.0 | category.bit())
    }

    /// Union of two sets.
    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Membership test.
    #[inline]
    #[must_use]
    pub const fn contains(self, category: WeaponCategory) -> bool {
        self.0 & category.bit() != 0
    }

    /// Members in declaration order.
    pub fn iter(self) -> impl Iterator<Item = WeaponCategory> {
        WeaponCategory::ALL
            .into_iter()
            .filter(move |category| self.contains(*category))
    }
}

// =============================================================================
// Effect types
// =============================================================================

/// How an effect's processor behaves on a hit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EffectBehavior {
    /// Derives a secondary amount from the original damage.
    DamageComposition,
    /// Rolls the value as a probability and requests a status/projectile/durability effect.
    ChanceStatus,
    /// No-op on hit; summed by the stat-aggregation side.
    Passive,
}

/// Every effect the engine knows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum EffectType {
    /// Bonus damage as a percentage of the hit. Tracks item level.
    DamagePercent = 0,
    /// Heals the attacker for a share of the damage dealt.
    LifeLeech = 1,
    /// Chance to not lose durability on a hit.
    DurabilitySave = 2,
    /// Chance to burn the target.
    FireOnHit = 3,
    /// Chance to poison the target.
    PoisonOnHit = 4,
    /// Chance to slow the target.
    SlowOnHit = 5,
    /// Chance to freeze the target. Never offered as a new upgrade.
    FreezeOnHit = 6,
    /// Chance to fire an extra projectile.
    Multishot = 7,
    /// Ring: bonus max stamina.
    RingStamina = 8,
    /// Ring: bonus max health.
    RingHealth = 9,
    /// Ring: bonus attack power.
    RingAttackPower = 10,
    /// Ring: health regeneration tier.
    RingHealthRegen = 11,
    /// Ring: magic resistance.
    RingResistMagic = 12,
    /// Ring: reflect damage when hit.
    RingThorns = 13,
    /// Ring: signature energy per attack.
    RingSignatureEnergy = 14,
    /// Armor: physical resistance.
    ArmorPhysicalResistance = 15,
    /// Armor: projectile resistance.
    ArmorProjectileResistance = 16,
    /// Armor: fire resistance.
    ArmorFireResistance = 17,
    /// Armor: resistance to every damage type.
    ArmorGeneralResistance = 18,
    /// Tool: bonus block drops.
    ToolDropBonus = 19,
}

impl EffectType {
    /// Every effect type in catalogue order.
    pub const ALL: [Self; 20] = [
        Self::DamagePercent,
        Self::LifeLeech,
        Self::DurabilitySave,
        Self::FireOnHit,
        Self::PoisonOnHit,
        Self::SlowOnHit,
        Self::FreezeOnHit,
        Self::Multishot,
        Self::RingStamina,
        Self::RingHealth,
        Self::RingAttackPower,
        Self::RingHealthRegen,
        Self::RingResistMagic,
        Self::RingThorns,
        Self::RingSignatureEnergy,
        Self::ArmorPhysicalResistance,
        Self::ArmorProjectileResistance,
        Self::ArmorFireResistance,
        Self::ArmorGeneralResistance,
        Self::ToolDropBonus,
    ];

    /// Persisted id.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::DamagePercent => "damage_percent",
            Self::LifeLeech => "life_leech",
            Self::DurabilitySave => "durability_save",
            Self::FireOnHit => "fire_on_hit",
            Self::PoisonOnHit => "poison_on_hit",
            Self::SlowOnHit => "slow_on_hit",
            Self::FreezeOnHit => "freeze_on_hit",
            Self::Multishot => "multishot",
            Self::RingStamina => "ring_stamina",
            Self::RingHealth => "ring_health",
            Self::RingAttackPower => "ring_attack_power",
            Self::RingHealthRegen => "ring_health_regen",
            Self::RingResistMagic => "ring_resist_magic",
            Self::RingThorns => "ring_thorns",
            Self::RingSignatureEnergy => "ring_signature_energy",
            Self::ArmorPhysicalResistance => "armor_physical_resistance",
            Self::ArmorProjectileResistance => "armor_projectile_resistance",
            Self::ArmorFireResistance => "armor_fire_resistance",
            Self::ArmorGeneralResistance => "armor_general_resistance",
            Self::ToolDropBonus => "tool_drop_bonus",
        }
    }

    /// Case-insensitive lookup by persisted id. Unknown ids return `None`.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|effect| effect.id().eq_ignore_ascii_case(id))
    }

    /// Categories this effect may attach to.
    #[must_use]
    pub const fn categories(self) -> CategorySet {
        match self {
            Self::DamagePercent
            | Self::LifeLeech
            | Self::FireOnHit
            | Self::PoisonOnHit
            | Self::SlowOnHit
            | Self::FreezeOnHit => CategorySet::WEAPONS,
            Self::DurabilitySave => CategorySet::WEAPONS.union(CategorySet::TOOL),
            Self::Multishot => CategorySet::EMPTY.with(WeaponCategory::Projectile),
            Self::RingStamina
            | Self::RingHealth
            | Self::RingAttackPower
            | Self::RingHealthRegen
            | Self::RingResistMagic
            | Self::RingThorns
            | Self::RingSignatureEnergy => CategorySet::RING,
            Self::ArmorPhysicalResistance
            | Self::ArmorProjectileResistance
            | Self::ArmorFireResistance
            | Self::ArmorGeneralResistance => CategorySet::ARMOR,
            Self::ToolDropBonus => CategorySet::TOOL,
        }
    }

    /// Whether this effect may attach to `category`.
    #[inline]
    #[must_use]
    pub const fn applies_to(self, category: WeaponCategory) -> bool {
        self.categories().contains(category)
    }

    /// Whether the upgrade flow may offer this effect as a new unlock.
    #[inline]
    #[must_use]
    pub const fn is_selectable(self) -> bool {
        !matches!(self, Self::FreezeOnHit)
    }

    /// Processor family.
    #[must_use]
    pub const fn behavior(self) -> EffectBehavior {
        match self {
            Self::DamagePercent | Self::LifeLeech => EffectBehavior::DamageComposition,
            Self::DurabilitySave
            | Self::FireOnHit
            | Self::PoisonOnHit
            | Self::SlowOnHit
            | Self::FreezeOnHit
            | Self::Multishot => EffectBehavior::ChanceStatus,
            _ => EffectBehavior::Passive,
        }
    }
}

impl fmt::Display for EffectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

// =============================================================================
// Definitions
// =============================================================================

/// How a computed value is shown to players.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ValueDisplayFormat {
    /// `0.05` → `"5%"`.
    #[default]
    Percent,
    /// `25.0` → `"25"`, `1.5` → `"1.5"`.
    RawNumber,
    /// `2.0` → `"2.0s"`.
    DurationSeconds,
}

impl ValueDisplayFormat {
    /// Formats a computed value.
    #[must_use]
    pub fn format(self, value: f64) -> String {
        match self {
            Self::Percent => format!("{:.0}%", value * 100.0),
            Self::RawNumber => {
                if value >= 10.0 && value.fract().abs() < f64::EPSILON {
                    format!("{value:.0}")
                } else {
                    format!("{value:.1}")
                }
            }
            Self::DurationSeconds => format!("{value:.1}s"),
        }
    }
}

/// Global scaling configuration for one effect type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EffectDefinition {
    /// Effect this definition scales.
    pub effect: EffectType,
    /// Value at level 1.
    pub base_value: f64,
    /// Value added per level above 1.
    pub value_per_level: f64,
    /// Value cap, `0` for uncapped.
    pub max_value: f64,
    /// Highest level the upgrade flow may boost to.
    pub max_level: i32,
    /// Base proc chance for effects that roll separately from their value.
    pub proc_chance: f64,
    /// Status duration in seconds, `0` when not applicable.
    pub duration_secs: f64,
    /// Description template; `{value}` is replaced with the formatted value.
    pub description: String,
    /// Display format for `{value}`.
    pub display_format: ValueDisplayFormat,
}

impl EffectDefinition {
    /// Creates a definition with defaults: uncapped, max level 10, always procs.
    #[must_use]
    pub fn new(effect: EffectType, base_value: f64, value_per_level: f64) -> Self {
        Self {
            effect,
            base_value,
            value_per_level,
            max_value: 0.0,
            max_level: 10,
            proc_chance: 1.0,
            duration_secs: 0.0,
            description: format!("{} {{value}}", effect.id()),
            display_format: ValueDisplayFormat::Percent,
        }
    }

    /// Sets the value cap.
    #[must_use]
    pub fn with_cap(mut self, max_value: f64) -> Self {
        self.max_value = max_value;
        self
    }

    /// Sets the maximum level.
    #[must_use]
    pub fn with_max_level(mut self, max_level: i32) -> Self {
        self.max_level = max_level;
        self
    }

    /// Sets the description template.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the display format.
    #[must_use]
    pub fn with_format(mut self, display_format: ValueDisplayFormat) -> Self {
        self.display_format = display_format;
        self
    }

    /// Sets the status duration.
    #[must_use]
    pub fn with_duration(mut self, duration_secs: f64) -> Self {
        self.duration_secs = duration_secs;
        self
    }

    /// Scaled value at `level`.
    #[must_use]
    pub fn calculate_value(&self, level: i32) -> f64 {
        if level < 1 {
            return 0.0;
        }
        let raw = self.base_value + f64::from(level - 1) * self.value_per_level;
        if self.max_value > 0.0 {
            raw.min(self.max_value)
        } else {
            raw
        }
    }

    /// Display string of the value at `level`.
    #[must_use]
    pub fn format_value(&self, level: i32) -> String {
        self.display_format.format(self.calculate_value(level))
    }

    /// Description with `{value}` filled in for `level`.
    #[must_use]
    pub fn formatted_description(&self, level: i32) -> String {
        self.description.replace("{value}", &self.format_value(level))
    }

    /// Whether an instance at `level` can still be boosted.
    #[inline]
    #[must_use]
    pub const fn can_boost(&self, level: i32) -> bool {
        level < self.max_level
    }
}

// =============================================================================
// Catalogue
// =============================================================================

/// One catalogue row: the definition plus its UI blurb.
#[derive(Clone, Debug, PartialEq)]
pub struct CatalogEntry {
    /// Scaling definition.
    pub definition: EffectDefinition,
    /// Short description for selection cards.
    pub short_description: &'static str,
}

/// Standard definitions for every effect type.
#[derive(Clone, Debug)]
pub struct EffectCatalog {
    entries: HashMap<EffectType, CatalogEntry>,
}

impl EffectCatalog {
    /// Creates an empty catalogue.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Builds the standard catalogue.
    #[must_use]
    pub fn standard() -> Self {
        use EffectType as E;
        use ValueDisplayFormat::{Percent, RawNumber};

        let mut catalog = Self::empty();
        let rows = [
            (
                EffectDefinition::new(E::DamagePercent, 0.03, 0.02)
                    .with_description("+{value} damage"),
                "Bonus damage as percentage of hit",
            ),
            (
                EffectDefinition::new(E::LifeLeech, 0.01, 0.01)
                    .with_cap(0.15)
                    .with_description("Heal {value} of damage dealt"),
                "Heal for a portion of damage dealt",
            ),
            (
                EffectDefinition::new(E::DurabilitySave, 0.05, 0.05)
                    .with_cap(0.50)
                    .with_description("{value} chance to save durability"),
                "Chance to not lose durability when hitting",
            ),
            (
                EffectDefinition::new(E::FireOnHit, 0.05, 0.02)
                    .with_duration(3.0)
                    .with_description("{value} chance to burn on hit"),
                "Chance to set enemies on fire",
            ),
            (
                EffectDefinition::new(E::PoisonOnHit, 0.05, 0.02)
                    .with_duration(8.0)
                    .with_description("{value} chance to poison on hit"),
                "Chance to poison enemies",
            ),
            (
                EffectDefinition::new(E::SlowOnHit, 0.05, 0.02)
                    .with_duration(5.0)
                    .with_description("{value} chance to slow on hit"),
                "Chance to slow enemy movement",
            ),
            (
                EffectDefinition::new(E::FreezeOnHit, 0.02, 0.01)
                    .with_cap(0.12)
                    .with_duration(2.0)
                    .with_description("{value} chance to freeze on hit"),
                "Chance to freeze enemies in place",
            ),
            (
                EffectDefinition::new(E::Multishot, 0.05, 0.02)
                    .with_cap(0.25)
                    .with_description("{value} chance for extra projectile"),
                "Chance to fire extra projectiles",
            ),
            (
                EffectDefinition::new(E::RingStamina, 10.0, 10.0)
                    .with_cap(50.0)
                    .with_max_level(5)
                    .with_format(RawNumber)
                    .with_description("+{value} max stamina"),
                "Bonus max stamina",
            ),
            (
                EffectDefinition::new(E::RingHealth, 25.0, 25.0)
                    .with_cap(100.0)
                    .with_max_level(4)
                    .with_format(RawNumber)
                    .with_description("+{value} max health"),
                "Bonus max health",
            ),
            (
                EffectDefinition::new(E::RingAttackPower, 0.05, 0.05)
                    .with_cap(0.25)
                    .with_max_level(5)
                    .with_description("+{value} attack power"),
                "Bonus attack power (damage %)",
            ),
            (
                EffectDefinition::new(E::RingHealthRegen, 1.0, 0.5)
                    .with_cap(2.0)
                    .with_max_level(3)
                    .with_format(RawNumber)
                    .with_description("+{value} health regen"),
                "Health regen I",
            ),
            (
                EffectDefinition::new(E::RingResistMagic, 0.05, 0.05)
                    .with_cap(0.25)
                    .with_max_level(5)
                    .with_description("+{value} resist magic"),
                "Resist magic",
            ),
            (
                EffectDefinition::new(E::RingThorns, 2.0, 2.0)
                    .with_cap(10.0)
                    .with_max_level(5)
                    .with_format(RawNumber)
                    .with_description("+{value} thorns damage"),
                "Thorns (reflect damage when hit)",
            ),
            (
                EffectDefinition::new(E::RingSignatureEnergy, 1.0, 1.0)
                    .with_cap(5.0)
                    .with_max_level(5)
                    .with_format(RawNumber)
                    .with_description("+{value} signature energy per attack"),
                "Signature energy boost (+1 per level per attack)",
            ),
            (
                EffectDefinition::new(E::ArmorPhysicalResistance, 0.05, 0.05)
                    .with_cap(0.25)
                    .with_max_level(5)
                    .with_description("+{value} physical resistance"),
                "Physical resistance",
            ),
            (
                EffectDefinition::new(E::ArmorProjectileResistance, 0.05, 0.05)
                    .with_cap(0.25)
                    .with_max_level(5)
                    .with_description("+{value} projectile resistance"),
                "Projectile resistance",
            ),
            (
                EffectDefinition::new(E::ArmorFireResistance, 0.05, 0.05)
                    .with_cap(0.25)
                    .with_max_level(5)
                    .with_description("+{value} fire resistance"),
                "Fire resistance",
            ),
            (
                EffectDefinition::new(E::ArmorGeneralResistance, 0.05, 0.05)
                    .with_description("+{value} general resistance"),
                "General resistance",
            ),
            (
                EffectDefinition::new(E::ToolDropBonus, 0.05, 0.05)
                    .with_format(Percent)
                    .with_description("+{value} bonus to block drops"),
                "Bonus percent to items dropped when breaking blocks",
            ),
        ];

        for (definition, short_description) in rows {
            catalog.insert(definition, short_description);
        }
        catalog
    }

    /// Adds or replaces an entry.
    pub fn insert(&mut self, definition: EffectDefinition, short_description: &'static str) {
        self.entries.insert(
            definition.effect,
            CatalogEntry {
                definition,
                short_description,
            },
        );
    }

    /// Definition for `effect`, `None` if not registered.
    #[must_use]
    pub fn definition(&self, effect: EffectType) -> Option<&EffectDefinition> {
        self.entries.get(&effect).map(|entry| &entry.definition)
    }

    /// Short description for `effect`; the id when unregistered.
    #[must_use]
    pub fn short_description(&self, effect: EffectType) -> &'static str {
        self.entries
            .get(&effect)
            .map_or_else(|| effect.id(), |entry| entry.short_description)
    }

    /// All entries in catalogue order.
    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        EffectType::ALL
            .into_iter()
            .filter_map(|effect| self.entries.get(&effect))
    }

    /// Number of registered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for EffectCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
