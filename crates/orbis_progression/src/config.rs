//! # Progression Configuration
//!
//! Balance values for the XP curve and the combat-side flush policy.
//! Loaded once at startup from TOML; every field has a default so partial
//! files are accepted.
//!
//! ```toml
//! xp_per_damage = 1.0
//! level_base_xp = 250.0
//! level_scaling = 1.25
//! max_level = 25
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ProgressionError, ProgressionResult};

/// Tunable progression settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionConfig {
    /// XP gained per point of damage dealt.
    pub xp_per_damage: f64,
    /// Global XP multiplier (events, boosts).
    pub xp_multiplier: f64,
    /// Base XP of the level curve.
    pub level_base_xp: f64,
    /// Exponent of the level curve.
    pub level_scaling: f64,
    /// Highest reachable level. Zero or negative means uncapped.
    pub max_level: i32,
    /// Whether the host should show XP gain notifications.
    pub show_xp_notifications: bool,
    /// Smallest XP gain worth notifying about.
    pub min_xp_for_notification: f64,
    /// Keep signature energy per weapon across hotbar swaps.
    pub preserve_signature_energy: bool,
    /// Idle gap after which the next hit flushes pending XP first.
    pub combat_idle_flush_ms: u64,
    /// Hits closer together than this defer a level-up flush.
    pub level_up_delay_threshold_ms: u64,
    /// Delay before restoring signature energy after a swap.
    pub signature_restore_delay_ms: u64,
    /// Options offered per upgrade selection.
    pub upgrade_option_count: usize,
    /// Seed for every RNG owned by the engine.
    pub rng_seed: u64,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            xp_per_damage: 1.0,
            xp_multiplier: 1.0,
            level_base_xp: 100.0,
            level_scaling: 1.5,
            max_level: 100,
            show_xp_notifications: false,
            min_xp_for_notification: 1.0,
            preserve_signature_energy: true,
            combat_idle_flush_ms: 3_000,
            level_up_delay_threshold_ms: 50,
            signature_restore_delay_ms: 100,
            upgrade_option_count: 3,
            rng_seed: 0x4543_484F,
        }
    }
}

impl ProgressionConfig {
    /// Parses and validates a config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressionError::ConfigParse`] for malformed TOML and
    /// [`ProgressionError::InvalidConfig`] when validation fails.
    pub fn from_toml_str(text: &str) -> ProgressionResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| ProgressionError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressionError::ConfigIo`] if the file cannot be read,
    /// otherwise the same errors as [`Self::from_toml_str`].
    pub fn from_file(path: impl AsRef<Path>) -> ProgressionResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ProgressionError::ConfigIo {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!(
            "Loaded progression config from {} (base_xp={}, scaling={}, max_level={})",
            path.display(),
            config.level_base_xp,
            config.level_scaling,
            config.max_level
        );
        Ok(config)
    }

    /// Serializes the config back to TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressionError::ConfigParse`] if serialization fails.
    pub fn to_toml_string(&self) -> ProgressionResult<String> {
        toml::to_string(self).map_err(|e| ProgressionError::ConfigParse(e.to_string()))
    }

    /// Checks that curve and XP factors are usable.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressionError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> ProgressionResult<()> {
        let non_negative = [
            ("xp_per_damage", self.xp_per_damage),
            ("xp_multiplier", self.xp_multiplier),
            ("level_scaling", self.level_scaling),
            ("min_xp_for_notification", self.min_xp_for_notification),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ProgressionError::InvalidConfig(format!(
                    "{name} must be a finite non-negative number, got {value}"
                )));
            }
        }
        if !self.level_base_xp.is_finite() || self.level_base_xp <= 0.0 {
            return Err(ProgressionError::InvalidConfig(format!(
                "level_base_xp must be positive, got {}",
                self.level_base_xp
            )));
        }
        if self.upgrade_option_count == 0 {
            return Err(ProgressionError::InvalidConfig(
                "upgrade_option_count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Builder-style override of the curve parameters.
    #[must_use]
    pub fn with_curve(mut self, base_xp: f64, scaling: f64, max_level: i32) -> Self {
        self.level_base_xp = base_xp;
        self.level_scaling = scaling;
        self.max_level = max_level;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = ProgressionConfig::from_toml_str("level_base_xp = 250.0\nlevel_scaling = 1.25\n")
            .expect("partial config should parse");

        assert!((config.level_base_xp - 250.0).abs() < f64::EPSILON);
        assert!((config.level_scaling - 1.25).abs() < f64::EPSILON);
        assert_eq!(config.max_level, 100, "missing fields fall back to defaults");
        assert_eq!(config.upgrade_option_count, 3);
    }

    #[test]
    fn test_toml_round_trip_preserves_values() {
        let config = ProgressionConfig::default().with_curve(300.0, 2.0, 40);
        let text = config.to_toml_string().expect("serialize");
        let parsed = ProgressionConfig::from_toml_str(&text).expect("parse");
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_rejects_negative_multiplier() {
        let err = ProgressionConfig::from_toml_str("xp_multiplier = -2.0").unwrap_err();
        assert!(matches!(err, ProgressionError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_zero_base_xp() {
        let err = ProgressionConfig::from_toml_str("level_base_xp = 0.0").unwrap_err();
        assert!(matches!(err, ProgressionError::InvalidConfig(_)));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let err = ProgressionConfig::from_toml_str("max_level = \"many\"").unwrap_err();
        assert!(matches!(err, ProgressionError::ConfigParse(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = ProgressionConfig::from_file("/nonexistent/orbis/progression.toml").unwrap_err();
        assert!(matches!(err, ProgressionError::ConfigIo { .. }));
    }
}
