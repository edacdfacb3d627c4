//! # Level Curve
//!
//! **Damage → XP → Level, with the level always derived from XP**
//!
//! - `xp_required_for_level(L) = base_xp * L^scaling` for `L >= 2`, `0` below.
//! - `level_from_xp` scans upward from level 1, so it is the exact inverse of
//!   the threshold function at every boundary.
//! - A non-positive `max_level` means uncapped; the scan then stops at
//!   [`UNCAPPED_LEVEL_CEILING`].
//!
//! All functions are total: negative or NaN XP resolves to level 1.

use crate::config::ProgressionConfig;

/// Hard stop for the level scan when the configured max level is uncapped.
pub const UNCAPPED_LEVEL_CEILING: i32 = 10_000;

/// Pure XP/level conversion built from [`ProgressionConfig`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LevelCurve {
    xp_per_damage: f64,
    xp_multiplier: f64,
    base_xp: f64,
    scaling: f64,
    max_level: i32,
}

impl LevelCurve {
    /// Creates a curve from explicit parameters.
    #[inline]
    #[must_use]
    pub const fn new(
        xp_per_damage: f64,
        xp_multiplier: f64,
        base_xp: f64,
        scaling: f64,
        max_level: i32,
    ) -> Self {
        Self {
            xp_per_damage,
            xp_multiplier,
            base_xp,
            scaling,
            max_level,
        }
    }

    /// Creates a curve from the loaded configuration.
    #[must_use]
    pub fn from_config(config: &ProgressionConfig) -> Self {
        Self::new(
            config.xp_per_damage,
            config.xp_multiplier,
            config.level_base_xp,
            config.level_scaling,
            config.max_level,
        )
    }

    /// The level the scan may reach, resolving "uncapped" to the ceiling.
    #[inline]
    #[must_use]
    pub const fn effective_max_level(&self) -> i32 {
        if self.max_level <= 0 {
            UNCAPPED_LEVEL_CEILING
        } else {
            self.max_level
        }
    }

    /// XP earned for a single hit.
    #[inline]
    #[must_use]
    pub fn xp_from_damage(&self, damage: f64) -> f64 {
        if damage > 0.0 {
            damage * self.xp_per_damage * self.xp_multiplier
        } else {
            0.0
        }
    }

    /// Total XP needed to reach `level`.
    #[inline]
    #[must_use]
    pub fn xp_required_for_level(&self, level: i32) -> f64 {
        if level <= 1 {
            return 0.0;
        }
        self.base_xp * f64::from(level).powf(self.scaling)
    }

    /// Highest level whose threshold `xp` has reached.
    #[must_use]
    pub fn level_from_xp(&self, xp: f64) -> i32 {
        if xp.is_nan() || xp <= 0.0 {
            return 1;
        }
        let max = self.effective_max_level();
        let mut level = 1;
        while level < max && xp >= self.xp_required_for_level(level + 1) {
            level += 1;
        }
        level
    }

    /// XP between `level` and the next one; zero at max level.
    #[must_use]
    pub fn xp_to_next_level(&self, level: i32) -> f64 {
        if self.is_max_level(level) {
            return 0.0;
        }
        self.xp_required_for_level(level + 1) - self.xp_required_for_level(level)
    }

    /// Whether `level` is at or beyond the cap.
    #[inline]
    #[must_use]
    pub const fn is_max_level(&self, level: i32) -> bool {
        level >= self.effective_max_level()
    }

    /// Human-readable progress, e.g. `"Level 5 | 450/520 XP (86%)"`.
    #[must_use]
    pub fn progress_string(&self, xp: f64) -> String {
        let level = self.level_from_xp(xp);
        if self.is_max_level(level) {
            return format!("Level {level} (MAX)");
        }
        let floor = self.xp_required_for_level(level);
        let into_level = (xp.max(0.0) - floor).max(0.0);
        let needed = self.xp_to_next_level(level);
        let percent = if needed > 0.0 {
            (into_level / needed * 100.0).floor()
        } else {
            0.0
        };
        format!("Level {level} | {into_level:.0}/{needed:.0} XP ({percent:.0}%)")
    }
}

impl Default for LevelCurve {
    fn default() -> Self {
        Self::from_config(&ProgressionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_curve() -> LevelCurve {
        LevelCurve::new(1.0, 1.0, 250.0, 1.25, 100)
    }

    #[test]
    fn test_level_two_threshold_matches_scenario() {
        let curve = scenario_curve();
        let required = curve.xp_required_for_level(2);
        assert!((required - 594.6).abs() < 0.01, "got {required}");
    }

    #[test]
    fn test_one_damage_hits_cross_at_595() {
        let curve = scenario_curve();
        let mut xp = 0.0;
        for _ in 0..594 {
            xp += curve.xp_from_damage(1.0);
        }
        assert_eq!(curve.level_from_xp(xp), 1, "594 XP is still level 1");
        xp += curve.xp_from_damage(1.0);
        assert_eq!(curve.level_from_xp(xp), 2, "595 XP reaches level 2");
    }

    #[test]
    fn test_level_from_xp_inverts_thresholds() {
        let curve = scenario_curve();
        for level in 2..=60 {
            let threshold = curve.xp_required_for_level(level);
            assert_eq!(curve.level_from_xp(threshold), level);
            assert_eq!(curve.level_from_xp(threshold - 1e-6), level - 1);
        }
    }

    #[test]
    fn test_thresholds_strictly_increase() {
        let curve = LevelCurve::default();
        let mut previous = curve.xp_required_for_level(2);
        for level in 3..=100 {
            let current = curve.xp_required_for_level(level);
            assert!(current > previous, "level {level} must need more XP");
            previous = current;
        }
    }

    #[test]
    fn test_non_positive_inputs() {
        let curve = scenario_curve();
        assert_eq!(curve.level_from_xp(0.0), 1);
        assert_eq!(curve.level_from_xp(-50.0), 1);
        assert_eq!(curve.level_from_xp(f64::NAN), 1);
        assert!(curve.xp_from_damage(0.0).abs() < f64::EPSILON);
        assert!(curve.xp_from_damage(-3.0).abs() < f64::EPSILON);
        assert!(curve.xp_required_for_level(1).abs() < f64::EPSILON);
        assert!(curve.xp_required_for_level(-4).abs() < f64::EPSILON);
    }

    #[test]
    fn test_max_level_clamps() {
        let curve = LevelCurve::new(1.0, 1.0, 10.0, 1.0, 5);
        assert_eq!(curve.level_from_xp(1_000_000.0), 5);
        assert!(curve.xp_to_next_level(5).abs() < f64::EPSILON);
        assert!(curve.xp_to_next_level(4) > 0.0);
    }

    #[test]
    fn test_uncapped_max_level_still_levels() {
        let curve = LevelCurve::new(1.0, 1.0, 10.0, 1.0, 0);
        assert_eq!(curve.effective_max_level(), UNCAPPED_LEVEL_CEILING);
        assert_eq!(curve.level_from_xp(45.0), 4, "10*4 = 40 <= 45 < 50");
        assert!(curve.xp_to_next_level(500) > 0.0);
    }

    #[test]
    fn test_multipliers_scale_xp() {
        let curve = LevelCurve::new(2.0, 1.5, 100.0, 1.5, 100);
        assert!((curve.xp_from_damage(10.0) - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_progress_string() {
        let curve = LevelCurve::new(1.0, 1.0, 100.0, 1.0, 3);
        // Level 2 at 200 XP, level 3 at 300 XP
        assert_eq!(curve.progress_string(250.0), "Level 2 | 50/100 XP (50%)");
        assert_eq!(curve.progress_string(0.0), "Level 1 | 0/200 XP (0%)");
        assert_eq!(curve.progress_string(900.0), "Level 3 (MAX)");
    }
}
