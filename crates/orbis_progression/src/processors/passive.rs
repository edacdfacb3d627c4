//! Passive effects (ring, armor and tool bonuses).
//!
//! Nothing happens on hit. The host reads summed values through
//! [`crate::EffectDispatcher::sum_effect_value`] when it recomputes stats.

use crate::catalog::{EffectDefinition, EffectType};
use crate::effects::EffectInstance;
use crate::error::ProgressionResult;
use crate::host::EntityId;

use super::{EffectContext, EffectProcessor};

/// Processor for effects that only contribute to aggregated stats.
#[derive(Clone, Copy, Debug)]
pub struct PassiveProcessor {
    effect: EffectType,
}

impl PassiveProcessor {
    /// Creates a passive processor for `effect`.
    #[inline]
    #[must_use]
    pub const fn new(effect: EffectType) -> Self {
        Self { effect }
    }

    /// Effect this processor stands for.
    #[inline]
    #[must_use]
    pub const fn effect(&self) -> EffectType {
        self.effect
    }
}

impl EffectProcessor for PassiveProcessor {
    fn on_damage_dealt(
        &self,
        _context: &EffectContext<'_>,
        _instance: &EffectInstance,
        _definition: &EffectDefinition,
    ) -> ProgressionResult<()> {
        Ok(())
    }

    fn on_equipped(&self, holder: EntityId, instance: &EffectInstance, definition: &EffectDefinition) {
        tracing::debug!(
            "{:?} equipped {} L{} ({})",
            holder,
            self.effect,
            instance.level,
            definition.format_value(instance.level)
        );
    }

    fn on_unequipped(&self, holder: EntityId, instance: &EffectInstance, _definition: &EffectDefinition) {
        tracing::debug!("{:?} unequipped {} L{}", holder, self.effect, instance.level);
    }
}
