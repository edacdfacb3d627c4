//! Damage-composition processors.
//!
//! Both derive their amount from the *original* hit, never from bonus damage.
//! Bonus damage is emitted with [`DamageTag::Bonus`] so it cannot trigger the
//! pipeline again.

use crate::catalog::EffectDefinition;
use crate::effects::EffectInstance;
use crate::error::ProgressionResult;
use crate::host::{BonusDamage, DamageTag};

use super::{EffectContext, EffectProcessor};

/// Amounts below this are not worth a secondary event.
pub const MIN_COMPOSED_AMOUNT: f64 = 0.1;

#[inline]
fn composed_amount(context: &EffectContext<'_>, instance: &EffectInstance, definition: &EffectDefinition) -> Option<f64> {
    let amount = context.original_damage * definition.calculate_value(instance.level);
    if amount.is_nan() || amount < MIN_COMPOSED_AMOUNT {
        None
    } else {
        Some(amount)
    }
}

/// Deals a percentage of the hit again as tagged bonus damage.
#[derive(Clone, Copy, Debug, Default)]
pub struct DamagePercentProcessor;

impl EffectProcessor for DamagePercentProcessor {
    fn on_damage_dealt(
        &self,
        context: &EffectContext<'_>,
        instance: &EffectInstance,
        definition: &EffectDefinition,
    ) -> ProgressionResult<()> {
        // Multishot arrows carry no bonus
        if context.is_extra_projectile {
            return Ok(());
        }
        let Some(bonus) = composed_amount(context, instance, definition) else {
            return Ok(());
        };
        context.host.emit_bonus_damage(BonusDamage {
            source: context.attacker,
            target: context.target,
            amount: bonus,
            cause: context.damage_cause.map(str::to_string),
            tag: DamageTag::Bonus,
        });
        tracing::debug!(
            "damage_percent L{}: +{:.1} bonus on {:.1} hit",
            instance.level,
            bonus,
            context.original_damage
        );
        Ok(())
    }
}

/// Heals the attacker for a share of the hit.
#[derive(Clone, Copy, Debug, Default)]
pub struct LifeLeechProcessor;

impl EffectProcessor for LifeLeechProcessor {
    fn on_damage_dealt(
        &self,
        context: &EffectContext<'_>,
        instance: &EffectInstance,
        definition: &EffectDefinition,
    ) -> ProgressionResult<()> {
        let Some(heal) = composed_amount(context, instance, definition) else {
            return Ok(());
        };
        context.host.heal(context.attacker, heal);
        tracing::debug!("life_leech L{}: healed {:.1}", instance.level, heal);
        Ok(())
    }
}
