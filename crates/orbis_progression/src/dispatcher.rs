//! # Effect Dispatcher
//!
//! **Binds effect types to definitions and processors, and runs them per hit**
//!
//! ## Isolation
//!
//! Every instance on the weapon is processed on its own:
//! - a missing definition or processor skips that instance only
//! - a processor error is logged and the next instance still runs
//! - a processor panic is caught at the instance boundary
//!
//! The triggering damage event is never aborted by an effect.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::catalog::{EffectCatalog, EffectDefinition, EffectType};
use crate::effects::{EffectInstance, EffectInstanceStore};
use crate::error::ProgressionError;
use crate::host::EntityId;
use crate::item::ItemRecord;
use crate::processors::{standard_processor, EffectContext, EffectProcessor};

/// Highest tier `ring_health_regen` is displayed at.
pub const HEALTH_REGEN_DISPLAY_CAP: i32 = 3;

/// Outcome counts of one dispatch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Instances whose processor ran to completion.
    pub applied: usize,
    /// Instances that do not apply to the hit's category.
    pub skipped: usize,
    /// Instances without a registered definition or processor.
    pub missing: usize,
    /// Instances whose processor returned an error or panicked.
    pub failed: usize,
}

/// Registry of definitions and processors.
pub struct EffectDispatcher {
    catalog: EffectCatalog,
    processors: HashMap<EffectType, Arc<dyn EffectProcessor>>,
}

impl EffectDispatcher {
    /// Creates a dispatcher with nothing registered.
    #[must_use]
    pub fn new() -> Self {
        Self {
            catalog: EffectCatalog::empty(),
            processors: HashMap::new(),
        }
    }

    /// Creates a dispatcher with the standard catalogue and processors.
    #[must_use]
    pub fn standard(seed: u64) -> Self {
        let mut dispatcher = Self {
            catalog: EffectCatalog::standard(),
            processors: HashMap::with_capacity(EffectType::ALL.len()),
        };
        for effect in EffectType::ALL {
            dispatcher.register_processor(effect, standard_processor(effect, seed));
        }
        tracing::info!(
            "Effect dispatcher ready: {} definitions, {} processors",
            dispatcher.catalog.len(),
            dispatcher.processors.len()
        );
        dispatcher
    }

    /// Registers or replaces the definition for its effect type.
    pub fn register_definition(&mut self, definition: EffectDefinition) {
        let short = self.catalog.short_description(definition.effect);
        self.catalog.insert(definition, short);
    }

    /// Registers or replaces the processor for `effect`.
    pub fn register_processor(&mut self, effect: EffectType, processor: Arc<dyn EffectProcessor>) {
        self.processors.insert(effect, processor);
    }

    /// Definition for `effect`.
    #[must_use]
    pub fn definition(&self, effect: EffectType) -> Option<&EffectDefinition> {
        self.catalog.definition(effect)
    }

    /// Processor for `effect`.
    #[must_use]
    pub fn processor(&self, effect: EffectType) -> Option<&Arc<dyn EffectProcessor>> {
        self.processors.get(&effect)
    }

    /// The registered catalogue.
    #[inline]
    #[must_use]
    pub const fn catalog(&self) -> &EffectCatalog {
        &self.catalog
    }

    fn pair(&self, effect: EffectType) -> Option<(&Arc<dyn EffectProcessor>, &EffectDefinition)> {
        Some((self.processors.get(&effect)?, self.catalog.definition(effect)?))
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Runs every applicable effect on the weapon in `context`.
    pub fn apply_on_damage_effects(&self, context: &EffectContext<'_>) -> DispatchReport {
        let mut report = DispatchReport::default();

        for instance in EffectInstanceStore::get_effects(context.weapon) {
            if !instance.effect.applies_to(context.category) {
                report.skipped += 1;
                continue;
            }
            let Some((processor, definition)) = self.pair(instance.effect) else {
                tracing::warn!(
                    "No processor or definition for {} on {}, skipping",
                    instance.effect,
                    context.weapon.item_id()
                );
                report.missing += 1;
                continue;
            };

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                processor.on_damage_dealt(context, &instance, definition)
            }));
            match outcome {
                Ok(Ok(())) => report.applied += 1,
                Ok(Err(error)) => {
                    tracing::warn!("{} failed: {}", instance.effect, error);
                    report.failed += 1;
                }
                Err(payload) => {
                    let error = ProgressionError::ProcessorFailed {
                        effect: instance.effect.id(),
                        reason: panic_message(payload.as_ref()),
                    };
                    tracing::warn!("{}", error);
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Calls `on_equipped` for every effect on `item`.
    pub fn notify_equipped(&self, holder: EntityId, item: &ItemRecord) {
        self.notify(item, |processor, instance, definition| {
            processor.on_equipped(holder, instance, definition);
        });
    }

    /// Calls `on_unequipped` for every effect on `item`.
    pub fn notify_unequipped(&self, holder: EntityId, item: &ItemRecord) {
        self.notify(item, |processor, instance, definition| {
            processor.on_unequipped(holder, instance, definition);
        });
    }

    fn notify(&self, item: &ItemRecord, hook: impl Fn(&dyn EffectProcessor, &EffectInstance, &EffectDefinition)) {
        for instance in EffectInstanceStore::get_effects(item) {
            let Some((processor, definition)) = self.pair(instance.effect) else {
                continue;
            };
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                hook(processor.as_ref(), &instance, definition);
            }));
            if let Err(payload) = outcome {
                tracing::warn!(
                    "{} equip hook panicked: {}",
                    instance.effect,
                    panic_message(payload.as_ref())
                );
            }
        }
    }

    // =========================================================================
    // Read-only aggregations
    // =========================================================================

    /// `1 + damage_percent value`, or `1` without that effect.
    #[must_use]
    pub fn calculate_total_damage_multiplier(&self, item: &ItemRecord) -> f64 {
        1.0 + self.effect_value(item, EffectType::DamagePercent)
    }

    /// Scaled value of `effect` on `item`, zero when absent.
    #[must_use]
    pub fn effect_value(&self, item: &ItemRecord, effect: EffectType) -> f64 {
        let Some(instance) = EffectInstanceStore::get_effect(item, effect) else {
            return 0.0;
        };
        self.definition(effect)
            .map_or(0.0, |definition| definition.calculate_value(instance.level))
    }

    /// Sum of `effect` over several items (equipped rings, armor pieces).
    #[must_use]
    pub fn sum_effect_value<'i>(&self, items: impl IntoIterator<Item = &'i ItemRecord>, effect: EffectType) -> f64 {
        items
            .into_iter()
            .map(|item| self.effect_value(item, effect))
            .sum()
    }

    /// Comma-separated descriptions of every effect, or `"No effects"`.
    #[must_use]
    pub fn effects_summary(&self, item: &ItemRecord) -> String {
        let effects = EffectInstanceStore::get_effects(item);
        if effects.is_empty() {
            return "No effects".to_string();
        }
        effects
            .iter()
            .filter_map(|instance| {
                let definition = self.definition(instance.effect)?;
                Some(describe(instance, definition))
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for EffectDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn describe(instance: &EffectInstance, definition: &EffectDefinition) -> String {
    if instance.effect != EffectType::RingHealthRegen {
        return definition.formatted_description(instance.level);
    }
    let tier = instance.level.min(HEALTH_REGEN_DISPLAY_CAP);
    let mut text = definition.formatted_description(tier);
    if instance.level >= HEALTH_REGEN_DISPLAY_CAP {
        text.push_str(" (MAX)");
    }
    text
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic".to_string())
}
