//! Integration test for the embue selection flow.

use std::collections::HashSet;

use orbis_progression::upgrade::persisted_options;
use orbis_progression::{
    EffectCatalog, EffectInstance, EffectInstanceStore, EffectType, ItemClass, ItemRecord,
    MaterialTiers, PendingProgressTracker, ProgressionConfig, ProgressionService, UpgradeOption,
    UpgradeSelector, WeaponCategory,
};

fn service() -> ProgressionService {
    ProgressionService::new(ProgressionConfig::default()).unwrap()
}

fn sword_with_embues(count: i32) -> ItemRecord {
    PendingProgressTracker::add_pending_embues(&ItemRecord::new("Weapon_Sword_Iron", ItemClass::Weapon), count)
}

#[test]
fn test_reopen_returns_same_options_until_selected() {
    let service = service();
    let sword = sword_with_embues(2);

    let (sword, first) = service.open_upgrade_selection(&sword);
    assert_eq!(first.len(), 3);
    let (sword, second) = service.open_upgrade_selection(&sword);
    assert_eq!(first, second, "closing without a choice must not reroll");

    let upgraded = service.select_upgrade(&sword, 0).unwrap();
    assert_eq!(PendingProgressTracker::get_pending_embues(&upgraded), 1);
    assert!(persisted_options(&upgraded).is_empty());
    assert!(EffectInstanceStore::has_effect(&upgraded, first[0].effect()));

    let (upgraded, fresh) = service.open_upgrade_selection(&upgraded);
    assert!(!fresh.is_empty());
    assert_eq!(persisted_options(&upgraded), fresh);
}

#[test]
fn test_no_embue_no_roll() {
    let service = service();
    let sword = sword_with_embues(0);
    let (unchanged, options) = service.open_upgrade_selection(&sword);
    assert!(options.is_empty());
    assert_eq!(unchanged, sword);
    assert!(service.select_upgrade(&sword, 0).is_none());
}

#[test]
fn test_out_of_range_index_leaves_item_untouched() {
    let service = service();
    let (sword, options) = service.open_upgrade_selection(&sword_with_embues(1));
    assert!(service.select_upgrade(&sword, options.len()).is_none());
    assert_eq!(PendingProgressTracker::get_pending_embues(&sword), 1);
}

#[test]
fn test_maxed_effect_is_never_boosted() {
    let catalog = EffectCatalog::standard();
    let max_level = catalog.definition(EffectType::LifeLeech).unwrap().max_level;
    let sword = EffectInstanceStore::set_effect(
        &sword_with_embues(1),
        EffectInstance::new(EffectType::LifeLeech, max_level).unwrap(),
    );
    let sword = EffectInstanceStore::set_effect(&sword, EffectInstance::unlocked(EffectType::FireOnHit));

    let selector = UpgradeSelector::new(11, MaterialTiers::standard(), 3);
    let pool = selector.candidate_pool(&sword, WeaponCategory::Physical, &catalog);
    assert!(pool.contains(&UpgradeOption::Boost {
        effect: EffectType::FireOnHit,
        level: 1
    }));
    assert!(pool.iter().all(|option| option.effect() != EffectType::LifeLeech));

    for seed in 0..20 {
        let selector = UpgradeSelector::new(seed, MaterialTiers::standard(), 3);
        let (_, options) =
            selector.get_or_create_pending_upgrade_options(&sword, WeaponCategory::Physical, &catalog);
        let types: HashSet<EffectType> = options.iter().map(|option| option.effect()).collect();
        assert_eq!(types.len(), options.len(), "seed {seed} offered one effect twice");
    }
}

#[test]
fn test_full_slots_only_offer_boosts() {
    let catalog = EffectCatalog::standard();
    let crude = ItemRecord::new("Weapon_Sword_Crude", ItemClass::Weapon);
    let crude = PendingProgressTracker::add_pending_embues(&crude, 1);
    let crude = EffectInstanceStore::set_effect(&crude, EffectInstance::unlocked(EffectType::FireOnHit));
    let crude = EffectInstanceStore::set_effect(&crude, EffectInstance::unlocked(EffectType::SlowOnHit));
    assert_eq!(MaterialTiers::standard().boost_slots(&crude), 2);

    let selector = UpgradeSelector::new(5, MaterialTiers::standard(), 3);
    let pool = selector.candidate_pool(&crude, WeaponCategory::Physical, &catalog);
    assert_eq!(pool.len(), 2);
    assert!(pool
        .iter()
        .all(|option| matches!(option, UpgradeOption::Boost { .. })));
}
