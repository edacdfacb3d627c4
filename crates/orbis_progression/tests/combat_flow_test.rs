//! Integration test for hit handling: effect dispatch, isolation and pending XP.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use orbis_progression::{
    DamageEvent, EffectContext, EffectDefinition, EffectDispatcher, EffectInstance,
    EffectInstanceStore, EffectProcessor, EffectType, EntityId, HostRequest, ItemClass, ItemRecord,
    Loadout, PendingProgressTracker, PlayerId, ProgressKey, ProgressionConfig, ProgressionResult,
    ProgressionService, RecordingHost,
};

const PLAYER: PlayerId = PlayerId(42);
const ME: EntityId = EntityId(100);
const TARGET: EntityId = EntityId(200);

struct Exploding {
    calls: AtomicUsize,
}

impl EffectProcessor for Exploding {
    fn on_damage_dealt(
        &self,
        _context: &EffectContext<'_>,
        _instance: &EffectInstance,
        _definition: &EffectDefinition,
    ) -> ProgressionResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        panic!("processor bug");
    }
}

fn empowered_sword() -> ItemRecord {
    let sword = ItemRecord::new("Weapon_Sword_Iron", ItemClass::Weapon);
    let sword = EffectInstanceStore::set_effect(&sword, EffectInstance::new(EffectType::DamagePercent, 3).unwrap());
    EffectInstanceStore::set_effect(&sword, EffectInstance::new(EffectType::LifeLeech, 5).unwrap())
}

#[test]
fn test_bonus_damage_does_not_retrigger() {
    let service = ProgressionService::new(ProgressionConfig::default()).unwrap();
    let host = RecordingHost::new();
    let loadout = Loadout::new(0, empowered_sword());

    let hit = DamageEvent::player_hit(PLAYER, ME, TARGET, 100.0, 1_000);
    let outcome = service.on_damage_dealt(&hit, &loadout, &host).unwrap();
    assert_eq!(outcome.dispatch.applied, 2);
    assert!((host.total_bonus_damage() - 7.0).abs() < 1e-9);
    assert!(host
        .requests()
        .iter()
        .any(|request| matches!(request, HostRequest::Heal { entity, .. } if *entity == ME)));

    // The host feeds the emitted bonus damage back as a new event.
    let echo = DamageEvent::player_hit(PLAYER, ME, TARGET, 7.0, 1_001).as_bonus();
    assert!(service.on_damage_dealt(&echo, &loadout, &host).is_none());
    assert!((host.total_bonus_damage() - 7.0).abs() < 1e-9, "no second bonus emitted");
    assert!(
        (service.tracker().pending_xp(ProgressKey::hotbar(PLAYER, 0)) - 100.0).abs() < 1e-9,
        "bonus damage earns no XP"
    );
}

#[test]
fn test_panicking_processor_is_isolated() {
    let exploding = Arc::new(Exploding {
        calls: AtomicUsize::new(0),
    });
    let mut dispatcher = EffectDispatcher::standard(9);
    dispatcher.register_processor(EffectType::LifeLeech, exploding.clone());

    let service = ProgressionService::new(ProgressionConfig::default())
        .unwrap()
        .with_dispatcher(dispatcher);
    let host = RecordingHost::new();
    let loadout = Loadout::new(0, empowered_sword());

    let hit = DamageEvent::player_hit(PLAYER, ME, TARGET, 100.0, 1_000);
    let outcome = service.on_damage_dealt(&hit, &loadout, &host).unwrap();

    assert_eq!(exploding.calls.load(Ordering::SeqCst), 1);
    assert_eq!(outcome.dispatch.failed, 1);
    assert_eq!(outcome.dispatch.applied, 1);
    assert!((host.total_bonus_damage() - 7.0).abs() < 1e-9, "the other effect still ran");
    assert!((outcome.xp_gained - 100.0).abs() < 1e-9, "the hit still earned XP");
}

#[test]
fn test_concurrent_accrual_flushes_exactly_once() {
    let tracker = PendingProgressTracker::new();
    let sword = ItemRecord::new("Weapon_Sword_Iron", ItemClass::Weapon).with_stored_xp(10.0);
    let shared = ProgressKey::hotbar(PLAYER, 0);

    thread::scope(|scope| {
        for player in 0..8u64 {
            let tracker = &tracker;
            scope.spawn(move || {
                let own = ProgressKey::hotbar(PlayerId(player), 1);
                for _ in 0..1_000 {
                    tracker.add_pending_xp(shared, 1.0);
                    tracker.add_pending_xp(own, 0.5);
                }
            });
        }
    });

    assert!((tracker.pending_xp(shared) - 8_000.0).abs() < 1e-9);
    let flushed = tracker.flush_pending_xp(&sword, shared);
    assert!((flushed.stored_xp() - 8_010.0).abs() < 1e-9);
    assert_eq!(tracker.pending_xp(shared), 0.0);

    let again = tracker.flush_pending_xp(&flushed, shared);
    assert_eq!(again, flushed, "second flush writes nothing");

    for player in 0..8u64 {
        let own = ProgressKey::hotbar(PlayerId(player), 1);
        assert!((tracker.pending_xp(own) - 500.0).abs() < 1e-9);
    }
}

#[test]
fn test_swapped_item_does_not_inherit_pending_xp() {
    let service = ProgressionService::new(ProgressionConfig::default()).unwrap();
    let host = RecordingHost::new();
    let key = ProgressKey::hotbar(PLAYER, 0);

    let sword = Loadout::new(0, ItemRecord::new("Weapon_Sword_Iron", ItemClass::Weapon));
    service.on_damage_dealt(&DamageEvent::player_hit(PLAYER, ME, TARGET, 80.0, 1_000), &sword, &host);

    let axe = Loadout::new(0, ItemRecord::new("Weapon_Axe_Iron", ItemClass::Weapon));
    let outcome = service
        .on_damage_dealt(&DamageEvent::player_hit(PLAYER, ME, TARGET, 5.0, 1_200), &axe, &host)
        .unwrap();
    assert!((service.tracker().pending_xp(key) - 5.0).abs() < 1e-9);
    assert!(outcome.item.stored_xp().abs() < 1e-9);
}
