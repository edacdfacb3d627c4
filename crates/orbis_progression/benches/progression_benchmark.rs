//! Benchmark for the per-hit progression path.
//!
//! TARGET: a full hit (dispatch + XP accrual) well under 10 microseconds
//!
//! Run with: cargo bench --package orbis_progression --bench progression_benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use orbis_progression::{
    DamageEvent, EffectContext, EffectDispatcher, EffectInstance, EffectInstanceStore, EffectType,
    EntityId, ItemClass, ItemRecord, LevelCurve, Loadout, PlayerId, ProgressionConfig,
    ProgressionService, RecordingHost,
};

fn loaded_sword() -> ItemRecord {
    let sword = ItemRecord::new("Weapon_Sword_Mithril", ItemClass::Weapon).with_stored_xp(25_000.0);
    [
        EffectInstance::new(EffectType::DamagePercent, 12),
        EffectInstance::new(EffectType::LifeLeech, 4),
        EffectInstance::new(EffectType::FireOnHit, 3),
        EffectInstance::new(EffectType::SlowOnHit, 2),
    ]
    .into_iter()
    .flatten()
    .fold(sword, |item, instance| EffectInstanceStore::set_effect(&item, instance))
}

fn benchmark_level_from_xp(c: &mut Criterion) {
    let curve = LevelCurve::default();
    let xp = curve.xp_required_for_level(80) + 1.0;

    c.bench_function("level_from_xp_level_80", |b| {
        b.iter(|| black_box(curve.level_from_xp(black_box(xp))));
    });
}

fn benchmark_dispatch(c: &mut Criterion) {
    let dispatcher = EffectDispatcher::standard(1);
    let host = RecordingHost::new();
    let sword = loaded_sword();

    c.bench_function("dispatch_four_effects", |b| {
        b.iter(|| {
            host.clear();
            let context = EffectContext::new(&host, &sword, EntityId(1), EntityId(2), black_box(40.0));
            black_box(dispatcher.apply_on_damage_effects(&context))
        });
    });
}

fn benchmark_full_hit(c: &mut Criterion) {
    let service = ProgressionService::new(ProgressionConfig::default()).unwrap();
    let host = RecordingHost::new();
    let loadout = Loadout::new(0, loaded_sword());
    let mut now = 0;

    c.bench_function("on_damage_dealt", |b| {
        b.iter(|| {
            host.clear();
            now += 100;
            let hit = DamageEvent::player_hit(PlayerId(1), EntityId(1), EntityId(2), 0.01, now);
            black_box(service.on_damage_dealt(&hit, &loadout, &host))
        });
    });
}

criterion_group!(benches, benchmark_level_from_xp, benchmark_dispatch, benchmark_full_hit);
criterion_main!(benches);
