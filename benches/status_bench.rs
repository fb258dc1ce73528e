// Benchmark for structural hashing and status diff performance
// Run with: cargo bench

use criterion::{criterion_group, criterion_main, Criterion};

use anker_bridge::status::{structural_hash, StatusModel};
use anker_bridge::telemetry::TelemetryRecord;
use anker_bridge::translator::EventTranslator;

fn bench_structural_hash(c: &mut Criterion) {
    let mesh: Vec<Vec<f64>> = (0..7)
        .map(|y| (0..7).map(|x| (x * y) as f64 * 0.01).collect())
        .collect();
    let value = serde_json::json!({
        "profile_name": "anker-builtin",
        "probed_matrix": &mesh,
        "profiles": { "anker-builtin": { "points": &mesh } },
    });
    c.bench_function("structural_hash bed_mesh", |b| {
        b.iter(|| structural_hash(std::hint::black_box(&value)));
    });
}

fn bench_status_update(c: &mut Criterion) {
    c.bench_function("status_update with one changed section", |b| {
        let mut model = StatusModel::new();
        let mut temp = 20.0;
        b.iter(|| {
            temp += 0.5;
            model.heater_bed.temperature = temp;
            let update = model.status_update();
            assert_eq!(update.len(), 1);
        });
    });
}

fn bench_dispatch(c: &mut Criterion) {
    let records: Vec<TelemetryRecord> = (0..1000)
        .map(|i| {
            serde_json::from_value(serde_json::json!({
                "commandType": 1003,
                "currentTemp": (20000 + i).to_string(),
                "targetTemp": 21000,
            }))
            .unwrap()
        })
        .collect();
    c.bench_function("dispatch 1k heater records", |b| {
        b.iter(|| {
            let mut translator = EventTranslator::new();
            for record in &records {
                translator.dispatch(record);
            }
        });
    });
}

criterion_group!(benches, bench_structural_hash, bench_status_update, bench_dispatch);
criterion_main!(benches);
