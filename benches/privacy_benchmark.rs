use criterion::{black_box, criterion_group, criterion_main, Criterion};
use runsync::config::PrivacyConfig;
use runsync::geo::{codec, privacy};

fn benchmark_privacy_filter(c: &mut Criterion) {
    // A dense synthetic track heading north-east out of central Beijing
    let points: Vec<(f64, f64)> = (0..2000)
        .map(|i| (39.9042 + i as f64 * 5e-5, 116.4074 + i as f64 * 7e-5))
        .collect();
    let encoded = codec::encode(&points).expect("Failed to encode track");

    let zones = PrivacyConfig {
        centers: vec![(39.9042, 116.4074), (39.95, 116.47)],
        radius_m: 500.0,
        start_end_radius_m: 200.0,
    };
    let no_zones = PrivacyConfig::default();

    let mut group = c.benchmark_group("privacy_filter");

    group.bench_function("dense_track_with_zones", |b| {
        b.iter(|| privacy::filter_polyline(black_box(&encoded), black_box(&zones)))
    });

    group.bench_function("dense_track_no_zones", |b| {
        b.iter(|| privacy::filter_polyline(black_box(&encoded), black_box(&no_zones)))
    });

    group.finish();
}

criterion_group!(benches, benchmark_privacy_filter);
criterion_main!(benches);
