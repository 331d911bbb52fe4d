// Router benchmarks: slot hashing throughput and the cost of
// resolving a routing destination, including the multi-slot split
// path multi-key commands take.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use valkey_core::config::ReadFrom;
use valkey_core::router::{extract_keys, key_slot, resolve, MultiSlotPattern, RequestType};

fn bench_key_slot(c: &mut Criterion) {
    let mut group = c.benchmark_group("key_slot");

    let keys: Vec<Vec<u8>> = vec![
        b"short".to_vec(),
        b"a-somewhat-longer-key-name-for-testing".to_vec(),
        b"{tag}.field.with.hash.tag".to_vec(),
    ];

    for key in &keys {
        group.bench_with_input(
            BenchmarkId::from_parameter(String::from_utf8_lossy(key)),
            key,
            |b, key| b.iter(|| black_box(key_slot(black_box(key)))),
        );
    }

    group.finish();
}

fn bench_resolve_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_multi_slot");

    for count in [1usize, 10, 100] {
        let args: Vec<Vec<u8>> = (0..count).map(|i| format!("key{i}").into_bytes()).collect();
        group.bench_with_input(BenchmarkId::from_parameter(count), &args, |b, args| {
            let keys = extract_keys(Some(MultiSlotPattern::KeysOnly), true, args);
            b.iter(|| {
                black_box(resolve(&RequestType::MGet, &keys, None, &ReadFrom::Primary).unwrap())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_key_slot, bench_resolve_split);
criterion_main!(benches);
