// Wire codec benchmarks: command encoding and RESP decoding across a
// range of value shapes, mirroring what a busy connection actually
// pushes through the decoder (short replies, bulk payloads, nested
// arrays).

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use valkey_core::codec::{decode, encode_command, Decoded};

fn bench_encode_command(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_command");

    let cases: Vec<(&str, Vec<&[u8]>)> = vec![
        ("get", vec![b"foo".as_slice()]),
        ("set", vec![b"foo".as_slice(), b"bar".as_slice()]),
        (
            "mset_10",
            (0..10).flat_map(|_| [b"k".as_slice(), b"v".as_slice()]).collect(),
        ),
    ];

    for (name, args) in cases {
        group.bench_with_input(BenchmarkId::from_parameter(name), &args, |b, args| {
            b.iter(|| black_box(encode_command(b"SET", args.iter().copied())));
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    let simple_string = b"+OK\r\n".to_vec();
    let bulk_string = {
        let mut buf = Vec::from(&b"$1024\r\n"[..]);
        buf.extend(std::iter::repeat(b'x').take(1024));
        buf.extend_from_slice(b"\r\n");
        buf
    };
    let nested_array = {
        let mut buf = Vec::from(&b"*100\r\n"[..]);
        for i in 0..100 {
            let item = format!("item-{i}");
            buf.extend_from_slice(format!("${}\r\n{}\r\n", item.len(), item).as_bytes());
        }
        buf
    };

    for (name, payload) in [
        ("simple_string", simple_string),
        ("bulk_string_1kb", bulk_string),
        ("flat_array_100", nested_array),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(name), &payload, |b, payload| {
            b.iter(|| match decode(black_box(payload)).unwrap() {
                Decoded::Complete { frame, .. } => black_box(frame),
                Decoded::Incomplete => panic!("benchmark payload must decode in one pass"),
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_encode_command, bench_decode);
criterion_main!(benches);
