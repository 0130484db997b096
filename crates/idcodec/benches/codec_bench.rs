use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use staffdesk_idcodec::{IdCodec, MasterKey};

fn bench_codec(c: &mut Criterion) {
    let codec = IdCodec::new(MasterKey::from_bytes([9u8; 32]));
    let protector = codec
        .protector("EmployeeIdRouteValue")
        .expect("valid purpose");

    let mut group = c.benchmark_group("idcodec");
    for id in [1u64, 1_000_000, u64::MAX] {
        let token = protector.encode(id).expect("encode");

        group.bench_with_input(BenchmarkId::new("encode", id), &id, |b, &id| {
            b.iter(|| protector.encode(black_box(id)))
        });
        group.bench_with_input(BenchmarkId::new("decode", id), &token, |b, token| {
            b.iter(|| protector.decode(black_box(token)))
        });
    }
    group.bench_function("protector_derivation", |b| {
        b.iter(|| codec.protector(black_box("EmployeeIdRouteValue")))
    });
    group.finish();
}

criterion_group!(benches, bench_codec);
criterion_main!(benches);
