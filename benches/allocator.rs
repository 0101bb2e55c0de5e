//! Benchmark for the capacity allocator and partition table ingest

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use diskmap::hardware::CorrelationMap;
use diskmap::{
    AllocatorProfile, CapacityPolicy, DiskgroupAssignment, DiskgroupPolicy, ResolvedDevice,
};

const SIZES_KIB: [u64; 5] = [1_048_576, 10_485_760, 16_777_920, 52_428_800, 134_218_560];

fn devices(count: usize) -> Vec<ResolvedDevice> {
    (0..count)
        .map(|i| ResolvedDevice {
            kernel_name: format!("sd{}", i),
            stable_id: format!("36000c29{:024}", i),
            size_kib: SIZES_KIB[i % SIZES_KIB.len()],
            locator: Some(format!("0:0:{}:0:0", i)),
        })
        .collect()
}

fn bench_capacity_policy(c: &mut Criterion) {
    let mut group = c.benchmark_group("capacity_policy");

    for (name, profile) in [
        ("virtualized", AllocatorProfile::virtualized()),
        ("physical", AllocatorProfile::physical()),
    ] {
        for count in [16usize, 256, 4096] {
            let devices = devices(count);
            group.throughput(Throughput::Elements(count as u64));
            group.bench_with_input(BenchmarkId::new(name, count), &devices, |b, devices| {
                let policy = CapacityPolicy::new(&profile);
                b.iter(|| {
                    let mut assignment = DiskgroupAssignment::new();
                    let _ = policy.assign(black_box(devices), &mut assignment);
                    assignment
                });
            });
        }
    }

    group.finish();
}

fn bench_partition_ingest(c: &mut Criterion) {
    let mut group = c.benchmark_group("correlation");

    let mut table = String::from("major minor  #blocks  name\n\n");
    for i in 0..4096 {
        table.push_str(&format!(
            "   8 {:>6} {:>10} sd{}\n",
            i * 16,
            SIZES_KIB[i % SIZES_KIB.len()],
            i
        ));
    }

    group.throughput(Throughput::Elements(4096));
    group.bench_function("ingest_partitions", |b| {
        b.iter(|| {
            let mut map = CorrelationMap::new();
            map.ingest_partitions(black_box(&table));
            map
        });
    });

    group.finish();
}

criterion_group!(benches, bench_capacity_policy, bench_partition_ingest);
criterion_main!(benches);
