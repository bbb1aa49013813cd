use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use taglock_core::{Mutex, SpinLock};

fn acquire_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("acquire_release");

    let anonymous = SpinLock::new(false);
    group.bench_function("anonymous_uncontended", |b| {
        b.iter(|| {
            black_box(&anonymous).acquire().unwrap();
            anonymous.release_relaxed().unwrap();
        });
    });

    let tracked = SpinLock::new(true);
    group.bench_function("tracked_uncontended", |b| {
        b.iter(|| {
            black_box(&tracked).acquire().unwrap();
            tracked.release().unwrap();
        });
    });

    let held = SpinLock::new(false);
    held.acquire().unwrap();
    group.bench_function("try_acquire_held", |b| {
        b.iter(|| black_box(held.try_acquire().unwrap()));
    });
    held.release().unwrap();

    let mutex = Mutex::new(0u64);
    group.bench_function("mutex_guard_round_trip", |b| {
        b.iter(|| {
            *mutex.lock() += 1;
        });
    });

    group.finish();
}

criterion_group!(benches, acquire_benchmark);
criterion_main!(benches);
