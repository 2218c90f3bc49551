use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use slotflake::{
    LockSnowflakeGenerator, MemoryNamespace, NamespaceLayout, SlotAllocator, SystemClock,
    TimeSource,
};
use std::{
    sync::{
        Arc, Barrier,
        atomic::{AtomicU64, Ordering},
    },
    thread::scope,
    time::Instant,
};

/// Advances one millisecond every 4096 reads, so the generator never spins.
struct TickingMockTime {
    reads: AtomicU64,
}

impl TimeSource for TickingMockTime {
    fn current_millis(&self) -> u64 {
        self.reads.fetch_add(1, Ordering::Relaxed) >> 12
    }
}

// Number of IDs generated per benchmark iteration (split across threads for
// the contended benchmarks).
const TOTAL_IDS: usize = 4096;

fn bench_generator<T: TimeSource>(
    c: &mut Criterion,
    group_name: &str,
    generator_factory: impl Fn() -> LockSnowflakeGenerator<T>,
) {
    let mut group = c.benchmark_group(group_name);
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));

    group.bench_function(format!("elems/{TOTAL_IDS}"), |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();

            for _ in 0..iters {
                let generator = generator_factory();
                for _ in 0..TOTAL_IDS {
                    black_box(generator.next_id().unwrap());
                }
            }

            start.elapsed()
        });
    });

    group.finish();
}

fn bench_generator_contended<T: TimeSource + Send + Sync>(
    c: &mut Criterion,
    group_name: &str,
    generator_factory: impl Fn() -> LockSnowflakeGenerator<T>,
) {
    let mut group = c.benchmark_group(group_name);

    for thread_count in [1, 2, 4, 8] {
        let ids_per_thread = TOTAL_IDS / thread_count;

        group.throughput(Throughput::Elements(TOTAL_IDS as u64));
        group.bench_function(
            format!("elems/{TOTAL_IDS}/threads/{thread_count}"),
            |b| {
                b.iter_custom(|iters| {
                    let start = Instant::now();

                    for _ in 0..iters {
                        let generator = Arc::new(generator_factory());
                        let barrier = Arc::new(Barrier::new(thread_count + 1));
                        scope(|s| {
                            for _ in 0..thread_count {
                                let generator = Arc::clone(&generator);
                                let barrier = Arc::clone(&barrier);
                                s.spawn(move || {
                                    barrier.wait();
                                    for _ in 0..ids_per_thread {
                                        black_box(generator.next_id().unwrap());
                                    }
                                });
                            }
                            barrier.wait();
                        });
                    }

                    start.elapsed()
                });
            },
        );
    }

    group.finish();
}

fn benchmark_mock_sequential(c: &mut Criterion) {
    bench_generator(c, "mock/sequential/lock", || {
        LockSnowflakeGenerator::new(1, 1, TickingMockTime {
            reads: AtomicU64::new(0),
        })
        .unwrap()
    });
}

fn benchmark_system_sequential(c: &mut Criterion) {
    let clock = SystemClock::new().unwrap();
    bench_generator(c, "system/sequential/lock", || {
        LockSnowflakeGenerator::new(1, 1, clock).unwrap()
    });
}

fn benchmark_system_contended(c: &mut Criterion) {
    let clock = SystemClock::new().unwrap();
    bench_generator_contended(c, "system/contended/lock", || {
        LockSnowflakeGenerator::new(1, 1, clock).unwrap()
    });
}

/// Claiming an identity in a namespace where half the space is held and the
/// other half is reclaimable.
fn benchmark_acquire_identity(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocator/acquire");
    group.throughput(Throughput::Elements(1));

    group.bench_function("half_reclaimable", |b| {
        b.iter_custom(|iters| {
            let mut elapsed = core::time::Duration::ZERO;

            for _ in 0..iters {
                let namespace = MemoryNamespace::new();
                let mut holders: Vec<_> = (0..1024)
                    .map(|_| {
                        let session = namespace.session();
                        SlotAllocator::new(&session, NamespaceLayout::default())
                            .acquire_identity()
                            .unwrap();
                        session
                    })
                    .collect();
                // Every other holder "crashes".
                let mut i = 0;
                holders.retain(|_| {
                    i += 1;
                    i % 2 == 0
                });

                let session = namespace.session();
                let allocator = SlotAllocator::new(&session, NamespaceLayout::default());
                let start = Instant::now();
                black_box(allocator.acquire_identity().unwrap());
                elapsed += start.elapsed();
            }

            elapsed
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_mock_sequential,
    benchmark_system_sequential,
    benchmark_system_contended,
    benchmark_acquire_identity,
);
criterion_main!(benches);
