use criterion::BenchmarkGroup;
use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::criterion_group;
use criterion::criterion_main;
use forktask::Runtime;
use forktask::Task;
use std::hint::black_box;
use std::sync::Arc;
use std::sync::Barrier;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;
use std::time::Instant;

const THREADS: &[usize] = &[2, 4, 8];
const PAYLOADS: &[usize] = &[0, 1 << 10, 1 << 16, 1 << 20];

fn bench_spawn(criterion: &mut Criterion) {
  let mut group: BenchmarkGroup<_> = criterion.benchmark_group("spawn");
  let runtime: Runtime = Runtime::new();

  group.sample_size(20);

  group.bench_function("single-threaded", |bench| {
    bench.iter(|| {
      let task: Task<u64> = runtime.spawn(|| black_box(7_u64) * 7).unwrap();
      black_box(task.get().unwrap());
    })
  });

  for threads in THREADS {
    let id: BenchmarkId = BenchmarkId::new("multi-threaded", threads);

    group.bench_with_input(id, threads, |bench, &threads| {
      bench.iter_custom(|iters| {
        let barrier: Arc<Barrier> = Arc::new(Barrier::new(threads + 1));
        let mut handles: Vec<JoinHandle<Duration>> = Vec::with_capacity(threads);

        for _ in 0..threads {
          let barrier: Arc<Barrier> = barrier.clone();
          let runtime: Runtime = runtime.clone();

          let handle: JoinHandle<Duration> = thread::spawn(move || {
            barrier.wait();

            let start: Instant = Instant::now();

            for _ in 0..iters {
              let task: Task<u64> = runtime.spawn(|| black_box(7_u64) * 7).unwrap();
              black_box(task.get().unwrap());
            }

            start.elapsed()
          });

          handles.push(handle);
        }

        barrier.wait();

        handles
          .into_iter()
          .map(|handle| handle.join().unwrap())
          .sum()
      })
    });
  }

  group.finish();
}

fn bench_payload(criterion: &mut Criterion) {
  let mut group: BenchmarkGroup<_> = criterion.benchmark_group("payload");
  let runtime: Runtime = Runtime::new();

  group.sample_size(20);

  for size in PAYLOADS {
    let id: BenchmarkId = BenchmarkId::from_parameter(size);

    group.bench_with_input(id, size, |bench, &size| {
      bench.iter(|| {
        let task: Task<Vec<u8>> = runtime.spawn(move || vec![0; size]).unwrap();
        black_box(task.get().unwrap());
      })
    });
  }

  group.finish();
}

criterion_group!(benches, bench_spawn, bench_payload);
criterion_main!(benches);
