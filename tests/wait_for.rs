use std::num::NonZeroUsize;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use forktask::Ready;
use forktask::Runtime;
use forktask::Task;

// Deterministic spread of sleep durations between 1 and 20 ms.
fn sleep_ms(index: u64) -> u64 {
  1 + (index.wrapping_mul(2_654_435_761) >> 7) % 20
}

fn sleeper(index: u64) -> u64 {
  thread::sleep(Duration::from_millis(sleep_ms(index)));
  index
}

#[test]
fn test_yields_every_task_once() {
  let runtime: Runtime = Runtime::new();
  let started: Instant = Instant::now();

  let mut pending: Vec<Task<u64>> = (0..50).map(|index| runtime.spawn(move || sleeper(index)).unwrap()).collect();

  let mut seen: Vec<u64> = forktask::wait_for(&mut pending, None)
    .filter_map(Ready::into_task)
    .map(|task| task.get().unwrap())
    .collect();

  seen.sort_unstable();

  assert_eq!(seen, (0..50).collect::<Vec<u64>>());
  assert!(pending.is_empty());
  assert!(started.elapsed() < Duration::from_secs(20), "{:?}", started.elapsed());
}

#[test]
fn test_no_slot_before_first_done() {
  let runtime: Runtime = Runtime::new();

  let mut pending: Vec<Task<u64>> = (0..3).map(|index| runtime.spawn(move || sleeper(index)).unwrap()).collect();
  let mut waiting = forktask::wait_for(&mut pending, NonZeroUsize::new(3));

  assert!(matches!(waiting.next(), Some(Ready::Done(_))));

  let rest: Vec<Ready<u64>> = waiting.collect();
  let done: usize = rest.iter().filter(|ready| !ready.is_slot()).count();

  assert_eq!(done, 2);
}

#[test]
fn test_capacity_throttles_submission() {
  let runtime: Runtime = Runtime::new();
  let capacity: NonZeroUsize = NonZeroUsize::new(4).unwrap();

  let mut inputs = 0..16_u64;
  let mut pending: Vec<Task<u64>> = Vec::new();
  let mut waiting = forktask::wait_for(&mut pending, Some(capacity));
  let mut results: Vec<u64> = Vec::new();

  while let Some(ready) = waiting.next() {
    match ready {
      Ready::Done(task) => results.push(task.get().unwrap()),
      Ready::Slot => {
        assert!(waiting.len() < capacity.get());

        if let Some(input) = inputs.next() {
          waiting.push(runtime.spawn(move || sleeper(input) * 10).unwrap());
        }
      }
    }

    assert!(waiting.len() <= capacity.get());
  }

  results.sort_unstable();

  assert_eq!(results, (0..16).map(|input| input * 10).collect::<Vec<u64>>());
}
