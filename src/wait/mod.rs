//! Completion-waiting combinator.
//!
//! [`wait_for`] turns a set of pending handles into a sequence of finished
//! ones, optionally signalling when the set drops below a capacity so the
//! caller can submit more work.
//!
//! ```no_run
//! use std::num::NonZeroUsize;
//!
//! use forktask::Ready;
//! use forktask::Task;
//!
//! let mut inputs = 0_u64..100;
//! let mut pending: Vec<Task<u64>> = Vec::new();
//! let mut waiting = forktask::wait_for(&mut pending, NonZeroUsize::new(8));
//!
//! while let Some(ready) = waiting.next() {
//!   match ready {
//!     Ready::Done(task) => println!("{}", task.get().unwrap()),
//!     Ready::Slot => {
//!       if let Some(input) = inputs.next() {
//!         waiting.push(forktask::spawn(move || input * input).unwrap());
//!       }
//!     }
//!   }
//! }
//! ```

use std::collections::VecDeque;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::fmt::Result;
use std::iter::FusedIterator;
use std::num::NonZeroUsize;
use std::thread;
use std::time::Duration;

use crate::consts;
use crate::task::Task;

/// Waits for the handles in `pending` to finish.
///
/// Finished handles are removed from `pending` and yielded in the order
/// they are found. When `capacity` is set and fewer than `capacity` handles
/// are pending, each round also yields one [`Ready::Slot`]. The sequence
/// ends once `pending` is empty at the end of a round.
///
/// `pending` is borrowed for the whole iteration; submit new tasks through
/// [`WaitFor::push`].
#[inline]
pub fn wait_for<T>(pending: &mut Vec<Task<T>>, capacity: Option<NonZeroUsize>) -> WaitFor<'_, T> {
  WaitFor {
    pending,
    capacity,
    interval: consts::WAIT_INTERVAL,
    found: VecDeque::new(),
    stage: Stage::Scan,
    idle: true,
  }
}

// -----------------------------------------------------------------------------
// Ready
// -----------------------------------------------------------------------------

/// An item yielded by [`WaitFor`].
pub enum Ready<T> {
  /// A handle that has finished; reading it does not block.
  Done(Task<T>),
  /// The pending set is below capacity.
  Slot,
}

impl<T> Ready<T> {
  /// Returns the finished handle, if this is [`Ready::Done`].
  #[inline]
  pub fn into_task(self) -> Option<Task<T>> {
    match self {
      Self::Done(task) => Some(task),
      Self::Slot => None,
    }
  }

  #[inline]
  pub const fn is_slot(&self) -> bool {
    matches!(self, Self::Slot)
  }
}

impl<T> Debug for Ready<T> {
  fn fmt(&self, f: &mut Formatter<'_>) -> Result {
    match self {
      Self::Done(task) => f.debug_tuple("Done").field(task).finish(),
      Self::Slot => f.write_str("Slot"),
    }
  }
}

// -----------------------------------------------------------------------------
// Wait For
// -----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
  Scan,
  Drain,
  Slot,
  Check,
  Done,
}

/// Iterator returned by [`wait_for`].
pub struct WaitFor<'a, T> {
  pending: &'a mut Vec<Task<T>>,
  capacity: Option<NonZeroUsize>,
  interval: Duration,
  found: VecDeque<Task<T>>,
  stage: Stage,
  idle: bool,
}

impl<T> WaitFor<'_, T> {
  /// Sets how long a round that finds nothing sleeps before the next scan.
  #[inline]
  pub fn interval(mut self, interval: Duration) -> Self {
    self.interval = interval;
    self
  }

  /// Adds a handle to the pending set.
  ///
  /// Has no effect on a sequence that already ended.
  #[inline]
  pub fn push(&mut self, task: Task<T>) {
    self.pending.push(task);
  }

  /// Returns the number of pending handles.
  #[inline]
  pub fn len(&self) -> usize {
    self.pending.len() + self.found.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  fn scan(&mut self) {
    let mut index: usize = 0;

    while index < self.pending.len() {
      if self.pending[index].is_done() {
        self.found.push_back(self.pending.remove(index));
      } else {
        index += 1;
      }
    }
  }

  fn has_slot(&self) -> bool {
    self
      .capacity
      .is_some_and(|capacity| self.pending.len() < capacity.get())
  }
}

impl<T> Iterator for WaitFor<'_, T> {
  type Item = Ready<T>;

  fn next(&mut self) -> Option<Self::Item> {
    loop {
      match self.stage {
        Stage::Scan => {
          self.scan();
          self.stage = Stage::Drain;
        }
        Stage::Drain => match self.found.pop_front() {
          Some(task) => {
            self.idle = false;
            return Some(Ready::Done(task));
          }
          None => self.stage = Stage::Slot,
        },
        Stage::Slot => {
          self.stage = Stage::Check;

          if self.has_slot() {
            return Some(Ready::Slot);
          }
        }
        Stage::Check => {
          if self.pending.is_empty() {
            self.stage = Stage::Done;
            return None;
          }

          if self.idle {
            thread::sleep(self.interval);
          }

          self.idle = true;
          self.stage = Stage::Scan;
        }
        Stage::Done => return None,
      }
    }
  }
}

impl<T> FusedIterator for WaitFor<'_, T> {}

impl<T> Debug for WaitFor<'_, T> {
  fn fmt(&self, f: &mut Formatter<'_>) -> Result {
    f.debug_struct("WaitFor")
      .field("pending", &self.len())
      .field("capacity", &self.capacity)
      .field("interval", &self.interval)
      .finish_non_exhaustive()
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use std::num::NonZeroUsize;
  use std::time::Duration;

  use crate::core::WorkerId;
  use crate::task::Resolver;
  use crate::task::Task;
  use crate::task::pair;
  use crate::wait::Ready;
  use crate::wait::wait_for;

  fn pending(count: i32) -> (Vec<Task<i32>>, Vec<Resolver<i32>>) {
    (1..=count).map(|raw| pair(WorkerId::from_raw(raw))).unzip()
  }

  #[test]
  fn test_empty_set_ends() {
    let mut pending: Vec<Task<i32>> = Vec::new();

    assert!(wait_for(&mut pending, None).next().is_none());
  }

  #[test]
  fn test_empty_set_with_capacity_yields_slot() {
    let mut pending: Vec<Task<i32>> = Vec::new();
    let mut waiting = wait_for(&mut pending, NonZeroUsize::new(2));

    assert!(waiting.next().is_some_and(|ready| ready.is_slot()));
    assert!(waiting.next().is_none());
    assert!(waiting.next().is_none());
  }

  #[test]
  fn test_yields_finished_in_scan_order() {
    let (mut tasks, resolvers): (Vec<Task<i32>>, Vec<Resolver<i32>>) = pending(3);

    for (value, resolver) in resolvers.into_iter().enumerate() {
      resolver.complete(Ok(value as i32));
    }

    let values: Vec<i32> = wait_for(&mut tasks, None)
      .filter_map(Ready::into_task)
      .map(|task| task.get().unwrap())
      .collect();

    assert_eq!(values, [0, 1, 2]);
    assert!(tasks.is_empty());
  }

  #[test]
  fn test_full_capacity_waits_for_done() {
    let (mut tasks, mut resolvers): (Vec<Task<i32>>, Vec<Resolver<i32>>) = pending(2);
    let last: Resolver<i32> = resolvers.pop().unwrap();
    let first: Resolver<i32> = resolvers.pop().unwrap();

    let thread = std::thread::spawn(move || {
      std::thread::sleep(Duration::from_millis(20));
      last.complete(Ok(2));
    });

    let mut waiting = wait_for(&mut tasks, NonZeroUsize::new(2));

    let Some(Ready::Done(task)) = waiting.next() else {
      panic!("expected a finished task before any slot");
    };

    assert_eq!(task.get().unwrap(), 2);
    assert!(waiting.next().is_some_and(|ready| ready.is_slot()));
    assert_eq!(waiting.len(), 1);

    first.complete(Ok(1));

    let rest: Vec<Ready<i32>> = waiting.collect();

    assert!(matches!(rest.as_slice(), [Ready::Done(_), Ready::Slot]));
    thread.join().unwrap();
  }

  #[test]
  fn test_push_on_slot() {
    let mut tasks: Vec<Task<i32>> = Vec::new();
    let mut waiting = wait_for(&mut tasks, NonZeroUsize::new(1)).interval(Duration::ZERO);
    let mut submitted: i32 = 0;
    let mut finished: i32 = 0;

    while let Some(ready) = waiting.next() {
      match ready {
        Ready::Done(task) => finished += task.get().unwrap(),
        Ready::Slot if submitted < 5 => {
          submitted += 1;

          let (task, resolver): (Task<i32>, Resolver<i32>) = pair(WorkerId::from_raw(submitted));
          resolver.complete(Ok(submitted));
          waiting.push(task);
        }
        Ready::Slot => {}
      }
    }

    assert_eq!(submitted, 5);
    assert_eq!(finished, 15);
  }
}
