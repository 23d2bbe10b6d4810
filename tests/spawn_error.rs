//! Runs alone in its own test binary: lowering the descriptor limit would
//! break any test running next to it.

use nix::sys::resource::Resource;
use nix::sys::resource::getrlimit;
use nix::sys::resource::setrlimit;
use nix::sys::resource::rlim_t;

use forktask::Runtime;
use forktask::Task;
use forktask::error::SpawnError;
use forktask::error::SpawnOp;

#[test]
fn test_exhausted_descriptors() {
  let runtime: Runtime = Runtime::new();
  let (soft, hard): (rlim_t, rlim_t) = getrlimit(Resource::RLIMIT_NOFILE).unwrap();

  // Standard streams only; no room for a pipe.
  setrlimit(Resource::RLIMIT_NOFILE, 3, hard).unwrap();

  let result: Result<Task<u32>, SpawnError> = runtime.spawn(|| 1_u32);

  setrlimit(Resource::RLIMIT_NOFILE, soft, hard).unwrap();

  let error: SpawnError = result.unwrap_err();

  assert_eq!(error.op(), SpawnOp::Pipe);
  assert_eq!(error.io_error().raw_os_error(), Some(libc::EMFILE));
  assert_eq!(runtime.pending(), 0);

  let task: Task<u32> = runtime.spawn(|| 2_u32).unwrap();

  assert_eq!(task.get().unwrap(), 2);
  assert_eq!(runtime.pending(), 0);
}
