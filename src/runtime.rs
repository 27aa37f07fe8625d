//! Single-threaded async runtime glue.
//!
//! ```text
//!   futures_lite::future::block_on            (drives the caller's future)
//!     └─ edge_executor::LocalExecutor::run    (drives spawned tasks)
//!          ├─ deferred handler replies
//!          ├─ server-side stream pumps
//!          ├─ inactivity watchdog ── async_io_mini::Timer
//!          └─ keepalive ticker    ── async_io_mini::Timer
//! ```
//!
//! Channels are `!Send` (they share state through `Rc`), so everything runs
//! on one thread. The executor is shared by `Rc` between every channel on it.

use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

/// Nominal run-queue size. The crate enables edge-executor's `unbounded`
/// queue, so bursts of deferred replies and served streams grow past it
/// instead of failing to schedule.
pub const TASK_QUEUE_DEPTH: usize = 64;

pub type Executor = edge_executor::LocalExecutor<'static, TASK_QUEUE_DEPTH>;

pub type Task<T> = edge_executor::Task<T>;

pub fn new_executor() -> Rc<Executor> {
    Rc::new(Executor::new())
}

/// Drive `future` to completion on the current thread, running the
/// executor's tasks alongside it.
pub fn block_on<T>(executor: &Executor, future: impl Future<Output = T>) -> T {
    futures_lite::future::block_on(executor.run(future))
}

pub async fn sleep(duration: Duration) {
    async_io_mini::Timer::after(duration).await;
}

/// Yield `n` times so queued tasks get a chance to run.
pub async fn yield_times(n: usize) {
    for _ in 0..n {
        futures_lite::future::yield_now().await;
    }
}
