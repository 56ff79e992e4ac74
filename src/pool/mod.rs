//! Self-managed worker pool.
//!
//! A bounded task queue serviced by a dynamically sized set of worker
//! threads, resized by a dedicated manager thread.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                        ThreadPool                          │
//! ├────────────────────────────────────────────────────────────┤
//! │   submit() ──► ┌──────────────────────┐  ◄── not_full      │
//! │                │  TaskQueue (ring)    │                    │
//! │                └──────────┬───────────┘  ──► not_empty     │
//! │                           │                                │
//! │       ┌─────────┐    ┌────▼────┐    ┌─────────┐            │
//! │       │ Worker0 │    │ Worker1 │    │ Worker2 │  ...       │
//! │       └─────────┘    └─────────┘    └─────────┘            │
//! │            ▲  spawn (grow)   ▲  kill credits (shrink)      │
//! │            └────────┬────────┘                             │
//! │                ┌────┴────┐                                 │
//! │                │ Manager │  (once per scaling period)      │
//! │                └─────────┘                                 │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Queue, live count, kill credits, shutdown flag and thread registry sit
//! behind one lock; the working count has its own.

mod error;
mod manager;
mod queue;
mod state;
mod thread;
mod worker;

pub use error::{PoolError, PoolResult};
pub use queue::{Task, TaskQueue};
pub use thread::ThreadPool;

use serde::Serialize;

/// Point-in-time view of a pool's counters.
///
/// Values are read under the pool's locks but may be stale as soon as they
/// are returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Workers alive (idle or busy).
    pub live: usize,
    /// Workers running a task.
    pub working: usize,
    /// Workers waiting for a task.
    pub idle: usize,
    /// Tasks waiting in the queue.
    pub queued: usize,
    /// Queue capacity.
    pub capacity: usize,
    /// Shrink requests not yet taken up by a worker.
    pub pending_kill: usize,
    pub min_threads: usize,
    pub max_threads: usize,
    pub shutdown: bool,
}

impl PoolStats {
    /// Fraction of live workers that are busy (0.0 with no live workers).
    pub fn utilization(&self) -> f64 {
        if self.live == 0 {
            0.0
        } else {
            self.working as f64 / self.live as f64
        }
    }
}
