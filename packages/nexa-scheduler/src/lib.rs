//! Cooperative frame scheduler for the Nexa rendering pipeline.
//!
//! Work is batched into three timing domains driven by a single-threaded
//! host event loop:
//!
//! - **microtasks** drain to a fixpoint, in waves, before the host moves on;
//! - **macrotasks** run one batch per host-loop turn;
//! - **frames** run once per display refresh, with writes ordered by tree
//!   depth, then plain writes, then reads, and after-tasks last.
//!
//! ```
//! use nexa_scheduler::{LocalHost, Scheduler};
//! use std::rc::Rc;
//!
//! let host = Rc::new(LocalHost::new());
//! let scheduler = Scheduler::new(host.clone());
//!
//! let frame = scheduler.next_frame();
//! frame.write(|| println!("mutate"));
//! frame.read(|| println!("measure"));
//!
//! host.render();
//! assert_eq!(scheduler.clock(), 2);
//! ```

pub mod error;
pub mod flags;
pub mod frame;
pub mod host;
pub mod queue;
pub mod scheduler;
pub mod task;

use queue::Callback;

/// Callback registration primitives of the host environment.
///
/// Each request must invoke its callback exactly once, asynchronously. The
/// scheduler keeps at most one request per domain outstanding.
pub trait Host {
    /// Run `callback` before the host proceeds to macrotask-tier work.
    fn request_microtask(&self, callback: Callback);

    /// Run `callback` in a later host-loop turn.
    fn request_macrotask(&self, callback: Callback);

    /// Run `callback` at the next display refresh.
    fn request_animation_frame(&self, callback: Callback);
}

pub use error::{HostError, SchedulerError, TaskError};
pub use flags::{Domain, DomainState, FrameFlags, SchedulerFlags};
pub use frame::Frame;
pub use host::LocalHost;
pub use scheduler::{ExecutedTasks, Scheduler, SchedulerBuilder, SchedulerSnapshot};
pub use task::{Component, Task};
