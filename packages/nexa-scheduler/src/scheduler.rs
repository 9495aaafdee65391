use crate::Host;
use crate::error::{ErrorSink, Failures, SchedulerError, TaskError};
use crate::flags::{Domain, DomainState, SchedulerFlags};
use crate::frame::Frame;
use crate::queue::{Callback, TaskQueue};
use crate::task::Task;
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// Coordinates microtask, macrotask and frame work on a single thread.
///
/// Each domain keeps at most one host registration outstanding. Scheduling
/// into any domain from inside any running flush is allowed; the new work
/// lands in a detached container and runs per the domain's rules (next wave,
/// next turn, or this/next frame pass). Flushes only run from host
/// callbacks; one that fires while its own domain is already running is
/// rejected and re-requested.
pub struct Scheduler {
    this: Weak<Scheduler>,
    host: Rc<dyn Host>,
    flags: Cell<SchedulerFlags>,
    clock: Cell<u64>,
    microtasks: TaskQueue,
    macrotasks: TaskQueue,
    current: RefCell<Rc<Frame>>,
    next: RefCell<Rc<Frame>>,
    executed: Cell<ExecutedTasks>,
    error_sink: Option<ErrorSink>,
    max_frame_iterations: Option<usize>,
}

#[derive(Default)]
pub struct SchedulerBuilder {
    error_sink: Option<ErrorSink>,
    max_frame_iterations: Option<usize>,
}

impl SchedulerBuilder {
    /// Report task failures here and keep draining instead of re-raising
    /// the first one once the flush has finished its bookkeeping.
    pub fn error_sink(mut self, sink: impl Fn(TaskError) + 'static) -> Self {
        self.error_sink = Some(Rc::new(sink));
        self
    }

    /// Warn when a frame pass needs more write/read iterations than this.
    pub fn max_frame_iterations(mut self, iterations: usize) -> Self {
        self.max_frame_iterations = Some(iterations);
        self
    }

    pub fn build(self, host: Rc<dyn Host>) -> Rc<Scheduler> {
        Rc::new_cyclic(|this| Scheduler {
            this: this.clone(),
            host,
            flags: Cell::new(SchedulerFlags::empty()),
            clock: Cell::new(1),
            microtasks: TaskQueue::new(),
            macrotasks: TaskQueue::new(),
            current: RefCell::new(Rc::new(Frame::new())),
            next: RefCell::new(Rc::new(Frame::new())),
            executed: Cell::new(ExecutedTasks::default()),
            error_sink: self.error_sink,
            max_frame_iterations: self.max_frame_iterations,
        })
    }
}

/// Running totals of tasks handed to each domain's flush.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ExecutedTasks {
    pub microtasks: u64,
    pub macrotasks: u64,
    pub frame_tasks: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct SchedulerSnapshot {
    pub clock: u64,
    pub flags: u32,
    pub microtask: DomainState,
    pub macrotask: DomainState,
    pub frame: DomainState,
    pub pending_microtasks: usize,
    pub pending_macrotasks: usize,
    pub pending_frame_tasks: usize,
    pub executed: ExecutedTasks,
}

impl Scheduler {
    pub fn new(host: Rc<dyn Host>) -> Rc<Self> {
        Self::builder().build(host)
    }

    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::default()
    }

    pub fn clock(&self) -> u64 {
        self.clock.get()
    }

    pub fn flags(&self) -> SchedulerFlags {
        self.flags.get()
    }

    pub fn domain_state(&self, domain: Domain) -> DomainState {
        self.flags.get().domain_state(domain)
    }

    pub fn executed(&self) -> ExecutedTasks {
        self.executed.get()
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        let flags = self.flags.get();
        SchedulerSnapshot {
            clock: self.clock.get(),
            flags: flags.bits(),
            microtask: flags.domain_state(Domain::Microtask),
            macrotask: flags.domain_state(Domain::Macrotask),
            frame: flags.domain_state(Domain::Frame),
            pending_microtasks: self.microtasks.len(),
            pending_macrotasks: self.macrotasks.len(),
            pending_frame_tasks: self.current.borrow().pending_tasks()
                + self.next.borrow().pending_tasks(),
            executed: self.executed.get(),
        }
    }

    pub fn schedule_microtask(&self, task: impl FnOnce() + 'static) {
        self.microtasks.push(Box::new(task));
        self.arm(Domain::Microtask);
    }

    pub fn schedule_macrotask(&self, task: impl FnOnce() + 'static) {
        self.macrotasks.push(Box::new(task));
        self.arm(Domain::Macrotask);
    }

    /// The frame that the upcoming pass will drain. Arms the frame
    /// registration if none is outstanding.
    pub fn next_frame(&self) -> Rc<Frame> {
        self.arm(Domain::Frame);
        self.next.borrow().clone()
    }

    /// The frame of the pass in progress, or of the last completed one.
    ///
    /// Tasks running inside a frame pass use this to add work to that same
    /// pass.
    pub fn current_frame(&self) -> Rc<Frame> {
        self.current.borrow().clone()
    }

    /// Drains microtasks in waves until a wave schedules nothing new.
    pub(crate) fn flush_microtasks(&self) -> Result<(), SchedulerError> {
        let guard = FlushGuard::enter(self, Domain::Microtask)?;
        let mut failures = Failures::new(Domain::Microtask, self.error_sink.clone());

        let mut waves = 0;
        let mut executed = 0;
        loop {
            let batch = self.microtasks.take_batch();
            if batch.is_empty() {
                break;
            }
            waves += 1;
            executed += batch.len();
            for task in batch {
                failures.run(task);
            }
        }

        tracing::debug!(
            waves,
            executed,
            failed = failures.count(),
            "microtask flush complete"
        );
        self.add_executed(Domain::Microtask, executed);
        drop(guard);
        failures.finish();
        Ok(())
    }

    /// Runs the macrotasks queued before this call, once.
    pub(crate) fn flush_macrotasks(&self) -> Result<(), SchedulerError> {
        let guard = FlushGuard::enter(self, Domain::Macrotask)?;
        self.remove_flags(SchedulerFlags::MACROTASK_PENDING);
        let mut failures = Failures::new(Domain::Macrotask, self.error_sink.clone());

        let batch = self.macrotasks.take_batch();
        let executed = batch.len();
        for task in batch {
            failures.run(task);
        }

        tracing::debug!(executed, failed = failures.count(), "macrotask flush complete");
        self.add_executed(Domain::Macrotask, executed);
        drop(guard);
        failures.finish();
        Ok(())
    }

    /// Swaps the frames and drains the one that was `next`.
    pub(crate) fn flush_frame(&self) -> Result<(), SchedulerError> {
        let guard = FlushGuard::enter(self, Domain::Frame)?;
        self.remove_flags(SchedulerFlags::FRAMETASK_PENDING);
        std::mem::swap(&mut *self.current.borrow_mut(), &mut *self.next.borrow_mut());

        let frame = self.current_frame();
        let mut failures = Failures::new(Domain::Frame, self.error_sink.clone());
        let mut executed = 0;
        let iterations = frame.run(&mut |task: Task| {
            executed += 1;
            failures.run(|| task.run_as_scheduled_task());
        });

        if let Some(limit) = self.max_frame_iterations {
            if iterations > limit {
                tracing::warn!(
                    iterations,
                    limit,
                    "frame pass kept scheduling writes into itself"
                );
            }
        }

        tracing::debug!(
            iterations,
            executed,
            failed = failures.count(),
            "frame flush complete"
        );
        self.add_executed(Domain::Frame, executed);
        drop(guard);

        // Work pushed into `current_frame()` outside of a pass ends up in
        // the frame that just became `next`.
        if !self.next.borrow().is_empty() {
            self.arm(Domain::Frame);
        }

        failures.finish();
        Ok(())
    }

    pub(crate) fn flush(&self, domain: Domain) -> Result<(), SchedulerError> {
        match domain {
            Domain::Microtask => self.flush_microtasks(),
            Domain::Macrotask => self.flush_macrotasks(),
            Domain::Frame => self.flush_frame(),
        }
    }

    fn arm(&self, domain: Domain) {
        let pending = domain.pending_flag();
        if self.flags.get().contains(pending) {
            return;
        }
        self.insert_flags(pending);
        tracing::trace!(%domain, clock = self.clock.get(), "requesting host callback");
        self.request_host(domain);
    }

    fn request_host(&self, domain: Domain) {
        let this = self.this.clone();
        let callback: Callback = Box::new(move || {
            if let Some(scheduler) = this.upgrade() {
                scheduler.on_host_callback(domain);
            }
        });
        match domain {
            Domain::Microtask => self.host.request_microtask(callback),
            Domain::Macrotask => self.host.request_macrotask(callback),
            Domain::Frame => self.host.request_animation_frame(callback),
        }
    }

    fn on_host_callback(&self, domain: Domain) {
        if let Err(err) = self.flush(domain) {
            // The running microtask flush drains to a fixpoint and clears
            // the pending bit itself. For the other domains the spent
            // registration must be replaced, since the pending bit is set.
            tracing::warn!(%err, "host callback fired during its own flush");
            if domain != Domain::Microtask {
                self.request_host(domain);
            }
        }
    }

    fn add_executed(&self, domain: Domain, count: usize) {
        let mut executed = self.executed.get();
        let count = count as u64;
        match domain {
            Domain::Microtask => executed.microtasks += count,
            Domain::Macrotask => executed.macrotasks += count,
            Domain::Frame => executed.frame_tasks += count,
        }
        self.executed.set(executed);
    }

    fn insert_flags(&self, flags: SchedulerFlags) {
        self.flags.set(self.flags.get() | flags);
    }

    fn remove_flags(&self, flags: SchedulerFlags) {
        self.flags.set(self.flags.get() - flags);
    }
}

/// Marks a domain as running for the lifetime of a flush.
///
/// Dropping it clears the running bits and advances the clock, on normal
/// return and on unwind alike.
struct FlushGuard<'a> {
    scheduler: &'a Scheduler,
    domain: Domain,
}

impl<'a> FlushGuard<'a> {
    fn enter(scheduler: &'a Scheduler, domain: Domain) -> Result<Self, SchedulerError> {
        if scheduler.flags.get().contains(domain.running_flag()) {
            return Err(SchedulerError::ReentrantFlush(domain));
        }
        scheduler.insert_flags(SchedulerFlags::RUNNING | domain.running_flag());
        tracing::trace!(%domain, clock = scheduler.clock.get(), "flush started");
        Ok(Self { scheduler, domain })
    }
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        let scheduler = self.scheduler;
        let mut done = self.domain.running_flag();
        if self.domain == Domain::Microtask {
            done |= SchedulerFlags::MICROTASK_PENDING;
        }
        scheduler.remove_flags(done);
        if !scheduler.flags.get().any_running() {
            scheduler.remove_flags(SchedulerFlags::RUNNING);
        }
        scheduler.clock.set(scheduler.clock.get() + 1);
        tracing::trace!(domain = %self.domain, clock = scheduler.clock.get(), "flush finished");
    }
}
