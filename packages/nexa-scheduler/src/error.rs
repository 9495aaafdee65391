use crate::flags::Domain;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("{0} flush invoked while a {0} flush is already running")]
    ReentrantFlush(Domain),
}

/// A failure raised by a task while a flush routine was draining it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("{domain} task panicked: {message}")]
    Panicked { domain: Domain, message: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("host loop still busy after {0} turns")]
    TurnLimitExceeded(usize),
}

/// Receives task failures when the scheduler is configured to keep draining.
pub type ErrorSink = Rc<dyn Fn(TaskError)>;

/// Runs the tasks of one flush, catching panics so the flush can finish.
///
/// With a sink, every failure is reported and dropped. Without one, the
/// first payload is held and re-raised by [`Failures::finish`], which the
/// flush routine calls only after its bookkeeping is done.
pub(crate) struct Failures {
    domain: Domain,
    sink: Option<ErrorSink>,
    first: Option<Box<dyn Any + Send>>,
    count: usize,
}

impl Failures {
    pub(crate) fn new(domain: Domain, sink: Option<ErrorSink>) -> Self {
        Self {
            domain,
            sink,
            first: None,
            count: 0,
        }
    }

    pub(crate) fn run(&mut self, f: impl FnOnce()) {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(f)) {
            self.record(payload);
        }
    }

    fn record(&mut self, payload: Box<dyn Any + Send>) {
        self.count += 1;
        let message = panic_message(payload.as_ref());
        tracing::error!(domain = %self.domain, %message, "scheduled task panicked");

        match &self.sink {
            Some(sink) => sink(TaskError::Panicked {
                domain: self.domain,
                message,
            }),
            None => {
                if self.first.is_none() {
                    self.first = Some(payload);
                }
            }
        }
    }

    pub(crate) fn count(&self) -> usize {
        self.count
    }

    pub(crate) fn finish(self) {
        if let Some(payload) = self.first {
            panic::resume_unwind(payload);
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
