use std::fmt;
use std::rc::Rc;

/// A unit that re-renders itself when scheduled.
///
/// The scheduler only needs the single `update` capability; diffing and
/// mutation application live behind it.
pub trait Component {
    fn update(&self);
}

/// A unit of frame work: either a one-shot callback or a component update.
pub enum Task {
    Callback(Box<dyn FnOnce()>),
    Component(Rc<dyn Component>),
}

impl Task {
    pub fn callback(f: impl FnOnce() + 'static) -> Self {
        Task::Callback(Box::new(f))
    }

    pub fn component(component: Rc<dyn Component>) -> Self {
        Task::Component(component)
    }

    pub fn run_as_scheduled_task(self) {
        match self {
            Task::Callback(f) => f(),
            Task::Component(c) => c.update(),
        }
    }
}

impl<F> From<F> for Task
where
    F: FnOnce() + 'static,
{
    fn from(f: F) -> Self {
        Task::Callback(Box::new(f))
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Callback(_) => f.write_str("Task::Callback"),
            Task::Component(_) => f.write_str("Task::Component"),
        }
    }
}
