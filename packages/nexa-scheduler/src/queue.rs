use std::cell::RefCell;
use std::collections::VecDeque;

pub type Callback = Box<dyn FnOnce()>;

/// A single-threaded FIFO queue of callbacks.
///
/// The queue is never iterated in place: a flush takes the whole batch out
/// with [`TaskQueue::take_batch`], so callbacks appended while the batch runs
/// land in a fresh container.
#[derive(Default)]
pub struct TaskQueue {
    queue: RefCell<VecDeque<Callback>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            queue: RefCell::new(VecDeque::new()),
        }
    }

    pub fn push(&self, task: Callback) {
        self.queue.borrow_mut().push_back(task);
    }

    pub fn pop(&self) -> Option<Callback> {
        self.queue.borrow_mut().pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    /// Detaches everything queued so far and leaves an empty queue behind.
    pub fn take_batch(&self) -> VecDeque<Callback> {
        std::mem::take(&mut *self.queue.borrow_mut())
    }
}
