use crate::flags::FrameFlags;
use crate::task::{Component, Task};
use smallvec::SmallVec;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

type TaskGroup = SmallVec<[Task; 4]>;

/// Task container for one rendering cycle.
///
/// A frame pass drains it in write/read alternation: priority-grouped writes
/// (ascending rank), then plain writes, then reads, repeated until no write
/// is left; after-tasks run once that has quiesced.
#[derive(Default)]
pub struct Frame {
    flags: Cell<FrameFlags>,
    write_tasks: RefCell<Vec<Task>>,
    /// Indexed by rank. Drained slots are set back to `None`.
    write_task_groups: RefCell<Vec<Option<TaskGroup>>>,
    read_tasks: RefCell<Vec<Task>>,
    after_tasks: RefCell<Vec<Task>>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flags(&self) -> FrameFlags {
        self.flags.get()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.get().is_empty()
    }

    /// Queues a plain write (DOM mutation, no ordering between writes).
    pub fn write(&self, task: impl Into<Task>) {
        self.set_flag(FrameFlags::WRITE);
        self.write_tasks.borrow_mut().push(task.into());
    }

    /// Queues a write in the group for `rank`. Lower ranks drain first.
    pub fn write_prio(&self, rank: usize, task: impl Into<Task>) {
        self.set_flag(FrameFlags::WRITE_PRIO);
        let mut groups = self.write_task_groups.borrow_mut();
        if groups.len() <= rank {
            groups.resize_with(rank + 1, || None);
        }
        groups[rank].get_or_insert_with(SmallVec::new).push(task.into());
    }

    /// Schedules `component.update()` ordered by its depth in the tree.
    pub fn update_component(&self, component: Rc<dyn Component>, depth: usize) {
        self.write_prio(depth, Task::component(component));
    }

    /// Queues a layout read. Reads run after every pending write.
    pub fn read(&self, task: impl Into<Task>) {
        self.set_flag(FrameFlags::READ);
        self.read_tasks.borrow_mut().push(task.into());
    }

    /// Queues a task that runs once writes and reads have quiesced.
    pub fn after(&self, task: impl Into<Task>) {
        self.set_flag(FrameFlags::AFTER);
        self.after_tasks.borrow_mut().push(task.into());
    }

    fn set_flag(&self, flag: FrameFlags) {
        self.flags.set(self.flags.get() | flag);
    }

    /// Clears `flag` and reports whether it was set.
    fn take_flag(&self, flag: FrameFlags) -> bool {
        let flags = self.flags.get();
        if flags.contains(flag) {
            self.flags.set(flags - flag);
            true
        } else {
            false
        }
    }

    /// Drains the frame, handing every task to `run_task` in pass order.
    ///
    /// Returns how many write/read iterations ran. A task that keeps
    /// scheduling writes into this frame keeps the pass alive; bounding that
    /// is up to the caller.
    pub(crate) fn run(&self, run_task: &mut dyn FnMut(Task)) -> usize {
        let mut iterations = 0;

        loop {
            loop {
                iterations += 1;

                while self.take_flag(FrameFlags::WRITE_PRIO) {
                    self.drain_write_groups(run_task);
                }

                while self.take_flag(FrameFlags::WRITE) {
                    let tasks = std::mem::take(&mut *self.write_tasks.borrow_mut());
                    tasks.into_iter().for_each(&mut *run_task);
                }

                while self.take_flag(FrameFlags::READ) {
                    let tasks = std::mem::take(&mut *self.read_tasks.borrow_mut());
                    tasks.into_iter().for_each(&mut *run_task);
                }

                if !self.flags().intersects(FrameFlags::WRITE_ANY) {
                    break;
                }
            }

            if !self.take_flag(FrameFlags::AFTER) {
                break;
            }
            let tasks = std::mem::take(&mut *self.after_tasks.borrow_mut());
            tasks.into_iter().for_each(&mut *run_task);

            // After-tasks may have queued more work into this frame.
            if self.is_empty() {
                break;
            }
        }

        iterations
    }

    fn drain_write_groups(&self, run_task: &mut dyn FnMut(Task)) {
        let mut rank = 0;
        loop {
            let group = {
                let mut groups = self.write_task_groups.borrow_mut();
                match groups.get_mut(rank) {
                    Some(slot) => slot.take(),
                    None => break,
                }
            };
            if let Some(group) = group {
                group.into_iter().for_each(&mut *run_task);
            }
            rank += 1;
        }
    }

    pub(crate) fn pending_tasks(&self) -> usize {
        let groups: usize = self
            .write_task_groups
            .borrow()
            .iter()
            .flatten()
            .map(|group| group.len())
            .sum();
        groups
            + self.write_tasks.borrow().len()
            + self.read_tasks.borrow().len()
            + self.after_tasks.borrow().len()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("flags", &self.flags.get())
            .field("pending_tasks", &self.pending_tasks())
            .finish()
    }
}
