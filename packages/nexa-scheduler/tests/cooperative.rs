use nexa_scheduler::{Domain, DomainState, LocalHost, Scheduler, SchedulerFlags};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[test]
fn test_scheduler_yielding() {
    let host = Rc::new(LocalHost::new());
    let scheduler = Scheduler::new(host.clone());

    // Initially idle
    assert!(host.is_idle());
    assert!(!host.tick());
    assert_eq!(scheduler.clock(), 1);

    scheduler.schedule_microtask(|| {});
    assert!(!host.is_idle());
    assert_eq!(
        scheduler.domain_state(Domain::Microtask),
        DomainState::Pending
    );

    // Tick drains it, so nothing is left pending afterwards.
    assert!(!host.tick());
    assert!(host.is_idle());
    assert_eq!(scheduler.domain_state(Domain::Microtask), DomainState::Idle);
    assert_eq!(scheduler.flags(), SchedulerFlags::empty());
}

#[test]
fn test_next_frame_arms_one_registration() {
    let host = Rc::new(LocalHost::new());
    let scheduler = Scheduler::new(host.clone());

    let first = scheduler.next_frame();
    for _ in 0..10 {
        let frame = scheduler.next_frame();
        assert!(Rc::ptr_eq(&first, &frame));
        frame.write(|| {});
    }

    assert_eq!(host.pending_animation_frames(), 1);
    assert!(scheduler.flags().contains(SchedulerFlags::FRAMETASK_PENDING));

    assert_eq!(host.render(), 1);
    assert_eq!(scheduler.executed().frame_tasks, 10);
    assert!(host.is_idle());
}

#[test]
fn test_frames_swap_each_pass() {
    let host = Rc::new(LocalHost::new());
    let scheduler = Scheduler::new(host.clone());
    let seen = Rc::new(RefCell::new(None));

    let next = scheduler.next_frame();
    let before = scheduler.current_frame();
    assert!(!Rc::ptr_eq(&next, &before));

    {
        let sch = scheduler.clone();
        let seen = seen.clone();
        next.write(move || {
            *seen.borrow_mut() = Some((sch.current_frame(), sch.next_frame()));
        });
    }
    host.render();

    let (current_in_pass, next_in_pass) = seen.borrow_mut().take().unwrap();
    assert!(Rc::ptr_eq(&current_in_pass, &next));
    assert!(Rc::ptr_eq(&next_in_pass, &before));
    assert!(Rc::ptr_eq(&scheduler.current_frame(), &next));

    // The write above called next_frame(), which armed the following pass.
    assert!(host.has_pending_frame());
}

#[test]
fn test_domain_state_machine_inside_flushes() {
    let host = Rc::new(LocalHost::new());
    let scheduler = Scheduler::new(host.clone());
    let states = Rc::new(RefCell::new(Vec::new()));

    {
        let sch = scheduler.clone();
        let states = states.clone();
        scheduler.schedule_macrotask(move || {
            states.borrow_mut().push(sch.domain_state(Domain::Macrotask));
            sch.schedule_macrotask(|| {});
            states.borrow_mut().push(sch.domain_state(Domain::Macrotask));
            assert!(sch.flags().contains(SchedulerFlags::RUNNING));
        });
    }

    host.run_macrotask();
    assert_eq!(
        *states.borrow(),
        vec![DomainState::Running, DomainState::PendingWhileRunning]
    );
    assert_eq!(
        scheduler.domain_state(Domain::Macrotask),
        DomainState::Pending
    );
    assert!(!scheduler.flags().contains(SchedulerFlags::RUNNING));
}

#[test]
fn test_reentrant_render_is_rejected_without_ticking_clock() {
    let host = Rc::new(LocalHost::new());
    let scheduler = Scheduler::new(host.clone());
    let inner_clock = Rc::new(Cell::new(0));

    {
        let sch = scheduler.clone();
        let h = host.clone();
        let inner_clock = inner_clock.clone();
        scheduler.next_frame().write(move || {
            sch.next_frame();
            assert_eq!(h.pending_animation_frames(), 1);
            // The host fires the frame callback while this pass is running.
            h.render();
            inner_clock.set(sch.clock());
        });
    }
    host.render();

    // The nested callback neither ran a pass nor advanced the clock.
    assert_eq!(inner_clock.get(), 1);
    assert_eq!(scheduler.clock(), 2);
    // Its registration was replaced, so exactly one is outstanding.
    assert_eq!(host.pending_animation_frames(), 1);
    assert_eq!(
        scheduler.domain_state(Domain::Frame),
        DomainState::Pending
    );
}

#[test]
fn test_reentrant_macrotask_callback_is_requeued() {
    let host = Rc::new(LocalHost::new());
    let scheduler = Scheduler::new(host.clone());
    let second = Rc::new(Cell::new(false));

    {
        let sch = scheduler.clone();
        let h = host.clone();
        let second = second.clone();
        scheduler.schedule_macrotask(move || {
            let second = second.clone();
            sch.schedule_macrotask(move || second.set(true));
            // Host turns the loop from inside the running macrotask flush.
            assert!(h.run_macrotask());
        });
    }

    assert!(host.run_macrotask());
    assert!(!second.get());
    assert_eq!(scheduler.clock(), 2);
    assert_eq!(host.pending_macrotasks(), 1);
    assert_eq!(
        scheduler.domain_state(Domain::Macrotask),
        DomainState::Pending
    );

    assert!(host.run_macrotask());
    assert!(second.get());
    assert_eq!(scheduler.clock(), 3);
    assert!(host.is_idle());
}

#[test]
fn test_one_registration_per_pending_macrotask_batch() {
    let host = Rc::new(LocalHost::new());
    let scheduler = Scheduler::new(host.clone());
    let ran = Rc::new(Cell::new(0));

    let task = |ran: &Rc<Cell<u32>>| {
        let ran = ran.clone();
        move || ran.set(ran.get() + 1)
    };

    scheduler.schedule_macrotask(task(&ran));
    assert!(host.run_macrotask());
    assert_eq!(scheduler.clock(), 2);

    scheduler.schedule_macrotask(task(&ran));
    scheduler.schedule_macrotask(task(&ran));
    assert!(scheduler.flags().contains(SchedulerFlags::MACROTASK_PENDING));
    assert_eq!(host.pending_macrotasks(), 1);

    assert_eq!(host.run_until_idle(4), Ok(1));
    assert_eq!(ran.get(), 3);
    // One tick per flush that actually ran.
    assert_eq!(scheduler.clock(), 3);
}

#[test]
fn test_nested_render_is_deferred_not_lost() {
    let host = Rc::new(LocalHost::new());
    let scheduler = Scheduler::new(host.clone());
    let later = Rc::new(Cell::new(false));

    {
        let sch = scheduler.clone();
        let h = host.clone();
        let later = later.clone();
        scheduler.next_frame().write(move || {
            let later = later.clone();
            sch.next_frame().write(move || later.set(true));
            // Host renders from inside a running pass.
            h.render();
        });
    }

    host.render();
    assert!(!later.get());
    assert!(host.has_pending_frame());
    assert_eq!(
        scheduler.domain_state(Domain::Frame),
        DomainState::Pending
    );

    host.render();
    assert!(later.get());
    assert_eq!(scheduler.domain_state(Domain::Frame), DomainState::Idle);
}

#[test]
fn test_work_left_in_current_frame_is_picked_up() {
    let host = Rc::new(LocalHost::new());
    let scheduler = Scheduler::new(host.clone());
    let ran = Rc::new(Cell::new(0));

    {
        let ran = ran.clone();
        scheduler.current_frame().write(move || ran.set(ran.get() + 1));
    }
    scheduler.next_frame();
    host.render();
    assert_eq!(ran.get(), 0);

    // The stale frame became `next` and armed its own pass.
    assert!(host.has_pending_frame());
    host.render();
    assert_eq!(ran.get(), 1);
    assert!(host.is_idle());
}

#[test]
fn test_component_tree_rerenders_cooperatively() {
    use nexa_scheduler::Component;

    struct Ticker {
        scheduler: Rc<Scheduler>,
        this: RefCell<Option<Rc<Ticker>>>,
        renders: Cell<u32>,
        limit: u32,
    }

    impl Component for Ticker {
        fn update(&self) {
            self.renders.set(self.renders.get() + 1);
            if self.renders.get() < self.limit {
                if let Some(this) = self.this.borrow().clone() {
                    self.scheduler.next_frame().update_component(this, 0);
                }
            }
        }
    }

    let host = Rc::new(LocalHost::new());
    let scheduler = Scheduler::new(host.clone());
    let ticker = Rc::new(Ticker {
        scheduler: scheduler.clone(),
        this: RefCell::new(None),
        renders: Cell::new(0),
        limit: 3,
    });
    *ticker.this.borrow_mut() = Some(ticker.clone());

    scheduler.next_frame().update_component(ticker.clone(), 0);
    let turns = host.run_until_idle(10).unwrap();

    assert_eq!(turns, 3);
    assert_eq!(ticker.renders.get(), 3);
    assert_eq!(scheduler.clock(), 4);

    ticker.this.borrow_mut().take();
}

#[test]
fn test_callbacks_after_scheduler_drop_are_noops() {
    let host = Rc::new(LocalHost::new());
    let ran = Rc::new(Cell::new(false));

    {
        let scheduler = Scheduler::new(host.clone());
        let ran = ran.clone();
        scheduler.schedule_macrotask(move || ran.set(true));
    }

    assert!(host.run_macrotask());
    assert!(!ran.get());
}
