use anyhow::{Context, Result};
use nexa_scheduler::{Component, LocalHost, Scheduler, SchedulerSnapshot};
use std::cell::Cell;
use std::rc::Rc;

#[derive(Debug, Clone, Copy)]
pub struct SimulationConfig {
    pub depth: usize,
    pub fanout: usize,
    pub frames: usize,
    pub max_turns: usize,
}

#[derive(Default)]
struct Counters {
    renders: Cell<u64>,
    measures: Cell<u64>,
    commits: Cell<u64>,
}

pub struct Report {
    pub components: usize,
    pub renders: u64,
    pub measures: u64,
    pub commits: u64,
    pub turns: usize,
    pub elapsed_ms: f64,
    pub snapshot: SchedulerSnapshot,
}

/// A component that re-renders its whole subtree in the current pass and
/// measures itself once writes are done.
struct Node {
    id: usize,
    depth: usize,
    children: Vec<Rc<Node>>,
    scheduler: Rc<Scheduler>,
    counters: Rc<Counters>,
}

impl Component for Node {
    fn update(&self) {
        self.counters.renders.set(self.counters.renders.get() + 1);
        tracing::trace!(id = self.id, depth = self.depth, "render");

        let frame = self.scheduler.current_frame();
        for child in &self.children {
            frame.update_component(child.clone(), child.depth);
        }

        let counters = self.counters.clone();
        frame.read(move || counters.measures.set(counters.measures.get() + 1));
    }
}

fn build_tree(
    depth: usize,
    config: &SimulationConfig,
    scheduler: &Rc<Scheduler>,
    counters: &Rc<Counters>,
    next_id: &mut usize,
) -> Rc<Node> {
    let id = *next_id;
    *next_id += 1;

    let children = if depth + 1 < config.depth {
        (0..config.fanout)
            .map(|_| build_tree(depth + 1, config, scheduler, counters, next_id))
            .collect()
    } else {
        Vec::new()
    };

    Rc::new(Node {
        id,
        depth,
        children,
        scheduler: scheduler.clone(),
        counters: counters.clone(),
    })
}

/// Feeds one input event per frame through macrotask -> microtask -> frame
/// and runs the host loop until everything has settled.
pub fn run(config: SimulationConfig) -> Result<Report> {
    let host = Rc::new(LocalHost::new());
    let scheduler = Scheduler::builder()
        .max_frame_iterations(config.depth.max(1) * 2)
        .error_sink(|err| tracing::error!(%err, "task failed"))
        .build(host.clone());
    let counters = Rc::new(Counters::default());

    let mut components = 0;
    let root = build_tree(0, &config, &scheduler, &counters, &mut components);
    tracing::info!(components, depth = config.depth, fanout = config.fanout, "tree built");

    let mut turns = 0;
    for frame_index in 0..config.frames {
        let sch = scheduler.clone();
        let root = root.clone();
        let counters = counters.clone();
        scheduler.schedule_macrotask(move || {
            tracing::debug!(frame_index, "input event");
            let scheduler = sch.clone();
            sch.schedule_microtask(move || {
                let frame = scheduler.next_frame();
                frame.update_component(root, 0);
                frame.after(move || counters.commits.set(counters.commits.get() + 1));
            });
        });

        turns += host
            .run_until_idle(config.max_turns)
            .with_context(|| format!("frame {frame_index} did not settle"))?;
    }

    Ok(Report {
        components,
        renders: counters.renders.get(),
        measures: counters.measures.get(),
        commits: counters.commits.get(),
        turns,
        elapsed_ms: host.now(),
        snapshot: scheduler.snapshot(),
    })
}
