use serde::Serialize;

bitflags::bitflags! {
    /// Pending/running state of the three timing domains.
    ///
    /// A `*_PENDING` bit is set iff exactly one host registration for that
    /// domain is outstanding. `*_RUNNING` bits are only set while the
    /// domain's flush routine is on the stack.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct SchedulerFlags: u32 {
        const RUNNING           = 1 << 0;
        const MICROTASK_PENDING = 1 << 1;
        const MICROTASK_RUNNING = 1 << 2;
        const MACROTASK_PENDING = 1 << 3;
        const MACROTASK_RUNNING = 1 << 4;
        const FRAMETASK_PENDING = 1 << 5;
        const FRAMETASK_RUNNING = 1 << 6;
    }
}

bitflags::bitflags! {
    /// Which task groups of a [`Frame`](crate::Frame) hold work.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct FrameFlags: u8 {
        const WRITE      = 1 << 0;
        const WRITE_PRIO = 1 << 1;
        const READ       = 1 << 2;
        const AFTER      = 1 << 3;
        const WRITE_ANY  = Self::WRITE.bits() | Self::WRITE_PRIO.bits();
    }
}

/// One of the three timing domains a scheduler drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Domain {
    Microtask,
    Macrotask,
    Frame,
}

impl Domain {
    pub const ALL: [Domain; 3] = [Domain::Microtask, Domain::Macrotask, Domain::Frame];

    pub fn pending_flag(self) -> SchedulerFlags {
        match self {
            Domain::Microtask => SchedulerFlags::MICROTASK_PENDING,
            Domain::Macrotask => SchedulerFlags::MACROTASK_PENDING,
            Domain::Frame => SchedulerFlags::FRAMETASK_PENDING,
        }
    }

    pub fn running_flag(self) -> SchedulerFlags {
        match self {
            Domain::Microtask => SchedulerFlags::MICROTASK_RUNNING,
            Domain::Macrotask => SchedulerFlags::MACROTASK_RUNNING,
            Domain::Frame => SchedulerFlags::FRAMETASK_RUNNING,
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Domain::Microtask => "microtask",
            Domain::Macrotask => "macrotask",
            Domain::Frame => "frame",
        };
        f.write_str(name)
    }
}

/// Per-domain view of [`SchedulerFlags`]: `Idle -> Pending -> Running -> Idle`.
///
/// `PendingWhileRunning` happens when a running flush re-arms its own
/// domain for a later turn (macrotasks do this, and frames do when a task
/// calls `next_frame()`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DomainState {
    Idle,
    Pending,
    Running,
    PendingWhileRunning,
}

impl SchedulerFlags {
    pub fn domain_state(self, domain: Domain) -> DomainState {
        let pending = self.contains(domain.pending_flag());
        let running = self.contains(domain.running_flag());
        match (pending, running) {
            (false, false) => DomainState::Idle,
            (true, false) => DomainState::Pending,
            (false, true) => DomainState::Running,
            (true, true) => DomainState::PendingWhileRunning,
        }
    }

    /// Whether any domain's flush routine is executing.
    pub fn any_running(self) -> bool {
        Domain::ALL
            .iter()
            .any(|domain| self.contains(domain.running_flag()))
    }
}
