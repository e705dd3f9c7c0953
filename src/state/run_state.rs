/// Lifecycle states of one crawl run
///
/// The only legal path is `Idle -> Running -> Draining -> Stopped`, with a
/// shortcut from `Running` straight to `Stopped` for runs that never
/// dispatched any work.
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    /// Constructed, nothing opened yet
    Idle,

    /// Export log open, frontier seeded, tasks being dispatched
    Running,

    /// Frontier closed; in-flight tasks are finishing
    Draining,

    /// Export log finalized and run outcome recorded
    Stopped,
}

impl RunState {
    /// Returns true if moving from `self` to `next` is allowed
    pub fn can_transition_to(&self, next: RunState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Running)
                | (Self::Running, Self::Draining)
                | (Self::Running, Self::Stopped)
                | (Self::Draining, Self::Stopped)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
