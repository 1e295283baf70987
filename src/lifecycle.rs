//! System lifecycle state held by the server context.

use std::sync::atomic::{AtomicU8, Ordering};

/// Phase of the control system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LifecyclePhase {
    /// Not started; requests are refused.
    #[default]
    Stopped,
    /// Accepting requests and hardware events.
    Running,
    /// Shutdown in progress; requests are refused.
    ShuttingDown,
}

impl LifecyclePhase {
    const fn to_u8(self) -> u8 {
        match self {
            LifecyclePhase::Stopped => 0,
            LifecyclePhase::Running => 1,
            LifecyclePhase::ShuttingDown => 2,
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => LifecyclePhase::Running,
            2 => LifecyclePhase::ShuttingDown,
            _ => LifecyclePhase::Stopped,
        }
    }

    /// Lowercase name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            LifecyclePhase::Stopped => "stopped",
            LifecyclePhase::Running => "running",
            LifecyclePhase::ShuttingDown => "shutting down",
        }
    }
}

/// Lifecycle state shared between request handlers and the event feed.
///
/// Transitions are compare-and-set, so two callers racing to start (or to
/// shut down) see exactly one of them succeed.
///
/// ```rust
/// use rs_layout::{Lifecycle, LifecyclePhase};
///
/// let lifecycle = Lifecycle::new();
/// assert!(!lifecycle.is_running());
/// assert!(lifecycle.start());
/// assert!(!lifecycle.start());
/// assert!(lifecycle.begin_shutdown());
/// assert_eq!(lifecycle.phase(), LifecyclePhase::ShuttingDown);
/// lifecycle.finish_shutdown();
/// assert_eq!(lifecycle.phase(), LifecyclePhase::Stopped);
/// ```
#[derive(Debug, Default)]
pub struct Lifecycle {
    phase: AtomicU8,
}

impl Lifecycle {
    /// Creates a lifecycle in the [`Stopped`](LifecyclePhase::Stopped) phase.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    pub fn phase(&self) -> LifecyclePhase {
        LifecyclePhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Whether requests should be served.
    pub fn is_running(&self) -> bool {
        self.phase() == LifecyclePhase::Running
    }

    /// Stopped → Running. Returns false if not stopped.
    pub fn start(&self) -> bool {
        self.transition(LifecyclePhase::Stopped, LifecyclePhase::Running)
    }

    /// Running → ShuttingDown. Returns false if not running.
    pub fn begin_shutdown(&self) -> bool {
        self.transition(LifecyclePhase::Running, LifecyclePhase::ShuttingDown)
    }

    /// ShuttingDown → Stopped.
    pub fn finish_shutdown(&self) -> bool {
        self.transition(LifecyclePhase::ShuttingDown, LifecyclePhase::Stopped)
    }

    fn transition(&self, from: LifecyclePhase, to: LifecyclePhase) -> bool {
        self.phase
            .compare_exchange(from.to_u8(), to.to_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
