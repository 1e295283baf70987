//! Shared layout context for all services.
//!
//! `SharedLayout` wraps one [`Layout`] together with the clock every service
//! uses for session activity, so the HTTP surface and the event feed agree
//! on what "now" means.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use rs_layout::hal::MockBus;
//! use rs_layout::services::{LayoutProvider, SharedLayout};
//! use rs_layout::{HardwareEvent, Layout};
//!
//! let shared = Arc::new(SharedLayout::new(Layout::new(MockBus::new(), 0)));
//! shared.apply_event(HardwareEvent::train_discovered("train7", 7, &[])).unwrap();
//! shared.layout().start();
//!
//! let session = shared.open_session().unwrap();
//! shared.grab(&session, "train7").unwrap();
//! assert!(shared.query().trains()[0].grabbed);
//! ```

use std::sync::Arc;
use std::time::Instant;

use crate::commands::LayoutCommand;
use crate::error::{EventError, Result};
use crate::events::HardwareEvent;
use crate::layout::Layout;
use crate::lifecycle::LifecyclePhase;
use crate::ownership::{GrabOutcome, ReleaseOutcome};
use crate::query::QueryService;
use crate::state::{Identifier, SessionToken};
use crate::traits::TrackBus;

// ============================================================================
// Layout Provider Trait
// ============================================================================

/// Access to a running layout, as the services need it.
///
/// The HTTP handler and the event feed only see this trait, so they can be
/// driven by any bus type or by a test double.
pub trait LayoutProvider: Send + Sync {
    /// Milliseconds since the provider was created.
    fn now_ms(&self) -> u64;

    /// Current lifecycle phase.
    fn phase(&self) -> LifecyclePhase;

    /// Whether requests should be served.
    fn is_running(&self) -> bool {
        self.phase() == LifecyclePhase::Running
    }

    /// Read-only queries.
    fn query(&self) -> &QueryService;

    /// Apply one hardware event.
    fn apply_event(&self, event: HardwareEvent) -> core::result::Result<(), EventError>;

    /// Open a session.
    fn open_session(&self) -> Result<SessionToken>;

    /// End a session, returning the trains it released.
    fn end_session(&self, session: &SessionToken) -> Result<Vec<Identifier>>;

    /// Grab a train for a session.
    fn grab(&self, session: &SessionToken, train: &str) -> Result<GrabOutcome>;

    /// Release a train held by a session.
    fn release(&self, session: &SessionToken, train: &str) -> Result<ReleaseOutcome>;

    /// Authorize and forward a command.
    fn dispatch(&self, session: &SessionToken, command: &LayoutCommand) -> Result<()>;

    /// Expire idle sessions.
    fn expire_idle(&self) -> Vec<SessionToken>;
}

// ============================================================================
// Shared Layout
// ============================================================================

/// A [`Layout`] plus the time base shared by all services.
pub struct SharedLayout<B: TrackBus> {
    layout: Layout<B>,

    /// Time when the context was created; `now_ms` counts from here.
    start_time: Instant,
}

impl<B: TrackBus> SharedLayout<B> {
    /// Wrap a layout. The clock starts now.
    pub fn new(layout: Layout<B>) -> Self {
        Self {
            layout,
            start_time: Instant::now(),
        }
    }

    /// Milliseconds since creation.
    #[inline]
    pub fn now_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// The wrapped layout.
    pub fn layout(&self) -> &Layout<B> {
        &self.layout
    }
}

impl<B: TrackBus + 'static> LayoutProvider for Arc<SharedLayout<B>> {
    fn now_ms(&self) -> u64 {
        SharedLayout::now_ms(self)
    }

    fn phase(&self) -> LifecyclePhase {
        self.layout.phase()
    }

    fn query(&self) -> &QueryService {
        self.layout.query()
    }

    fn apply_event(&self, event: HardwareEvent) -> core::result::Result<(), EventError> {
        self.layout.apply_event(event)
    }

    fn open_session(&self) -> Result<SessionToken> {
        self.layout.open_session(SharedLayout::now_ms(self))
    }

    fn end_session(&self, session: &SessionToken) -> Result<Vec<Identifier>> {
        self.layout.end_session(session)
    }

    fn grab(&self, session: &SessionToken, train: &str) -> Result<GrabOutcome> {
        self.layout.grab(session, train, SharedLayout::now_ms(self))
    }

    fn release(&self, session: &SessionToken, train: &str) -> Result<ReleaseOutcome> {
        self.layout.release(session, train, SharedLayout::now_ms(self))
    }

    fn dispatch(&self, session: &SessionToken, command: &LayoutCommand) -> Result<()> {
        self.layout.dispatch(session, command, SharedLayout::now_ms(self))
    }

    fn expire_idle(&self) -> Vec<SessionToken> {
        self.layout.expire_idle(SharedLayout::now_ms(self))
    }
}
