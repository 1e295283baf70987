//! The layout context: every core component wired together.
//!
//! A [`Layout`] owns the store, the grab registry, the session manager, the
//! query service, the command dispatcher and the lifecycle. Services hold it
//! behind an `Arc` and call into it; nothing in here is global.
//!
//! ```rust
//! use rs_layout::hal::MockBus;
//! use rs_layout::{HardwareEvent, Layout, LayoutError};
//!
//! let layout = Layout::new(MockBus::new(), 0);
//! layout.apply_event(HardwareEvent::train_discovered("train7", 7, &[])).unwrap();
//!
//! // Nothing is served before start.
//! assert!(matches!(layout.open_session(0), Err(LayoutError::NotRunning)));
//!
//! layout.start();
//! let session = layout.open_session(0).unwrap();
//! layout.grab(&session, "train7", 1).unwrap();
//! assert!(layout.query().trains()[0].grabbed);
//!
//! layout.shutdown();
//! assert!(layout.query().trains().is_empty());
//! ```

use std::sync::{Arc, PoisonError, RwLock};

use tracing::{info, warn};

use crate::commands::LayoutCommand;
use crate::dispatch::CommandDispatcher;
use crate::error::{EventError, LayoutError, Result};
use crate::events::HardwareEvent;
use crate::lifecycle::{Lifecycle, LifecyclePhase};
use crate::ownership::{GrabOutcome, OwnershipRegistry, ReleaseOutcome};
use crate::query::QueryService;
use crate::session::SessionManager;
use crate::state::{Category, Identifier, SessionToken};
use crate::store::StateStore;
use crate::traits::TrackBus;

/// All core components of one layout.
pub struct Layout<B: TrackBus> {
    store: Arc<StateStore>,
    grabs: Arc<OwnershipRegistry>,
    sessions: SessionManager,
    query: QueryService,
    dispatcher: CommandDispatcher<B>,
    lifecycle: Lifecycle,
    // Requests and events hold this for reading; shutdown and start hold it
    // for writing. The flag is whether hardware events are accepted.
    gate: RwLock<bool>,
}

impl<B: TrackBus> Layout<B> {
    /// Creates a stopped layout driving `bus`.
    ///
    /// Sessions idle longer than `idle_timeout_ms` are expired (0 = never).
    /// Hardware events are accepted right away, so discovery can run before
    /// [`start`](Self::start).
    pub fn new(bus: B, idle_timeout_ms: u64) -> Self {
        let store = Arc::new(StateStore::new());
        let grabs = Arc::new(OwnershipRegistry::new(Arc::clone(&store)));
        Self {
            sessions: SessionManager::new(Arc::clone(&grabs), idle_timeout_ms),
            query: QueryService::new(Arc::clone(&store), Arc::clone(&grabs)),
            dispatcher: CommandDispatcher::new(Arc::clone(&store), Arc::clone(&grabs), bus),
            lifecycle: Lifecycle::new(),
            gate: RwLock::new(true),
            store,
            grabs,
        }
    }

    /// Creates a stopped layout using the session settings of `config`.
    pub fn from_config(bus: B, config: &crate::config::Config) -> Self {
        Self::new(bus, config.session.idle_timeout_ms)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Current phase.
    pub fn phase(&self) -> LifecyclePhase {
        self.lifecycle.phase()
    }

    /// Whether requests are served.
    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    /// Start serving, and accept hardware events again after a shutdown.
    ///
    /// Returns false if already running or shutting down.
    pub fn start(&self) -> bool {
        let mut intake = self.gate.write().unwrap_or_else(PoisonError::into_inner);
        let started = self.lifecycle.start();
        if started {
            *intake = true;
            info!(
                trains = self.store.count(Category::Train),
                points = self.store.count(Category::Point),
                signals = self.store.count(Category::Signal),
                segments = self.store.count(Category::Segment),
                "layout running"
            );
        }
        started
    }

    /// Stop serving and drop all sessions, grabs and known state.
    ///
    /// Waits for requests and events already in progress. Until the next
    /// [`start`](Self::start), requests get [`LayoutError::NotRunning`] and
    /// hardware events get [`EventError::IntakeClosed`].
    ///
    /// Returns false if the layout was not running.
    pub fn shutdown(&self) -> bool {
        if !self.lifecycle.begin_shutdown() {
            return false;
        }
        let mut intake = self.gate.write().unwrap_or_else(PoisonError::into_inner);
        *intake = false;
        let sessions = self.sessions.terminate_all();
        self.grabs.clear();
        self.store.clear();
        self.lifecycle.finish_shutdown();
        drop(intake);
        info!(sessions, "layout stopped");
        true
    }

    /// Run `f` if the layout is running, with shutdown held off until it
    /// returns.
    fn serving<R>(&self, f: impl FnOnce() -> Result<R>) -> Result<R> {
        let _gate = self.gate.read().unwrap_or_else(PoisonError::into_inner);
        if !self.lifecycle.is_running() {
            return Err(LayoutError::NotRunning);
        }
        f()
    }

    // ========================================================================
    // Hardware events
    // ========================================================================

    /// Apply one hardware event.
    ///
    /// Removing a train also drops its grab, after the store entry is gone so
    /// a concurrent grab cannot resurrect it.
    ///
    /// # Errors
    ///
    /// [`EventError::IntakeClosed`] between a shutdown and the next start,
    /// otherwise whatever [`StateStore::apply_event`] returns.
    pub fn apply_event(&self, event: HardwareEvent) -> core::result::Result<(), EventError> {
        let intake = self.gate.read().unwrap_or_else(PoisonError::into_inner);
        if !*intake {
            return Err(EventError::IntakeClosed);
        }
        let removed_train = match &event {
            HardwareEvent::Removed {
                category: Category::Train,
                id,
            } => Some(id.clone()),
            _ => None,
        };
        self.store.apply_event(event)?;
        if let Some(train) = removed_train {
            if let Some(owner) = self.grabs.forget_train(&train) {
                warn!(train = %train, session = %owner, "grabbed train removed");
            }
        }
        Ok(())
    }

    // ========================================================================
    // Sessions and grabs
    // ========================================================================

    /// Open a new session.
    pub fn open_session(&self, now_ms: u64) -> Result<SessionToken> {
        self.serving(|| Ok(self.sessions.open(now_ms)))
    }

    /// End a session, releasing its grabs.
    ///
    /// # Errors
    ///
    /// [`LayoutError::UnknownSession`] if the session is not open.
    pub fn end_session(&self, session: &SessionToken) -> Result<Vec<Identifier>> {
        self.serving(|| {
            self.sessions
                .terminate(session)
                .ok_or(LayoutError::UnknownSession)
        })
    }

    /// Grab a train for a session.
    pub fn grab(&self, session: &SessionToken, train: &str, now_ms: u64) -> Result<GrabOutcome> {
        self.serving(|| self.sessions.grab(session, train, now_ms))
    }

    /// Release a train held by a session.
    pub fn release(
        &self,
        session: &SessionToken,
        train: &str,
        now_ms: u64,
    ) -> Result<ReleaseOutcome> {
        self.serving(|| self.sessions.release(session, train, now_ms))
    }

    /// Authorize and forward a command from a session.
    ///
    /// The session stays open until the command has been forwarded; ending
    /// it waits for the bus call.
    ///
    /// # Errors
    ///
    /// [`LayoutError::NotRunning`], [`LayoutError::UnknownSession`], or
    /// whatever [`CommandDispatcher::dispatch`] returns.
    pub fn dispatch(&self, session: &SessionToken, command: &LayoutCommand, now_ms: u64) -> Result<()> {
        self.serving(|| {
            self.sessions
                .with_session(session, now_ms, || self.dispatcher.dispatch(session, command))?
        })
    }

    /// Terminate idle sessions. Returns the expired tokens.
    pub fn expire_idle(&self, now_ms: u64) -> Vec<SessionToken> {
        self.serving(|| Ok(self.sessions.expire_idle(now_ms)))
            .unwrap_or_default()
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Read-only queries.
    pub fn query(&self) -> &QueryService {
        &self.query
    }

    /// The state store.
    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// The grab registry.
    pub fn grabs(&self) -> &Arc<OwnershipRegistry> {
        &self.grabs
    }

    /// The session manager.
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// The command dispatcher.
    pub fn dispatcher(&self) -> &CommandDispatcher<B> {
        &self.dispatcher
    }
}
