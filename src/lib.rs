//! # rs-layout
//!
//! State and command core for a model railway layout server, with an
//! optional plain-text HTTP monitor and driver surface.
//!
//! ## Features
//!
//! - **Live layout state**: trains, points, signals, segments and track
//!   outputs, updated from asynchronous hardware events
//! - **Exclusive train control**: sessions grab trains; only the holder can drive
//! - **Consistent queries**: every read is a per-entity snapshot, never a torn
//!   entry, and never waits on the bus
//! - **No global lock**: independent entities update concurrently
//!
//! ## Architecture
//!
//! The crate is structured to allow testing on desktop without hardware:
//!
//! - `store` - Registry of everything the bus has reported
//! - `ownership` - Train grabs, keyed by train
//! - `session` - Session tokens, idle expiry, release on termination
//! - `query` - Read-only projections for the presentation layer
//! - `dispatch` - Authorization and forwarding of commands to the bus
//! - `layout` - All of the above wired together, with the lifecycle
//! - `traits` / `hal` - The bus abstraction and a recording mock
//! - `services` - Shared context, text rendering, HTTP router, event feed
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use rs_layout::{
//!     Category, HardwareEvent, LayoutError, OwnershipRegistry, SessionToken, StateStore,
//!     TrackOutputState,
//! };
//!
//! let store = Arc::new(StateStore::new());
//! store.apply_event(HardwareEvent::train_discovered("train7", 7, &["head_light"])).unwrap();
//! store.apply_event(HardwareEvent::track_output("cs1", 0x03)).unwrap();
//!
//! assert_eq!(store.list(Category::Train)[0].as_str(), "train7");
//! assert!(!store.train_state("train9").unwrap().known);
//! assert_eq!(store.track_output_state("cs1").unwrap().state, TrackOutputState::Go);
//!
//! let grabs = OwnershipRegistry::new(Arc::clone(&store));
//! let a = SessionToken::from("sessionA");
//! let b = SessionToken::from("sessionB");
//! grabs.grab("train7", &a).unwrap();
//! assert!(matches!(grabs.grab("train7", &b), Err(LayoutError::AlreadyGrabbed { .. })));
//! ```

#![warn(missing_docs)]

/// Control commands sent by sessions.
pub mod commands;
/// Authorization and forwarding of commands to the bus.
pub mod dispatch;
/// Error types.
pub mod error;
/// Hardware events delivered by the bus.
pub mod events;
/// Bus implementations (a recording mock).
pub mod hal;
/// The layout context tying all components together.
pub mod layout;
/// Explicit system lifecycle.
pub mod lifecycle;
/// Train grabs.
pub mod ownership;
/// Read-only projections.
pub mod query;
/// Client sessions.
pub mod session;
/// Identifiers and per-entity state types.
pub mod state;
/// The concurrent state store.
pub mod store;
/// Bus abstraction.
pub mod traits;

/// Server configuration.
pub mod config;

/// Services: shared context, rendering, HTTP (feature-gated), event feed.
pub mod services;

// Re-exports for convenience
pub use commands::LayoutCommand;
pub use dispatch::CommandDispatcher;
pub use error::{EventError, LayoutError, Result};
pub use events::HardwareEvent;
pub use layout::Layout;
pub use lifecycle::{Lifecycle, LifecyclePhase};
pub use ownership::{GrabOutcome, OwnershipRegistry, ReleaseOutcome};
pub use query::{
    AccessorySummary, PeripheralSummary, QueryService, SegmentSummary, TrackOutputSummary,
    TrainSummary,
};
pub use session::SessionManager;
pub use state::{
    AccessoryKind, AccessoryState, Category, Direction, Identifier, PeripheralState,
    SegmentState, SessionToken, TrackOutputQuery, TrackOutputState, TrainState, MAX_ID_LEN,
    MAX_SPEED_STEP,
};
pub use store::StateStore;
pub use traits::TrackBus;

// Config re-exports
pub use config::{Config, DeviceConfig, FeedConfig, SessionConfig, WebConfig};
