//! Services built on the layout core.
//!
//! - `shared`: [`SharedLayout`] and the [`LayoutProvider`] trait the other
//!   services are written against
//! - `render`: plain-text bodies for every monitor response
//! - `http_handler`: endpoint logic, independent of the HTTP framework
//! - `web` feature: the axum router and server, plus the tokio event feed
//!
//! # Shared State Pattern
//!
//! One [`Layout`](crate::Layout) is wrapped once and shared by every service:
//!
//! ```ignore
//! use std::sync::Arc;
//! use rs_layout::services::{build_router, event_channel, EventFeedRunner, SharedLayout};
//!
//! let shared = Arc::new(SharedLayout::new(layout));
//!
//! let (events_tx, events_rx) = event_channel(&config.feed);
//! tokio::spawn(EventFeedRunner::new(Arc::clone(&shared), events_rx, &config.session).run());
//!
//! let router = build_router(Arc::clone(&shared), &web_config);
//! ```

pub mod shared;

pub mod render;

pub mod http_handler;

// Form parameter types need serde
#[cfg(feature = "serde")]
pub mod api;

#[cfg(feature = "web")]
pub mod web;

// Event feed runner (tokio)
#[cfg(feature = "web")]
pub mod event_feed;

// Re-exports
pub use shared::*;

pub use http_handler::*;

#[cfg(feature = "serde")]
pub use api::*;

#[cfg(feature = "web")]
pub use web::*;

#[cfg(feature = "web")]
pub use event_feed::*;
