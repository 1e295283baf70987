//! Device layer implementations of [`crate::traits`].
//!
//! - `mock`: recording bus for tests and desktop runs

pub mod mock;

pub use mock::*;
