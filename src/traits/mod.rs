//! Seams between the layout core and the device layer.
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`TrackBus`] | Forward authorized commands to the hardware |
//!
//! Desktop builds and tests use [`crate::hal::MockBus`].

mod bus;

pub use bus::TrackBus;
