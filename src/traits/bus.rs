//! Outgoing side of the device bus.

use crate::state::{Category, Direction, PeripheralState, TrackOutputState};

/// Sink for commands that passed authorization.
///
/// Implementations talk to the command station or accessory boards. They do
/// not update the state store; the hardware confirms through events.
///
/// # Example
///
/// ```rust
/// use rs_layout::hal::MockBus;
/// use rs_layout::traits::TrackBus;
/// use rs_layout::Direction;
///
/// let mut bus = MockBus::new();
/// bus.set_train_speed(7, 40, Direction::Forward).unwrap();
/// assert_eq!(bus.calls.len(), 1);
/// ```
pub trait TrackBus: Send {
    /// Error type returned by the bus.
    type Error: core::fmt::Debug;

    /// Drive the decoder at `dcc_address`.
    fn set_train_speed(
        &mut self,
        dcc_address: u16,
        speed_step: u8,
        direction: Direction,
    ) -> Result<(), Self::Error>;

    /// Stop the decoder at `dcc_address` immediately.
    fn emergency_stop(&mut self, dcc_address: u16) -> Result<(), Self::Error>;

    /// Switch a decoder function.
    fn set_peripheral(
        &mut self,
        dcc_address: u16,
        peripheral: &str,
        state: PeripheralState,
    ) -> Result<(), Self::Error>;

    /// Set a point or signal aspect.
    fn set_accessory(&mut self, category: Category, id: &str, aspect: &str) -> Result<(), Self::Error>;

    /// Change a track output's state.
    fn set_track_output(&mut self, id: &str, state: TrackOutputState) -> Result<(), Self::Error>;
}
