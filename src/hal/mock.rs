//! Mock bus for testing without hardware.
//!
//! [`MockBus`] records every call so tests can assert on what reached the
//! hardware. It can also be told to fail, to exercise error paths.
//!
//! ```rust
//! use rs_layout::hal::{BusCall, MockBus};
//! use rs_layout::traits::TrackBus;
//! use rs_layout::TrackOutputState;
//!
//! let mut bus = MockBus::new();
//! bus.set_track_output("cs1", TrackOutputState::Go).unwrap();
//! assert_eq!(
//!     bus.calls,
//!     vec![BusCall::TrackOutput { id: "cs1".into(), state: TrackOutputState::Go }]
//! );
//! ```

use crate::state::{Category, Direction, PeripheralState, TrackOutputState};
use crate::traits::TrackBus;

/// One recorded bus call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BusCall {
    /// `set_train_speed`
    Speed {
        /// Decoder address.
        dcc_address: u16,
        /// Speed step.
        speed_step: u8,
        /// Direction.
        direction: Direction,
    },
    /// `emergency_stop`
    EmergencyStop {
        /// Decoder address.
        dcc_address: u16,
    },
    /// `set_peripheral`
    Peripheral {
        /// Decoder address.
        dcc_address: u16,
        /// Peripheral name.
        peripheral: String,
        /// State.
        state: PeripheralState,
    },
    /// `set_accessory`
    Accessory {
        /// Point or signal.
        category: Category,
        /// Accessory identifier.
        id: String,
        /// Aspect.
        aspect: String,
    },
    /// `set_track_output`
    TrackOutput {
        /// Track output identifier.
        id: String,
        /// State.
        state: TrackOutputState,
    },
}

/// Error returned by a [`MockBus`] set to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MockBusError;

/// Recording bus.
#[derive(Debug, Default)]
pub struct MockBus {
    /// Every successful call, in order.
    pub calls: Vec<BusCall>,
    /// When set, every call fails without being recorded.
    pub fail: bool,
}

impl MockBus {
    /// Creates a mock bus that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock bus that rejects everything.
    pub fn failing() -> Self {
        Self {
            calls: Vec::new(),
            fail: true,
        }
    }

    fn record(&mut self, call: BusCall) -> Result<(), MockBusError> {
        if self.fail {
            return Err(MockBusError);
        }
        self.calls.push(call);
        Ok(())
    }
}

impl TrackBus for MockBus {
    type Error = MockBusError;

    fn set_train_speed(
        &mut self,
        dcc_address: u16,
        speed_step: u8,
        direction: Direction,
    ) -> Result<(), MockBusError> {
        self.record(BusCall::Speed {
            dcc_address,
            speed_step,
            direction,
        })
    }

    fn emergency_stop(&mut self, dcc_address: u16) -> Result<(), MockBusError> {
        self.record(BusCall::EmergencyStop { dcc_address })
    }

    fn set_peripheral(
        &mut self,
        dcc_address: u16,
        peripheral: &str,
        state: PeripheralState,
    ) -> Result<(), MockBusError> {
        self.record(BusCall::Peripheral {
            dcc_address,
            peripheral: peripheral.to_owned(),
            state,
        })
    }

    fn set_accessory(&mut self, category: Category, id: &str, aspect: &str) -> Result<(), MockBusError> {
        self.record(BusCall::Accessory {
            category,
            id: id.to_owned(),
            aspect: aspect.to_owned(),
        })
    }

    fn set_track_output(&mut self, id: &str, state: TrackOutputState) -> Result<(), MockBusError> {
        self.record(BusCall::TrackOutput {
            id: id.to_owned(),
            state,
        })
    }
}
