//! Hardware state-change events delivered by the device layer.
//!
//! Events arrive at-least-once, in order per entity, with no ordering across
//! entities. Identifiers are carried as raw strings because they come from
//! outside; the store validates them when applying.
//!
//! ```rust
//! use rs_layout::{Category, HardwareEvent, StateStore, TrackOutputState};
//!
//! let store = StateStore::new();
//! store.apply_event(HardwareEvent::track_output("cs1", 0x03)).unwrap();
//!
//! let query = store.track_output_state("cs1").unwrap();
//! assert!(query.known);
//! assert_eq!(query.state, TrackOutputState::Go);
//! assert_eq!(store.list(Category::TrackOutput)[0].as_str(), "cs1");
//! ```

use std::collections::BTreeSet;

use crate::state::{AccessoryKind, Category, Direction, PeripheralState};

/// A single state change reported by the hardware.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "event", rename_all = "snake_case"))]
pub enum HardwareEvent {
    /// A train was announced on the bus (or re-announced).
    TrainDiscovered {
        /// Train identifier.
        id: String,
        /// DCC address of the train's decoder.
        dcc_address: u16,
        /// Names of the train's switchable peripherals.
        peripherals: Vec<String>,
    },
    /// New drive state for a known train.
    TrainState {
        /// Train identifier.
        id: String,
        /// Detected on track.
        on_track: bool,
        /// Direction of travel.
        direction: Direction,
        /// Speed step.
        speed_step: u8,
    },
    /// One peripheral of a known train switched.
    TrainPeripheral {
        /// Train identifier.
        id: String,
        /// Peripheral name.
        peripheral: String,
        /// New state.
        state: PeripheralState,
    },
    /// A point or signal was announced.
    AccessoryDiscovered {
        /// [`Category::Point`] or [`Category::Signal`].
        category: Category,
        /// Accessory identifier.
        id: String,
        /// Wiring.
        kind: AccessoryKind,
        /// Declared aspects, in order.
        aspects: Vec<String>,
        /// Aspect reported at discovery.
        initial: String,
    },
    /// A known point or signal changed aspect.
    AccessoryAspect {
        /// [`Category::Point`] or [`Category::Signal`].
        category: Category,
        /// Accessory identifier.
        id: String,
        /// New aspect.
        aspect: String,
    },
    /// A detection segment was announced (initially free).
    SegmentDiscovered {
        /// Segment identifier.
        id: String,
    },
    /// Occupancy report. Creates the segment if it was not announced yet.
    SegmentOccupancy {
        /// Segment identifier.
        id: String,
        /// Whether anything is detected.
        occupied: bool,
        /// DCC addresses detected on the segment.
        dcc_addresses: BTreeSet<u16>,
    },
    /// Command-station state of a track output. Creates the output on first report.
    TrackOutput {
        /// Track output identifier.
        id: String,
        /// Raw command-station state code.
        code: u8,
    },
    /// Explicit device removal.
    Removed {
        /// Category of the removed entity.
        category: Category,
        /// Identifier of the removed entity.
        id: String,
    },
}

impl HardwareEvent {
    /// Category of the entity this event touches.
    pub fn category(&self) -> Category {
        match self {
            HardwareEvent::TrainDiscovered { .. }
            | HardwareEvent::TrainState { .. }
            | HardwareEvent::TrainPeripheral { .. } => Category::Train,
            HardwareEvent::AccessoryDiscovered { category, .. }
            | HardwareEvent::AccessoryAspect { category, .. }
            | HardwareEvent::Removed { category, .. } => *category,
            HardwareEvent::SegmentDiscovered { .. } | HardwareEvent::SegmentOccupancy { .. } => {
                Category::Segment
            }
            HardwareEvent::TrackOutput { .. } => Category::TrackOutput,
        }
    }

    /// Raw identifier of the entity this event touches.
    pub fn id(&self) -> &str {
        match self {
            HardwareEvent::TrainDiscovered { id, .. }
            | HardwareEvent::TrainState { id, .. }
            | HardwareEvent::TrainPeripheral { id, .. }
            | HardwareEvent::AccessoryDiscovered { id, .. }
            | HardwareEvent::AccessoryAspect { id, .. }
            | HardwareEvent::SegmentDiscovered { id }
            | HardwareEvent::SegmentOccupancy { id, .. }
            | HardwareEvent::TrackOutput { id, .. }
            | HardwareEvent::Removed { id, .. } => id,
        }
    }

    // ------------------------------------------------------------------------
    // Convenience constructors
    // ------------------------------------------------------------------------

    /// Train announcement with the given peripherals.
    pub fn train_discovered(id: &str, dcc_address: u16, peripherals: &[&str]) -> Self {
        HardwareEvent::TrainDiscovered {
            id: id.to_owned(),
            dcc_address,
            peripherals: peripherals.iter().map(|p| (*p).to_owned()).collect(),
        }
    }

    /// Drive state update.
    pub fn train_state(id: &str, on_track: bool, direction: Direction, speed_step: u8) -> Self {
        HardwareEvent::TrainState {
            id: id.to_owned(),
            on_track,
            direction,
            speed_step,
        }
    }

    /// Point announcement; the first aspect is the initial one.
    pub fn point_discovered(id: &str, kind: AccessoryKind, aspects: &[&str]) -> Self {
        Self::accessory_discovered(Category::Point, id, kind, aspects)
    }

    /// Signal announcement; the first aspect is the initial one.
    pub fn signal_discovered(id: &str, kind: AccessoryKind, aspects: &[&str]) -> Self {
        Self::accessory_discovered(Category::Signal, id, kind, aspects)
    }

    fn accessory_discovered(
        category: Category,
        id: &str,
        kind: AccessoryKind,
        aspects: &[&str],
    ) -> Self {
        HardwareEvent::AccessoryDiscovered {
            category,
            id: id.to_owned(),
            kind,
            aspects: aspects.iter().map(|a| (*a).to_owned()).collect(),
            initial: aspects.first().map(|a| (*a).to_owned()).unwrap_or_default(),
        }
    }

    /// Aspect change of a point or signal.
    pub fn aspect(category: Category, id: &str, aspect: &str) -> Self {
        HardwareEvent::AccessoryAspect {
            category,
            id: id.to_owned(),
            aspect: aspect.to_owned(),
        }
    }

    /// Occupancy report. `occupied` is true whenever any address is given.
    pub fn occupancy(id: &str, occupied: bool, dcc_addresses: &[u16]) -> Self {
        HardwareEvent::SegmentOccupancy {
            id: id.to_owned(),
            occupied,
            dcc_addresses: dcc_addresses.iter().copied().collect(),
        }
    }

    /// Track output state report.
    pub fn track_output(id: &str, code: u8) -> Self {
        HardwareEvent::TrackOutput {
            id: id.to_owned(),
            code,
        }
    }
}
