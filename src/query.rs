//! Read-only projections over the store and the grab registry.
//!
//! This is what the presentation layer consumes. Every call reads per-entity
//! snapshots and returns owned values; nothing here waits on hardware I/O or
//! changes state, so a query can be dropped at any point.
//!
//! Listings are composed per entity: an entity removed between the listing
//! and its state read is skipped rather than reported half-known.

use std::sync::Arc;

use crate::error::Result;
use crate::ownership::OwnershipRegistry;
use crate::state::{
    AccessoryState, Category, Identifier, PeripheralState, SessionToken, TrackOutputState,
    TrainState,
};
use crate::store::StateStore;

/// A train and whether some session holds it.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrainSummary {
    /// Train identifier.
    pub id: Identifier,
    /// Whether the train is grabbed.
    pub grabbed: bool,
}

/// A train peripheral and its state.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PeripheralSummary {
    /// Peripheral name.
    pub id: Identifier,
    /// Current state.
    pub state: PeripheralState,
}

/// A known track output and its state.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackOutputSummary {
    /// Output identifier.
    pub id: Identifier,
    /// Command-station state.
    pub state: TrackOutputState,
}

/// A point or signal and its current aspect.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AccessorySummary {
    /// Accessory identifier.
    pub id: Identifier,
    /// Current state.
    pub state: AccessoryState,
}

/// A segment with its detected trains resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SegmentSummary {
    /// Segment identifier.
    pub id: Identifier,
    /// Whether the segment is occupied.
    pub occupied: bool,
    /// One entry per detected DCC address; `None` when no known train uses it.
    pub trains: Vec<Option<Identifier>>,
}

/// Query facade for the presentation layer.
#[derive(Clone)]
pub struct QueryService {
    store: Arc<StateStore>,
    grabs: Arc<OwnershipRegistry>,
}

impl QueryService {
    /// Creates a query service over `store` and `grabs`.
    pub fn new(store: Arc<StateStore>, grabs: Arc<OwnershipRegistry>) -> Self {
        Self { store, grabs }
    }

    /// All trains in discovery order, with grab status.
    pub fn trains(&self) -> Vec<TrainSummary> {
        self.store
            .list(Category::Train)
            .into_iter()
            .map(|id| {
                let grabbed = self.grabs.is_grabbed(id.as_str());
                TrainSummary { id, grabbed }
            })
            .collect()
    }

    /// Drive state of one train (`known == false` if absent).
    pub fn train_state(&self, id: &str) -> Result<TrainState> {
        self.store.train_state(id)
    }

    /// Peripherals of one train.
    pub fn train_peripherals(&self, id: &str) -> Result<Vec<PeripheralSummary>> {
        Ok(self
            .store
            .train_peripherals(id)?
            .into_iter()
            .map(|(id, state)| PeripheralSummary { id, state })
            .collect())
    }

    /// Every known track output with its state.
    pub fn track_outputs(&self) -> Vec<TrackOutputSummary> {
        self.store
            .list(Category::TrackOutput)
            .into_iter()
            .filter_map(|id| {
                let query = self.store.track_output_state(id.as_str()).ok()?;
                query.known.then_some(TrackOutputSummary {
                    id,
                    state: query.state,
                })
            })
            .collect()
    }

    /// Every point with its aspect.
    pub fn points(&self) -> Vec<AccessorySummary> {
        self.accessories(Category::Point)
    }

    /// Every signal with its aspect.
    pub fn signals(&self) -> Vec<AccessorySummary> {
        self.accessories(Category::Signal)
    }

    fn accessories(&self, category: Category) -> Vec<AccessorySummary> {
        self.store
            .list(category)
            .into_iter()
            .filter_map(|id| {
                let state = self.store.accessory_state(category, id.as_str()).ok()?;
                Some(AccessorySummary { id, state })
            })
            .collect()
    }

    /// Declared aspects of a point.
    pub fn point_aspects(&self, id: &str) -> Result<Vec<String>> {
        self.store.aspects(Category::Point, id)
    }

    /// Declared aspects of a signal.
    pub fn signal_aspects(&self, id: &str) -> Result<Vec<String>> {
        self.store.aspects(Category::Signal, id)
    }

    /// Every segment with occupancy and detected trains.
    pub fn segments(&self) -> Vec<SegmentSummary> {
        self.store
            .list(Category::Segment)
            .into_iter()
            .filter_map(|id| {
                let state = self.store.segment_state(id.as_str()).ok()?;
                let trains = state
                    .dcc_addresses
                    .iter()
                    .map(|addr| self.store.train_by_address(*addr))
                    .collect();
                Some(SegmentSummary {
                    id,
                    occupied: state.occupied,
                    trains,
                })
            })
            .collect()
    }

    /// Session holding a train, for callers that need more than a flag.
    pub fn train_owner(&self, id: &str) -> Option<SessionToken> {
        self.grabs.owner_of(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::HardwareEvent;
    use crate::state::AccessoryKind;

    fn service() -> (Arc<StateStore>, Arc<OwnershipRegistry>, QueryService) {
        let store = Arc::new(StateStore::new());
        let grabs = Arc::new(OwnershipRegistry::new(Arc::clone(&store)));
        let query = QueryService::new(Arc::clone(&store), Arc::clone(&grabs));
        (store, grabs, query)
    }

    #[test]
    fn trains_carry_grab_status() {
        let (store, grabs, query) = service();
        store.apply_event(HardwareEvent::train_discovered("t1", 1, &[])).unwrap();
        store.apply_event(HardwareEvent::train_discovered("t2", 2, &[])).unwrap();
        grabs.grab("t2", &SessionToken::from("a")).unwrap();

        let trains = query.trains();
        assert_eq!(trains.len(), 2);
        assert_eq!(trains[0].id.as_str(), "t1");
        assert!(!trains[0].grabbed);
        assert!(trains[1].grabbed);
        assert_eq!(query.train_owner("t2"), Some(SessionToken::from("a")));
    }

    #[test]
    fn segments_resolve_addresses() {
        let (store, _grabs, query) = service();
        store.apply_event(HardwareEvent::train_discovered("t1", 1, &[])).unwrap();
        store.apply_event(HardwareEvent::occupancy("seg1", true, &[1, 9])).unwrap();
        store.apply_event(HardwareEvent::SegmentDiscovered { id: "seg2".into() }).unwrap();

        let segments = query.segments();
        assert_eq!(segments.len(), 2);
        assert!(segments[0].occupied);
        assert_eq!(
            segments[0].trains,
            vec![Some(Identifier::new("t1").unwrap()), None]
        );
        assert!(!segments[1].occupied);
        assert!(segments[1].trains.is_empty());
    }

    #[test]
    fn accessories_and_aspects() {
        let (store, _grabs, query) = service();
        store
            .apply_event(HardwareEvent::point_discovered("p1", AccessoryKind::Dcc, &["normal", "reverse"]))
            .unwrap();
        store
            .apply_event(HardwareEvent::signal_discovered("s1", AccessoryKind::Board, &["stop", "go"]))
            .unwrap();

        let points = query.points();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].state.aspect(), "normal");
        assert_eq!(query.signals()[0].state.aspect(), "stop");
        assert_eq!(query.point_aspects("p1").unwrap(), vec!["normal", "reverse"]);
        assert!(query.signal_aspects("p1").is_err());
    }

    #[test]
    fn track_outputs_listed_with_state() {
        let (store, _grabs, query) = service();
        store.apply_event(HardwareEvent::track_output("cs1", 0x03)).unwrap();
        store.apply_event(HardwareEvent::track_output("cs2", 0x00)).unwrap();
        let outputs = query.track_outputs();
        assert_eq!(outputs[0].state, TrackOutputState::Go);
        assert_eq!(outputs[1].state, TrackOutputState::Off);
    }

    #[test]
    fn peripherals_of_unknown_train_not_found() {
        let (_store, _grabs, query) = service();
        assert!(query.train_peripherals("ghost").is_err());
        assert!(!query.train_state("ghost").unwrap().known);
        assert!(query.train_state("").is_err());
    }
}
