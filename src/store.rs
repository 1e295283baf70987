//! Concurrent store of the layout's current known state.
//!
//! Each category lives in its own `Registry`: a sharded map from identifier
//! to an individually locked entry, plus an insertion-order index that is only
//! written on structural changes (discovery, removal). Updating one entity
//! takes that entity's write lock and nothing else, so a burst of occupancy
//! reports never stalls a train query.
//!
//! Readers clone the entry under its read lock. A snapshot is therefore always
//! a whole entry as written by one event, never a mix of two.
//!
//! # Example
//!
//! ```rust
//! use rs_layout::{Category, HardwareEvent, StateStore};
//!
//! let store = StateStore::new();
//! assert!(!store.train_state("train7").unwrap().known);
//!
//! store
//!     .apply_event(HardwareEvent::train_discovered("train7", 7, &["head_light"]))
//!     .unwrap();
//! assert!(store.train_state("train7").unwrap().known);
//!
//! store.apply_event(HardwareEvent::occupancy("seg1", true, &[1, 2])).unwrap();
//! let seg = store.segment_state("seg1").unwrap();
//! assert!(seg.occupied);
//! assert_eq!(seg.dcc_addresses.len(), 2);
//! ```

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use crate::error::{EventError, LayoutError, Result};
use crate::events::HardwareEvent;
use crate::state::{
    AccessoryKind, AccessoryState, Category, Identifier, PeripheralState, SegmentState,
    TrackOutputQuery, TrackOutputState, TrainState, MAX_SPEED_STEP,
};

// ============================================================================
// Lock helpers
// ============================================================================

// A panic while holding an entry lock leaves a value that was fully written
// by the last successful event, so poisoned locks are entered anyway.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Registry
// ============================================================================

/// Insertion-ordered map of independently locked entries.
struct Registry<T> {
    entries: DashMap<Identifier, Arc<RwLock<T>>>,
    order: RwLock<Vec<Identifier>>,
}

impl<T: Clone> Registry<T> {
    fn new() -> Self {
        Self {
            entries: DashMap::new(),
            order: RwLock::new(Vec::new()),
        }
    }

    fn slot(&self, id: &str) -> Option<Arc<RwLock<T>>> {
        // Clone the Arc out so the shard lock is released before the entry
        // lock is taken.
        self.entries.get(id).map(|e| Arc::clone(e.value()))
    }

    fn snapshot(&self, id: &str) -> Option<T> {
        self.slot(id).map(|slot| read(&slot).clone())
    }

    fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    fn ids(&self) -> Vec<Identifier> {
        read(&self.order).clone()
    }

    /// Run `update` on an existing entry under its write lock.
    fn update<R>(&self, id: &str, update: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.slot(id).map(|slot| update(&mut *write(&slot)))
    }

    /// Insert a new entry, or update the existing one in place.
    ///
    /// Returns `true` if the entry was created.
    fn upsert(&self, id: Identifier, create: impl FnOnce() -> T, update: impl FnOnce(&mut T)) -> bool {
        if let Some(slot) = self.slot(id.as_str()) {
            update(&mut *write(&slot));
            return false;
        }
        // Structural change: hold the order lock so the index and the map
        // never disagree about membership.
        let mut order = write(&self.order);
        match self.entries.entry(id.clone()) {
            Entry::Occupied(existing) => {
                let slot = Arc::clone(existing.get());
                drop(existing);
                drop(order);
                update(&mut *write(&slot));
                false
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::new(RwLock::new(create())));
                order.push(id);
                true
            }
        }
    }

    fn remove(&self, id: &str) -> bool {
        let mut order = write(&self.order);
        if self.entries.remove(id).is_some() {
            order.retain(|existing| existing.as_str() != id);
            true
        } else {
            false
        }
    }

    fn clear(&self) {
        let mut order = write(&self.order);
        self.entries.clear();
        order.clear();
    }

    /// Find the first entry in insertion order matching `pred`.
    fn find(&self, pred: impl Fn(&T) -> bool) -> Option<Identifier> {
        self.ids()
            .into_iter()
            .find(|id| self.snapshot(id.as_str()).is_some_and(|entry| pred(&entry)))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

// ============================================================================
// Entries
// ============================================================================

#[derive(Clone, Debug)]
struct TrainEntry {
    dcc_address: u16,
    state: TrainState,
    peripherals: Vec<(Identifier, PeripheralState)>,
}

#[derive(Clone, Debug)]
struct AccessoryEntry {
    aspects: Vec<String>,
    state: AccessoryState,
}

// ============================================================================
// State Store
// ============================================================================

/// Current known state of every entity on the layout.
///
/// All methods take `&self`; share the store behind an `Arc`. Queries never
/// perform I/O and only wait on the lock of the entry being read.
pub struct StateStore {
    trains: Registry<TrainEntry>,
    points: Registry<AccessoryEntry>,
    signals: Registry<AccessoryEntry>,
    segments: Registry<SegmentState>,
    track_outputs: Registry<TrackOutputState>,
}

impl StateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            trains: Registry::new(),
            points: Registry::new(),
            signals: Registry::new(),
            segments: Registry::new(),
            track_outputs: Registry::new(),
        }
    }

    fn accessories(&self, category: Category) -> Option<&Registry<AccessoryEntry>> {
        match category {
            Category::Point => Some(&self.points),
            Category::Signal => Some(&self.signals),
            _ => None,
        }
    }

    // ------------------------------------------------------------------------
    // Listings
    // ------------------------------------------------------------------------

    /// Identifiers of a category in discovery order, without duplicates.
    pub fn list(&self, category: Category) -> Vec<Identifier> {
        match category {
            Category::Train => self.trains.ids(),
            Category::Point => self.points.ids(),
            Category::Signal => self.signals.ids(),
            Category::Segment => self.segments.ids(),
            Category::TrackOutput => self.track_outputs.ids(),
        }
    }

    /// Whether `id` is registered in `category`.
    pub fn contains(&self, category: Category, id: &str) -> bool {
        match category {
            Category::Train => self.trains.contains(id),
            Category::Point => self.points.contains(id),
            Category::Signal => self.signals.contains(id),
            Category::Segment => self.segments.contains(id),
            Category::TrackOutput => self.track_outputs.contains(id),
        }
    }

    /// Number of registered entities in `category`.
    pub fn count(&self, category: Category) -> usize {
        match category {
            Category::Train => self.trains.len(),
            Category::Point => self.points.len(),
            Category::Signal => self.signals.len(),
            Category::Segment => self.segments.len(),
            Category::TrackOutput => self.track_outputs.len(),
        }
    }

    // ------------------------------------------------------------------------
    // Per-entity state
    // ------------------------------------------------------------------------

    /// Drive state of a train; `known == false` if the train was never seen.
    ///
    /// # Errors
    ///
    /// [`LayoutError::InvalidArgument`] if `id` is not a valid identifier.
    pub fn train_state(&self, id: &str) -> Result<TrainState> {
        Identifier::new(id)?;
        Ok(self
            .trains
            .snapshot(id)
            .map(|entry| entry.state)
            .unwrap_or_else(TrainState::unknown))
    }

    /// DCC address of a known train.
    pub fn train_address(&self, id: &str) -> Option<u16> {
        self.trains.snapshot(id).map(|entry| entry.dcc_address)
    }

    /// Peripherals of a train with their current state, in declaration order.
    pub fn train_peripherals(&self, id: &str) -> Result<Vec<(Identifier, PeripheralState)>> {
        Identifier::new(id)?;
        self.trains
            .snapshot(id)
            .map(|entry| entry.peripherals)
            .ok_or_else(|| LayoutError::not_found(Category::Train, id))
    }

    /// Train using `dcc_address`, if any. When several trains share the
    /// address, the earliest discovered one wins.
    pub fn train_by_address(&self, dcc_address: u16) -> Option<Identifier> {
        self.trains.find(|entry| entry.dcc_address == dcc_address)
    }

    /// Current aspect of a point or signal.
    pub fn accessory_state(&self, category: Category, id: &str) -> Result<AccessoryState> {
        Identifier::new(id)?;
        let registry = self
            .accessories(category)
            .ok_or_else(|| LayoutError::InvalidArgument(format!("{category} is not an accessory")))?;
        registry
            .snapshot(id)
            .map(|entry| entry.state)
            .ok_or_else(|| LayoutError::not_found(category, id))
    }

    /// Declared aspects of a point or signal.
    pub fn aspects(&self, category: Category, id: &str) -> Result<Vec<String>> {
        Identifier::new(id)?;
        let registry = self
            .accessories(category)
            .ok_or_else(|| LayoutError::InvalidArgument(format!("{category} is not an accessory")))?;
        registry
            .snapshot(id)
            .map(|entry| entry.aspects)
            .ok_or_else(|| LayoutError::not_found(category, id))
    }

    /// Occupancy of a segment.
    pub fn segment_state(&self, id: &str) -> Result<SegmentState> {
        Identifier::new(id)?;
        self.segments
            .snapshot(id)
            .ok_or_else(|| LayoutError::not_found(Category::Segment, id))
    }

    /// State of a track output; `known == false` if it does not exist.
    ///
    /// # Errors
    ///
    /// [`LayoutError::InvalidArgument`] if `id` is not a valid identifier.
    pub fn track_output_state(&self, id: &str) -> Result<TrackOutputQuery> {
        Identifier::new(id)?;
        Ok(match self.track_outputs.snapshot(id) {
            Some(state) => TrackOutputQuery { known: true, state },
            None => TrackOutputQuery::default(),
        })
    }

    // ------------------------------------------------------------------------
    // Updates
    // ------------------------------------------------------------------------

    /// Apply one hardware event.
    ///
    /// The touched entry is replaced under its own write lock; concurrent
    /// readers see either the old or the new entry. A malformed event leaves
    /// the store unchanged.
    pub fn apply_event(&self, event: HardwareEvent) -> core::result::Result<(), EventError> {
        match event {
            HardwareEvent::TrainDiscovered {
                id,
                dcc_address,
                peripherals,
            } => {
                let id = Identifier::new(id)?;
                let peripherals = validate_peripherals(&id, peripherals)?;
                let created = self.trains.upsert(
                    id.clone(),
                    || TrainEntry {
                        dcc_address,
                        state: TrainState {
                            known: true,
                            ..TrainState::unknown()
                        },
                        peripherals: peripherals
                            .iter()
                            .map(|p| (p.clone(), PeripheralState::Off))
                            .collect(),
                    },
                    |entry| {
                        entry.dcc_address = dcc_address;
                        // Keep the last known state of peripherals that survive.
                        let previous = std::mem::take(&mut entry.peripherals);
                        entry.peripherals = peripherals
                            .iter()
                            .map(|p| {
                                let state = previous
                                    .iter()
                                    .find(|(name, _)| name == p)
                                    .map(|(_, s)| *s)
                                    .unwrap_or_default();
                                (p.clone(), state)
                            })
                            .collect();
                    },
                );
                debug!(train = %id, dcc_address, created, "train discovered");
                Ok(())
            }

            HardwareEvent::TrainState {
                id,
                on_track,
                direction,
                speed_step,
            } => {
                if speed_step > MAX_SPEED_STEP {
                    return Err(EventError::InvalidPayload {
                        id,
                        reason: "speed step out of range",
                    });
                }
                self.trains
                    .update(&id, |entry| {
                        entry.state = TrainState {
                            on_track,
                            direction,
                            speed_step,
                            known: true,
                        };
                    })
                    .ok_or(EventError::Undiscovered {
                        category: Category::Train,
                        id,
                    })
            }

            HardwareEvent::TrainPeripheral {
                id,
                peripheral,
                state,
            } => {
                let outcome = self.trains.update(&id, |entry| {
                    match entry
                        .peripherals
                        .iter_mut()
                        .find(|(name, _)| name.as_str() == peripheral)
                    {
                        Some((_, current)) => {
                            *current = state;
                            true
                        }
                        None => false,
                    }
                });
                match outcome {
                    Some(true) => Ok(()),
                    Some(false) => Err(EventError::UnknownPeripheral {
                        train: id,
                        peripheral,
                    }),
                    None => Err(EventError::Undiscovered {
                        category: Category::Train,
                        id,
                    }),
                }
            }

            HardwareEvent::AccessoryDiscovered {
                category,
                id,
                kind,
                aspects,
                initial,
            } => {
                let registry = self
                    .accessories(category)
                    .ok_or(EventError::NotAccessory(category))?;
                let id = Identifier::new(id)?;
                let entry = build_accessory(&id, kind, aspects, initial)?;
                let replacement = entry.clone();
                registry.upsert(id, || entry, |existing| *existing = replacement);
                Ok(())
            }

            HardwareEvent::AccessoryAspect {
                category,
                id,
                aspect,
            } => {
                let registry = self
                    .accessories(category)
                    .ok_or(EventError::NotAccessory(category))?;
                let outcome = registry.update(&id, |entry| {
                    if entry.aspects.iter().any(|a| *a == aspect) {
                        entry.state.set_aspect(aspect.clone());
                        true
                    } else {
                        false
                    }
                });
                match outcome {
                    Some(true) => Ok(()),
                    Some(false) => Err(EventError::UnknownAspect { id, aspect }),
                    None => Err(EventError::Undiscovered { category, id }),
                }
            }

            HardwareEvent::SegmentDiscovered { id } => {
                let id = Identifier::new(id)?;
                self.segments.upsert(id, SegmentState::default, |_| {});
                Ok(())
            }

            HardwareEvent::SegmentOccupancy {
                id,
                occupied,
                dcc_addresses,
            } => {
                let id = Identifier::new(id)?;
                // A segment reporting addresses is occupied whatever the flag says.
                let state = SegmentState {
                    occupied: occupied || !dcc_addresses.is_empty(),
                    dcc_addresses,
                };
                let replacement = state.clone();
                self.segments
                    .upsert(id, || state, |existing| *existing = replacement);
                Ok(())
            }

            HardwareEvent::TrackOutput { id, code } => {
                let id = Identifier::new(id)?;
                let state = TrackOutputState::from_code(code);
                if state == TrackOutputState::Unknown {
                    debug!(track_output = %id, code, "unmapped track output code");
                }
                self.track_outputs
                    .upsert(id, || state, |existing| *existing = state);
                Ok(())
            }

            HardwareEvent::Removed { category, id } => {
                // Removal is delivered at-least-once; a repeat is harmless.
                let removed = match category {
                    Category::Train => self.trains.remove(&id),
                    Category::Point => self.points.remove(&id),
                    Category::Signal => self.signals.remove(&id),
                    Category::Segment => self.segments.remove(&id),
                    Category::TrackOutput => self.track_outputs.remove(&id),
                };
                debug!(%category, id = %id, removed, "device removed");
                Ok(())
            }
        }
    }

    /// Drop every entry (system shutdown).
    pub fn clear(&self) {
        self.trains.clear();
        self.points.clear();
        self.signals.clear();
        self.segments.clear();
        self.track_outputs.clear();
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_peripherals(
    train: &Identifier,
    peripherals: Vec<String>,
) -> core::result::Result<Vec<Identifier>, EventError> {
    let mut seen = HashSet::new();
    let mut validated = Vec::with_capacity(peripherals.len());
    for raw in peripherals {
        let name = Identifier::new(raw)?;
        if !seen.insert(name.clone()) {
            return Err(EventError::InvalidPayload {
                id: train.to_string(),
                reason: "duplicate peripheral",
            });
        }
        validated.push(name);
    }
    Ok(validated)
}

fn build_accessory(
    id: &Identifier,
    kind: AccessoryKind,
    aspects: Vec<String>,
    initial: String,
) -> core::result::Result<AccessoryEntry, EventError> {
    if aspects.is_empty() {
        return Err(EventError::InvalidPayload {
            id: id.to_string(),
            reason: "no aspects declared",
        });
    }
    let mut seen = HashSet::new();
    for aspect in &aspects {
        Identifier::new(aspect.as_str())?;
        if !seen.insert(aspect.as_str()) {
            return Err(EventError::InvalidPayload {
                id: id.to_string(),
                reason: "duplicate aspect",
            });
        }
    }
    if !seen.contains(initial.as_str()) {
        return Err(EventError::UnknownAspect {
            id: id.to_string(),
            aspect: initial,
        });
    }
    Ok(AccessoryEntry {
        aspects,
        state: AccessoryState::new(kind, initial),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Direction;
    use std::thread;

    fn store_with_train(id: &str, addr: u16) -> StateStore {
        let store = StateStore::new();
        store
            .apply_event(HardwareEvent::train_discovered(id, addr, &["head_light", "horn"]))
            .unwrap();
        store
    }

    #[test]
    fn unseen_train_is_unknown() {
        let store = StateStore::new();
        for id in ["train1", "train7", "nope"] {
            assert!(!store.train_state(id).unwrap().known);
        }
    }

    #[test]
    fn discovered_train_is_known_and_off_track() {
        let store = store_with_train("train7", 7);
        let state = store.train_state("train7").unwrap();
        assert!(state.known);
        assert!(!state.on_track);
        assert_eq!(store.train_address("train7"), Some(7));
    }

    #[test]
    fn train_state_event_replaces_state() {
        let store = store_with_train("train7", 7);
        store
            .apply_event(HardwareEvent::train_state("train7", true, Direction::Backward, 42))
            .unwrap();
        let state = store.train_state("train7").unwrap();
        assert!(state.on_track);
        assert_eq!(state.direction, Direction::Backward);
        assert_eq!(state.speed_step, 42);
    }

    #[test]
    fn train_state_for_undiscovered_train_is_rejected() {
        let store = StateStore::new();
        let err = store
            .apply_event(HardwareEvent::train_state("ghost", true, Direction::Forward, 1))
            .unwrap_err();
        assert!(matches!(err, EventError::Undiscovered { .. }));
        assert!(!store.train_state("ghost").unwrap().known);
    }

    #[test]
    fn speed_step_out_of_range_is_rejected() {
        let store = store_with_train("train7", 7);
        assert!(store
            .apply_event(HardwareEvent::train_state("train7", true, Direction::Forward, 127))
            .is_err());
        assert_eq!(store.train_state("train7").unwrap().speed_step, 0);
    }

    #[test]
    fn peripherals_listed_in_declaration_order() {
        let store = store_with_train("train7", 7);
        store
            .apply_event(HardwareEvent::TrainPeripheral {
                id: "train7".into(),
                peripheral: "horn".into(),
                state: PeripheralState::On,
            })
            .unwrap();
        let peripherals = store.train_peripherals("train7").unwrap();
        assert_eq!(peripherals.len(), 2);
        assert_eq!(peripherals[0].0.as_str(), "head_light");
        assert_eq!(peripherals[0].1, PeripheralState::Off);
        assert_eq!(peripherals[1].1, PeripheralState::On);
    }

    #[test]
    fn unknown_peripheral_is_rejected() {
        let store = store_with_train("train7", 7);
        let err = store
            .apply_event(HardwareEvent::TrainPeripheral {
                id: "train7".into(),
                peripheral: "smoke".into(),
                state: PeripheralState::On,
            })
            .unwrap_err();
        assert!(matches!(err, EventError::UnknownPeripheral { .. }));
    }

    #[test]
    fn rediscovery_keeps_surviving_peripheral_states() {
        let store = store_with_train("train7", 7);
        store
            .apply_event(HardwareEvent::TrainPeripheral {
                id: "train7".into(),
                peripheral: "horn".into(),
                state: PeripheralState::On,
            })
            .unwrap();
        store
            .apply_event(HardwareEvent::train_discovered("train7", 8, &["horn", "bell"]))
            .unwrap();
        let peripherals = store.train_peripherals("train7").unwrap();
        assert_eq!(peripherals[0], (Identifier::new("horn").unwrap(), PeripheralState::On));
        assert_eq!(peripherals[1].1, PeripheralState::Off);
        assert_eq!(store.train_address("train7"), Some(8));
        assert_eq!(store.list(Category::Train).len(), 1);
    }

    #[test]
    fn duplicate_peripherals_are_rejected() {
        let store = StateStore::new();
        assert!(store
            .apply_event(HardwareEvent::train_discovered("t", 1, &["horn", "horn"]))
            .is_err());
        assert!(!store.contains(Category::Train, "t"));
    }

    #[test]
    fn train_by_address() {
        let store = store_with_train("train7", 7);
        store
            .apply_event(HardwareEvent::train_discovered("train3", 3, &[]))
            .unwrap();
        assert_eq!(store.train_by_address(3).unwrap().as_str(), "train3");
        assert!(store.train_by_address(99).is_none());
    }

    #[test]
    fn shared_address_resolves_to_earliest_train() {
        let store = StateStore::new();
        for id in ["zephyr", "alpha", "mid"] {
            store
                .apply_event(HardwareEvent::train_discovered(id, 5, &[]))
                .unwrap();
        }
        for _ in 0..10 {
            assert_eq!(store.train_by_address(5).unwrap().as_str(), "zephyr");
        }
        store
            .apply_event(HardwareEvent::Removed {
                category: Category::Train,
                id: "zephyr".into(),
            })
            .unwrap();
        assert_eq!(store.train_by_address(5).unwrap().as_str(), "alpha");
    }

    #[test]
    fn malformed_ids_are_invalid_arguments() {
        let store = store_with_train("train7", 7);
        for id in ["", "two words", "tab\tid"] {
            assert!(matches!(store.train_state(id), Err(LayoutError::InvalidArgument(_))));
            assert!(matches!(
                store.track_output_state(id),
                Err(LayoutError::InvalidArgument(_))
            ));
            assert!(matches!(
                store.train_peripherals(id),
                Err(LayoutError::InvalidArgument(_))
            ));
            assert!(matches!(
                store.aspects(Category::Signal, id),
                Err(LayoutError::InvalidArgument(_))
            ));
            assert!(matches!(store.segment_state(id), Err(LayoutError::InvalidArgument(_))));
        }
    }

    #[test]
    fn accessory_lookup_unknown_is_not_found() {
        let store = StateStore::new();
        assert!(matches!(
            store.accessory_state(Category::Point, "p1"),
            Err(LayoutError::NotFound { .. })
        ));
        assert!(matches!(
            store.accessory_state(Category::Train, "p1"),
            Err(LayoutError::InvalidArgument(_))
        ));
    }

    #[test]
    fn accessory_aspect_must_be_declared() {
        let store = StateStore::new();
        store
            .apply_event(HardwareEvent::point_discovered(
                "point1",
                AccessoryKind::Board,
                &["normal", "reverse"],
            ))
            .unwrap();
        store
            .apply_event(HardwareEvent::aspect(Category::Point, "point1", "reverse"))
            .unwrap();
        assert!(store
            .apply_event(HardwareEvent::aspect(Category::Point, "point1", "sideways"))
            .is_err());

        let state = store.accessory_state(Category::Point, "point1").unwrap();
        assert_eq!(state, AccessoryState::BoardAccessory { state_id: "reverse".into() });
        assert_eq!(store.aspects(Category::Point, "point1").unwrap(), vec!["normal", "reverse"]);
    }

    #[test]
    fn points_and_signals_are_separate_namespaces() {
        let store = StateStore::new();
        store
            .apply_event(HardwareEvent::point_discovered("x1", AccessoryKind::Board, &["normal"]))
            .unwrap();
        store
            .apply_event(HardwareEvent::signal_discovered("x1", AccessoryKind::Dcc, &["stop", "go"]))
            .unwrap();
        assert_eq!(store.accessory_state(Category::Point, "x1").unwrap().aspect(), "normal");
        assert_eq!(store.accessory_state(Category::Signal, "x1").unwrap().aspect(), "stop");
    }

    #[test]
    fn accessory_discovery_validates_aspects() {
        let store = StateStore::new();
        assert!(store
            .apply_event(HardwareEvent::point_discovered("p", AccessoryKind::Board, &[]))
            .is_err());
        assert!(store
            .apply_event(HardwareEvent::point_discovered("p", AccessoryKind::Board, &["a", "a"]))
            .is_err());
        assert!(store
            .apply_event(HardwareEvent::AccessoryDiscovered {
                category: Category::Segment,
                id: "p".into(),
                kind: AccessoryKind::Board,
                aspects: vec!["a".into()],
                initial: "a".into(),
            })
            .is_err());
        assert_eq!(store.count(Category::Point), 0);
    }

    #[test]
    fn segment_occupancy_read_after_write() {
        let store = StateStore::new();
        store.apply_event(HardwareEvent::occupancy("S", true, &[1, 2])).unwrap();
        let seg = store.segment_state("S").unwrap();
        assert!(seg.occupied);
        assert_eq!(seg.dcc_addresses.into_iter().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn segment_with_addresses_is_occupied() {
        let store = StateStore::new();
        store.apply_event(HardwareEvent::occupancy("S", false, &[5])).unwrap();
        assert!(store.segment_state("S").unwrap().occupied);
    }

    #[test]
    fn unknown_segment_is_not_found() {
        let store = StateStore::new();
        assert!(store.segment_state("nope").is_err());
    }

    #[test]
    fn track_output_go() {
        let store = StateStore::new();
        assert!(!store.track_output_state("cs1").unwrap().known);
        store.apply_event(HardwareEvent::track_output("cs1", 0x03)).unwrap();
        let query = store.track_output_state("cs1").unwrap();
        assert!(query.known);
        assert_eq!(query.state, TrackOutputState::Go);
    }

    #[test]
    fn track_output_unmapped_code() {
        let store = StateStore::new();
        store.apply_event(HardwareEvent::track_output("cs1", 0x77)).unwrap();
        let query = store.track_output_state("cs1").unwrap();
        assert!(query.known);
        assert_eq!(query.state, TrackOutputState::Unknown);
    }

    #[test]
    fn listing_is_insertion_ordered_and_stable() {
        let store = StateStore::new();
        for id in ["seg3", "seg1", "seg2"] {
            store
                .apply_event(HardwareEvent::SegmentDiscovered { id: id.into() })
                .unwrap();
        }
        // Re-announcement does not duplicate or reorder.
        store.apply_event(HardwareEvent::occupancy("seg1", true, &[4])).unwrap();

        let first = store.list(Category::Segment);
        let names: Vec<_> = first.iter().map(Identifier::as_str).collect();
        assert_eq!(names, vec!["seg3", "seg1", "seg2"]);
        for _ in 0..5 {
            assert_eq!(store.list(Category::Segment), first);
        }
    }

    #[test]
    fn removal_makes_train_unknown() {
        let store = store_with_train("train7", 7);
        store
            .apply_event(HardwareEvent::Removed {
                category: Category::Train,
                id: "train7".into(),
            })
            .unwrap();
        assert!(!store.train_state("train7").unwrap().known);
        assert!(store.list(Category::Train).is_empty());

        // Duplicate delivery is harmless.
        assert!(store
            .apply_event(HardwareEvent::Removed {
                category: Category::Train,
                id: "train7".into(),
            })
            .is_ok());
    }

    #[test]
    fn malformed_identifier_is_rejected() {
        let store = StateStore::new();
        assert!(matches!(
            store.apply_event(HardwareEvent::track_output("", 0x03)),
            Err(EventError::BadIdentifier(_))
        ));
        assert!(store.list(Category::TrackOutput).is_empty());
    }

    #[test]
    fn clear_empties_every_category() {
        let store = store_with_train("train7", 7);
        store.apply_event(HardwareEvent::track_output("cs1", 0x03)).unwrap();
        store.clear();
        for category in Category::ALL {
            assert!(store.list(category).is_empty());
        }
    }

    #[test]
    fn concurrent_occupancy_never_torn() {
        let store = Arc::new(StateStore::new());
        store.apply_event(HardwareEvent::occupancy("S", false, &[])).unwrap();

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..2000 {
                    let ev = if i % 2 == 0 {
                        HardwareEvent::occupancy("S", true, &[1, 2])
                    } else {
                        HardwareEvent::occupancy("S", false, &[])
                    };
                    store.apply_event(ev).unwrap();
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..2000 {
                        let seg = store.segment_state("S").unwrap();
                        if seg.occupied {
                            assert_eq!(seg.dcc_addresses.len(), 2);
                        } else {
                            assert!(seg.dcc_addresses.is_empty());
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }

    #[test]
    fn concurrent_discovery_has_no_duplicates() {
        let store = Arc::new(StateStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..50 {
                        let id = format!("seg{i}");
                        store
                            .apply_event(HardwareEvent::SegmentDiscovered { id })
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let ids = store.list(Category::Segment);
        assert_eq!(ids.len(), 50);
        assert_eq!(store.count(Category::Segment), 50);
    }
}
