//! Exclusive train control ("grabs").
//!
//! A grab is a lease a session holds over one train. At most one session
//! holds a given train; trains are independent of each other. Each train's
//! slot is a compare-and-set on a sharded map, so grabbing `train1` never
//! waits on anything touching `train2`.
//!
//! # Rules
//!
//! - Grabbing needs the train to exist in the [`StateStore`].
//! - Re-grabbing a train the session already holds is a no-op success.
//! - Releasing a train nobody holds is a no-op success.
//! - Releasing a train another session holds fails with `NotOwner`.
//!
//! ```rust
//! use std::sync::Arc;
//! use rs_layout::{HardwareEvent, LayoutError, OwnershipRegistry, SessionToken, StateStore};
//!
//! let store = Arc::new(StateStore::new());
//! store.apply_event(HardwareEvent::train_discovered("train7", 7, &[])).unwrap();
//! let grabs = OwnershipRegistry::new(Arc::clone(&store));
//!
//! let a = SessionToken::from("sessionA");
//! let b = SessionToken::from("sessionB");
//!
//! grabs.grab("train7", &a).unwrap();
//! assert!(matches!(grabs.grab("train7", &b), Err(LayoutError::AlreadyGrabbed { .. })));
//! grabs.release("train7", &a).unwrap();
//! grabs.grab("train7", &b).unwrap();
//! ```

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use crate::error::{LayoutError, Result};
use crate::state::{Category, Identifier, SessionToken};
use crate::store::StateStore;

/// What a successful grab did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GrabOutcome {
    /// The train was free and is now held by the caller.
    Granted,
    /// The caller already held the train.
    AlreadyHeld,
}

/// What a successful release did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The caller's grab was removed.
    Released,
    /// Nobody held the train.
    NotGrabbed,
}

/// Train → owning session.
pub struct OwnershipRegistry {
    store: Arc<StateStore>,
    grabs: DashMap<Identifier, SessionToken>,
}

impl OwnershipRegistry {
    /// Creates an empty registry checking train existence against `store`.
    pub fn new(store: Arc<StateStore>) -> Self {
        Self {
            store,
            grabs: DashMap::new(),
        }
    }

    /// Take exclusive control of a train.
    ///
    /// # Errors
    ///
    /// - [`LayoutError::InvalidArgument`] for a malformed train id
    /// - [`LayoutError::UnknownTrain`] if the store does not know the train
    /// - [`LayoutError::AlreadyGrabbed`] if another session holds it
    pub fn grab(&self, train: &str, session: &SessionToken) -> Result<GrabOutcome> {
        let train = Identifier::new(train)?;
        if !self.store.contains(Category::Train, train.as_str()) {
            return Err(LayoutError::UnknownTrain(train.into()));
        }

        let outcome = match self.grabs.entry(train.clone()) {
            Entry::Occupied(held) if held.get() == session => GrabOutcome::AlreadyHeld,
            Entry::Occupied(held) => {
                return Err(LayoutError::AlreadyGrabbed {
                    train,
                    owner: held.get().clone(),
                });
            }
            Entry::Vacant(free) => {
                free.insert(session.clone());
                GrabOutcome::Granted
            }
        };

        // The train may have been removed between the existence check and the
        // insert; removal clears grabs after the store, so checking again here
        // closes the gap.
        if outcome == GrabOutcome::Granted && !self.store.contains(Category::Train, train.as_str()) {
            self.grabs.remove_if(&train, |_, owner| owner == session);
            return Err(LayoutError::UnknownTrain(train.into()));
        }

        debug!(train = %train, session = %session, ?outcome, "grab");
        Ok(outcome)
    }

    /// Give up control of a train.
    ///
    /// # Errors
    ///
    /// - [`LayoutError::InvalidArgument`] for a malformed train id
    /// - [`LayoutError::NotOwner`] if another session holds the train
    pub fn release(&self, train: &str, session: &SessionToken) -> Result<ReleaseOutcome> {
        let train = Identifier::new(train)?;
        let outcome = match self.grabs.entry(train.clone()) {
            Entry::Occupied(held) if held.get() == session => {
                held.remove();
                ReleaseOutcome::Released
            }
            Entry::Occupied(_) => return Err(LayoutError::NotOwner { train }),
            Entry::Vacant(_) => ReleaseOutcome::NotGrabbed,
        };
        debug!(train = %train, session = %session, ?outcome, "release");
        Ok(outcome)
    }

    /// Release every train held by `session`. Returns the released trains.
    ///
    /// Each train's slot is cleared under its shard lock, so a concurrent grab
    /// by another session either sees the old owner and fails, or sees the
    /// slot free and succeeds.
    pub fn release_all(&self, session: &SessionToken) -> Vec<Identifier> {
        let mut released = Vec::new();
        self.grabs.retain(|train, owner| {
            if owner == session {
                released.push(train.clone());
                false
            } else {
                true
            }
        });
        released.sort();
        if !released.is_empty() {
            debug!(session = %session, count = released.len(), "released all grabs");
        }
        released
    }

    /// Whether anyone holds the train.
    pub fn is_grabbed(&self, train: &str) -> bool {
        self.grabs.contains_key(train)
    }

    /// Session holding the train, if any.
    pub fn owner_of(&self, train: &str) -> Option<SessionToken> {
        self.grabs.get(train).map(|owner| owner.value().clone())
    }

    /// Whether `session` holds the train.
    pub fn is_owner(&self, train: &str, session: &SessionToken) -> bool {
        self.grabs
            .get(train)
            .is_some_and(|owner| owner.value() == session)
    }

    /// Run `f` while `session` holds `train`.
    ///
    /// The grab's shard stays read-locked until `f` returns, so no release or
    /// competing grab of the train can complete in between.
    ///
    /// # Errors
    ///
    /// [`LayoutError::NotOwner`] if `session` does not hold the train.
    pub fn with_grab<R>(&self, train: &str, session: &SessionToken, f: impl FnOnce() -> R) -> Result<R> {
        match self.grabs.get(train) {
            Some(owner) if owner.value() == session => Ok(f()),
            _ => Err(LayoutError::NotOwner {
                train: Identifier::new(train)?,
            }),
        }
    }

    /// Trains currently held by `session`, in no particular order.
    pub fn grabbed_by(&self, session: &SessionToken) -> Vec<Identifier> {
        self.grabs
            .iter()
            .filter(|e| e.value() == session)
            .map(|e| e.key().clone())
            .collect()
    }

    /// Every grabbed train with its owner, sorted by train id.
    pub fn grabbed_trains(&self) -> Vec<(Identifier, SessionToken)> {
        let mut all: Vec<_> = self
            .grabs
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Drop the grab on a removed train, whoever holds it.
    pub fn forget_train(&self, train: &str) -> Option<SessionToken> {
        self.grabs.remove(train).map(|(_, owner)| owner)
    }

    /// Number of grabbed trains.
    pub fn len(&self) -> usize {
        self.grabs.len()
    }

    /// Returns true if no train is grabbed.
    pub fn is_empty(&self) -> bool {
        self.grabs.is_empty()
    }

    /// Drop every grab (system shutdown).
    pub fn clear(&self) {
        self.grabs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::HardwareEvent;
    use std::sync::Barrier;
    use std::thread;

    fn registry_with(trains: &[&str]) -> (Arc<StateStore>, OwnershipRegistry) {
        let store = Arc::new(StateStore::new());
        for (i, id) in trains.iter().enumerate() {
            store
                .apply_event(HardwareEvent::train_discovered(id, i as u16 + 1, &[]))
                .unwrap();
        }
        let registry = OwnershipRegistry::new(Arc::clone(&store));
        (store, registry)
    }

    fn token(s: &str) -> SessionToken {
        SessionToken::from(s)
    }

    #[test]
    fn grab_release_scenario() {
        let (_store, grabs) = registry_with(&["train7"]);
        let a = token("sessionA");
        let b = token("sessionB");

        assert_eq!(grabs.grab("train7", &a).unwrap(), GrabOutcome::Granted);
        assert!(matches!(
            grabs.grab("train7", &b),
            Err(LayoutError::AlreadyGrabbed { ref owner, .. }) if *owner == a
        ));
        assert_eq!(grabs.release("train7", &a).unwrap(), ReleaseOutcome::Released);
        assert_eq!(grabs.grab("train7", &b).unwrap(), GrabOutcome::Granted);
        assert_eq!(grabs.owner_of("train7"), Some(b));
    }

    #[test]
    fn regrab_by_same_session_is_idempotent() {
        let (_store, grabs) = registry_with(&["train7"]);
        let a = token("a");
        grabs.grab("train7", &a).unwrap();
        assert_eq!(grabs.grab("train7", &a).unwrap(), GrabOutcome::AlreadyHeld);
        assert_eq!(grabs.len(), 1);
    }

    #[test]
    fn grab_unknown_train_fails() {
        let (_store, grabs) = registry_with(&[]);
        assert!(matches!(
            grabs.grab("ghost", &token("a")),
            Err(LayoutError::UnknownTrain(_))
        ));
        assert!(!grabs.is_grabbed("ghost"));
    }

    #[test]
    fn grab_malformed_id_fails() {
        let (_store, grabs) = registry_with(&[]);
        assert!(matches!(
            grabs.grab("", &token("a")),
            Err(LayoutError::InvalidArgument(_))
        ));
    }

    #[test]
    fn double_release_is_noop() {
        let (_store, grabs) = registry_with(&["train7"]);
        let a = token("a");
        grabs.grab("train7", &a).unwrap();
        assert_eq!(grabs.release("train7", &a).unwrap(), ReleaseOutcome::Released);
        assert_eq!(grabs.release("train7", &a).unwrap(), ReleaseOutcome::NotGrabbed);
    }

    #[test]
    fn release_by_non_owner_fails() {
        let (_store, grabs) = registry_with(&["train7"]);
        grabs.grab("train7", &token("a")).unwrap();
        assert!(matches!(
            grabs.release("train7", &token("b")),
            Err(LayoutError::NotOwner { .. })
        ));
        assert!(grabs.is_grabbed("train7"));
    }

    #[test]
    fn release_all_only_touches_own_trains() {
        let (_store, grabs) = registry_with(&["t1", "t2", "t3"]);
        let a = token("a");
        let b = token("b");
        grabs.grab("t1", &a).unwrap();
        grabs.grab("t2", &b).unwrap();
        grabs.grab("t3", &a).unwrap();

        let mut released = grabs.release_all(&a);
        released.sort();
        let names: Vec<_> = released.iter().map(Identifier::as_str).collect();
        assert_eq!(names, vec!["t1", "t3"]);
        assert!(!grabs.is_grabbed("t1"));
        assert!(grabs.is_owner("t2", &b));
        assert!(grabs.release_all(&a).is_empty());
    }

    #[test]
    fn grab_does_not_affect_existence() {
        let (store, grabs) = registry_with(&["train7"]);
        grabs.grab("train7", &token("a")).unwrap();
        assert!(store.train_state("train7").unwrap().known);
        grabs.release("train7", &token("a")).unwrap();
        assert!(store.train_state("train7").unwrap().known);
    }

    #[test]
    fn forget_train_clears_grab() {
        let (_store, grabs) = registry_with(&["train7"]);
        grabs.grab("train7", &token("a")).unwrap();
        assert_eq!(grabs.forget_train("train7"), Some(token("a")));
        assert!(grabs.is_empty());
    }

    #[test]
    fn with_grab_runs_only_for_the_holder() {
        let (_store, grabs) = registry_with(&["train7", "train8"]);
        grabs.grab("train7", &token("a")).unwrap();

        assert_eq!(grabs.with_grab("train7", &token("a"), || 40), Ok(40));
        let mut ran = false;
        assert!(matches!(
            grabs.with_grab("train7", &token("b"), || ran = true),
            Err(LayoutError::NotOwner { .. })
        ));
        assert!(matches!(
            grabs.with_grab("train8", &token("a"), || ran = true),
            Err(LayoutError::NotOwner { .. })
        ));
        assert!(!ran);
    }

    #[test]
    fn grabbed_by_lists_session_trains() {
        let (_store, grabs) = registry_with(&["t1", "t2"]);
        grabs.grab("t2", &token("a")).unwrap();
        let held = grabs.grabbed_by(&token("a"));
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].as_str(), "t2");

        grabs.grab("t1", &token("b")).unwrap();
        let all: Vec<_> = grabs
            .grabbed_trains()
            .into_iter()
            .map(|(train, owner)| (train.to_string(), owner))
            .collect();
        assert_eq!(
            all,
            vec![("t1".to_string(), token("b")), ("t2".to_string(), token("a"))]
        );
    }

    #[test]
    fn concurrent_grab_has_single_winner() {
        let (_store, grabs) = registry_with(&["train7"]);
        let grabs = Arc::new(grabs);
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let grabs = Arc::clone(&grabs);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    grabs.grab("train7", &SessionToken::from(format!("s{i}")))
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        assert!(results
            .iter()
            .filter(|r| r.is_err())
            .all(|r| matches!(r, Err(LayoutError::AlreadyGrabbed { .. }))));
    }

    #[test]
    fn release_all_races_with_other_grabs() {
        let trains: Vec<String> = (0..64).map(|i| format!("t{i}")).collect();
        let ids: Vec<&str> = trains.iter().map(String::as_str).collect();
        let (_store, grabs) = registry_with(&ids);
        let grabs = Arc::new(grabs);
        let a = token("a");
        for id in &ids {
            grabs.grab(id, &a).unwrap();
        }

        let contender = {
            let grabs = Arc::clone(&grabs);
            let trains = trains.clone();
            thread::spawn(move || {
                let b = token("b");
                let mut won = 0;
                for id in &trains {
                    if grabs.grab(id, &b).is_ok() {
                        won += 1;
                    }
                }
                won
            })
        };
        let released = grabs.release_all(&a);
        let won = contender.join().unwrap();

        assert_eq!(released.len(), 64);
        // Every train ends up either free or held by b, never by a.
        assert!(grabs.grabbed_by(&a).is_empty());
        assert_eq!(grabs.grabbed_by(&token("b")).len(), won);
    }
}
