//! Authorization and forwarding of control commands.
//!
//! The dispatcher checks a command against the grab registry and the store,
//! then hands it to the [`TrackBus`]. It never writes to the store: the
//! hardware reports the resulting state through events like any other change.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use crate::commands::LayoutCommand;
use crate::error::{LayoutError, Result};
use crate::ownership::OwnershipRegistry;
use crate::state::{Category, SessionToken, TrackOutputState, MAX_SPEED_STEP};
use crate::store::StateStore;
use crate::traits::TrackBus;

/// Validates commands and forwards them to the bus.
pub struct CommandDispatcher<B: TrackBus> {
    store: Arc<StateStore>,
    grabs: Arc<OwnershipRegistry>,
    // One physical bus: writes to it are serialized.
    bus: Mutex<B>,
}

impl<B: TrackBus> CommandDispatcher<B> {
    /// Creates a dispatcher forwarding to `bus`.
    pub fn new(store: Arc<StateStore>, grabs: Arc<OwnershipRegistry>, bus: B) -> Self {
        Self {
            store,
            grabs,
            bus: Mutex::new(bus),
        }
    }

    /// Access the bus (for inspection in tests and diagnostics).
    pub fn with_bus<R>(&self, f: impl FnOnce(&mut B) -> R) -> R {
        let mut guard = self.bus.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Authorize `command` for `session` and forward it.
    ///
    /// The bus is locked before any check runs, and a train command keeps
    /// the train's grab fixed until the bus call returns. A command that
    /// queued behind another one is therefore checked against the grabs as
    /// they are when it reaches the bus.
    ///
    /// # Errors
    ///
    /// - [`LayoutError::UnknownTrain`] / [`LayoutError::NotFound`] for unknown targets
    /// - [`LayoutError::NotOwner`] if a train command comes from a session
    ///   that does not hold the grab
    /// - [`LayoutError::InvalidArgument`] for out-of-range speed steps,
    ///   undeclared aspects or peripherals, and non-commandable output states
    /// - [`LayoutError::Bus`] if the bus fails
    pub fn dispatch(&self, session: &SessionToken, command: &LayoutCommand) -> Result<()> {
        self.with_bus(|bus| match command.train() {
            Some(train) => {
                if !self.store.contains(Category::Train, train) {
                    return Err(LayoutError::UnknownTrain(train.to_owned()));
                }
                self.grabs
                    .with_grab(train, session, || self.forward(bus, session, command))?
            }
            None => self.forward(bus, session, command),
        })
    }

    fn forward(&self, bus: &mut B, session: &SessionToken, command: &LayoutCommand) -> Result<()> {
        match command {
            LayoutCommand::SetSpeed {
                train,
                speed_step,
                direction,
            } => {
                if *speed_step > MAX_SPEED_STEP {
                    return Err(LayoutError::InvalidArgument(format!(
                        "speed step {speed_step} exceeds {MAX_SPEED_STEP}"
                    )));
                }
                let addr = self.train_address(train)?;
                report(command, bus.set_train_speed(addr, *speed_step, *direction))
            }

            LayoutCommand::EmergencyStop { train } => {
                let addr = self.train_address(train)?;
                warn!(train = %train, session = %session, "emergency stop");
                report(command, bus.emergency_stop(addr))
            }

            LayoutCommand::SetPeripheral {
                train,
                peripheral,
                state,
            } => {
                let addr = self.train_address(train)?;
                let declared = self
                    .store
                    .train_peripherals(train)?
                    .iter()
                    .any(|(name, _)| name.as_str() == peripheral);
                if !declared {
                    return Err(LayoutError::InvalidArgument(format!(
                        "train '{train}' has no peripheral '{peripheral}'"
                    )));
                }
                report(command, bus.set_peripheral(addr, peripheral, *state))
            }

            LayoutCommand::SetPoint { id, aspect } => {
                self.check_aspect(Category::Point, id, aspect)?;
                report(command, bus.set_accessory(Category::Point, id, aspect))
            }

            LayoutCommand::SetSignal { id, aspect } => {
                self.check_aspect(Category::Signal, id, aspect)?;
                report(command, bus.set_accessory(Category::Signal, id, aspect))
            }

            LayoutCommand::SetTrackOutput { id, state } => {
                if !self.store.track_output_state(id)?.known {
                    return Err(LayoutError::not_found(Category::TrackOutput, id.as_str()));
                }
                if !matches!(
                    state,
                    TrackOutputState::Off
                        | TrackOutputState::Stop
                        | TrackOutputState::SoftStop
                        | TrackOutputState::Go
                ) {
                    return Err(LayoutError::InvalidArgument(format!(
                        "track output state '{}' cannot be commanded",
                        state.as_str()
                    )));
                }
                report(command, bus.set_track_output(id, *state))
            }
        }
    }

    fn train_address(&self, train: &str) -> Result<u16> {
        self.store
            .train_address(train)
            .ok_or_else(|| LayoutError::UnknownTrain(train.to_owned()))
    }

    fn check_aspect(&self, category: Category, id: &str, aspect: &str) -> Result<()> {
        let aspects = self.store.aspects(category, id)?;
        if aspects.iter().any(|a| a == aspect) {
            Ok(())
        } else {
            Err(LayoutError::InvalidArgument(format!(
                "'{aspect}' is not an aspect of {category} '{id}'"
            )))
        }
    }
}

fn report<E: core::fmt::Debug>(command: &LayoutCommand, outcome: core::result::Result<(), E>) -> Result<()> {
    outcome.map_err(|err| {
        warn!(?command, ?err, "bus rejected command");
        LayoutError::Bus(format!("{err:?}"))
    })?;
    debug!(?command, "command forwarded");
    Ok(())
}
