//! Control commands a session can send to the layout.
//!
//! Train commands need the sending session to hold the train's grab.
//! Accessory and track output commands only need an open session.
//!
//! ```rust
//! use rs_layout::{Direction, LayoutCommand};
//!
//! let cmd = LayoutCommand::speed("train7", 40, Direction::Forward);
//! assert_eq!(cmd.train(), Some("train7"));
//! assert!(LayoutCommand::point("point3", "reverse").train().is_none());
//! ```

use crate::state::{Category, Direction, PeripheralState, TrackOutputState};

/// A command forwarded to the bus after authorization.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "command", rename_all = "snake_case"))]
pub enum LayoutCommand {
    /// Drive a train at a speed step in a direction.
    SetSpeed {
        /// Train identifier.
        train: String,
        /// Speed step, 0..=126.
        speed_step: u8,
        /// Direction of travel.
        direction: Direction,
    },
    /// Stop one train immediately.
    EmergencyStop {
        /// Train identifier.
        train: String,
    },
    /// Switch a train peripheral.
    SetPeripheral {
        /// Train identifier.
        train: String,
        /// Peripheral name.
        peripheral: String,
        /// Desired state.
        state: PeripheralState,
    },
    /// Set a point to one of its aspects.
    SetPoint {
        /// Point identifier.
        id: String,
        /// Target aspect.
        aspect: String,
    },
    /// Set a signal to one of its aspects.
    SetSignal {
        /// Signal identifier.
        id: String,
        /// Target aspect.
        aspect: String,
    },
    /// Change a track output's command-station state.
    SetTrackOutput {
        /// Track output identifier.
        id: String,
        /// Desired state: off, stop, soft stop or go.
        state: TrackOutputState,
    },
}

impl LayoutCommand {
    /// Speed command.
    pub fn speed(train: &str, speed_step: u8, direction: Direction) -> Self {
        LayoutCommand::SetSpeed {
            train: train.to_owned(),
            speed_step,
            direction,
        }
    }

    /// Emergency stop for one train.
    pub fn estop(train: &str) -> Self {
        LayoutCommand::EmergencyStop {
            train: train.to_owned(),
        }
    }

    /// Peripheral command.
    pub fn peripheral(train: &str, peripheral: &str, state: PeripheralState) -> Self {
        LayoutCommand::SetPeripheral {
            train: train.to_owned(),
            peripheral: peripheral.to_owned(),
            state,
        }
    }

    /// Point command.
    pub fn point(id: &str, aspect: &str) -> Self {
        LayoutCommand::SetPoint {
            id: id.to_owned(),
            aspect: aspect.to_owned(),
        }
    }

    /// Signal command.
    pub fn signal(id: &str, aspect: &str) -> Self {
        LayoutCommand::SetSignal {
            id: id.to_owned(),
            aspect: aspect.to_owned(),
        }
    }

    /// Track output command.
    pub fn track_output(id: &str, state: TrackOutputState) -> Self {
        LayoutCommand::SetTrackOutput {
            id: id.to_owned(),
            state,
        }
    }

    /// The train this command needs a grab for, if any.
    pub fn train(&self) -> Option<&str> {
        match self {
            LayoutCommand::SetSpeed { train, .. }
            | LayoutCommand::EmergencyStop { train }
            | LayoutCommand::SetPeripheral { train, .. } => Some(train),
            _ => None,
        }
    }

    /// Category of the target entity.
    pub fn category(&self) -> Category {
        match self {
            LayoutCommand::SetSpeed { .. }
            | LayoutCommand::EmergencyStop { .. }
            | LayoutCommand::SetPeripheral { .. } => Category::Train,
            LayoutCommand::SetPoint { .. } => Category::Point,
            LayoutCommand::SetSignal { .. } => Category::Signal,
            LayoutCommand::SetTrackOutput { .. } => Category::TrackOutput,
        }
    }

    /// Whether this is an emergency stop.
    pub fn is_estop(&self) -> bool {
        matches!(self, LayoutCommand::EmergencyStop { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn train_commands_name_their_train() {
        assert_eq!(LayoutCommand::estop("t1").train(), Some("t1"));
        assert_eq!(
            LayoutCommand::peripheral("t2", "horn", PeripheralState::On).train(),
            Some("t2")
        );
        assert_eq!(
            LayoutCommand::track_output("cs1", TrackOutputState::Go).train(),
            None
        );
    }

    #[test]
    fn categories() {
        assert_eq!(LayoutCommand::signal("s", "go").category(), Category::Signal);
        assert_eq!(
            LayoutCommand::speed("t", 1, Direction::Forward).category(),
            Category::Train
        );
        assert!(LayoutCommand::estop("t").is_estop());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn json_form_is_tagged_by_command() {
        let json = serde_json::to_value(LayoutCommand::speed("train7", 40, Direction::Backward)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "command": "set_speed",
                "train": "train7",
                "speed_step": 40,
                "direction": "backward"
            })
        );

        let cmd: LayoutCommand = serde_json::from_str(
            r#"{ "command": "set_track_output", "id": "cs1", "state": "soft_stop" }"#,
        )
        .unwrap();
        assert_eq!(cmd, LayoutCommand::track_output("cs1", TrackOutputState::SoftStop));
    }
}
