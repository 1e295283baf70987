//! Form parameters accepted by the HTTP endpoints.
//!
//! Every field is optional so a missing parameter reaches the handler, which
//! answers it the same way as an invalid one.

use serde::Deserialize;

/// `train=<id>`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrainParams {
    /// Train identifier.
    pub train: Option<String>,
}

/// `point=<id>`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PointParams {
    /// Point identifier.
    pub point: Option<String>,
}

/// `signal=<id>`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignalParams {
    /// Signal identifier.
    pub signal: Option<String>,
}

/// `session=<token>`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionParams {
    /// Session token.
    pub session: Option<String>,
}

/// `session=<token>&train=<id>`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GrabParams {
    /// Session token.
    pub session: Option<String>,
    /// Train identifier.
    pub train: Option<String>,
}

/// `session=..&train=..&speed=..&direction=..`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpeedParams {
    /// Session token.
    pub session: Option<String>,
    /// Train identifier.
    pub train: Option<String>,
    /// Speed step, kept as text so a bad number is a 501 like any other bad value.
    pub speed: Option<String>,
    /// `forward` or `backward`.
    pub direction: Option<String>,
}

/// `session=..&train=..&peripheral=..&state=on|off`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PeripheralParams {
    /// Session token.
    pub session: Option<String>,
    /// Train identifier.
    pub train: Option<String>,
    /// Peripheral name.
    pub peripheral: Option<String>,
    /// `on` or `off`.
    pub state: Option<String>,
}

/// `session=..&id=..&aspect=..` for points and signals.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccessoryParams {
    /// Session token.
    pub session: Option<String>,
    /// Point or signal identifier.
    pub id: Option<String>,
    /// Target aspect.
    pub aspect: Option<String>,
}

/// `session=..&id=..&state=..`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackOutputParams {
    /// Session token.
    pub session: Option<String>,
    /// Track output identifier.
    pub id: Option<String>,
    /// `off`, `stop`, `soft stop` or `go`.
    pub state: Option<String>,
}
