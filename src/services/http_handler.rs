//! HTTP request handling, independent of the server framework.
//!
//! `LayoutApiHandler` holds the logic of every endpoint: parameter checks,
//! the running check, the call into the layout, and the mapping of results
//! to a status code and a plain-text body. The axum router in
//! [`web`](super::web) only extracts form fields and forwards them here.
//!
//! # Status codes
//!
//! | Situation | Status |
//! |---|---|
//! | success | 200 |
//! | not running, missing or invalid parameter | 501 |
//! | monitor lookup of an unknown train, point or signal | 501 |
//! | train without peripherals on the peripherals route | 501 |
//! | unknown session | 403 |
//! | driver request for an unknown train, point, signal or output | 404 |
//! | train grabbed by another session | 409 |
//! | bus failure | 500 |

use tracing::{info, warn};

use crate::commands::LayoutCommand;
use crate::error::LayoutError;
use crate::ownership::{GrabOutcome, ReleaseOutcome};
use crate::state::{Direction, PeripheralState, SessionToken, TrackOutputState, MAX_SPEED_STEP};

use super::render;
use super::shared::LayoutProvider;

// ============================================================================
// API Response Types
// ============================================================================

/// Result of an API operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiResult {
    /// Success with a plain-text body.
    Ok(String),
    /// Error with status code and message.
    Error(u16, String),
}

impl ApiResult {
    /// Create a success response.
    pub fn ok(body: impl Into<String>) -> Self {
        Self::Ok(body.into())
    }

    /// Create an error response.
    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self::Error(status, message.into())
    }

    /// 501, the answer to anything the server cannot serve as asked.
    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::Error(501, message.into())
    }

    /// Check if this is a success response.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// The body (for success) or error message.
    pub fn body(&self) -> &str {
        match self {
            Self::Ok(body) => body,
            Self::Error(_, msg) => msg,
        }
    }

    /// The HTTP status code.
    pub fn status(&self) -> u16 {
        match self {
            Self::Ok(_) => 200,
            Self::Error(status, _) => *status,
        }
    }
}

impl From<LayoutError> for ApiResult {
    fn from(err: LayoutError) -> Self {
        let status = match err {
            LayoutError::NotRunning | LayoutError::InvalidArgument(_) => 501,
            LayoutError::UnknownSession => 403,
            LayoutError::NotFound { .. } | LayoutError::UnknownTrain(_) => 404,
            LayoutError::AlreadyGrabbed { .. } | LayoutError::NotOwner { .. } => 409,
            LayoutError::Bus(_) => 500,
        };
        ApiResult::error(status, err.to_string())
    }
}

// Axum integration: allow ApiResult to be returned directly from handlers
#[cfg(feature = "web")]
impl axum::response::IntoResponse for ApiResult {
    fn into_response(self) -> axum::response::Response {
        use axum::http::{header, StatusCode};

        let status =
            StatusCode::from_u16(self.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = match self {
            ApiResult::Ok(body) | ApiResult::Error(_, body) => body,
        };
        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            body,
        )
            .into_response()
    }
}

type Handled = Result<String, ApiResult>;

fn required<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, ApiResult> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiResult::not_implemented(format!(
            "missing parameter '{name}'"
        ))),
    }
}

/// Monitor routes answer 501 for an entity that does not exist.
fn invalid_entity<'a>(kind: &'a str, id: &'a str) -> impl FnOnce(LayoutError) -> ApiResult + 'a {
    move |err| match err {
        LayoutError::NotFound { .. } | LayoutError::UnknownTrain(_) => {
            ApiResult::not_implemented(format!("invalid {kind} '{id}'"))
        }
        other => other.into(),
    }
}

fn session_param(value: Option<&str>) -> Result<SessionToken, ApiResult> {
    required(value, "session").map(SessionToken::from)
}

// ============================================================================
// HTTP API Handler
// ============================================================================

/// Endpoint logic for the monitor and driver routes.
pub struct LayoutApiHandler<S: LayoutProvider> {
    state: S,
}

impl<S: LayoutProvider> LayoutApiHandler<S> {
    /// Create a new handler with the given layout provider.
    pub fn new(state: S) -> Self {
        Self { state }
    }

    /// The provider this handler serves.
    pub fn provider(&self) -> &S {
        &self.state
    }

    fn serve(&self, request: &'static str, f: impl FnOnce(&S) -> Handled) -> ApiResult {
        let result = if self.state.is_running() {
            f(&self.state)
        } else {
            Err(ApiResult::from(LayoutError::NotRunning))
        };
        match result {
            Ok(body) => {
                info!(request, "request served");
                ApiResult::Ok(body)
            }
            Err(err) => {
                warn!(request, status = err.status(), reason = err.body(), "request rejected");
                err
            }
        }
    }

    // ========================================================================
    // Monitor
    // ========================================================================

    /// POST /monitor/trains
    pub fn trains(&self) -> ApiResult {
        self.serve("get trains", |s| Ok(render::trains(&s.query().trains())))
    }

    /// POST /monitor/train-state
    pub fn train_state(&self, train: Option<&str>) -> ApiResult {
        self.serve("get train state", |s| {
            let train = required(train, "train")?;
            let state = s.query().train_state(train)?;
            if !state.known {
                return Err(ApiResult::not_implemented(format!("invalid train '{train}'")));
            }
            Ok(render::train_state(&state))
        })
    }

    /// POST /monitor/train-peripherals
    pub fn train_peripherals(&self, train: Option<&str>) -> ApiResult {
        self.serve("get train peripherals", |s| {
            let train = required(train, "train")?;
            let peripherals = s
                .query()
                .train_peripherals(train)
                .map_err(invalid_entity("train", train))?;
            if peripherals.is_empty() {
                return Err(ApiResult::not_implemented(format!(
                    "train '{train}' has no peripherals"
                )));
            }
            Ok(render::peripherals(&peripherals))
        })
    }

    /// POST /monitor/track-outputs
    pub fn track_outputs(&self) -> ApiResult {
        self.serve("get track outputs", |s| {
            Ok(render::track_outputs(&s.query().track_outputs()))
        })
    }

    /// POST /monitor/points
    pub fn points(&self) -> ApiResult {
        self.serve("get points", |s| Ok(render::accessories(&s.query().points())))
    }

    /// POST /monitor/signals
    pub fn signals(&self) -> ApiResult {
        self.serve("get signals", |s| Ok(render::accessories(&s.query().signals())))
    }

    /// POST /monitor/point-aspects
    pub fn point_aspects(&self, point: Option<&str>) -> ApiResult {
        self.serve("get point aspects", |s| {
            let point = required(point, "point")?;
            let aspects = s
                .query()
                .point_aspects(point)
                .map_err(invalid_entity("point", point))?;
            Ok(render::aspects(&aspects))
        })
    }

    /// POST /monitor/signal-aspects
    pub fn signal_aspects(&self, signal: Option<&str>) -> ApiResult {
        self.serve("get signal aspects", |s| {
            let signal = required(signal, "signal")?;
            let aspects = s
                .query()
                .signal_aspects(signal)
                .map_err(invalid_entity("signal", signal))?;
            Ok(render::aspects(&aspects))
        })
    }

    /// POST /monitor/segments
    pub fn segments(&self) -> ApiResult {
        self.serve("get segments", |s| Ok(render::segments(&s.query().segments())))
    }

    // ========================================================================
    // Driver
    // ========================================================================

    /// POST /driver/session - body is the new token.
    pub fn open_session(&self) -> ApiResult {
        self.serve("open session", |s| Ok(s.open_session()?.to_string()))
    }

    /// POST /driver/session/end - body lists the released trains.
    pub fn end_session(&self, session: Option<&str>) -> ApiResult {
        self.serve("end session", |s| {
            let session = session_param(session)?;
            Ok(render::released(&s.end_session(&session)?))
        })
    }

    /// POST /driver/grab-train
    pub fn grab_train(&self, session: Option<&str>, train: Option<&str>) -> ApiResult {
        self.serve("grab train", |s| {
            let session = session_param(session)?;
            let train = required(train, "train")?;
            Ok(match s.grab(&session, train)? {
                GrabOutcome::Granted => "grabbed",
                GrabOutcome::AlreadyHeld => "already grabbed",
            }
            .to_owned())
        })
    }

    /// POST /driver/release-train
    pub fn release_train(&self, session: Option<&str>, train: Option<&str>) -> ApiResult {
        self.serve("release train", |s| {
            let session = session_param(session)?;
            let train = required(train, "train")?;
            Ok(match s.release(&session, train)? {
                ReleaseOutcome::Released => "released",
                ReleaseOutcome::NotGrabbed => "not grabbed",
            }
            .to_owned())
        })
    }

    /// POST /driver/set-speed
    pub fn set_speed(
        &self,
        session: Option<&str>,
        train: Option<&str>,
        speed: Option<&str>,
        direction: Option<&str>,
    ) -> ApiResult {
        self.serve("set train speed", |s| {
            let session = session_param(session)?;
            let train = required(train, "train")?;
            let speed = required(speed, "speed")?;
            let speed_step = speed
                .parse::<u8>()
                .ok()
                .filter(|step| *step <= MAX_SPEED_STEP)
                .ok_or_else(|| {
                    ApiResult::not_implemented(format!(
                        "speed must be 0..={MAX_SPEED_STEP}, got '{speed}'"
                    ))
                })?;
            let direction = required(direction, "direction")?;
            let direction = Direction::parse(direction).ok_or_else(|| {
                ApiResult::not_implemented(format!("invalid direction '{direction}'"))
            })?;
            s.dispatch(&session, &LayoutCommand::speed(train, speed_step, direction))?;
            Ok("ok".to_owned())
        })
    }

    /// POST /driver/emergency-stop
    pub fn emergency_stop(&self, session: Option<&str>, train: Option<&str>) -> ApiResult {
        self.serve("emergency stop", |s| {
            let session = session_param(session)?;
            let train = required(train, "train")?;
            s.dispatch(&session, &LayoutCommand::estop(train))?;
            Ok("ok".to_owned())
        })
    }

    /// POST /driver/set-peripheral
    pub fn set_peripheral(
        &self,
        session: Option<&str>,
        train: Option<&str>,
        peripheral: Option<&str>,
        state: Option<&str>,
    ) -> ApiResult {
        self.serve("set train peripheral", |s| {
            let session = session_param(session)?;
            let train = required(train, "train")?;
            let peripheral = required(peripheral, "peripheral")?;
            let state = required(state, "state")?;
            let state = PeripheralState::parse(state).ok_or_else(|| {
                ApiResult::not_implemented(format!("invalid peripheral state '{state}'"))
            })?;
            s.dispatch(&session, &LayoutCommand::peripheral(train, peripheral, state))?;
            Ok("ok".to_owned())
        })
    }

    /// POST /driver/set-point
    pub fn set_point(&self, session: Option<&str>, id: Option<&str>, aspect: Option<&str>) -> ApiResult {
        self.serve("set point", |s| {
            let session = session_param(session)?;
            let id = required(id, "id")?;
            let aspect = required(aspect, "aspect")?;
            s.dispatch(&session, &LayoutCommand::point(id, aspect))?;
            Ok("ok".to_owned())
        })
    }

    /// POST /driver/set-signal
    pub fn set_signal(&self, session: Option<&str>, id: Option<&str>, aspect: Option<&str>) -> ApiResult {
        self.serve("set signal", |s| {
            let session = session_param(session)?;
            let id = required(id, "id")?;
            let aspect = required(aspect, "aspect")?;
            s.dispatch(&session, &LayoutCommand::signal(id, aspect))?;
            Ok("ok".to_owned())
        })
    }

    /// POST /driver/set-track-output
    pub fn set_track_output(
        &self,
        session: Option<&str>,
        id: Option<&str>,
        state: Option<&str>,
    ) -> ApiResult {
        self.serve("set track output", |s| {
            let session = session_param(session)?;
            let id = required(id, "id")?;
            let state = required(state, "state")?;
            let state = TrackOutputState::parse(state).ok_or_else(|| {
                ApiResult::not_implemented(format!("invalid track output state '{state}'"))
            })?;
            s.dispatch(&session, &LayoutCommand::track_output(id, state))?;
            Ok("ok".to_owned())
        })
    }
}
