//! Layout data model: identifiers, categories and per-entity state values.
//!
//! Everything in here is a plain value. Snapshots handed out by the store are
//! clones of these types, so a caller can hold one as long as it likes without
//! blocking hardware updates.

use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;

use crate::error::LayoutError;

/// Longest accepted identifier, in bytes.
pub const MAX_ID_LEN: usize = 64;

/// Highest DCC speed step (128-step mode, step 1 is e-stop on the wire).
pub const MAX_SPEED_STEP: u8 = 126;

// ============================================================================
// Identifiers
// ============================================================================

/// Opaque name of a train, point, signal, segment or track output.
///
/// Unique within its [`Category`]. Construct with [`Identifier::new`], which
/// rejects empty names, names longer than [`MAX_ID_LEN`] and names containing
/// whitespace or control characters.
///
/// ```rust
/// use rs_layout::Identifier;
///
/// assert!(Identifier::new("train7").is_ok());
/// assert!(Identifier::new("").is_err());
/// assert!(Identifier::new("two words").is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct Identifier(String);

impl Identifier {
    /// Validate and wrap a name.
    pub fn new(raw: impl Into<String>) -> Result<Self, LayoutError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(LayoutError::InvalidArgument("identifier is empty".into()));
        }
        if raw.len() > MAX_ID_LEN {
            return Err(LayoutError::InvalidArgument(format!(
                "identifier longer than {MAX_ID_LEN} bytes"
            )));
        }
        if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(LayoutError::InvalidArgument(format!(
                "identifier '{}' contains whitespace or control characters",
                raw.escape_debug()
            )));
        }
        Ok(Self(raw))
    }

    /// The identifier as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Identifier {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identifier {
    type Error = LayoutError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Identifier::new(value)
    }
}

impl TryFrom<&str> for Identifier {
    type Error = LayoutError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Identifier::new(value)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

/// Token naming a client session that may hold train grabs.
///
/// Tokens minted by [`SessionToken::generate`] are random UUIDs; tokens built
/// with [`SessionToken::from`] are taken verbatim (useful in tests and for
/// transports that bring their own session ids).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct SessionToken(String);

impl SessionToken {
    /// Mint a fresh random token.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// The token as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionToken {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for SessionToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Categories
// ============================================================================

/// Kind of layout entity. Identifiers are unique per category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Category {
    /// Locomotive or train set addressed by DCC.
    Train,
    /// Turnout.
    Point,
    /// Track-side signal.
    Signal,
    /// Occupancy-detection zone.
    Segment,
    /// Command-station output channel.
    TrackOutput,
}

impl Category {
    /// All categories, in listing order.
    pub const ALL: [Category; 5] = [
        Category::Train,
        Category::Point,
        Category::Signal,
        Category::Segment,
        Category::TrackOutput,
    ];

    /// Lowercase human-readable name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Category::Train => "train",
            Category::Point => "point",
            Category::Signal => "signal",
            Category::Segment => "segment",
            Category::TrackOutput => "track output",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Trains
// ============================================================================

/// Direction of travel as reported by the command station.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Direction {
    /// Driving forward.
    #[default]
    Forward,
    /// Driving backward.
    Backward,
}

impl Direction {
    /// Lowercase name, as rendered by the monitor.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Backward => "backward",
        }
    }

    /// Parse `"forward"` or `"backward"` (case-insensitive).
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.eq_ignore_ascii_case("forward") {
            Some(Direction::Forward)
        } else if raw.eq_ignore_ascii_case("backward") {
            Some(Direction::Backward)
        } else {
            None
        }
    }
}

/// Point-in-time view of a train.
///
/// `known == false` means the store has never seen the train. It is a normal
/// answer, not an error, and the other fields hold defaults.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrainState {
    /// Whether the train has been detected on the track.
    pub on_track: bool,
    /// Current direction of travel.
    pub direction: Direction,
    /// Commanded speed step (0..=126).
    pub speed_step: u8,
    /// Whether the train is registered at all.
    pub known: bool,
}

impl TrainState {
    /// The answer for a train that does not exist.
    pub const fn unknown() -> Self {
        Self {
            on_track: false,
            direction: Direction::Forward,
            speed_step: 0,
            known: false,
        }
    }
}

/// On/off state of a train peripheral (head light, horn, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum PeripheralState {
    /// Switched off.
    #[default]
    Off,
    /// Switched on.
    On,
}

impl PeripheralState {
    /// `"on"` or `"off"`.
    pub const fn as_str(&self) -> &'static str {
        match self {
            PeripheralState::On => "on",
            PeripheralState::Off => "off",
        }
    }

    /// Parse `"on"` or `"off"` (case-insensitive).
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.eq_ignore_ascii_case("on") {
            Some(PeripheralState::On)
        } else if raw.eq_ignore_ascii_case("off") {
            Some(PeripheralState::Off)
        } else {
            None
        }
    }
}

impl From<bool> for PeripheralState {
    fn from(on: bool) -> Self {
        if on {
            PeripheralState::On
        } else {
            PeripheralState::Off
        }
    }
}

// ============================================================================
// Accessories
// ============================================================================

/// How an accessory is wired to the bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AccessoryKind {
    /// Driven directly by a bus accessory board.
    Board,
    /// Driven through DCC accessory decoders on the track signal.
    Dcc,
}

/// Current aspect of a point or signal, tagged by wiring.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum AccessoryState {
    /// Board accessory and its current aspect.
    BoardAccessory {
        /// Aspect identifier.
        state_id: String,
    },
    /// DCC accessory and its current aspect.
    DccAccessory {
        /// Aspect identifier.
        state_id: String,
    },
}

impl AccessoryState {
    /// Build the variant matching `kind`.
    pub fn new(kind: AccessoryKind, state_id: impl Into<String>) -> Self {
        let state_id = state_id.into();
        match kind {
            AccessoryKind::Board => AccessoryState::BoardAccessory { state_id },
            AccessoryKind::Dcc => AccessoryState::DccAccessory { state_id },
        }
    }

    /// The current aspect, whatever the wiring.
    pub fn aspect(&self) -> &str {
        match self {
            AccessoryState::BoardAccessory { state_id } | AccessoryState::DccAccessory { state_id } => {
                state_id
            }
        }
    }

    /// Wiring of this accessory.
    pub fn kind(&self) -> AccessoryKind {
        match self {
            AccessoryState::BoardAccessory { .. } => AccessoryKind::Board,
            AccessoryState::DccAccessory { .. } => AccessoryKind::Dcc,
        }
    }

    pub(crate) fn set_aspect(&mut self, aspect: String) {
        match self {
            AccessoryState::BoardAccessory { state_id } | AccessoryState::DccAccessory { state_id } => {
                *state_id = aspect
            }
        }
    }
}

// ============================================================================
// Segments
// ============================================================================

/// Occupancy of a detection segment.
///
/// `occupied` and `dcc_addresses` always come from the same hardware report.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SegmentState {
    /// Whether anything is detected on the segment.
    pub occupied: bool,
    /// DCC addresses currently reported on the segment.
    pub dcc_addresses: BTreeSet<u16>,
}

// ============================================================================
// Track outputs
// ============================================================================

/// Command-station state of a track output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TrackOutputState {
    /// Output switched off.
    Off,
    /// Hard stop, all trains halted.
    Stop,
    /// Trains brake to a halt.
    SoftStop,
    /// Normal operation.
    Go,
    /// Normal operation without the host watchdog.
    GoIgnoreWatchdog,
    /// Programming track mode.
    Prog,
    /// Programming in progress.
    ProgBusy,
    /// Command station busy.
    Busy,
    /// State query pending.
    Query,
    /// Code outside the known set.
    #[default]
    Unknown,
}

impl TrackOutputState {
    /// Map a raw command-station code. Unmapped codes become [`Unknown`](Self::Unknown).
    ///
    /// ```rust
    /// use rs_layout::TrackOutputState;
    ///
    /// assert_eq!(TrackOutputState::from_code(0x03), TrackOutputState::Go);
    /// assert_eq!(TrackOutputState::from_code(0x42), TrackOutputState::Unknown);
    /// ```
    pub const fn from_code(code: u8) -> Self {
        match code {
            0x00 => TrackOutputState::Off,
            0x01 => TrackOutputState::Stop,
            0x02 => TrackOutputState::SoftStop,
            0x03 => TrackOutputState::Go,
            0x04 => TrackOutputState::GoIgnoreWatchdog,
            0x08 => TrackOutputState::Prog,
            0x09 => TrackOutputState::ProgBusy,
            0x0D => TrackOutputState::Busy,
            0xFF => TrackOutputState::Query,
            _ => TrackOutputState::Unknown,
        }
    }

    /// Raw code, if this state has one.
    pub const fn code(&self) -> Option<u8> {
        match self {
            TrackOutputState::Off => Some(0x00),
            TrackOutputState::Stop => Some(0x01),
            TrackOutputState::SoftStop => Some(0x02),
            TrackOutputState::Go => Some(0x03),
            TrackOutputState::GoIgnoreWatchdog => Some(0x04),
            TrackOutputState::Prog => Some(0x08),
            TrackOutputState::ProgBusy => Some(0x09),
            TrackOutputState::Busy => Some(0x0D),
            TrackOutputState::Query => Some(0xFF),
            TrackOutputState::Unknown => None,
        }
    }

    /// Human-readable name, as rendered by the monitor.
    pub const fn as_str(&self) -> &'static str {
        match self {
            TrackOutputState::Off => "off",
            TrackOutputState::Stop => "stop",
            TrackOutputState::SoftStop => "soft stop",
            TrackOutputState::Go => "go",
            TrackOutputState::GoIgnoreWatchdog => "go + ignore watchdog",
            TrackOutputState::Prog => "prog",
            TrackOutputState::ProgBusy => "prog busy",
            TrackOutputState::Busy => "busy",
            TrackOutputState::Query => "query",
            TrackOutputState::Unknown => "unknown",
        }
    }

    /// Parse a name as produced by [`as_str`](Self::as_str). `"unknown"` is
    /// not accepted.
    pub fn parse(raw: &str) -> Option<Self> {
        const NAMED: [TrackOutputState; 9] = [
            TrackOutputState::Off,
            TrackOutputState::Stop,
            TrackOutputState::SoftStop,
            TrackOutputState::Go,
            TrackOutputState::GoIgnoreWatchdog,
            TrackOutputState::Prog,
            TrackOutputState::ProgBusy,
            TrackOutputState::Busy,
            TrackOutputState::Query,
        ];
        let raw = raw.trim();
        NAMED.into_iter().find(|s| s.as_str().eq_ignore_ascii_case(raw))
    }
}

/// Answer to a track output lookup. `known == false` if the output does not exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackOutputQuery {
    /// Whether the output is registered.
    pub known: bool,
    /// Current state; [`TrackOutputState::Unknown`] when not known.
    pub state: TrackOutputState,
}
