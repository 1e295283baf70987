//! Plain-text rendering of query results.
//!
//! Every response body the HTTP surface produces is formatted here. Listings
//! put one entity per line, with no trailing newline.

use crate::query::{
    AccessorySummary, PeripheralSummary, SegmentSummary, TrackOutputSummary, TrainSummary,
};
use crate::state::{Identifier, TrainState};

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn lines<T>(items: &[T], line: impl Fn(&T) -> String) -> String {
    items.iter().map(line).collect::<Vec<_>>().join("\n")
}

/// `train7 - grabbed: yes`
pub fn trains(trains: &[TrainSummary]) -> String {
    lines(trains, |t| format!("{} - grabbed: {}", t.id, yes_no(t.grabbed)))
}

/// `on track: yes - direction: forward - speed step: 12`
pub fn train_state(state: &TrainState) -> String {
    format!(
        "on track: {} - direction: {} - speed step: {}",
        yes_no(state.on_track),
        state.direction.as_str(),
        state.speed_step
    )
}

/// `head_light - state: on`
pub fn peripherals(peripherals: &[PeripheralSummary]) -> String {
    lines(peripherals, |p| format!("{} - state: {}", p.id, p.state.as_str()))
}

/// `cs1 - state: soft stop`
pub fn track_outputs(outputs: &[TrackOutputSummary]) -> String {
    lines(outputs, |o| format!("{} - state: {}", o.id, o.state.as_str()))
}

/// `point1 - state: reverse`, for points and signals alike.
pub fn accessories(accessories: &[AccessorySummary]) -> String {
    lines(accessories, |a| format!("{} - state: {}", a.id, a.state.aspect()))
}

/// `normal, reverse`
pub fn aspects(aspects: &[String]) -> String {
    aspects.join(", ")
}

/// `seg1 - occupied: yes trains: train7, unknown`
///
/// The `trains:` suffix only appears when the segment reports decoder
/// addresses. Addresses with no known train read as `unknown`.
pub fn segments(segments: &[SegmentSummary]) -> String {
    lines(segments, |s| {
        let mut line = format!("{} - occupied: {}", s.id, yes_no(s.occupied));
        if !s.trains.is_empty() {
            let names: Vec<&str> = s
                .trains
                .iter()
                .map(|t| t.as_ref().map_or("unknown", Identifier::as_str))
                .collect();
            line.push_str(" trains: ");
            line.push_str(&names.join(", "));
        }
        line
    })
}

/// One released train per line.
pub fn released(trains: &[Identifier]) -> String {
    lines(trains, |t| t.to_string())
}
