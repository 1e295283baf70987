//! Integration tests for the web API.
//!
//! These drive the axum router directly with `oneshot`, without binding a
//! socket.

#![cfg(feature = "web")]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;

use rs_layout::hal::{BusCall, MockBus};
use rs_layout::services::{build_router, LayoutProvider, SharedLayout, WebServerConfig};
use rs_layout::{AccessoryKind, Direction, HardwareEvent, Layout};

type Shared = Arc<SharedLayout<MockBus>>;

fn create_test_app() -> (axum::Router, Shared) {
    let shared = Arc::new(SharedLayout::new(Layout::new(MockBus::new(), 0)));
    for event in [
        HardwareEvent::train_discovered("train7", 7, &["head_light", "horn"]),
        HardwareEvent::train_discovered("cargo_db", 12, &[]),
        HardwareEvent::train_state("train7", true, Direction::Forward, 12),
        HardwareEvent::point_discovered("point1", AccessoryKind::Board, &["normal", "reverse"]),
        HardwareEvent::signal_discovered("signal1", AccessoryKind::Dcc, &["stop", "go"]),
        HardwareEvent::track_output("cs1", 0x03),
        HardwareEvent::occupancy("seg1", true, &[7, 99]),
        HardwareEvent::occupancy("seg2", false, &[]),
    ] {
        shared.apply_event(event).unwrap();
    }
    shared.layout().start();
    let router = build_router(Arc::clone(&shared), &WebServerConfig::default());
    (router, shared)
}

fn post(uri: &str, form: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_owned()))
        .unwrap()
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

async fn open_session(app: &axum::Router) -> String {
    let (status, token) = send(app, post("/driver/session", "")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!token.is_empty());
    token
}

// ============================================================================
// Monitor
// ============================================================================

#[tokio::test]
async fn test_list_trains() {
    let (app, _shared) = create_test_app();

    let response = app.clone().oneshot(post("/monitor/trains", "")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));

    let (_, body) = send(&app, post("/monitor/trains", "")).await;
    assert_eq!(body, "train7 - grabbed: no\ncargo_db - grabbed: no");
}

#[tokio::test]
async fn test_train_state() {
    let (app, _shared) = create_test_app();

    let (status, body) = send(&app, post("/monitor/train-state", "train=train7")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "on track: yes - direction: forward - speed step: 12");

    let (status, body) = send(&app, post("/monitor/train-state", "train=ghost")).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    assert_eq!(body, "invalid train 'ghost'");

    let (status, _) = send(&app, post("/monitor/train-state", "train=two+words")).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);

    let (status, _) = send(&app, post("/monitor/train-state", "")).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn test_train_peripherals() {
    let (app, _shared) = create_test_app();

    let (status, body) = send(&app, post("/monitor/train-peripherals", "train=train7")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "head_light - state: off\nhorn - state: off");

    let (status, _) = send(&app, post("/monitor/train-peripherals", "train=ghost")).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);

    // A train without peripherals reads as an invalid train here.
    let (status, _) = send(&app, post("/monitor/train-peripherals", "train=cargo_db")).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn test_accessories_and_aspects() {
    let (app, _shared) = create_test_app();

    let (status, body) = send(&app, post("/monitor/points", "")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "point1 - state: normal");

    let (_, body) = send(&app, post("/monitor/signals", "")).await;
    assert_eq!(body, "signal1 - state: stop");

    let (status, body) = send(&app, post("/monitor/point-aspects", "point=point1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "normal, reverse");

    let (_, body) = send(&app, post("/monitor/signal-aspects", "signal=signal1")).await;
    assert_eq!(body, "stop, go");

    let (status, _) = send(&app, post("/monitor/point-aspects", "point=signal1")).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);

    let (status, _) = send(&app, post("/monitor/signal-aspects", "signal=nope")).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn test_track_outputs_and_segments() {
    let (app, _shared) = create_test_app();

    let (status, body) = send(&app, post("/monitor/track-outputs", "")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "cs1 - state: go");

    let (status, body) = send(&app, post("/monitor/segments", "")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        "seg1 - occupied: yes trains: train7, unknown\nseg2 - occupied: no"
    );
}

#[tokio::test]
async fn test_not_running_is_501() {
    let shared = Arc::new(SharedLayout::new(Layout::new(MockBus::new(), 0)));
    let app = build_router(Arc::clone(&shared), &WebServerConfig::default());

    let (status, _) = send(&app, post("/monitor/trains", "")).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    let (status, _) = send(&app, post("/driver/session", "")).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);

    shared.layout().start();
    let (status, _) = send(&app, post("/monitor/trains", "")).await;
    assert_eq!(status, StatusCode::OK);

    shared.layout().shutdown();
    let (status, _) = send(&app, post("/monitor/trains", "")).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn test_wrong_method_and_unknown_route() {
    let (app, _shared) = create_test_app();

    let get = Request::builder()
        .uri("/monitor/trains")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, get).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);

    let (status, _) = send(&app, post("/monitor/everything", "")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Driver
// ============================================================================

#[tokio::test]
async fn test_grab_drive_release() {
    let (app, shared) = create_test_app();
    let session = open_session(&app).await;

    let (status, body) = send(
        &app,
        post("/driver/grab-train", &format!("session={session}&train=train7")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "grabbed");

    let (_, body) = send(&app, post("/monitor/trains", "")).await;
    assert!(body.starts_with("train7 - grabbed: yes"));

    let (status, body) = send(
        &app,
        post(
            "/driver/set-speed",
            &format!("session={session}&train=train7&speed=40&direction=backward"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(
        shared.layout().dispatcher().with_bus(|bus| bus.calls.last().cloned()),
        Some(BusCall::Speed {
            dcc_address: 7,
            speed_step: 40,
            direction: Direction::Backward
        })
    );

    let (status, body) = send(
        &app,
        post("/driver/release-train", &format!("session={session}&train=train7")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "released");

    let (_, body) = send(
        &app,
        post("/driver/release-train", &format!("session={session}&train=train7")),
    )
    .await;
    assert_eq!(body, "not grabbed");
}

#[tokio::test]
async fn test_conflicting_grab_is_409() {
    let (app, _shared) = create_test_app();
    let a = open_session(&app).await;
    let b = open_session(&app).await;
    assert_ne!(a, b);

    let (status, _) = send(&app, post("/driver/grab-train", &format!("session={a}&train=train7"))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, post("/driver/grab-train", &format!("session={b}&train=train7"))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        post(
            "/driver/set-speed",
            &format!("session={b}&train=train7&speed=10&direction=forward"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(&app, post("/driver/grab-train", &format!("session={a}&train=train7"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "already grabbed");
}

#[tokio::test]
async fn test_driver_parameter_errors() {
    let (app, _shared) = create_test_app();
    let session = open_session(&app).await;

    let (status, _) = send(&app, post("/driver/grab-train", "train=train7")).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);

    let (status, _) = send(&app, post("/driver/grab-train", "session=nobody&train=train7")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        post("/driver/grab-train", &format!("session={session}&train=ghost")),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    send(&app, post("/driver/grab-train", &format!("session={session}&train=train7"))).await;
    for form in [
        format!("session={session}&train=train7&speed=127&direction=forward"),
        format!("session={session}&train=train7&speed=fast&direction=forward"),
        format!("session={session}&train=train7&speed=10&direction=sideways"),
        format!("session={session}&train=train7&speed=10"),
    ] {
        let (status, _) = send(&app, post("/driver/set-speed", &form)).await;
        assert_eq!(status, StatusCode::NOT_IMPLEMENTED, "{form}");
    }
}

#[tokio::test]
async fn test_peripherals_and_emergency_stop() {
    let (app, shared) = create_test_app();
    let session = open_session(&app).await;
    send(&app, post("/driver/grab-train", &format!("session={session}&train=train7"))).await;

    let (status, _) = send(
        &app,
        post(
            "/driver/set-peripheral",
            &format!("session={session}&train=train7&peripheral=horn&state=on"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        post(
            "/driver/set-peripheral",
            &format!("session={session}&train=train7&peripheral=bell&state=on"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);

    let (status, _) = send(
        &app,
        post("/driver/emergency-stop", &format!("session={session}&train=train7")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        shared.layout().dispatcher().with_bus(|bus| bus.calls.len()),
        2
    );
}

#[tokio::test]
async fn test_accessory_and_track_output_commands() {
    let (app, shared) = create_test_app();
    let session = open_session(&app).await;

    let (status, _) = send(
        &app,
        post("/driver/set-point", &format!("session={session}&id=point1&aspect=reverse")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        post("/driver/set-signal", &format!("session={session}&id=signal1&aspect=purple")),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);

    let (status, _) = send(
        &app,
        post("/driver/set-track-output", &format!("session={session}&id=cs1&state=stop")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        post("/driver/set-track-output", &format!("session={session}&id=cs9&state=go")),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Commands do not change reported state; only the bus echo does.
    let (_, body) = send(&app, post("/monitor/points", "")).await;
    assert_eq!(body, "point1 - state: normal");
    assert_eq!(
        shared.layout().dispatcher().with_bus(|bus| bus.calls.len()),
        2
    );
}

#[tokio::test]
async fn test_end_session_releases_trains() {
    let (app, _shared) = create_test_app();
    let session = open_session(&app).await;
    send(&app, post("/driver/grab-train", &format!("session={session}&train=train7"))).await;
    send(&app, post("/driver/grab-train", &format!("session={session}&train=cargo_db"))).await;

    let (status, body) = send(&app, post("/driver/session/end", &format!("session={session}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "cargo_db\ntrain7");

    let (_, body) = send(&app, post("/monitor/trains", "")).await;
    assert!(!body.contains("grabbed: yes"));

    let (status, _) = send(&app, post("/driver/session/end", &format!("session={session}"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
