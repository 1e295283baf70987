//! Layout server with a mock bus.
//!
//! Serves the monitor and driver routes over HTTP, applies hardware events
//! from the event feed, and expires idle sessions. With `feed.demo_layout`
//! set, a small demonstration layout is reported at startup so every route
//! has something to show. It is off by default.
//!
//! # Usage
//!
//! ```sh
//! cargo run --bin layout_server
//! echo '{ "feed": { "demo_layout": true } }' > demo.json
//! cargo run --bin layout_server -- demo.json
//! RUST_LOG=rs_layout=debug cargo run --bin layout_server -- demo.json
//! ```
//!
//! Then, for example:
//!
//! ```sh
//! curl -X POST http://localhost:8080/monitor/trains
//! curl -X POST -d train=train7 http://localhost:8080/monitor/train-state
//! ```

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{info, warn};

use rs_layout::hal::MockBus;
use rs_layout::services::{
    event_channel, run_server_with_state, EventFeedRunner, SharedLayout, WebServerConfig,
};
use rs_layout::{AccessoryKind, Config, Direction, HardwareEvent, Layout};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = load_config()?;
    info!(name = %config.device.name, "starting layout server");

    let shared = Arc::new(SharedLayout::new(Layout::from_config(MockBus::new(), &config)));

    // Event feed
    let (events_tx, events_rx) = event_channel(&config.feed);
    let feed = tokio::spawn(
        EventFeedRunner::new(Arc::clone(&shared), events_rx, &config.session).run(),
    );

    if config.feed.demo_layout {
        report_demo_layout(&events_tx).await?;
    }

    shared.layout().start();

    let web_config = WebServerConfig::from_config(&config.web)
        .with_context(|| format!("invalid bind address '{}'", config.web.bind_address))?;

    if config.web.enabled {
        run_server_with_state(Arc::clone(&shared), web_config, shutdown_signal())
            .await
            .context("web server failed")?;
    } else {
        info!("web server disabled, running the event feed only");
        shutdown_signal().await;
    }

    // Drain the feed first so no queued event lands after the store is cleared.
    drop(events_tx);
    let stats = feed.await.context("event feed task panicked")?;
    shared.layout().shutdown();
    info!(
        applied = stats.applied,
        dropped = stats.dropped,
        "layout server stopped"
    );
    Ok(())
}

/// Config from the JSON file named by the first argument, or defaults.
fn load_config() -> anyhow::Result<Config> {
    match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config file '{path}'"))?;
            let config =
                Config::from_json(&json).with_context(|| format!("parsing config file '{path}'"))?;
            info!(%path, "configuration loaded");
            Ok(config)
        }
        None => Ok(Config::default()),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(%err, "cannot listen for ctrl-c, shutting down");
    }
    info!("shutdown requested");
}

/// Report a small layout as the bus would during discovery.
async fn report_demo_layout(events: &mpsc::Sender<HardwareEvent>) -> anyhow::Result<()> {
    let demo = [
        HardwareEvent::train_discovered("train7", 7, &["head_light", "horn"]),
        HardwareEvent::train_discovered("cargo_db", 12, &["head_light"]),
        HardwareEvent::train_state("train7", true, Direction::Forward, 0),
        HardwareEvent::point_discovered("point1", AccessoryKind::Board, &["normal", "reverse"]),
        HardwareEvent::point_discovered("point2", AccessoryKind::Dcc, &["normal", "reverse"]),
        HardwareEvent::signal_discovered("signal1", AccessoryKind::Board, &["stop", "go", "caution"]),
        HardwareEvent::track_output("master", 0x03),
        HardwareEvent::occupancy("seg2", true, &[12]),
        HardwareEvent::occupancy("seg1", true, &[7]),
    ];
    for event in demo {
        events
            .send(event)
            .await
            .context("event feed closed during discovery")?;
    }
    info!("demo layout reported");
    Ok(())
}
