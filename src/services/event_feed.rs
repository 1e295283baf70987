//! Asynchronous hardware event feed.
//!
//! The bus reader pushes [`HardwareEvent`]s into a bounded channel; the
//! runner drains it into the layout and, between events, expires idle
//! sessions on a fixed interval. A malformed event is logged and dropped,
//! it never stops the feed.
//!
//! # Example
//!
//! ```ignore
//! let (tx, rx) = event_channel(&config.feed);
//! let runner = EventFeedRunner::new(Arc::clone(&shared), rx, &config.session);
//! let feed = tokio::spawn(runner.run());
//!
//! tx.send(HardwareEvent::track_output("cs1", 0x03)).await?;
//! drop(tx);
//! let stats = feed.await?;
//! ```

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{FeedConfig, SessionConfig};
use crate::error::EventError;
use crate::events::HardwareEvent;
use crate::lifecycle::LifecyclePhase;

use super::shared::LayoutProvider;

/// Create the channel between a bus reader and an [`EventFeedRunner`].
pub fn event_channel(
    config: &FeedConfig,
) -> (mpsc::Sender<HardwareEvent>, mpsc::Receiver<HardwareEvent>) {
    mpsc::channel(config.channel_capacity.max(1))
}

/// Counters kept by the runner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeedStats {
    /// Events applied to the store.
    pub applied: u64,
    /// Events dropped as malformed or out of phase.
    pub dropped: u64,
    /// Sessions ended by idle timeout.
    pub expired_sessions: u64,
}

// ============================================================================
// Event Feed Runner
// ============================================================================

/// Drains hardware events into a layout.
pub struct EventFeedRunner<P: LayoutProvider> {
    provider: P,
    events: mpsc::Receiver<HardwareEvent>,
    expiry_interval: Duration,
    stats: FeedStats,
}

impl<P: LayoutProvider> EventFeedRunner<P> {
    /// Create a runner reading from `events`.
    pub fn new(provider: P, events: mpsc::Receiver<HardwareEvent>, config: &SessionConfig) -> Self {
        Self {
            provider,
            events,
            expiry_interval: Duration::from_millis(u64::from(config.expiry_check_ms.max(1))),
            stats: FeedStats::default(),
        }
    }

    /// Counters so far.
    pub fn stats(&self) -> FeedStats {
        self.stats
    }

    /// Apply one event. Returns whether it was applied.
    ///
    /// Events arriving during or after a shutdown are dropped, so the store
    /// is not repopulated until the layout is started again.
    pub fn handle_event(&mut self, event: HardwareEvent) -> bool {
        if self.provider.phase() == LifecyclePhase::ShuttingDown {
            debug!(category = %event.category(), id = event.id(), "event dropped during shutdown");
            self.stats.dropped += 1;
            return false;
        }
        let category = event.category();
        let id = event.id().to_owned();
        match self.provider.apply_event(event) {
            Ok(()) => {
                self.stats.applied += 1;
                true
            }
            Err(EventError::IntakeClosed) => {
                debug!(%category, id = %id, "event dropped after shutdown");
                self.stats.dropped += 1;
                false
            }
            Err(err) => {
                warn!(%category, id = %id, %err, "dropping malformed hardware event");
                self.stats.dropped += 1;
                false
            }
        }
    }

    /// Expire idle sessions if the layout is running.
    pub fn expire_idle(&mut self) -> usize {
        if !self.provider.is_running() {
            return 0;
        }
        let expired = self.provider.expire_idle().len();
        self.stats.expired_sessions += expired as u64;
        expired
    }

    /// Run until every sender is dropped. Returns the final counters.
    pub async fn run(mut self) -> FeedStats {
        let mut ticker = tokio::time::interval(self.expiry_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => {
                        self.handle_event(event);
                    }
                    None => break,
                },
                _ = ticker.tick() => {
                    self.expire_idle();
                }
            }
        }

        info!(
            applied = self.stats.applied,
            dropped = self.stats.dropped,
            expired_sessions = self.stats.expired_sessions,
            "event feed closed"
        );
        self.stats
    }
}
