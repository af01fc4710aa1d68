//! Subscriber that drains the event broadcast into the log.
//!
//! The run publishes every violation, transaction outcome and generation
//! summary onto a [`BroadcastSink`]. [`spawn_event_logger`] consumes that
//! channel on its own task, forwards each event to a [`TracingSink`], and
//! returns per-kind counts once every sender is gone.

use std::collections::BTreeMap;

use evoguard_events::{BroadcastSink, EventSink, TracingSink};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::warn;

/// Number of events seen per event kind.
pub type EventTally = BTreeMap<&'static str, u64>;

/// Start logging events published on `sink` from now on.
///
/// The task ends when the sink and all its clones are dropped.
pub fn spawn_event_logger(sink: &BroadcastSink) -> JoinHandle<EventTally> {
    let mut rx = sink.subscribe();
    tokio::spawn(async move {
        let mut tally = EventTally::new();
        loop {
            match rx.recv().await {
                Ok(published) => {
                    let kind = published.event.kind();
                    let count = tally.entry(kind).or_insert(0);
                    *count = count.saturating_add(1);
                    if let Err(e) =
                        TracingSink.publish(&published.topic, &published.key, &published.event)
                    {
                        warn!(kind, error = %e, "failed to log event");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event logger fell behind, events skipped");
                }
                Err(RecvError::Closed) => return tally,
            }
        }
    })
}
