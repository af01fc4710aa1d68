//! Event sinks.
//!
//! [`EventSink`] is the seam between the simulation and whatever carries
//! events onward. Three sinks ship with the crate:
//!
//! - [`TracingSink`] logs each event as JSON at `info` level
//! - [`MemorySink`] keeps events in a vector for tests and reports
//! - [`BroadcastSink`] fans events out over a `tokio` broadcast channel

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::event::SimulationEvent;

/// Capacity of the broadcast channel.
///
/// A subscriber that falls further behind receives
/// [`broadcast::error::RecvError::Lagged`] and skips to the newest event.
const BROADCAST_CAPACITY: usize = 1024;

/// Errors a sink can report.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The event could not be serialized.
    #[error("failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The sink refused the event.
    #[error("sink rejected event on {topic}: {reason}")]
    Rejected {
        /// Topic the event was published on.
        topic: String,
        /// Why the sink refused it.
        reason: String,
    },
}

/// A destination for simulation events.
pub trait EventSink: Send + Sync {
    /// Publish `event` on `topic`, partitioned by `key`.
    fn publish(&self, topic: &str, key: &str, event: &SimulationEvent)
    -> Result<(), PublishError>;
}

/// Publish through `sink`, logging instead of propagating any failure.
pub fn publish_or_log(sink: &dyn EventSink, key: &str, event: &SimulationEvent) {
    let topic = event.topic();
    if let Err(e) = sink.publish(topic, key, event) {
        warn!(
            topic,
            key,
            kind = event.kind(),
            error = %e,
            "failed to publish event"
        );
    }
}

/// An event as a sink received it.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedEvent {
    /// Topic it was published on.
    pub topic: String,
    /// Partition key.
    pub key: String,
    /// The event itself.
    pub event: SimulationEvent,
}

// ---------------------------------------------------------------------------
// TracingSink
// ---------------------------------------------------------------------------

/// Logs every event. Used when no external bus is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn publish(
        &self,
        topic: &str,
        key: &str,
        event: &SimulationEvent,
    ) -> Result<(), PublishError> {
        let payload = serde_json::to_string(event)?;
        info!(topic, key, kind = event.kind(), payload, "event");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemorySink
// ---------------------------------------------------------------------------

/// Collects events in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<PublishedEvent>>,
    reject: bool,
}

impl MemorySink {
    /// An empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that rejects every event.
    pub fn rejecting() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            reject: true,
        }
    }

    /// A copy of everything published so far, in publish order.
    pub fn events(&self) -> Vec<PublishedEvent> {
        self.events.lock().clone()
    }

    /// Events published on `topic`.
    pub fn events_on(&self, topic: &str) -> Vec<SimulationEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.topic == topic)
            .map(|e| e.event.clone())
            .collect()
    }

    /// Number of events held.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether nothing has been published.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for MemorySink {
    fn publish(
        &self,
        topic: &str,
        key: &str,
        event: &SimulationEvent,
    ) -> Result<(), PublishError> {
        if self.reject {
            return Err(PublishError::Rejected {
                topic: topic.to_owned(),
                reason: "sink is closed".to_owned(),
            });
        }
        self.events.lock().push(PublishedEvent {
            topic: topic.to_owned(),
            key: key.to_owned(),
            event: event.clone(),
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// BroadcastSink
// ---------------------------------------------------------------------------

/// Fans events out to any number of async subscribers.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<Arc<PublishedEvent>>,
}

impl BroadcastSink {
    /// Create a sink with the default channel capacity.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { tx }
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<PublishedEvent>> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for BroadcastSink {
    fn publish(
        &self,
        topic: &str,
        key: &str,
        event: &SimulationEvent,
    ) -> Result<(), PublishError> {
        let published = Arc::new(PublishedEvent {
            topic: topic.to_owned(),
            key: key.to_owned(),
            event: event.clone(),
        });
        // send only fails with zero receivers, which is normal.
        let _ = self.tx.send(published);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use evoguard_types::TransactionId;

    use super::*;
    use crate::event::TOPIC_TRANSACTIONS;

    fn committed() -> SimulationEvent {
        SimulationEvent::TransactionCommitted {
            transaction_id: TransactionId::new(),
            name: "tick".to_owned(),
            operations: 1,
        }
    }

    #[test]
    fn memory_sink_records_in_order() {
        let sink = MemorySink::new();
        publish_or_log(&sink, "a", &committed());
        publish_or_log(&sink, "b", &committed());
        let keys: Vec<String> = sink.events().into_iter().map(|e| e.key).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(sink.events_on(TOPIC_TRANSACTIONS).len(), 2);
    }

    #[test]
    fn rejected_publish_is_swallowed() {
        let sink = MemorySink::rejecting();
        let direct = sink.publish(TOPIC_TRANSACTIONS, "k", &committed());
        assert!(matches!(direct, Err(PublishError::Rejected { .. })));
        publish_or_log(&sink, "k", &committed());
        assert!(sink.is_empty());
    }

    #[test]
    fn tracing_sink_accepts_events() {
        assert!(TracingSink.publish(TOPIC_TRANSACTIONS, "k", &committed()).is_ok());
    }

    #[test]
    fn broadcast_without_subscribers_is_fine() {
        let sink = BroadcastSink::new();
        assert!(sink.publish(TOPIC_TRANSACTIONS, "k", &committed()).is_ok());
    }

    #[tokio::test]
    async fn broadcast_reaches_subscribers() {
        let sink = BroadcastSink::new();
        let mut rx = sink.subscribe();
        publish_or_log(&sink, "k", &committed());
        let received = rx.recv().await;
        assert!(matches!(received, Ok(ref e) if e.topic == TOPIC_TRANSACTIONS));
    }
}
