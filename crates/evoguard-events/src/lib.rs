//! Simulation events and the sinks they are published to.
//!
//! Components never talk to a bus directly. They hold an injected
//! [`EventSink`] and publish through [`publish_or_log`], which downgrades
//! any sink failure to a `warn!` so event delivery can never fail the
//! operation that produced it.
//!
//! # Modules
//!
//! - [`event`] -- The [`SimulationEvent`] enum and topic names
//! - [`sink`] -- [`EventSink`] trait and the tracing, memory and broadcast sinks

pub mod event;
pub mod sink;

pub use event::{
    GenerationSummary, SimulationEvent, TOPIC_GENERATIONS, TOPIC_TRANSACTIONS, TOPIC_VIOLATIONS,
};
pub use sink::{
    BroadcastSink, EventSink, MemorySink, PublishError, PublishedEvent, TracingSink,
    publish_or_log,
};
