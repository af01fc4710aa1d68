//! Metric batch types fed to the detectors.

use serde::{Deserialize, Serialize};

use evoguard_types::{AgentId, Position};

/// One agent's readings for one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMetric {
    /// Tick the reading was taken on.
    pub tick: u64,
    /// The agent.
    pub agent_id: AgentId,
    /// Where the agent stood.
    pub position: Position,
    /// Resources the agent carried.
    pub resources: f64,
    /// Reward earned this tick.
    pub reward: f64,
    /// Violations the agent committed this tick.
    pub violations: u64,
}

/// System-wide readings for one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMetric {
    /// Tick the reading was taken on.
    pub tick: u64,
    /// Generation the tick belongs to.
    pub generation: u64,
    /// Units of work that failed during the tick (failed compensations in
    /// the simulation loop).
    pub failed_nodes: u32,
    /// Mean wall-clock latency of the tick, in milliseconds.
    pub avg_latency_ms: f64,
    /// Fitness of every living agent at the end of the tick.
    pub fitness: Vec<f64>,
}
