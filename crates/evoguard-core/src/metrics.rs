//! Bounded per-tick metric window feeding the behavior detectors.

use std::collections::VecDeque;

use evoguard_observer::{AgentMetric, SystemMetric};

#[derive(Debug, Clone)]
struct TickMetrics {
    agents: Vec<AgentMetric>,
    system: SystemMetric,
}

/// Keeps the most recent `capacity` ticks of metrics.
///
/// Older ticks fall off the front as new ones arrive. Generation turnover
/// drains the window so every behavior report covers one generation.
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    capacity: usize,
    ticks: VecDeque<TickMetrics>,
}

impl MetricsCollector {
    /// Create a collector retaining up to `capacity` ticks (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            ticks: VecDeque::with_capacity(capacity),
        }
    }

    /// Maximum number of ticks retained.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Ticks currently retained.
    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    /// Whether no tick is retained.
    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    /// Append one tick's readings, evicting the oldest tick when full.
    pub fn record(&mut self, agents: Vec<AgentMetric>, system: SystemMetric) {
        while self.ticks.len() >= self.capacity {
            self.ticks.pop_front();
        }
        self.ticks.push_back(TickMetrics { agents, system });
    }

    /// Copy the window out as detector batches.
    pub fn batches(&self) -> (Vec<AgentMetric>, Vec<SystemMetric>) {
        let agents = self
            .ticks
            .iter()
            .flat_map(|t| t.agents.iter().cloned())
            .collect();
        let system = self.ticks.iter().map(|t| t.system.clone()).collect();
        (agents, system)
    }

    /// Empty the window, returning its contents as detector batches.
    pub fn drain(&mut self) -> (Vec<AgentMetric>, Vec<SystemMetric>) {
        let batches = self.batches();
        self.ticks.clear();
        batches
    }
}

#[cfg(test)]
mod tests {
    use evoguard_types::{AgentId, Position};

    use super::*;

    fn tick(n: u64) -> (Vec<AgentMetric>, SystemMetric) {
        let agent = AgentMetric {
            tick: n,
            agent_id: AgentId::new(),
            position: Position::ORIGIN,
            resources: 0.0,
            reward: 0.0,
            violations: 0,
        };
        let system = SystemMetric {
            tick: n,
            generation: 0,
            failed_nodes: 0,
            avg_latency_ms: 1.0,
            fitness: vec![100.0],
        };
        (vec![agent], system)
    }

    #[test]
    fn window_evicts_oldest_ticks() {
        let mut collector = MetricsCollector::new(3);
        for n in 1..=5 {
            let (agents, system) = tick(n);
            collector.record(agents, system);
        }
        assert_eq!(collector.len(), 3);
        let (agents, system) = collector.batches();
        let ticks: Vec<u64> = system.iter().map(|s| s.tick).collect();
        assert_eq!(ticks, vec![3, 4, 5]);
        assert_eq!(agents.len(), 3);
    }

    #[test]
    fn drain_empties_the_window() {
        let mut collector = MetricsCollector::new(0);
        assert_eq!(collector.capacity(), 1);
        let (agents, system) = tick(1);
        collector.record(agents, system);
        let (agents, system) = collector.drain();
        assert_eq!((agents.len(), system.len()), (1, 1));
        assert!(collector.is_empty());
    }
}
