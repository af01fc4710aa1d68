//! Per-generation behavior report.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::detector::{detect_clustering, detect_competition, detect_cooperation, scan_system};
use crate::metrics::{AgentMetric, SystemMetric};
use crate::signal::BehaviorSignal;

/// Every detector's verdict for one generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorReport {
    /// The generation analyzed.
    pub generation: u64,
    /// Agent detectors first, then the system scan.
    pub signals: Vec<BehaviorSignal>,
}

impl BehaviorReport {
    /// Run all detectors over the generation's metric window.
    pub fn analyze(generation: u64, agents: &[AgentMetric], system: &[SystemMetric]) -> Self {
        let mut signals = vec![
            detect_clustering(agents),
            detect_competition(agents),
            detect_cooperation(agents),
        ];
        signals.extend(scan_system(system));
        Self {
            generation,
            signals,
        }
    }

    /// Signals whose pattern was found.
    pub fn detected(&self) -> impl Iterator<Item = &BehaviorSignal> {
        self.signals.iter().filter(|s| s.detected)
    }

    /// Log every detected signal at `info` level.
    pub fn log(&self) {
        for signal in self.detected() {
            info!(
                generation = self.generation,
                signal = ?signal.signal_type,
                summary = %signal.summary,
                "Behavior detected"
            );
        }
    }
}
