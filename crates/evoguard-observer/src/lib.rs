//! Emergent behavior detection for the EvoGuard simulation.
//!
//! The simulation collects per-agent and system metrics every tick; at the
//! end of each generation the window is handed to the detectors here.
//!
//! # Modules
//!
//! - [`metrics`] -- [`AgentMetric`] and [`SystemMetric`] batch records
//! - [`signal`] -- The [`BehaviorSignal`] verdict type
//! - [`detector`] -- Clustering, competition, cooperation and system scans
//! - [`report`] -- [`BehaviorReport`] bundling all verdicts for a generation

pub mod detector;
pub mod metrics;
pub mod report;
pub mod signal;

pub use detector::{
    CLUSTERING_THRESHOLD, COMPETITION_DROP_THRESHOLD, COOPERATION_REWARD_THRESHOLD,
    FITNESS_SPREAD_LIMIT, LATENCY_CEILING_MS, detect_clustering, detect_competition,
    detect_cooperation, scan_system,
};
pub use metrics::{AgentMetric, SystemMetric};
pub use report::BehaviorReport;
pub use signal::BehaviorSignal;
