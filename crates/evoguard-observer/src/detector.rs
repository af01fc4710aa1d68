//! Emergent behavior detectors.
//!
//! Every detector is a pure function over a metric batch. None of them can
//! fail: an empty or too-small batch yields a non-detection whose summary
//! says so.

use std::collections::BTreeMap;

use evoguard_types::SignalType;

use crate::metrics::{AgentMetric, SystemMetric};
use crate::signal::BehaviorSignal;

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Mean pairwise distance at or below which agents count as clustered.
pub const CLUSTERING_THRESHOLD: f64 = 5.0;

/// Drop in mean resources, earliest to latest tick, that signals competition.
pub const COMPETITION_DROP_THRESHOLD: f64 = 10.0;

/// Mean reward at or above which agents count as cooperating.
pub const COOPERATION_REWARD_THRESHOLD: f64 = 0.5;

/// Average tick latency above which a tick is flagged.
pub const LATENCY_CEILING_MS: f64 = 250.0;

/// Generation fitness range above which the population is flagged as
/// diverging.
pub const FITNESS_SPREAD_LIMIT: f64 = 100.0;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn latest_tick(metrics: &[AgentMetric]) -> Vec<&AgentMetric> {
    let Some(latest) = metrics.iter().map(|m| m.tick).max() else {
        return Vec::new();
    };
    metrics.iter().filter(|m| m.tick == latest).collect()
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0_u64), |(s, n), v| (s + v, n.saturating_add(1)));
    (count > 0).then(|| sum / count as f64)
}

// ---------------------------------------------------------------------------
// Agent detectors
// ---------------------------------------------------------------------------

/// Agents on the latest tick standing close together.
pub fn detect_clustering(metrics: &[AgentMetric]) -> BehaviorSignal {
    let latest = latest_tick(metrics);
    if latest.len() < 2 {
        return BehaviorSignal::insufficient(
            SignalType::Clustering,
            "fewer than two agents on the latest tick",
        );
    }

    let distances = latest.iter().enumerate().flat_map(|(i, a)| {
        latest
            .iter()
            .skip(i.saturating_add(1))
            .map(|b| a.position.distance(b.position))
    });
    let mean_distance = mean(distances).unwrap_or(f64::INFINITY);
    let detected = mean_distance <= CLUSTERING_THRESHOLD;

    BehaviorSignal::new(
        SignalType::Clustering,
        detected,
        format!(
            "mean pairwise distance {mean_distance:.2} across {} agents ({} threshold {CLUSTERING_THRESHOLD})",
            latest.len(),
            if detected { "within" } else { "above" }
        ),
    )
    .with("mean_distance", mean_distance)
    .with("agents", latest.len())
    .with("threshold", CLUSTERING_THRESHOLD)
}

/// Resources falling across the window, or any violation within it.
pub fn detect_competition(metrics: &[AgentMetric]) -> BehaviorSignal {
    let mut by_tick: BTreeMap<u64, Vec<f64>> = BTreeMap::new();
    for m in metrics {
        by_tick.entry(m.tick).or_default().push(m.resources);
    }
    let (Some((first_tick, first)), Some((last_tick, last))) =
        (by_tick.first_key_value(), by_tick.last_key_value())
    else {
        return BehaviorSignal::insufficient(SignalType::Competition, "no agent metrics");
    };

    let start = mean(first.iter().copied()).unwrap_or(0.0);
    let end = mean(last.iter().copied()).unwrap_or(0.0);
    let drop = start - end;
    let violations = metrics
        .iter()
        .fold(0_u64, |acc, m| acc.saturating_add(m.violations));
    let detected = drop > COMPETITION_DROP_THRESHOLD || violations > 0;

    BehaviorSignal::new(
        SignalType::Competition,
        detected,
        format!(
            "mean resources {start:.2} -> {end:.2} over ticks {first_tick}..={last_tick}, {violations} violations"
        ),
    )
    .with("resource_drop", drop)
    .with("violations", violations)
    .with("first_tick", *first_tick)
    .with("last_tick", *last_tick)
}

/// High rewards shared by more than one agent on the latest tick.
pub fn detect_cooperation(metrics: &[AgentMetric]) -> BehaviorSignal {
    let latest = latest_tick(metrics);
    let Some(mean_reward) = mean(latest.iter().map(|m| m.reward)) else {
        return BehaviorSignal::insufficient(SignalType::Cooperation, "no agent metrics");
    };
    let rewarded = latest
        .iter()
        .filter(|m| m.reward >= COOPERATION_REWARD_THRESHOLD)
        .count();
    let detected = mean_reward >= COOPERATION_REWARD_THRESHOLD && rewarded > 1;

    BehaviorSignal::new(
        SignalType::Cooperation,
        detected,
        format!(
            "mean reward {mean_reward:.2}, {rewarded} of {} agents at or above {COOPERATION_REWARD_THRESHOLD}",
            latest.len()
        ),
    )
    .with("mean_reward", mean_reward)
    .with("rewarded_agents", rewarded)
}

// ---------------------------------------------------------------------------
// System scan
// ---------------------------------------------------------------------------

/// Flag failed nodes, slow ticks and diverging generations.
///
/// Returns one signal per finding, or a single "system healthy"
/// non-detection when nothing is wrong.
pub fn scan_system(metrics: &[SystemMetric]) -> Vec<BehaviorSignal> {
    let mut findings = Vec::new();

    for m in metrics {
        if m.failed_nodes > 0 {
            findings.push(
                BehaviorSignal::new(
                    SignalType::NodeFailure,
                    true,
                    format!("{} nodes failed on tick {}", m.failed_nodes, m.tick),
                )
                .with("tick", m.tick)
                .with("failed_nodes", m.failed_nodes),
            );
        }
        if m.avg_latency_ms > LATENCY_CEILING_MS {
            findings.push(
                BehaviorSignal::new(
                    SignalType::HighLatency,
                    true,
                    format!(
                        "tick {} averaged {:.1} ms, above {LATENCY_CEILING_MS} ms",
                        m.tick, m.avg_latency_ms
                    ),
                )
                .with("tick", m.tick)
                .with("avg_latency_ms", m.avg_latency_ms),
            );
        }
    }

    let mut by_generation: BTreeMap<u64, (f64, f64)> = BTreeMap::new();
    for m in metrics {
        for f in m.fitness.iter().copied().filter(|f| f.is_finite()) {
            let range = by_generation
                .entry(m.generation)
                .or_insert((f64::INFINITY, f64::NEG_INFINITY));
            *range = (range.0.min(f), range.1.max(f));
        }
    }
    for (generation, (low, high)) in by_generation {
        let spread = high - low;
        if spread > FITNESS_SPREAD_LIMIT {
            findings.push(
                BehaviorSignal::new(
                    SignalType::FitnessDivergence,
                    true,
                    format!(
                        "generation {generation} fitness spans {low:.2}..{high:.2}, range {spread:.2} above {FITNESS_SPREAD_LIMIT}"
                    ),
                )
                .with("generation", generation)
                .with("fitness_range", spread),
            );
        }
    }

    if findings.is_empty() {
        findings.push(
            BehaviorSignal::new(
                SignalType::SystemHealthy,
                false,
                format!("{} ticks scanned, no anomalies", metrics.len()),
            )
            .with("ticks", metrics.len()),
        );
    }
    findings
}
