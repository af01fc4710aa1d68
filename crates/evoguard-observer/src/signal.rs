//! Detector output.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use evoguard_types::SignalType;

/// The verdict of one detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorSignal {
    /// Which pattern was looked for.
    pub signal_type: SignalType,
    /// Whether the pattern was found.
    pub detected: bool,
    /// Human-readable explanation.
    pub summary: String,
    /// When the verdict was reached.
    pub timestamp: DateTime<Utc>,
    /// Figures behind the verdict, for reports.
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl BehaviorSignal {
    pub(crate) fn new(signal_type: SignalType, detected: bool, summary: impl Into<String>) -> Self {
        Self {
            signal_type,
            detected,
            summary: summary.into(),
            timestamp: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }

    /// A non-detection explaining that the batch was too small to judge.
    pub(crate) fn insufficient(signal_type: SignalType, reason: &str) -> Self {
        Self::new(signal_type, false, format!("insufficient data: {reason}"))
            .with("insufficient_data", true)
    }

    #[must_use]
    pub(crate) fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_owned(), value.into());
        self
    }
}
