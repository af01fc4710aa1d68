//! Error types for the evoguard-agents crate.

/// Errors raised when resolving or running a selection.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SelectionError {
    /// Selection settings cannot produce a survivor set.
    #[error("invalid selection configuration: {reason}")]
    InvalidConfiguration {
        /// Which setting was rejected and why.
        reason: String,
    },
}
