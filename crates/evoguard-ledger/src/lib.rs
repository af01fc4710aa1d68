//! Transaction ledger and saga coordination for the EvoGuard simulation.
//!
//! Every unit of work that must be undoable runs inside a logical
//! transaction. The ledger keeps the ordered operation log; the saga
//! coordinator keeps, per transaction, a stack of compensating actions that
//! mirrors that log.
//!
//! # Architecture
//!
//! - [`store`] -- The [`TransactionStore`] boundary with a version
//!   compare-and-swap, plus an in-memory implementation.
//! - [`transaction`] -- Pure status transitions on [`Transaction`] records.
//! - [`ledger`] -- The [`TransactionLedger`]: begin, append, commit and
//!   roll back records through the store.
//! - [`saga`] -- The [`SagaCoordinator`] and [`run_saga`].
//!
//! # Lifecycle
//!
//! ```text
//! begin -> Pending --commit--> Committed
//!                  \--rollback--> RolledBack
//! ```
//!
//! Both terminal states are final. Any further operation on a terminal or
//! absent transaction fails with [`LedgerError::UnknownTransaction`].
//! Rollback runs compensations newest first and always ends in
//! `RolledBack`, even when individual compensations fail.
//!
//! [`Transaction`]: evoguard_types::Transaction

pub mod ledger;
pub mod saga;
pub mod store;
pub mod transaction;

pub use ledger::TransactionLedger;
pub use saga::{
    BoxError, CompensatingAction, FnStep, RollbackReport, SagaCoordinator, SagaError, SagaStep,
    StepContext, StepResult, run_saga,
};
pub use store::{InMemoryTransactionStore, TransactionStore};

use evoguard_types::TransactionId;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised by the ledger and its store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// The transaction does not exist or has already reached a terminal
    /// state.
    #[error("unknown transaction: {id}")]
    UnknownTransaction {
        /// The transaction that was referenced.
        id: TransactionId,
    },

    /// Another writer changed the record since it was read.
    #[error("concurrent update of transaction {id}: expected version {expected}, found {actual}")]
    ConcurrentUpdate {
        /// The contended transaction.
        id: TransactionId,
        /// Version the writer based its change on.
        expected: u64,
        /// Version currently stored.
        actual: u64,
    },

    /// The backing store failed.
    #[error("transaction store failure: {reason}")]
    Store {
        /// What went wrong.
        reason: String,
    },
}
