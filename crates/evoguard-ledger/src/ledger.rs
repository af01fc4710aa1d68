//! The transaction ledger: ordered operation logs behind a store.
//!
//! [`TransactionLedger`] is a thin read-transition-write layer over a
//! [`TransactionStore`]. It never caches records; every call loads the
//! current version, applies a pure transition from [`crate::transaction`]
//! and saves it back through the store's compare-and-swap.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use evoguard_types::{Transaction, TransactionId, TransactionStatus};

use crate::LedgerError;
use crate::store::{InMemoryTransactionStore, TransactionStore};
use crate::transaction::{finished, with_operation};

/// Operation log for every transaction in the run.
#[derive(Clone)]
pub struct TransactionLedger {
    store: Arc<dyn TransactionStore>,
}

impl core::fmt::Debug for TransactionLedger {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TransactionLedger").finish_non_exhaustive()
    }
}

impl Default for TransactionLedger {
    fn default() -> Self {
        Self::new(Arc::new(InMemoryTransactionStore::new()))
    }
}

impl TransactionLedger {
    /// Create a ledger persisting to `store`.
    pub fn new(store: Arc<dyn TransactionStore>) -> Self {
        Self { store }
    }

    /// Open a new pending transaction.
    pub fn begin(&self, name: &str) -> Result<Transaction, LedgerError> {
        let record = Transaction::pending(name);
        self.store.save(&record)?;
        debug!(transaction_id = %record.id, name, "Transaction begun");
        Ok(record)
    }

    /// Append an operation and, when it has one, the description of its
    /// compensation.
    pub fn append_operation(
        &self,
        id: TransactionId,
        operation: &str,
        compensation: Option<&str>,
    ) -> Result<Transaction, LedgerError> {
        let current = self.load_pending(id)?;
        let next = with_operation(&current, operation, compensation)?;
        self.store.save(&next)?;
        Ok(next)
    }

    /// Mark a pending transaction committed.
    pub fn mark_committed(&self, id: TransactionId) -> Result<Transaction, LedgerError> {
        self.finish(id, TransactionStatus::Committed)
    }

    /// Mark a pending transaction rolled back.
    pub fn mark_rolled_back(&self, id: TransactionId) -> Result<Transaction, LedgerError> {
        self.finish(id, TransactionStatus::RolledBack)
    }

    /// Load a record in any state.
    pub fn find(&self, id: TransactionId) -> Result<Option<Transaction>, LedgerError> {
        self.store.find_by_id(id)
    }

    fn finish(
        &self,
        id: TransactionId,
        status: TransactionStatus,
    ) -> Result<Transaction, LedgerError> {
        let current = self.load_pending(id)?;
        let next = finished(&current, status, Utc::now())?;
        self.store.save(&next)?;
        debug!(transaction_id = %id, status = ?status, "Transaction finished");
        Ok(next)
    }

    fn load_pending(&self, id: TransactionId) -> Result<Transaction, LedgerError> {
        match self.store.find_by_id(id)? {
            Some(record) if record.is_pending() => Ok(record),
            _ => Err(LedgerError::UnknownTransaction { id }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_append_commit() {
        let ledger = TransactionLedger::default();
        let tx = ledger.begin("transfer");
        assert!(tx.is_ok());
        let Ok(tx) = tx else { return };

        assert!(ledger.append_operation(tx.id, "debit A", Some("credit A")).is_ok());
        let committed = ledger.mark_committed(tx.id);
        assert!(matches!(
            committed,
            Ok(ref t) if t.status == TransactionStatus::Committed && t.operations == vec!["debit A"]
        ));
    }

    #[test]
    fn unknown_id_is_rejected() {
        let ledger = TransactionLedger::default();
        let id = TransactionId::new();
        assert!(matches!(
            ledger.append_operation(id, "op", None),
            Err(LedgerError::UnknownTransaction { .. })
        ));
        assert!(matches!(
            ledger.mark_rolled_back(id),
            Err(LedgerError::UnknownTransaction { .. })
        ));
        assert!(matches!(ledger.find(id), Ok(None)));
    }

    #[test]
    fn terminal_is_final_in_either_order() {
        let ledger = TransactionLedger::default();
        let Ok(a) = ledger.begin("a") else { return };
        let Ok(b) = ledger.begin("b") else { return };

        assert!(ledger.mark_committed(a.id).is_ok());
        assert!(ledger.mark_rolled_back(a.id).is_err());
        assert!(ledger.mark_committed(a.id).is_err());

        assert!(ledger.mark_rolled_back(b.id).is_ok());
        assert!(ledger.mark_committed(b.id).is_err());

        let status = ledger.find(a.id).ok().flatten().map(|t| t.status);
        assert_eq!(status, Some(TransactionStatus::Committed));
    }
}
