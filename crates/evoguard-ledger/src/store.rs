//! Transaction persistence boundary.
//!
//! The store is the source of truth for whether a transaction exists and
//! what state it is in. [`TransactionStore::save`] is a compare-and-swap on
//! the record's `version`: version 0 may only be inserted, and version `n`
//! only replaces a stored version `n - 1`.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use evoguard_types::{Transaction, TransactionId};

use crate::LedgerError;

/// Durable home of transaction records.
pub trait TransactionStore: Send + Sync {
    /// Persist `record`, enforcing the version compare-and-swap.
    fn save(&self, record: &Transaction) -> Result<(), LedgerError>;

    /// Load a record by id.
    fn find_by_id(&self, id: TransactionId) -> Result<Option<Transaction>, LedgerError>;
}

/// In-memory store backed by a [`DashMap`].
#[derive(Debug, Default)]
pub struct InMemoryTransactionStore {
    records: DashMap<TransactionId, Transaction>,
}

impl InMemoryTransactionStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl TransactionStore for InMemoryTransactionStore {
    fn save(&self, record: &Transaction) -> Result<(), LedgerError> {
        match self.records.entry(record.id) {
            Entry::Vacant(slot) => {
                if record.version != 0 {
                    return Err(LedgerError::UnknownTransaction { id: record.id });
                }
                slot.insert(record.clone());
                Ok(())
            }
            Entry::Occupied(mut slot) => {
                let actual = slot.get().version;
                let expected = record.version.checked_sub(1);
                if expected != Some(actual) {
                    return Err(LedgerError::ConcurrentUpdate {
                        id: record.id,
                        expected: expected.unwrap_or(0),
                        actual,
                    });
                }
                slot.insert(record.clone());
                Ok(())
            }
        }
    }

    fn find_by_id(&self, id: TransactionId) -> Result<Option<Transaction>, LedgerError> {
        Ok(self.records.get(&id).map(|r| r.value().clone()))
    }
}
