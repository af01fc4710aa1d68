//! Pure transitions on [`Transaction`] records.
//!
//! Each function validates that the record is still pending and returns the
//! next version of it. Nothing here touches the store; the
//! [`TransactionLedger`](crate::TransactionLedger) persists the result.

use chrono::{DateTime, Utc};

use evoguard_types::{Transaction, TransactionStatus};

use crate::LedgerError;

fn next_version(current: &Transaction) -> Result<Transaction, LedgerError> {
    if !current.is_pending() {
        return Err(LedgerError::UnknownTransaction { id: current.id });
    }
    let mut next = current.clone();
    next.version = current.version.saturating_add(1);
    Ok(next)
}

/// Append an operation and, when it has one, the description of its
/// compensation.
pub fn with_operation(
    current: &Transaction,
    operation: &str,
    compensation: Option<&str>,
) -> Result<Transaction, LedgerError> {
    let mut next = next_version(current)?;
    next.operations.push(operation.to_owned());
    if let Some(compensation) = compensation {
        next.compensations.push(compensation.to_owned());
    }
    Ok(next)
}

/// Move a pending transaction into a terminal `status` at `at`.
pub fn finished(
    current: &Transaction,
    status: TransactionStatus,
    at: DateTime<Utc>,
) -> Result<Transaction, LedgerError> {
    let mut next = next_version(current)?;
    next.status = status;
    next.completed_at = Some(at);
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations_bump_version_and_keep_order() {
        let tx = Transaction::pending("t");
        let tx = with_operation(&tx, "debit", Some("refund"))
            .unwrap_or_else(|_| Transaction::pending("x"));
        let tx = with_operation(&tx, "audit", None).unwrap_or_else(|_| Transaction::pending("x"));
        let tx = with_operation(&tx, "credit", Some("reverse"))
            .unwrap_or_else(|_| Transaction::pending("x"));
        assert_eq!(tx.version, 3);
        assert_eq!(tx.operations, vec!["debit", "audit", "credit"]);
        assert_eq!(tx.compensations, vec!["refund", "reverse"]);
    }

    #[test]
    fn terminal_records_reject_everything() {
        let tx = Transaction::pending("t");
        let done = finished(&tx, TransactionStatus::Committed, Utc::now());
        assert!(matches!(done, Ok(ref t) if t.completed_at.is_some() && t.version == 1));
        let Ok(done) = done else { return };
        assert!(matches!(
            with_operation(&done, "late", Some("undo")),
            Err(LedgerError::UnknownTransaction { .. })
        ));
        assert!(matches!(
            finished(&done, TransactionStatus::RolledBack, Utc::now()),
            Err(LedgerError::UnknownTransaction { .. })
        ));
    }
}
