//! Saga coordination: compensation stacks and rollback.
//!
//! The [`SagaCoordinator`] logs operations and stacks the
//! [`CompensatingAction`]s supplied with them. On commit the stack is
//! discarded. On rollback it
//! is unwound newest first; a compensation that returns an error or panics
//! is logged with `error!` and the unwind carries on with the next one.
//!
//! Stacks live in a [`DashMap`] keyed by transaction id, so work on
//! independent transactions never contends on a global lock.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{error, info};

use evoguard_events::{EventSink, SimulationEvent, TracingSink, publish_or_log};
use evoguard_types::{Transaction, TransactionId};

use crate::LedgerError;
use crate::ledger::TransactionLedger;

/// Error type accepted from compensations and saga steps.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Version races tolerated when marking a transaction rolled back.
const MAX_FINISH_RETRIES: u32 = 3;

type Compensation = Box<dyn FnOnce() -> Result<(), BoxError> + Send + Sync>;

// ---------------------------------------------------------------------------
// Compensating action
// ---------------------------------------------------------------------------

/// An executable undo step with a human-readable description.
pub struct CompensatingAction {
    description: String,
    action: Compensation,
}

impl CompensatingAction {
    /// Wrap a fallible undo closure.
    pub fn new<F>(description: impl Into<String>, action: F) -> Self
    where
        F: FnOnce() -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            action: Box::new(action),
        }
    }

    /// Wrap an undo closure that cannot fail.
    pub fn infallible<F>(description: impl Into<String>, action: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self::new(description, move || {
            action();
            Ok(())
        })
    }

    /// What this compensation undoes.
    pub fn description(&self) -> &str {
        &self.description
    }

    fn run(self) -> Result<(), String> {
        match catch_unwind(AssertUnwindSafe(self.action)) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(payload) => Err(panic_message(payload.as_ref())),
        }
    }
}

impl core::fmt::Debug for CompensatingAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CompensatingAction")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .map_or_else(|| "compensation panicked".to_owned(), |m| format!("panicked: {m}"))
}

// ---------------------------------------------------------------------------
// Errors and reports
// ---------------------------------------------------------------------------

/// Errors raised by [`run_saga`].
#[derive(Debug, thiserror::Error)]
pub enum SagaError {
    /// A step failed. The transaction was rolled back before this error was
    /// returned.
    #[error("saga step '{step}' failed in transaction {transaction_id}")]
    ExecutionFailure {
        /// The rolled-back transaction.
        transaction_id: TransactionId,
        /// Name of the failing step.
        step: String,
        /// What the step reported.
        #[source]
        source: BoxError,
    },

    /// The ledger rejected an operation.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Outcome of a rollback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackReport {
    /// The record in its final `RolledBack` state.
    pub transaction: Transaction,
    /// Compensations attempted, newest first.
    pub attempted: Vec<String>,
    /// Descriptions of compensations that failed.
    pub failed: Vec<String>,
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Owns the compensation stacks of every open transaction.
pub struct SagaCoordinator {
    ledger: TransactionLedger,
    stacks: DashMap<TransactionId, Vec<CompensatingAction>>,
    sink: Arc<dyn EventSink>,
}

impl core::fmt::Debug for SagaCoordinator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SagaCoordinator")
            .field("open", &self.stacks.len())
            .finish_non_exhaustive()
    }
}

impl Default for SagaCoordinator {
    fn default() -> Self {
        Self::new(TransactionLedger::default(), Arc::new(TracingSink))
    }
}

impl SagaCoordinator {
    /// Create a coordinator over `ledger`, publishing outcomes to `sink`.
    pub fn new(ledger: TransactionLedger, sink: Arc<dyn EventSink>) -> Self {
        Self {
            ledger,
            stacks: DashMap::new(),
            sink,
        }
    }

    /// The underlying ledger.
    pub const fn ledger(&self) -> &TransactionLedger {
        &self.ledger
    }

    /// Open a transaction with an empty compensation stack.
    pub fn begin(&self, name: &str) -> Result<TransactionId, LedgerError> {
        let record = self.ledger.begin(name)?;
        self.stacks.insert(record.id, Vec::new());
        Ok(record.id)
    }

    /// Record `operation` and, when supplied, push its compensation.
    ///
    /// The compensation log and the stack grow together: if the ledger
    /// rejects the operation, nothing is pushed.
    pub fn log_operation(
        &self,
        id: TransactionId,
        operation: &str,
        compensation: Option<CompensatingAction>,
    ) -> Result<(), LedgerError> {
        self.push_operation(id, operation, compensation)
            .map_err(|(source, _unlogged)| source)
    }

    /// As [`Self::log_operation`], handing a rejected compensation back.
    fn push_operation(
        &self,
        id: TransactionId,
        operation: &str,
        compensation: Option<CompensatingAction>,
    ) -> Result<(), (LedgerError, Option<CompensatingAction>)> {
        let Some(mut stack) = self.stacks.get_mut(&id) else {
            return Err((LedgerError::UnknownTransaction { id }, compensation));
        };
        let description = compensation.as_ref().map(CompensatingAction::description);
        if let Err(source) = self.ledger.append_operation(id, operation, description) {
            return Err((source, compensation));
        }
        if let Some(compensation) = compensation {
            stack.push(compensation);
        }
        Ok(())
    }

    /// Commit: keep all effects and discard the compensations.
    pub fn commit(&self, id: TransactionId) -> Result<Transaction, LedgerError> {
        let Some((_, stack)) = self.stacks.remove(&id) else {
            return Err(LedgerError::UnknownTransaction { id });
        };
        let record = match self.ledger.mark_committed(id) {
            Ok(record) => record,
            Err(e) => {
                if self.still_pending(id) {
                    self.stacks.insert(id, stack);
                }
                return Err(e);
            }
        };
        drop(stack);

        info!(
            transaction_id = %id,
            name = %record.name,
            operations = record.operations.len(),
            "Transaction committed"
        );
        publish_or_log(
            self.sink.as_ref(),
            &id.to_string(),
            &SimulationEvent::TransactionCommitted {
                transaction_id: id,
                name: record.name.clone(),
                operations: record.operations.len(),
            },
        );
        Ok(record)
    }

    /// Roll back: run every compensation, newest first, then mark the
    /// transaction rolled back.
    pub fn rollback(&self, id: TransactionId) -> Result<RollbackReport, LedgerError> {
        let Some((_, stack)) = self.stacks.remove(&id) else {
            return Err(LedgerError::UnknownTransaction { id });
        };

        let mut attempted = Vec::with_capacity(stack.len());
        let mut failed = Vec::new();
        for compensation in stack.into_iter().rev() {
            let description = compensation.description.clone();
            if let Err(cause) = compensation.run() {
                error!(
                    transaction_id = %id,
                    compensation = %description,
                    error = %cause,
                    "Compensation failed, continuing rollback"
                );
                failed.push(description.clone());
            }
            attempted.push(description);
        }

        let transaction = self.mark_rolled_back(id)?;
        info!(
            transaction_id = %id,
            name = %transaction.name,
            compensations = attempted.len(),
            failures = failed.len(),
            "Transaction rolled back"
        );
        publish_or_log(
            self.sink.as_ref(),
            &id.to_string(),
            &SimulationEvent::TransactionRolledBack {
                transaction_id: id,
                name: transaction.name.clone(),
                compensations_run: attempted.len(),
                compensation_failures: failed.len(),
            },
        );
        Ok(RollbackReport {
            transaction,
            attempted,
            failed,
        })
    }

    /// Mark rolled back, retrying lost version races against the fresh
    /// record.
    fn mark_rolled_back(&self, id: TransactionId) -> Result<Transaction, LedgerError> {
        let mut attempts = 0_u32;
        loop {
            match self.ledger.mark_rolled_back(id) {
                Err(LedgerError::ConcurrentUpdate { .. }) if attempts < MAX_FINISH_RETRIES => {
                    attempts = attempts.saturating_add(1);
                }
                other => return other,
            }
        }
    }

    /// Whether the store still holds `id` as pending. An unreadable store
    /// counts as pending so the compensations are kept.
    fn still_pending(&self, id: TransactionId) -> bool {
        match self.ledger.find(id) {
            Ok(Some(record)) => record.is_pending(),
            Ok(None) => false,
            Err(_) => true,
        }
    }

    /// Load a transaction record in any state.
    pub fn find(&self, id: TransactionId) -> Result<Option<Transaction>, LedgerError> {
        self.ledger.find(id)
    }

    /// Compensations currently stacked for `id`, or `None` if it is not open.
    pub fn compensation_depth(&self, id: TransactionId) -> Option<usize> {
        self.stacks.get(&id).map(|s| s.len())
    }

    /// Number of open transactions.
    pub fn open_transactions(&self) -> usize {
        self.stacks.len()
    }
}

// ---------------------------------------------------------------------------
// Saga steps
// ---------------------------------------------------------------------------

/// Handle a step uses to register its effects.
#[derive(Debug)]
pub struct StepContext<'a> {
    coordinator: &'a SagaCoordinator,
    transaction_id: TransactionId,
}

impl StepContext<'_> {
    /// The transaction the step runs in.
    pub const fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    /// Record an effect applied part-way through the step, together with
    /// its undo.
    pub fn register(
        &self,
        operation: &str,
        compensation: CompensatingAction,
    ) -> Result<(), LedgerError> {
        self.coordinator
            .log_operation(self.transaction_id, operation, Some(compensation))
    }
}

/// What a step returns: on success, the compensation that undoes it.
pub type StepResult = Result<Option<CompensatingAction>, BoxError>;

/// One step of a saga.
pub trait SagaStep {
    /// Step name, logged as the step's operation.
    fn name(&self) -> &str;

    /// Apply the step.
    ///
    /// On success the returned compensation, if any, is logged under the
    /// step's name. Effects applied before a failure are registered through
    /// `ctx` so the rollback can undo them.
    fn execute(&mut self, ctx: &StepContext<'_>) -> StepResult;
}

/// A [`SagaStep`] built from a closure.
pub struct FnStep<F> {
    name: String,
    body: F,
}

impl<F> FnStep<F>
where
    F: FnMut(&StepContext<'_>) -> StepResult,
{
    /// Create a named step.
    pub fn new(name: impl Into<String>, body: F) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }
}

impl<F> SagaStep for FnStep<F>
where
    F: FnMut(&StepContext<'_>) -> StepResult,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, ctx: &StepContext<'_>) -> StepResult {
        (self.body)(ctx)
    }
}

/// Run `steps` in order inside one transaction.
///
/// Every successful step is logged under its name with the compensation it
/// returned. Commits when every step succeeds. When a step fails the
/// transaction is rolled back first and then [`SagaError::ExecutionFailure`]
/// is returned carrying the step's error as its source.
pub fn run_saga(
    coordinator: &SagaCoordinator,
    name: &str,
    steps: &mut [&mut dyn SagaStep],
) -> Result<Transaction, SagaError> {
    let transaction_id = coordinator.begin(name)?;
    let ctx = StepContext {
        coordinator,
        transaction_id,
    };

    for step in steps.iter_mut() {
        let step_name = step.name().to_owned();
        match step.execute(&ctx) {
            Ok(compensation) => {
                if let Err((source, unlogged)) =
                    coordinator.push_operation(transaction_id, &step_name, compensation)
                {
                    abandon_step(coordinator, transaction_id, &step_name, unlogged);
                    return Err(SagaError::Ledger(source));
                }
            }
            Err(source) => {
                error!(
                    transaction_id = %transaction_id,
                    step = %step_name,
                    error = %source,
                    "Saga step failed, rolling back"
                );
                coordinator.rollback(transaction_id)?;
                return Err(SagaError::ExecutionFailure {
                    transaction_id,
                    step: step_name,
                    source,
                });
            }
        }
    }

    match coordinator.commit(transaction_id) {
        Ok(record) => Ok(record),
        Err(source) => {
            if coordinator.compensation_depth(transaction_id).is_some() {
                roll_back_or_log(coordinator, transaction_id);
            }
            Err(SagaError::Ledger(source))
        }
    }
}

/// Undo a step whose completion the ledger refused to log, then roll back
/// everything logged before it.
fn abandon_step(
    coordinator: &SagaCoordinator,
    transaction_id: TransactionId,
    step: &str,
    unlogged: Option<CompensatingAction>,
) {
    if let Some(compensation) = unlogged {
        let description = compensation.description.clone();
        if let Err(cause) = compensation.run() {
            error!(
                transaction_id = %transaction_id,
                step,
                compensation = %description,
                error = %cause,
                "Compensation of unlogged step failed"
            );
        }
    }
    roll_back_or_log(coordinator, transaction_id);
}

fn roll_back_or_log(coordinator: &SagaCoordinator, transaction_id: TransactionId) {
    if let Err(e) = coordinator.rollback(transaction_id) {
        error!(transaction_id = %transaction_id, error = %e, "Saga rollback failed");
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;
    use std::sync::atomic::{AtomicU64, Ordering};

    use parking_lot::Mutex;

    use evoguard_events::{MemorySink, TOPIC_TRANSACTIONS};
    use evoguard_types::TransactionStatus;

    use super::*;
    use crate::store::{InMemoryTransactionStore, TransactionStore};

    fn recorder(log: &Arc<Mutex<Vec<String>>>, label: &str) -> CompensatingAction {
        let log = Arc::clone(log);
        let label = label.to_owned();
        CompensatingAction::infallible(format!("undo {label}"), move || log.lock().push(label))
    }

    /// Fails the `fail_on`-th save (counting from 1) and no other.
    struct FailingStore {
        inner: InMemoryTransactionStore,
        saves: AtomicU64,
        fail_on: u64,
    }

    impl TransactionStore for FailingStore {
        fn save(&self, record: &Transaction) -> Result<(), LedgerError> {
            let n = self.saves.fetch_add(1, Ordering::SeqCst).saturating_add(1);
            if n == self.fail_on {
                return Err(LedgerError::Store {
                    reason: "disk unavailable".to_owned(),
                });
            }
            self.inner.save(record)
        }

        fn find_by_id(&self, id: TransactionId) -> Result<Option<Transaction>, LedgerError> {
            self.inner.find_by_id(id)
        }
    }

    fn failing_on(fail_on: u64) -> SagaCoordinator {
        let store = FailingStore {
            inner: InMemoryTransactionStore::new(),
            saves: AtomicU64::new(0),
            fail_on,
        };
        SagaCoordinator::new(
            TransactionLedger::new(Arc::new(store)),
            Arc::new(MemorySink::new()),
        )
    }

    #[test]
    fn rollback_runs_newest_first() {
        let coordinator = SagaCoordinator::default();
        let log = Arc::new(Mutex::new(Vec::new()));
        let Ok(id) = coordinator.begin("transfer") else { return };

        assert!(coordinator.log_operation(id, "debit", Some(recorder(&log, "A"))).is_ok());
        assert!(coordinator.log_operation(id, "credit", Some(recorder(&log, "B"))).is_ok());
        assert_eq!(coordinator.compensation_depth(id), Some(2));

        let report = coordinator.rollback(id);
        assert!(report.is_ok());
        assert_eq!(log.lock().as_slice(), &["B", "A"]);

        let record = coordinator.find(id).ok().flatten();
        assert!(matches!(
            record,
            Some(ref t) if t.status == TransactionStatus::RolledBack && t.completed_at.is_some()
        ));
        assert_eq!(
            record.map(|t| t.operations),
            Some(vec!["debit".to_owned(), "credit".to_owned()])
        );
    }

    #[test]
    fn operation_without_compensation_is_logged_but_not_undone() {
        let coordinator = SagaCoordinator::default();
        let log = Arc::new(Mutex::new(Vec::new()));
        let Ok(id) = coordinator.begin("audited") else { return };

        assert!(coordinator.log_operation(id, "reserve", Some(recorder(&log, "R"))).is_ok());
        assert!(coordinator.log_operation(id, "notify", None).is_ok());
        assert_eq!(coordinator.compensation_depth(id), Some(1));

        let report = coordinator.rollback(id);
        assert!(matches!(report, Ok(ref r) if r.attempted == vec!["undo R"]));
        assert_eq!(log.lock().as_slice(), &["R"]);

        let record = coordinator.find(id).ok().flatten();
        assert_eq!(
            record.as_ref().map(|t| t.operations.clone()),
            Some(vec!["reserve".to_owned(), "notify".to_owned()])
        );
        assert_eq!(
            record.map(|t| t.compensations),
            Some(vec!["undo R".to_owned()])
        );
    }

    #[test]
    fn rollback_survives_failing_and_panicking_compensations() {
        let coordinator = SagaCoordinator::default();
        let log = Arc::new(Mutex::new(Vec::new()));
        let Ok(id) = coordinator.begin("fragile") else { return };

        assert!(coordinator.log_operation(id, "op1", Some(recorder(&log, "1"))).is_ok());
        let failing = CompensatingAction::new("undo 2", || Err("disk full".into()));
        assert!(coordinator.log_operation(id, "op2", Some(failing)).is_ok());
        assert!(coordinator.log_operation(id, "op3", Some(recorder(&log, "3"))).is_ok());
        let panicking =
            CompensatingAction::infallible("undo 4", || std::panic::panic_any("boom"));
        assert!(coordinator.log_operation(id, "op4", Some(panicking)).is_ok());

        let report = coordinator.rollback(id);
        assert!(report.is_ok());
        let Ok(report) = report else { return };
        assert_eq!(log.lock().as_slice(), &["3", "1"]);
        assert_eq!(report.attempted, vec!["undo 4", "undo 3", "undo 2", "undo 1"]);
        assert_eq!(report.failed, vec!["undo 4", "undo 2"]);
        assert_eq!(report.transaction.status, TransactionStatus::RolledBack);
    }

    #[test]
    fn commit_then_rollback_is_rejected() {
        let coordinator = SagaCoordinator::default();
        let log = Arc::new(Mutex::new(Vec::new()));
        let Ok(id) = coordinator.begin("t") else { return };
        assert!(coordinator.log_operation(id, "op", Some(recorder(&log, "x"))).is_ok());

        assert!(coordinator.commit(id).is_ok());
        assert!(matches!(
            coordinator.rollback(id),
            Err(LedgerError::UnknownTransaction { .. })
        ));
        assert!(log.lock().is_empty());
        assert!(matches!(
            coordinator.log_operation(id, "late", Some(recorder(&log, "y"))),
            Err(LedgerError::UnknownTransaction { .. })
        ));
    }

    #[test]
    fn rollback_then_commit_is_rejected() {
        let coordinator = SagaCoordinator::default();
        let Ok(id) = coordinator.begin("t") else { return };
        assert!(coordinator.rollback(id).is_ok());
        assert!(matches!(
            coordinator.commit(id),
            Err(LedgerError::UnknownTransaction { .. })
        ));
    }

    #[test]
    fn failed_commit_keeps_compensations_for_rollback() {
        // begin, log, then the commit write fails.
        let coordinator = failing_on(3);
        let log = Arc::new(Mutex::new(Vec::new()));
        let Ok(id) = coordinator.begin("t") else { return };
        assert!(coordinator.log_operation(id, "op", Some(recorder(&log, "x"))).is_ok());

        assert!(matches!(coordinator.commit(id), Err(LedgerError::Store { .. })));
        assert_eq!(coordinator.compensation_depth(id), Some(1));

        assert!(coordinator.rollback(id).is_ok());
        assert_eq!(log.lock().as_slice(), &["x"]);
        let status = coordinator.find(id).ok().flatten().map(|t| t.status);
        assert_eq!(status, Some(TransactionStatus::RolledBack));
    }

    #[test]
    fn rejected_operation_pushes_nothing() {
        // begin, then the first log write fails.
        let coordinator = failing_on(2);
        let log = Arc::new(Mutex::new(Vec::new()));
        let Ok(id) = coordinator.begin("t") else { return };
        assert!(matches!(
            coordinator.log_operation(id, "op", Some(recorder(&log, "x"))),
            Err(LedgerError::Store { .. })
        ));
        assert_eq!(coordinator.compensation_depth(id), Some(0));
    }

    #[test]
    fn outcomes_are_published() {
        let sink = Arc::new(MemorySink::new());
        let coordinator = SagaCoordinator::new(TransactionLedger::default(), sink.clone());
        let Ok(a) = coordinator.begin("a") else { return };
        let Ok(b) = coordinator.begin("b") else { return };
        assert!(coordinator.commit(a).is_ok());
        assert!(coordinator.rollback(b).is_ok());
        assert_eq!(sink.events_on(TOPIC_TRANSACTIONS).len(), 2);
    }

    #[test]
    fn successful_steps_are_logged_under_their_names() {
        let coordinator = SagaCoordinator::default();
        let mut reserve = FnStep::new("reserve stock", |_: &StepContext<'_>| Ok(None));
        let mut charge = FnStep::new("charge card", |_: &StepContext<'_>| {
            Ok(Some(CompensatingAction::infallible("refund card", || {})))
        });

        let mut steps: [&mut dyn SagaStep; 2] = [&mut reserve, &mut charge];
        let result = run_saga(&coordinator, "order", &mut steps);
        assert!(matches!(result, Ok(ref t) if t.status == TransactionStatus::Committed));
        let Ok(record) = result else { return };
        assert_eq!(record.operations, vec!["reserve stock", "charge card"]);
        assert_eq!(record.compensations, vec!["refund card"]);
    }

    #[test]
    fn saga_failure_rolls_back_before_returning() {
        let coordinator = SagaCoordinator::default();
        let log = Arc::new(Mutex::new(Vec::new()));

        let debit_log = Arc::clone(&log);
        let mut debit = FnStep::new("debit", move |_: &StepContext<'_>| {
            Ok(Some(recorder(&debit_log, "A")))
        });
        let hold_log = Arc::clone(&log);
        let mut credit = FnStep::new("credit", move |ctx: &StepContext<'_>| {
            ctx.register("hold B", recorder(&hold_log, "B"))?;
            Err("account frozen".into())
        });

        let mut steps: [&mut dyn SagaStep; 2] = [&mut debit, &mut credit];
        let result = run_saga(&coordinator, "transfer", &mut steps);
        assert_eq!(log.lock().as_slice(), &["B", "A"]);
        assert_eq!(coordinator.open_transactions(), 0);

        assert!(matches!(
            result,
            Err(SagaError::ExecutionFailure { ref step, .. }) if step == "credit"
        ));
        let Err(SagaError::ExecutionFailure { transaction_id, .. }) = &result else { return };
        let record = coordinator.find(*transaction_id).ok().flatten();
        assert!(matches!(
            record,
            Some(ref t) if t.status == TransactionStatus::RolledBack
                && t.operations == vec!["debit", "hold B"]
        ));
        let cause = result.as_ref().err().and_then(|e| e.source()).map(ToString::to_string);
        assert_eq!(cause.as_deref(), Some("account frozen"));
    }

    #[test]
    fn unlogged_step_is_undone_with_the_rest() {
        // begin, first step logged, second step's log write fails.
        let coordinator = failing_on(3);
        let log = Arc::new(Mutex::new(Vec::new()));

        let first_log = Arc::clone(&log);
        let mut first = FnStep::new("first", move |_: &StepContext<'_>| {
            Ok(Some(recorder(&first_log, "1")))
        });
        let second_log = Arc::clone(&log);
        let mut second = FnStep::new("second", move |_: &StepContext<'_>| {
            Ok(Some(recorder(&second_log, "2")))
        });

        let mut steps: [&mut dyn SagaStep; 2] = [&mut first, &mut second];
        let result = run_saga(&coordinator, "pair", &mut steps);
        assert!(matches!(result, Err(SagaError::Ledger(LedgerError::Store { .. }))));
        assert_eq!(log.lock().as_slice(), &["2", "1"]);
        assert_eq!(coordinator.open_transactions(), 0);
    }

    #[test]
    fn successful_saga_commits() {
        let coordinator = SagaCoordinator::default();
        let log = Arc::new(Mutex::new(Vec::new()));
        let step_log = Arc::clone(&log);
        let mut only = FnStep::new("only", move |ctx: &StepContext<'_>| {
            ctx.register("write", recorder(&step_log, "w"))?;
            Ok(None)
        });
        let mut steps: [&mut dyn SagaStep; 1] = [&mut only];
        let result = run_saga(&coordinator, "single", &mut steps);
        assert!(matches!(
            result,
            Ok(ref t) if t.status == TransactionStatus::Committed && t.operations == vec!["write", "only"]
        ));
        assert!(log.lock().is_empty());
    }

    #[test]
    fn independent_transactions_in_parallel() {
        let coordinator = SagaCoordinator::default();
        let log = Arc::new(Mutex::new(Vec::new()));
        std::thread::scope(|scope| {
            for worker in 0..8 {
                let coordinator = &coordinator;
                let log = &log;
                scope.spawn(move || {
                    let Ok(id) = coordinator.begin(&format!("w{worker}")) else { return };
                    for op in 0..10 {
                        let _ = coordinator.log_operation(
                            id,
                            &format!("op{op}"),
                            Some(recorder(log, &format!("{worker}-{op}"))),
                        );
                    }
                    if worker % 2 == 0 {
                        let _ = coordinator.rollback(id);
                    } else {
                        let _ = coordinator.commit(id);
                    }
                });
            }
        });
        assert_eq!(log.lock().len(), 40);
        assert_eq!(coordinator.open_transactions(), 0);
    }
}
