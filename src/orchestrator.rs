//! Backup-and-replace of a target table.
//!
//! Steps one to three (drop stale backup, snapshot, drop original) run inside
//! one immediate transaction; either all of them commit or none do. The new
//! table is written afterwards in its own batched transactions, so a failure
//! there leaves the original dropped and the `_TEMP` snapshot as the only copy
//! of the old rows.

use log::{info, warn};
use serde::Serialize;

use crate::{
    dataset::Dataset,
    error::{Step, StepFailure, WorkflowError, WorkflowResult},
    identifier::TableRef,
    store::{self, SqliteStore},
    typing::TypePlan,
};

/// What a successful replacement did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplaceSummary {
    pub table: TableRef,
    pub backup: TableRef,
    pub backup_rows: u64,
    pub rows_written: usize,
}

/// Flat outcome handed to the shell, success or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrchestrationResult {
    pub success: bool,
    pub table: String,
    pub backup_table: String,
    pub last_completed_step: Option<Step>,
    pub failed_step: Option<Step>,
    pub rows_written: usize,
    pub original_intact: bool,
    pub backup_present: Option<bool>,
    pub error: Option<String>,
    pub recovery: Option<String>,
}

impl OrchestrationResult {
    pub fn from_outcome(table: &TableRef, outcome: &WorkflowResult<ReplaceSummary>) -> Self {
        match outcome {
            Ok(summary) => Self {
                success: true,
                table: summary.table.to_string(),
                backup_table: summary.backup.to_string(),
                last_completed_step: Some(Step::Materialize),
                failed_step: None,
                rows_written: summary.rows_written,
                original_intact: false,
                backup_present: Some(true),
                error: None,
                recovery: None,
            },
            Err(err) => {
                let failure = err.step_failure();
                Self {
                    success: false,
                    table: table.to_string(),
                    backup_table: table.backup().to_string(),
                    last_completed_step: failure.and_then(|f| f.last_completed),
                    failed_step: failure.map(|f| f.step),
                    rows_written: failure.map(|f| f.rows_written).unwrap_or(0),
                    original_intact: err.original_intact(),
                    backup_present: failure.and_then(|f| f.backup_present),
                    error: Some(err.to_string()),
                    recovery: err.recovery_hint(),
                }
            }
        }
    }
}

/// Backs up `table` into `{table}_TEMP` and replaces it with `dataset`.
///
/// The caller has already reconciled columns and checked for duplicates.
/// Table existence is checked again here since time may have passed since
/// validation.
pub fn execute(
    store: &mut SqliteStore,
    table: &TableRef,
    dataset: &Dataset,
) -> WorkflowResult<ReplaceSummary> {
    if !store.table_exists(table)? {
        return Err(WorkflowError::TableNotFound(table.clone()));
    }
    let target = store.describe_table(table)?;
    let plan = TypePlan::build(dataset, &target)?;
    let backup = table.backup();
    info!(
        "Replacing {} with {} row(s); backup goes to {}",
        table,
        plan.rows.len(),
        backup
    );

    let backup_rows = match run_backup_and_drop(store, table, &backup) {
        Ok(rows) => rows,
        Err(mut failure) => {
            failure.backup_present = store.table_exists(&backup).ok();
            warn!(
                "Replacement of {} stopped at '{}'; transaction rolled back",
                table, failure.step
            );
            return Err(match failure.step {
                Step::DropOriginal => WorkflowError::DropStep(failure),
                _ => WorkflowError::BackupStep(failure),
            });
        }
    };
    info!("Backup {} holds {} row(s); original dropped", backup, backup_rows);

    let mut written = 0usize;
    if let Err(err) = store.materialize(table, &plan, &mut written) {
        warn!(
            "Writing {} failed after {} row(s); restore from {}",
            table, written, backup
        );
        return Err(WorkflowError::MaterializeStep(StepFailure {
            step: Step::Materialize,
            last_completed: Some(Step::DropOriginal),
            table: table.clone(),
            backup: backup.clone(),
            rolled_back: false,
            backup_present: store.table_exists(&backup).ok(),
            rows_written: written,
            message: err.to_string(),
        }));
    }
    info!("Wrote {} row(s) into {}", written, table);

    Ok(ReplaceSummary {
        table: table.clone(),
        backup,
        backup_rows,
        rows_written: written,
    })
}

fn run_backup_and_drop(
    store: &mut SqliteStore,
    table: &TableRef,
    backup: &TableRef,
) -> Result<u64, StepFailure> {
    let mut completed: Option<Step> = None;
    let fail = |step: Step, completed: Option<Step>, message: String| StepFailure {
        step,
        last_completed: completed,
        table: table.clone(),
        backup: backup.clone(),
        rolled_back: true,
        backup_present: None,
        rows_written: 0,
        message,
    };

    let tx = store
        .begin_replace()
        .map_err(|err| fail(Step::DropStaleBackup, completed, err.to_string()))?;

    store::drop_table_if_exists(&tx, backup)
        .map_err(|err| fail(Step::DropStaleBackup, completed, err.to_string()))?;
    completed = Some(Step::DropStaleBackup);

    store::copy_table(&tx, table, backup)
        .map_err(|err| fail(Step::CreateBackup, completed, err.to_string()))?;
    completed = Some(Step::CreateBackup);

    let original_rows = store::count_rows(&tx, table)
        .map_err(|err| fail(Step::VerifyBackup, completed, err.to_string()))?;
    let backup_rows = store::count_rows(&tx, backup)
        .map_err(|err| fail(Step::VerifyBackup, completed, err.to_string()))?;
    if original_rows != backup_rows {
        return Err(fail(
            Step::VerifyBackup,
            completed,
            format!("backup holds {backup_rows} row(s) but the original holds {original_rows}"),
        ));
    }
    completed = Some(Step::VerifyBackup);

    store::drop_table(&tx, table)
        .map_err(|err| fail(Step::DropOriginal, completed, err.to_string()))?;
    tx.commit()
        .map_err(|err| fail(Step::DropOriginal, completed, err.to_string()))?;
    Ok(backup_rows)
}
