//! Error taxonomy for the validate-backup-overwrite workflow.
//!
//! Every stage returns a [`WorkflowError`] so the shell can tell a rejected
//! upload apart from a failed replacement. The three step variants carry a
//! [`StepFailure`] naming the step that failed and the last one that finished,
//! because recovery depends on whether the original table still exists.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::{identifier::TableRef, reconcile::ColumnDiff};

pub type WorkflowResult<T> = std::result::Result<T, WorkflowError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    DropStaleBackup,
    CreateBackup,
    VerifyBackup,
    DropOriginal,
    Materialize,
}

impl Step {
    pub fn describe(&self) -> &'static str {
        match self {
            Step::DropStaleBackup => "drop stale backup",
            Step::CreateBackup => "create backup",
            Step::VerifyBackup => "verify backup",
            Step::DropOriginal => "drop original",
            Step::Materialize => "materialize new table",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepFailure {
    pub step: Step,
    pub last_completed: Option<Step>,
    pub table: TableRef,
    pub backup: TableRef,
    /// True when the DDL transaction was rolled back.
    pub rolled_back: bool,
    /// Whether a backup table was present once the failure settled, if known.
    pub backup_present: Option<bool>,
    pub rows_written: usize,
    pub message: String,
}

impl StepFailure {
    pub fn last_completed_label(&self) -> &'static str {
        self.last_completed.map(|step| step.describe()).unwrap_or("none")
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Failed to parse upload: {0}")]
    Parse(String),
    #[error("Invalid identifier '{0}': only letters, digits and underscore are allowed")]
    InvalidIdentifier(String),
    #[error("Table {0} does not exist")]
    TableNotFound(TableRef),
    #[error("Column mismatch between upload and table: {0}")]
    ColumnMismatch(ColumnDiff),
    #[error("Column '{column}' row {row}: value '{value}' is not a valid {expected}")]
    ColumnType {
        column: String,
        row: usize,
        value: String,
        expected: String,
    },
    #[error("{duplicates} duplicate row(s) found; remove them and upload again")]
    DuplicateRows { duplicates: usize },
    #[error(
        "Backup failed at step '{}' (last completed: {}): {}. Original table {} is intact and no data was lost",
        .0.step, .0.last_completed_label(), .0.message, .0.table
    )]
    BackupStep(StepFailure),
    #[error(
        "Dropping original table {} failed (last completed: {}): {}. The transaction was rolled back, the original table is intact and no data was lost",
        .0.table, .0.last_completed_label(), .0.message
    )]
    DropStep(StepFailure),
    #[error(
        "Writing new table {} failed after {} row(s) (last completed: {}): {}. The original table is gone; restore it from backup table {}",
        .0.table, .0.rows_written, .0.last_completed_label(), .0.message, .0.backup
    )]
    MaterializeStep(StepFailure),
}

impl WorkflowError {
    pub fn step_failure(&self) -> Option<&StepFailure> {
        match self {
            WorkflowError::BackupStep(failure)
            | WorkflowError::DropStep(failure)
            | WorkflowError::MaterializeStep(failure) => Some(failure),
            _ => None,
        }
    }

    /// Whether the original table is known to still hold its previous rows.
    pub fn original_intact(&self) -> bool {
        !matches!(self, WorkflowError::MaterializeStep(_))
    }

    pub fn recovery_hint(&self) -> Option<String> {
        match self {
            WorkflowError::BackupStep(failure) | WorkflowError::DropStep(failure) => Some(format!(
                "No action needed: {} still holds its previous rows",
                failure.table
            )),
            WorkflowError::MaterializeStep(failure) => Some(format!(
                "Recreate {} from backup table {} (for example CREATE TABLE {} AS SELECT * FROM {})",
                failure.table,
                failure.backup,
                failure.table.qualified(),
                failure.backup.qualified()
            )),
            _ => None,
        }
    }
}
