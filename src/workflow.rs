//! Validation and confirmation stages that sit between the shell and the
//! orchestrator.

use log::info;
use serde::Serialize;

use crate::{
    dataset::Dataset,
    duplicates::{self, DuplicateStats},
    error::{WorkflowError, WorkflowResult},
    identifier::TableRef,
    orchestrator::{self, ReplaceSummary},
    reconcile::reconcile,
    store::SqliteStore,
    typing::TargetColumn,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub total_rows: usize,
    pub unique_rows: usize,
    pub duplicate_rows: usize,
    /// Always true on a returned validation; a mismatch surfaces as
    /// `WorkflowError::ColumnMismatch` instead.
    pub column_match: bool,
}

impl ValidationResult {
    fn from_stats(stats: DuplicateStats, column_match: bool) -> Self {
        Self {
            total_rows: stats.total,
            unique_rows: stats.unique,
            duplicate_rows: stats.duplicates,
            column_match,
        }
    }
}

/// An upload that passed the column check, aligned to the target table.
#[derive(Debug, Clone)]
pub struct Validation {
    pub table: TableRef,
    pub target: Vec<TargetColumn>,
    pub dataset: Dataset,
    pub existing_rows: u64,
    pub result: ValidationResult,
}

/// Checks that `table` exists, that `dataset` carries exactly its columns,
/// and counts duplicate rows. Nothing is written.
pub fn validate(store: &SqliteStore, table: &TableRef, dataset: &Dataset) -> WorkflowResult<Validation> {
    if !store.table_exists(table)? {
        return Err(WorkflowError::TableNotFound(table.clone()));
    }
    let target = store.describe_table(table)?;
    let target_names = target.iter().map(|c| c.name.clone()).collect::<Vec<_>>();
    let aligned = reconcile(dataset, &target_names)?;
    let stats = duplicates::analyze(&aligned);
    let existing_rows = store.row_count(table)?;
    info!(
        "Validated upload for {}: {} row(s), {} unique, {} duplicate",
        table, stats.total, stats.unique, stats.duplicates
    );
    Ok(Validation {
        table: table.clone(),
        target,
        dataset: aligned,
        existing_rows,
        result: ValidationResult::from_stats(stats, true),
    })
}

/// The confirm action: refuses while duplicates remain, otherwise backs up
/// and overwrites the table.
pub fn confirm(store: &mut SqliteStore, validation: &Validation) -> WorkflowResult<ReplaceSummary> {
    let stats = duplicates::analyze(&validation.dataset);
    if stats.duplicates > 0 {
        return Err(WorkflowError::DuplicateRows {
            duplicates: stats.duplicates,
        });
    }
    orchestrator::execute(store, &validation.table, &validation.dataset)
}
