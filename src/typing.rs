//! Write-time typing of an upload.
//!
//! Each column keeps the type the target table already declares; values are
//! converted up front so a bad cell is reported before any DDL runs. Columns
//! without a declared type fall back to inference over the uploaded values.

use std::sync::OnceLock;

use log::debug;
use regex::Regex;
use serde::Serialize;

use crate::{
    data::{ColumnType, TypeCandidate, Value, parse_typed_value},
    dataset::Dataset,
    error::{WorkflowError, WorkflowResult},
    identifier::quote_identifier,
    reconcile::ColumnDiff,
};

static DECLARED_TYPE_PATTERN: OnceLock<Regex> = OnceLock::new();

fn declared_type_pattern() -> &'static Regex {
    DECLARED_TYPE_PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_ ]+(\(\s*\d+\s*(,\s*\d+\s*)?\))?$")
            .expect("declared type pattern is valid")
    })
}

/// A column of the existing table as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetColumn {
    pub name: String,
    pub declared_type: String,
    pub not_null: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnPlan {
    pub name: String,
    pub column_type: ColumnType,
    /// Type written into the new table's DDL.
    pub sql_type: String,
    pub not_null: bool,
}

impl ColumnPlan {
    pub fn definition(&self) -> String {
        let mut definition = format!("{} {}", quote_identifier(&self.name), self.sql_type);
        if self.not_null {
            definition.push_str(" NOT NULL");
        }
        definition
    }
}

#[derive(Debug, Clone)]
pub struct TypePlan {
    pub columns: Vec<ColumnPlan>,
    pub rows: Vec<Vec<Option<Value>>>,
}

impl TypePlan {
    /// Types every cell of `dataset` against `target`, column by column in
    /// target order.
    pub fn build(dataset: &Dataset, target: &[TargetColumn]) -> WorkflowResult<Self> {
        let mut sources = Vec::with_capacity(target.len());
        for column in target {
            let idx = dataset.column_index(&column.name).ok_or_else(|| {
                WorkflowError::ColumnMismatch(ColumnDiff {
                    missing: vec![column.name.clone()],
                    unexpected: Vec::new(),
                })
            })?;
            sources.push(idx);
        }
        if dataset.columns().len() != target.len() {
            let names = target.iter().map(|c| c.name.clone()).collect::<Vec<_>>();
            return Err(WorkflowError::ColumnMismatch(ColumnDiff::between(
                dataset.columns(),
                &names,
            )));
        }

        let columns = target
            .iter()
            .zip(&sources)
            .map(|(column, &idx)| plan_column(dataset, column, idx))
            .collect::<Vec<_>>();

        let mut rows = Vec::with_capacity(dataset.row_count());
        for (row_idx, raw) in dataset.rows().iter().enumerate() {
            let mut typed = Vec::with_capacity(columns.len());
            for (plan, &idx) in columns.iter().zip(&sources) {
                let cell = raw[idx].as_str();
                let value = parse_typed_value(cell, plan.column_type).map_err(|_| {
                    type_error(plan, row_idx, cell, plan.column_type.to_string())
                })?;
                if value.is_none() && plan.not_null {
                    return Err(type_error(plan, row_idx, cell, "non-empty value".to_string()));
                }
                typed.push(value);
            }
            rows.push(typed);
        }
        Ok(Self { columns, rows })
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

fn plan_column(dataset: &Dataset, column: &TargetColumn, idx: usize) -> ColumnPlan {
    let declared = column.declared_type.trim();
    let (column_type, sql_type) = match ColumnType::from_declared(declared) {
        Some(ty) if declared_type_pattern().is_match(declared) => (ty, declared.to_string()),
        Some(ty) => (ty, ty.sql_name().to_string()),
        None => {
            let mut candidate = TypeCandidate::default();
            for row in dataset.rows() {
                candidate.observe(&row[idx]);
            }
            let inferred = candidate.decide();
            debug!(
                "Column '{}' has no declared type; inferred {}",
                column.name, inferred
            );
            (inferred, inferred.sql_name().to_string())
        }
    };
    ColumnPlan {
        name: column.name.clone(),
        column_type,
        sql_type,
        not_null: column.not_null,
    }
}

fn type_error(plan: &ColumnPlan, row_idx: usize, cell: &str, expected: String) -> WorkflowError {
    WorkflowError::ColumnType {
        column: plan.name.clone(),
        row: row_idx + 2,
        value: cell.to_string(),
        expected,
    }
}
