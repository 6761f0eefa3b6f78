use std::{collections::HashSet, fmt};

use itertools::Itertools;
use serde::Serialize;

use crate::{
    dataset::Dataset,
    error::{WorkflowError, WorkflowResult},
};

/// Symmetric difference between upload columns and table columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnDiff {
    /// Present in the table but absent from the upload.
    pub missing: Vec<String>,
    /// Present in the upload but unknown to the table.
    pub unexpected: Vec<String>,
}

impl ColumnDiff {
    pub fn between(dataset_columns: &[String], target_columns: &[String]) -> Self {
        let uploaded: HashSet<&str> = dataset_columns.iter().map(String::as_str).collect();
        let expected: HashSet<&str> = target_columns.iter().map(String::as_str).collect();
        Self {
            missing: expected
                .difference(&uploaded)
                .map(|name| name.to_string())
                .sorted()
                .collect(),
            unexpected: uploaded
                .difference(&expected)
                .map(|name| name.to_string())
                .sorted()
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty()
    }
}

impl fmt::Display for ColumnDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing from upload [{}]", self.missing.join(", ")));
        }
        if !self.unexpected.is_empty() {
            parts.push(format!("not in table [{}]", self.unexpected.join(", ")));
        }
        if parts.is_empty() {
            f.write_str("no differences")
        } else {
            f.write_str(&parts.join("; "))
        }
    }
}

/// Aligns `dataset` to `target_columns`. Succeeds only when both sides hold
/// the same set of names; the result lists columns in target order.
pub fn reconcile(dataset: &Dataset, target_columns: &[String]) -> WorkflowResult<Dataset> {
    let diff = ColumnDiff::between(dataset.columns(), target_columns);
    if !diff.is_empty() {
        return Err(WorkflowError::ColumnMismatch(diff));
    }
    let order = target_columns
        .iter()
        .map(|name| {
            dataset
                .column_index(name)
                .ok_or_else(|| WorkflowError::ColumnMismatch(ColumnDiff {
                    missing: vec![name.clone()],
                    unexpected: Vec::new(),
                }))
        })
        .collect::<WorkflowResult<Vec<_>>>()?;
    Ok(dataset.project(&order))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn reconcile_reorders_to_target() {
        let dataset = Dataset::new(
            names(&["NAME", "AMT", "ID"]),
            vec![names(&["Alice", "10", "1"])],
        )
        .unwrap();
        let aligned = reconcile(&dataset, &names(&["ID", "NAME", "AMT"])).unwrap();
        assert_eq!(aligned.columns(), ["ID", "NAME", "AMT"]);
        assert_eq!(aligned.rows()[0], vec!["1", "Alice", "10"]);
    }

    #[test]
    fn mismatch_reports_both_sides_sorted() {
        let dataset = Dataset::new(names(&["ID", "ZIP", "CITY"]), Vec::new()).unwrap();
        let err = reconcile(&dataset, &names(&["ID", "NAME", "AMT"])).unwrap_err();
        match err {
            WorkflowError::ColumnMismatch(diff) => {
                assert_eq!(diff.missing, ["AMT", "NAME"]);
                assert_eq!(diff.unexpected, ["CITY", "ZIP"]);
            }
            other => panic!("expected column mismatch, got {other:?}"),
        }
    }

    #[test]
    fn diff_display_lists_each_side() {
        let diff = ColumnDiff {
            missing: names(&["AMT"]),
            unexpected: Vec::new(),
        };
        assert_eq!(diff.to_string(), "missing from upload [AMT]");
    }
}
