use std::collections::HashSet;

use serde::Serialize;

use crate::dataset::Dataset;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DuplicateStats {
    pub total: usize,
    pub unique: usize,
    pub duplicates: usize,
}

/// Counts distinct full-row tuples. Cells compare byte for byte; no trimming
/// or case folding.
pub fn analyze(dataset: &Dataset) -> DuplicateStats {
    let total = dataset.row_count();
    let unique = dataset
        .rows()
        .iter()
        .map(Vec::as_slice)
        .collect::<HashSet<&[String]>>()
        .len();
    DuplicateStats {
        total,
        unique,
        duplicates: total - unique,
    }
}

/// Row numbers (header counts as row 1) of rows repeating an earlier row,
/// capped at `limit`.
pub fn duplicate_row_numbers(dataset: &Dataset, limit: usize) -> Vec<usize> {
    let mut seen = HashSet::new();
    dataset
        .rows()
        .iter()
        .enumerate()
        .filter(|(_, row)| !seen.insert(row.as_slice()))
        .map(|(idx, _)| idx + 2)
        .take(limit)
        .collect()
}
