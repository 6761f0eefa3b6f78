use std::collections::HashSet;

use csv_overwrite::{
    dataset::Dataset,
    duplicates::analyze,
    error::WorkflowError,
    reconcile::reconcile,
};
use proptest::prelude::*;

const COLUMN_POOL: &[&str] = &["ID", "NAME", "AMT", "CITY", "ZIP", "QTY"];

fn column_set() -> impl Strategy<Value = Vec<String>> {
    proptest::sample::subsequence(COLUMN_POOL.to_vec(), 1..=COLUMN_POOL.len())
        .prop_shuffle()
        .prop_map(|columns| columns.into_iter().map(str::to_string).collect())
}

proptest! {
    #[test]
    fn reconcile_succeeds_exactly_for_equal_column_sets(
        uploaded in column_set(),
        target in column_set()
    ) {
        let row = uploaded.iter().map(|c| format!("{c}-cell")).collect::<Vec<_>>();
        let dataset = Dataset::new(uploaded.clone(), vec![row]).expect("dataset");
        let same_set = uploaded.iter().collect::<HashSet<_>>() == target.iter().collect::<HashSet<_>>();

        match reconcile(&dataset, &target) {
            Ok(aligned) => {
                prop_assert!(same_set);
                prop_assert_eq!(aligned.columns(), target.as_slice());
                for (column, cell) in aligned.columns().iter().zip(&aligned.rows()[0]) {
                    prop_assert_eq!(cell, &format!("{column}-cell"));
                }
            }
            Err(WorkflowError::ColumnMismatch(diff)) => {
                prop_assert!(!same_set);
                prop_assert!(!diff.is_empty());
            }
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }

    #[test]
    fn analyze_is_consistent_and_idempotent(
        rows in proptest::collection::vec(proptest::collection::vec("[ab]?", 2), 0..40)
    ) {
        let dataset = Dataset::new(vec!["A".to_string(), "B".to_string()], rows.clone())
            .expect("dataset");
        let first = analyze(&dataset);
        let second = analyze(&dataset);
        prop_assert_eq!(first, second);
        prop_assert_eq!(first.total, rows.len());
        prop_assert_eq!(first.duplicates, first.total - first.unique);
        prop_assert_eq!(first.unique, rows.iter().collect::<HashSet<_>>().len());
    }
}
