//! Text and JSON rendering of validation and replacement results.

use std::{borrow::Cow, fmt::Write as _};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::{
    orchestrator::OrchestrationResult,
    typing::TargetColumn,
    workflow::{Validation, ValidationResult},
};

/// Column-aligned plain text table with a dashed rule under the header.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(display_width(&flatten(cell)));
        }
    }
    let widths = widths.into_iter().map(|w| w.max(3)).collect::<Vec<_>>();

    let mut output = String::new();
    let rule = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    for line in std::iter::once(headers)
        .chain(std::iter::once(rule.as_slice()))
        .chain(rows.iter().map(Vec::as_slice))
    {
        let _ = writeln!(output, "{}", pad_row(line, &widths));
    }
    output
}

fn pad_row(cells: &[String], widths: &[usize]) -> String {
    let padded = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| {
            let cell = flatten(cell);
            let padding = width.saturating_sub(display_width(&cell));
            format!("{cell}{}", " ".repeat(padding))
        })
        .collect::<Vec<_>>()
        .join("  ");
    padded.trim_end().to_string()
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

fn flatten(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

#[derive(Debug, Serialize)]
pub struct ValidationReport<'a> {
    pub table: String,
    pub existing_rows: u64,
    pub columns: &'a [TargetColumn],
    pub result: ValidationResult,
    pub duplicate_rows: Vec<usize>,
    pub preview: &'a [Vec<String>],
}

impl<'a> ValidationReport<'a> {
    pub fn new(validation: &'a Validation, preview_rows: usize, duplicate_rows: Vec<usize>) -> Self {
        Self {
            table: validation.table.to_string(),
            existing_rows: validation.existing_rows,
            columns: &validation.target,
            result: validation.result,
            duplicate_rows,
            preview: validation.dataset.head(preview_rows),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Serializing validation report")
    }

    pub fn to_text(&self) -> String {
        let mut output = String::new();
        let headers = self.columns.iter().map(|c| c.name.clone()).collect::<Vec<_>>();
        if !self.preview.is_empty() {
            let _ = writeln!(output, "Preview ({} row(s))", self.preview.len());
            output.push_str(&render_table(&headers, self.preview));
            output.push('\n');
        }
        let _ = writeln!(
            output,
            "Target {} currently holds {} row(s)\n",
            self.table, self.existing_rows
        );
        let metrics = vec![
            vec!["Total rows".to_string(), self.result.total_rows.to_string()],
            vec!["Unique rows".to_string(), self.result.unique_rows.to_string()],
            vec!["Duplicate rows".to_string(), self.result.duplicate_rows.to_string()],
        ];
        output.push_str(&render_table(
            &["metric".to_string(), "value".to_string()],
            &metrics,
        ));
        if !self.duplicate_rows.is_empty() {
            let rows = self
                .duplicate_rows
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(output, "\nRepeated rows (header is row 1): {rows}");
        }
        output
    }
}

/// Single JSON document for the overwrite command: the validation report and,
/// when the replacement was attempted, its outcome.
pub fn overwrite_to_json(
    validation: &ValidationReport<'_>,
    outcome: Option<&OrchestrationResult>,
) -> Result<String> {
    let document = serde_json::json!({
        "validation": validation,
        "outcome": outcome,
    });
    serde_json::to_string_pretty(&document).context("Serializing overwrite report")
}

pub fn outcome_to_text(result: &OrchestrationResult) -> String {
    let mut rows = vec![
        vec!["table".to_string(), result.table.clone()],
        vec!["backup table".to_string(), result.backup_table.clone()],
        vec![
            "status".to_string(),
            (if result.success { "success" } else { "failed" }).to_string(),
        ],
        vec![
            "last completed step".to_string(),
            result
                .last_completed_step
                .map(|step| step.to_string())
                .unwrap_or_else(|| "none".to_string()),
        ],
        vec!["rows written".to_string(), result.rows_written.to_string()],
    ];
    if let Some(step) = result.failed_step {
        rows.push(vec!["failed step".to_string(), step.to_string()]);
        rows.push(vec![
            "original intact".to_string(),
            (if result.original_intact { "yes" } else { "no" }).to_string(),
        ]);
    }
    if let Some(present) = result.backup_present {
        rows.push(vec![
            "backup present".to_string(),
            (if present { "yes" } else { "no" }).to_string(),
        ]);
    }
    let mut output = render_table(&["field".to_string(), "value".to_string()], &rows);
    if let Some(recovery) = &result.recovery {
        let _ = writeln!(output, "\nRecovery: {recovery}");
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_table_aligns_columns() {
        let headers = vec!["id".to_string(), "name".to_string()];
        let rows = vec![
            vec!["1".to_string(), "Alice".to_string()],
            vec!["22".to_string(), "Bob".to_string()],
        ];
        let rendered = render_table(&headers, &rows);
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines, ["id   name", "---  -----", "1    Alice", "22   Bob"]);
    }

    #[test]
    fn render_table_flattens_control_characters() {
        let rendered = render_table(&["note".to_string()], &[vec!["a\nb\tc".to_string()]]);
        assert_eq!(rendered.lines().nth(2), Some("a b c"));
    }
}
