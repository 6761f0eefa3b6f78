use std::fmt;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::{ToSql, ToSqlOutput};
use serde::Serialize;

/// Logical column type used when writing an upload into the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Integer,
    Float,
    /// Integer when the value is integral, float otherwise.
    Numeric,
    Boolean,
    Date,
    DateTime,
}

impl ColumnType {
    /// Maps a declared SQL column type onto the logical type its values must
    /// satisfy. Returns `None` for an empty declaration.
    ///
    /// Follows SQLite's affinity order, with date, time and boolean
    /// declarations (which SQLite files under NUMERIC) checked first.
    pub fn from_declared(declared: &str) -> Option<ColumnType> {
        let upper = declared.trim().to_ascii_uppercase();
        if upper.is_empty() {
            return None;
        }
        let ty = if upper.contains("DATETIME") || upper.contains("TIMESTAMP") {
            ColumnType::DateTime
        } else if upper.contains("DATE") {
            ColumnType::Date
        } else if upper.contains("BOOL") {
            ColumnType::Boolean
        } else if upper.contains("INT") {
            ColumnType::Integer
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            ColumnType::Text
        } else if upper.contains("BLOB") {
            ColumnType::Text
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            ColumnType::Float
        } else {
            ColumnType::Numeric
        };
        Some(ty)
    }

    pub fn sql_name(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Float => "REAL",
            ColumnType::Numeric => "NUMERIC",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Date => "DATE",
            ColumnType::DateTime => "DATETIME",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ColumnType::Text => "text",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Numeric => "number",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
            ColumnType::DateTime => "datetime",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Text(s) => ToSqlOutput::from(s.as_str()),
            Value::Integer(i) => ToSqlOutput::from(*i),
            Value::Float(f) => ToSqlOutput::from(*f),
            Value::Boolean(b) => ToSqlOutput::from(i64::from(*b)),
            Value::Date(_) | Value::DateTime(_) => ToSqlOutput::from(self.as_display()),
        })
    }
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

pub fn parse_naive_datetime(value: &str) -> Result<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as datetime"))
}

fn parse_boolean(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Ok(true),
        "false" | "f" | "no" | "n" | "0" => Ok(false),
        _ => bail!("Failed to parse '{value}' as boolean"),
    }
}

/// NaN is rejected: SQLite binds it as NULL.
fn parse_float(value: &str) -> Result<f64> {
    let parsed: f64 = value
        .parse()
        .with_context(|| format!("Failed to parse '{value}' as float"))?;
    if parsed.is_nan() {
        bail!("'{value}' is not a number");
    }
    Ok(parsed)
}

/// Converts a raw cell into a typed value. Empty cells become `None` (NULL).
pub fn parse_typed_value(value: &str, ty: ColumnType) -> Result<Option<Value>> {
    if value.is_empty() {
        return Ok(None);
    }
    let parsed = match ty {
        ColumnType::Text => Value::Text(value.to_string()),
        ColumnType::Integer => Value::Integer(
            value
                .trim()
                .parse()
                .with_context(|| format!("Failed to parse '{value}' as integer"))?,
        ),
        ColumnType::Float => Value::Float(parse_float(value.trim())?),
        ColumnType::Numeric => {
            let trimmed = value.trim();
            match trimmed.parse::<i64>() {
                Ok(integer) => Value::Integer(integer),
                Err(_) => Value::Float(
                    parse_float(trimmed)
                        .with_context(|| format!("Failed to parse '{value}' as number"))?,
                ),
            }
        }
        ColumnType::Boolean => Value::Boolean(parse_boolean(value.trim())?),
        ColumnType::Date => Value::Date(parse_naive_date(value.trim())?),
        ColumnType::DateTime => Value::DateTime(parse_naive_datetime(value.trim())?),
    };
    Ok(Some(parsed))
}

/// Tracks which logical types every non-empty sample of a column satisfies.
#[derive(Debug, Clone)]
pub struct TypeCandidate {
    possible_integer: bool,
    possible_float: bool,
    possible_boolean: bool,
    possible_date: bool,
    possible_datetime: bool,
    observed: bool,
}

impl Default for TypeCandidate {
    fn default() -> Self {
        Self {
            possible_integer: true,
            possible_float: true,
            possible_boolean: true,
            possible_date: true,
            possible_datetime: true,
            observed: false,
        }
    }
}

impl TypeCandidate {
    pub fn observe(&mut self, value: &str) {
        if value.is_empty() {
            return;
        }
        self.observed = true;
        let trimmed = value.trim();
        if self.possible_boolean
            && !matches!(
                trimmed.to_ascii_lowercase().as_str(),
                "true" | "false" | "t" | "f" | "yes" | "no" | "y" | "n"
            )
        {
            self.possible_boolean = false;
        }
        if self.possible_integer && trimmed.parse::<i64>().is_err() {
            self.possible_integer = false;
        }
        if self.possible_float && parse_float(trimmed).is_err() {
            self.possible_float = false;
        }
        if self.possible_date && parse_naive_date(trimmed).is_err() {
            self.possible_date = false;
        }
        if self.possible_datetime && parse_naive_datetime(trimmed).is_err() {
            self.possible_datetime = false;
        }
    }

    pub fn decide(&self) -> ColumnType {
        if !self.observed {
            ColumnType::Text
        } else if self.possible_boolean {
            ColumnType::Boolean
        } else if self.possible_integer {
            ColumnType::Integer
        } else if self.possible_float {
            ColumnType::Float
        } else if self.possible_date {
            ColumnType::Date
        } else if self.possible_datetime {
            ColumnType::DateTime
        } else {
            ColumnType::Text
        }
    }
}
