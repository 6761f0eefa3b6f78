//! Schema and table identifiers.
//!
//! Operator-supplied names end up interpolated into DDL, so they are
//! uppercased and checked against a strict allow-list (`[A-Za-z0-9_]+`)
//! before a [`TableRef`] can be built. Column names come from the upload or
//! the catalog and are escaped with [`quote_identifier`] instead.

use std::{fmt, sync::OnceLock};

use regex::Regex;
use serde::Serialize;

use crate::error::{WorkflowError, WorkflowResult};

pub const BACKUP_SUFFIX: &str = "_TEMP";

static IDENTIFIER_PATTERN: OnceLock<Regex> = OnceLock::new();

fn identifier_pattern() -> &'static Regex {
    IDENTIFIER_PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("identifier pattern is valid"))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    pub fn parse(raw: &str) -> WorkflowResult<Self> {
        let trimmed = raw.trim();
        if !identifier_pattern().is_match(trimmed) {
            return Err(WorkflowError::InvalidIdentifier(raw.to_string()));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn quoted(&self) -> String {
        quote_identifier(&self.0)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Target table descriptor: `(schema, table)`, both normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TableRef {
    pub schema: Identifier,
    pub table: Identifier,
}

impl TableRef {
    pub fn new(schema: &str, table: &str) -> WorkflowResult<Self> {
        Ok(Self {
            schema: Identifier::parse(schema)?,
            table: Identifier::parse(table)?,
        })
    }

    /// The `{table}_TEMP` snapshot living next to this table.
    pub fn backup(&self) -> TableRef {
        TableRef {
            schema: self.schema.clone(),
            table: Identifier(format!("{}{BACKUP_SUFFIX}", self.table.0)),
        }
    }

    pub fn qualified(&self) -> String {
        format!("{}.{}", self.schema.quoted(), self.table.quoted())
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_uppercased_and_trimmed() {
        let table = TableRef::new(" misretail ", "t_user_input").unwrap();
        assert_eq!(table.schema.as_str(), "MISRETAIL");
        assert_eq!(table.table.as_str(), "T_USER_INPUT");
        assert_eq!(table.to_string(), "MISRETAIL.T_USER_INPUT");
        assert_eq!(table.qualified(), "\"MISRETAIL\".\"T_USER_INPUT\"");
    }

    #[test]
    fn identifiers_outside_allow_list_are_rejected() {
        for raw in ["", "orders;drop", "a b", "name\"", "sales.orders", "tëst", "straße", "ﬁle"] {
            assert!(
                matches!(Identifier::parse(raw), Err(WorkflowError::InvalidIdentifier(_))),
                "expected '{raw}' to be rejected"
            );
        }
    }

    #[test]
    fn backup_table_appends_temp_suffix() {
        let table = TableRef::new("main", "orders").unwrap();
        let backup = table.backup();
        assert_eq!(backup.schema, table.schema);
        assert_eq!(backup.table.as_str(), "ORDERS_TEMP");
    }

    #[test]
    fn quote_identifier_escapes_embedded_quotes() {
        assert_eq!(quote_identifier("AMT"), "\"AMT\"");
        assert_eq!(quote_identifier("A\"B"), "\"A\"\"B\"");
    }
}
