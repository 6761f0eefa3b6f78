//! SQLite-backed table store.
//!
//! A schema here is any database name the connection knows about: `main`,
//! `temp`, or a file attached at open time. Schema names resolve
//! case-insensitively; table names must match the catalog exactly.
//!
//! The store owns its [`Connection`] and is passed explicitly to every stage
//! of the workflow. Every statement is bounded by the configured busy timeout.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use log::{debug, info};
use rusqlite::{
    Connection, OpenFlags, OptionalExtension, Transaction, TransactionBehavior, params,
    params_from_iter,
};

use crate::{
    error::{WorkflowError, WorkflowResult},
    identifier::{Identifier, TableRef, quote_identifier},
    typing::{TargetColumn, TypePlan},
};

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_BATCH_SIZE: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: Identifier,
    pub path: PathBuf,
}

impl Attachment {
    /// Parses `NAME=PATH`.
    pub fn parse(value: &str) -> Result<Self, String> {
        let (name, path) = value
            .split_once('=')
            .ok_or_else(|| format!("Attachment '{value}' must look like NAME=PATH"))?;
        let name = Identifier::parse(name).map_err(|err| err.to_string())?;
        let path = path.trim();
        if path.is_empty() {
            return Err(format!("Attachment '{value}' is missing a path"));
        }
        Ok(Self {
            name,
            path: PathBuf::from(path),
        })
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub attachments: Vec<Attachment>,
    pub busy_timeout: Duration,
    /// Rows inserted per transaction while materializing.
    pub batch_size: usize,
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            attachments: Vec::new(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

pub struct SqliteStore {
    conn: Connection,
    batch_size: usize,
}

impl SqliteStore {
    /// Opens an existing database file. A missing or unreadable file is a
    /// connection error; nothing is created.
    pub fn open(config: &StoreConfig) -> WorkflowResult<Self> {
        let conn = open_existing(&config.path)?;
        conn.busy_timeout(config.busy_timeout)
            .map_err(|err| connection_error(&config.path, err))?;
        for attachment in &config.attachments {
            if !attachment.path.is_file() {
                return Err(WorkflowError::Connection(format!(
                    "Attached database {:?} does not exist",
                    attachment.path
                )));
            }
            let sql = format!("ATTACH DATABASE ?1 AS {}", attachment.name.quoted());
            conn.execute(&sql, params![attachment.path.to_string_lossy().into_owned()])
                .map_err(|err| connection_error(&attachment.path, err))?;
            debug!("Attached {:?} as {}", attachment.path, attachment.name);
        }
        conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
            row.get::<_, i64>(0)
        })
        .map_err(|err| connection_error(&config.path, err))?;
        info!("Connected to {:?}", config.path);
        Ok(Self {
            conn,
            batch_size: config.batch_size.max(1),
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Catalog lookup for `table`. An unknown schema reports `false`.
    pub fn table_exists(&self, table: &TableRef) -> WorkflowResult<bool> {
        let schema = self
            .conn
            .query_row(
                "SELECT name FROM pragma_database_list WHERE upper(name) = ?1",
                params![table.schema.as_str()],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(catalog_error)?;
        let Some(schema) = schema else {
            debug!("Schema {} is not known to the connection", table.schema);
            return Ok(false);
        };
        let sql = format!(
            "SELECT count(*) FROM {}.sqlite_master WHERE type = 'table' AND name = ?1",
            quote_identifier(&schema)
        );
        let count: i64 = self
            .conn
            .query_row(&sql, params![table.table.as_str()], |row| row.get(0))
            .map_err(catalog_error)?;
        Ok(count > 0)
    }

    /// Columns of `table` in declaration order, names uppercased.
    pub fn describe_table(&self, table: &TableRef) -> WorkflowResult<Vec<TargetColumn>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT name, type, \"notnull\" FROM pragma_table_info(?1, ?2) ORDER BY cid",
            )
            .map_err(catalog_error)?;
        let columns = stmt
            .query_map(params![table.table.as_str(), table.schema.as_str()], |row| {
                Ok(TargetColumn {
                    name: row.get::<_, String>(0)?.to_uppercase(),
                    declared_type: row.get(1)?,
                    not_null: row.get::<_, i64>(2)? != 0,
                })
            })
            .map_err(catalog_error)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(catalog_error)?;
        if columns.is_empty() {
            return Err(WorkflowError::TableNotFound(table.clone()));
        }
        Ok(columns)
    }

    pub fn row_count(&self, table: &TableRef) -> WorkflowResult<u64> {
        count_rows(&self.conn, table).map_err(catalog_error)
    }

    /// Starts the transaction wrapping the backup and drop steps. Immediate
    /// mode takes the write lock up front.
    pub(crate) fn begin_replace(&mut self) -> rusqlite::Result<Transaction<'_>> {
        self.conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
    }

    /// Recreates `table` from `plan` and bulk inserts its rows in batches,
    /// each batch committed on its own. `written` tracks committed rows so a
    /// failure can report how far the write got.
    pub(crate) fn materialize(
        &mut self,
        table: &TableRef,
        plan: &TypePlan,
        written: &mut usize,
    ) -> rusqlite::Result<()> {
        let definitions = plan
            .columns
            .iter()
            .map(|column| column.definition())
            .collect::<Vec<_>>()
            .join(", ");
        let create = format!("CREATE TABLE {} ({definitions})", table.qualified());
        let tx = self.conn.transaction()?;
        drop_table_if_exists(&tx, table)?;
        debug!("Executing: {create}");
        tx.execute(&create, [])?;
        tx.commit()?;

        let placeholders = (1..=plan.columns.len())
            .map(|idx| format!("?{idx}"))
            .collect::<Vec<_>>()
            .join(", ");
        let columns = plan
            .column_names()
            .iter()
            .map(|name| quote_identifier(name))
            .collect::<Vec<_>>()
            .join(", ");
        let insert = format!(
            "INSERT INTO {} ({columns}) VALUES ({placeholders})",
            table.qualified()
        );
        debug!("Executing in batches of {}: {insert}", self.batch_size);
        for batch in plan.rows.chunks(self.batch_size) {
            let tx = self.conn.transaction()?;
            {
                let mut stmt = tx.prepare(&insert)?;
                for row in batch {
                    stmt.execute(params_from_iter(row.iter()))?;
                }
            }
            tx.commit()?;
            *written += batch.len();
        }
        Ok(())
    }
}

fn open_existing(path: &Path) -> WorkflowResult<Connection> {
    if !path.is_file() {
        return Err(WorkflowError::Connection(format!(
            "Database {path:?} does not exist"
        )));
    }
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    Connection::open_with_flags(path, flags).map_err(|err| connection_error(path, err))
}

fn connection_error(path: &Path, err: rusqlite::Error) -> WorkflowError {
    WorkflowError::Connection(format!("{path:?}: {err}"))
}

fn catalog_error(err: rusqlite::Error) -> WorkflowError {
    WorkflowError::Connection(err.to_string())
}

pub(crate) fn count_rows(conn: &Connection, table: &TableRef) -> rusqlite::Result<u64> {
    let sql = format!("SELECT count(*) FROM {}", table.qualified());
    conn.query_row(&sql, [], |row| row.get::<_, i64>(0))
        .map(|count| count.max(0) as u64)
}

pub(crate) fn drop_table_if_exists(conn: &Connection, table: &TableRef) -> rusqlite::Result<()> {
    let sql = format!("DROP TABLE IF EXISTS {}", table.qualified());
    debug!("Executing: {sql}");
    conn.execute(&sql, []).map(|_| ())
}

pub(crate) fn drop_table(conn: &Connection, table: &TableRef) -> rusqlite::Result<()> {
    let sql = format!("DROP TABLE {}", table.qualified());
    debug!("Executing: {sql}");
    conn.execute(&sql, []).map(|_| ())
}

pub(crate) fn copy_table(
    conn: &Connection,
    source: &TableRef,
    destination: &TableRef,
) -> rusqlite::Result<()> {
    let sql = format!(
        "CREATE TABLE {} AS SELECT * FROM {}",
        destination.qualified(),
        source.qualified()
    );
    debug!("Executing: {sql}");
    conn.execute(&sql, []).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seeded() -> (TempDir, StoreConfig) {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("store.db");
        let conn = Connection::open(&path).expect("create db");
        conn.execute_batch(
            "CREATE TABLE ORDERS (ID INTEGER NOT NULL, NAME TEXT, AMT REAL);
             INSERT INTO ORDERS VALUES (1, 'a', 1.5), (2, 'b', 2.5);
             CREATE TABLE lower_case (id INTEGER);",
        )
        .expect("seed");
        (dir, StoreConfig::new(path))
    }

    #[test]
    fn open_rejects_missing_database() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(dir.path().join("absent.db"));
        assert!(matches!(
            SqliteStore::open(&config),
            Err(WorkflowError::Connection(_))
        ));
    }

    #[test]
    fn open_rejects_files_that_are_not_databases() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.db");
        std::fs::write(&path, "this is not a database, just some text padding it out").unwrap();
        assert!(matches!(
            SqliteStore::open(&StoreConfig::new(path)),
            Err(WorkflowError::Connection(_))
        ));
    }

    #[test]
    fn table_exists_matches_exact_names_and_known_schemas() {
        let (_dir, config) = seeded();
        let store = SqliteStore::open(&config).unwrap();
        assert!(store.table_exists(&TableRef::new("main", "orders").unwrap()).unwrap());
        assert!(!store.table_exists(&TableRef::new("main", "lower_case").unwrap()).unwrap());
        assert!(!store.table_exists(&TableRef::new("main", "missing").unwrap()).unwrap());
        assert!(!store.table_exists(&TableRef::new("sales", "orders").unwrap()).unwrap());
    }

    #[test]
    fn describe_reports_columns_in_order() {
        let (_dir, config) = seeded();
        let store = SqliteStore::open(&config).unwrap();
        let table = TableRef::new("main", "orders").unwrap();
        let columns = store.describe_table(&table).unwrap();
        let names = columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["ID", "NAME", "AMT"]);
        assert!(columns[0].not_null);
        assert_eq!(columns[2].declared_type, "REAL");
        assert_eq!(store.row_count(&table).unwrap(), 2);
    }

    #[test]
    fn attachments_become_schemas() {
        let (dir, mut config) = seeded();
        let sales = dir.path().join("sales.db");
        Connection::open(&sales)
            .unwrap()
            .execute_batch("CREATE TABLE LEDGER (ID INTEGER);")
            .unwrap();
        config.attachments.push(Attachment::parse(&format!("sales={}", sales.display())).unwrap());
        let store = SqliteStore::open(&config).unwrap();
        assert!(store.table_exists(&TableRef::new("SALES", "LEDGER").unwrap()).unwrap());
        assert!(!store.table_exists(&TableRef::new("MAIN", "LEDGER").unwrap()).unwrap());
    }

    #[test]
    fn attachment_parse_requires_name_and_path() {
        assert!(Attachment::parse("sales").is_err());
        assert!(Attachment::parse("sales=").is_err());
        assert!(Attachment::parse("bad name=x.db").is_err());
        let parsed = Attachment::parse("sales=/tmp/sales.db").unwrap();
        assert_eq!(parsed.name.as_str(), "SALES");
    }
}
