#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tempfile::{TempDir, tempdir};

/// Orders table with three rows, used by most scenarios.
pub const ORDERS_SQL: &str = "
    CREATE TABLE ORDERS (ID INTEGER NOT NULL, NAME VARCHAR(40), AMT REAL);
    INSERT INTO ORDERS VALUES (1, 'old-a', 1.0), (2, 'old-b', 2.0), (3, 'old-c', 3.0);
";

/// Scratch directory that cleans up its files and databases on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Creates a SQLite database file and runs `sql` against it.
    pub fn database(&self, name: &str, sql: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let conn = Connection::open(&path).expect("create database");
        conn.execute_batch(sql).expect("seed database");
        path
    }
}

pub fn open(path: &Path) -> Connection {
    Connection::open(path).expect("open database")
}

pub fn count(path: &Path, table: &str) -> i64 {
    open(path)
        .query_row(&format!("SELECT count(*) FROM {table}"), [], |row| row.get(0))
        .expect("count rows")
}

pub fn table_exists(path: &Path, table: &str) -> bool {
    open(path)
        .query_row(
            "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get::<_, i64>(0),
        )
        .expect("catalog lookup")
        > 0
}

pub fn names(path: &Path, table: &str) -> Vec<String> {
    let conn = open(path);
    let mut stmt = conn
        .prepare(&format!("SELECT NAME FROM {table} ORDER BY ID"))
        .expect("prepare");
    stmt.query_map([], |row| row.get::<_, Option<String>>(0))
        .expect("query")
        .map(|value| value.expect("row").unwrap_or_default())
        .collect()
}
