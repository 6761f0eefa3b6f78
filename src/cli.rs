use std::{path::PathBuf, time::Duration};

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::store::{Attachment, StoreConfig};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Validate a CSV upload against a table, back the table up, and overwrite it",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check an upload against the target table without changing anything
    Validate(UploadArgs),
    /// Validate, back up the target table to <TABLE>_TEMP, then replace its rows
    Overwrite(OverwriteArgs),
}

#[derive(Debug, Args)]
pub struct UploadArgs {
    /// CSV file to upload ('-' reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// SQLite database file holding the target table
    #[arg(long = "db", env = "CSV_OVERWRITE_DB")]
    pub database: PathBuf,
    /// Schema (database name) owning the table
    #[arg(short = 's', long, default_value = "MAIN")]
    pub schema: String,
    /// Target table name
    #[arg(short = 't', long)]
    pub table: String,
    /// Extra database files exposed as schemas, given as NAME=PATH
    #[arg(long = "attach", value_parser = Attachment::parse, action = clap::ArgAction::Append)]
    pub attachments: Vec<Attachment>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the upload (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Number of uploaded rows to preview
    #[arg(long = "preview-rows", default_value_t = 5)]
    pub preview_rows: usize,
    /// Milliseconds to wait on a locked database before failing
    #[arg(
        long = "busy-timeout-ms",
        env = "CSV_OVERWRITE_BUSY_TIMEOUT_MS",
        default_value_t = 5000
    )]
    pub busy_timeout_ms: u64,
    /// How results are printed
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

impl UploadArgs {
    pub fn store_config(&self) -> StoreConfig {
        let mut config = StoreConfig::new(&self.database);
        config.attachments = self.attachments.clone();
        config.busy_timeout = Duration::from_millis(self.busy_timeout_ms);
        config
    }
}

#[derive(Debug, Args)]
pub struct OverwriteArgs {
    #[command(flatten)]
    pub upload: UploadArgs,
    /// Rows inserted per transaction when writing the new table
    #[arg(long = "batch-size", default_value_t = 500)]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
#[value(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
