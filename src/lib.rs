pub mod cli;
pub mod data;
pub mod dataset;
pub mod duplicates;
pub mod error;
pub mod identifier;
pub mod io_utils;
pub mod orchestrator;
pub mod reconcile;
pub mod report;
pub mod store;
pub mod typing;
pub mod workflow;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info};

use crate::{
    cli::{Cli, Commands, OutputFormat, OverwriteArgs, UploadArgs},
    dataset::{Dataset, LoadOptions},
    error::WorkflowError,
    identifier::TableRef,
    orchestrator::OrchestrationResult,
    report::ValidationReport,
    store::SqliteStore,
    workflow::Validation,
};

const DUPLICATE_ROW_LIMIT: usize = 20;

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_overwrite", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Validate(args) => handle_validate(&args),
        Commands::Overwrite(args) => handle_overwrite(&args),
    }
}

fn handle_validate(args: &UploadArgs) -> Result<()> {
    let table = TableRef::new(&args.schema, &args.table)?;
    let dataset = load_upload(args)?;
    let store = SqliteStore::open(&args.store_config())?;
    let validation = workflow::validate(&store, &table, &dataset)
        .with_context(|| format!("Validating upload against {table}"))?;
    print_validation(args, &validation)
}

fn handle_overwrite(args: &OverwriteArgs) -> Result<()> {
    let upload = &args.upload;
    let table = TableRef::new(&upload.schema, &upload.table)?;
    let dataset = load_upload(upload)?;
    let mut config = upload.store_config();
    config.batch_size = args.batch_size;
    let mut store = SqliteStore::open(&config)?;
    let validation = workflow::validate(&store, &table, &dataset)
        .with_context(|| format!("Validating upload against {table}"))?;
    let summary_view = validation_report(upload, &validation);
    if upload.format == OutputFormat::Table {
        print!("{}", summary_view.to_text());
    }

    let outcome = match workflow::confirm(&mut store, &validation) {
        Err(err @ WorkflowError::DuplicateRows { .. }) => {
            if upload.format == OutputFormat::Json {
                println!("{}", report::overwrite_to_json(&summary_view, None)?);
            }
            return Err(err.into());
        }
        other => other,
    };
    let result = OrchestrationResult::from_outcome(&table, &outcome);
    match upload.format {
        OutputFormat::Table => println!("\n{}", report::outcome_to_text(&result)),
        OutputFormat::Json => println!("{}", report::overwrite_to_json(&summary_view, Some(&result))?),
    }
    let summary = outcome.with_context(|| format!("Overwriting {table}"))?;
    info!(
        "Backed up {} row(s) into {} and wrote {} row(s) into {}",
        summary.backup_rows, summary.backup, summary.rows_written, summary.table
    );
    Ok(())
}

fn load_upload(args: &UploadArgs) -> Result<Dataset> {
    let options = LoadOptions {
        delimiter: io_utils::resolve_input_delimiter(&args.input, args.delimiter),
        encoding: io_utils::resolve_encoding(args.input_encoding.as_deref())?,
    };
    info!(
        "Loading '{}' with delimiter '{}'",
        args.input.display(),
        io_utils::printable_delimiter(options.delimiter)
    );
    let bytes = io_utils::read_upload(&args.input)?;
    let dataset = dataset::load(&bytes, &options)
        .with_context(|| format!("Loading upload {:?}", args.input))?;
    info!(
        "Loaded {} row(s) across {} column(s)",
        dataset.row_count(),
        dataset.columns().len()
    );
    Ok(dataset)
}

fn validation_report<'a>(args: &UploadArgs, validation: &'a Validation) -> ValidationReport<'a> {
    let duplicate_rows =
        duplicates::duplicate_row_numbers(&validation.dataset, DUPLICATE_ROW_LIMIT);
    ValidationReport::new(validation, args.preview_rows, duplicate_rows)
}

fn print_validation(args: &UploadArgs, validation: &Validation) -> Result<()> {
    let report = validation_report(args, validation);
    match args.format {
        OutputFormat::Table => print!("{}", report.to_text()),
        OutputFormat::Json => println!("{}", report.to_json()?),
    }
    Ok(())
}
