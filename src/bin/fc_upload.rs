use std::fs::OpenOptions;
use std::process::ExitCode;
use std::sync::Mutex;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use flowcell_parser::app::{App, UploadOptions};
use flowcell_parser::config::ConfigLoader;
use flowcell_parser::diagnostics::TracingSink;
use flowcell_parser::error::FlowcellError;
use flowcell_parser::output::JsonOutput;
use flowcell_parser::reconcile::{Document, DocumentStore, StoredDocument};
use flowcell_parser::statusdb::StatusDbClient;

#[derive(Parser)]
#[command(name = "fc-upload")]
#[command(about = "Parse a sequencing run folder and store its metadata document in StatusDB")]
#[command(version)]
struct Cli {
    /// Run folder to parse
    #[arg(short, long)]
    flowcell: Utf8PathBuf,

    /// Configuration file (default: ~/opt/config/post_process.yaml)
    #[arg(short, long)]
    conf: Option<String>,

    /// Append logs to this file instead of stderr
    #[arg(short, long)]
    log: Option<Utf8PathBuf>,

    /// Replace a differing stored document instead of merging into it
    #[arg(long)]
    overwrite: bool,

    /// Print the parsed document without contacting the database
    #[arg(long)]
    dry_run: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<FlowcellError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &FlowcellError) -> u8 {
    match error {
        FlowcellError::NotFound(_) | FlowcellError::MissingConfig => 2,
        FlowcellError::StoreHttp(_) | FlowcellError::StoreStatus { .. } => 3,
        FlowcellError::DuplicateDocuments { .. } | FlowcellError::RevisionConflict { .. } => 4,
        _ => 1,
    }
}

fn init_logging(log: Option<&Utf8PathBuf>) -> miette::Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false);
    match log {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .into_diagnostic()?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log.as_ref())?;

    let sink = TracingSink;
    if cli.dry_run {
        let app = App::new(NopStore);
        let document = app.parse_run(&cli.flowcell, &sink)?;
        JsonOutput::print_document(&document).into_diagnostic()?;
        return Ok(());
    }

    let config = ConfigLoader::resolve(cli.conf.as_deref())?;
    let client = StatusDbClient::new(&config.statusdb)?;
    let app = App::new(client);
    let result = app.upload(
        &cli.flowcell,
        UploadOptions {
            overwrite: cli.overwrite,
        },
        &sink,
    )?;
    tracing::info!(name = %result.name, action = %result.action, "upload finished");
    JsonOutput::print_upload(&result).into_diagnostic()?;
    Ok(())
}

/// Store used by `--dry-run`, which never reaches the database.
struct NopStore;

impl DocumentStore for NopStore {
    fn find_by_name(&self, _name: &str) -> Result<Vec<StoredDocument>, FlowcellError> {
        Ok(Vec::new())
    }

    fn create(&self, _document: &Document) -> Result<String, FlowcellError> {
        Err(FlowcellError::StoreHttp("dry run".to_string()))
    }

    fn replace(&self, _id: &str, _rev: &str, _document: &Document) -> Result<(), FlowcellError> {
        Err(FlowcellError::StoreHttp("dry run".to_string()))
    }
}
