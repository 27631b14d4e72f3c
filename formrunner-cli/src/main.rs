//! formrunner CLI
//!
//! Fills a web form from a spreadsheet script.
//!
//! Usage:
//!   formrunner run                     # run with formrunner.yaml in the current directory
//!   formrunner run --dry-run           # log commands instead of driving the browser
//!   formrunner inspect --sheet Travel  # show how every cell would be classified

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use formrunner::{
    Actuator, BrowserActuator, BrowserBridge, Classifier, DocumentStore, DropdownMappingTable,
    DryRunActuator, IdResolver, Interpreter, JsonWorkbookStore, MappingTable, NoopOracle, Oracle,
    PythonOracle, RunConfig,
};
use tracing::{info, warn};

mod inspect;
mod logging;
mod persist;
mod summary;

#[derive(Parser)]
#[command(name = "formrunner")]
#[command(about = "Fill web forms from spreadsheet scripts")]
#[command(version)]
struct Cli {
    /// YAML configuration file; defaults are used when it is missing or invalid
    #[clap(
        long,
        short = 'c',
        global = true,
        env = "FORMRUNNER_CONFIG",
        default_value = "formrunner.yaml"
    )]
    config: PathBuf,

    /// Also write daily-rolling log files into this directory
    #[clap(long, global = true, env = "FORMRUNNER_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Write log files into the default per-user log directory
    #[clap(long, global = true, conflicts_with = "log_dir")]
    log_to_file: bool,

    /// Debug-level logging
    #[clap(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser, Debug)]
struct SourceArgs {
    /// Script workbook
    #[clap(long, short = 'd')]
    document: Option<PathBuf>,

    /// Sheet of the script workbook to run
    #[clap(long, short = 's')]
    sheet: Option<String>,

    /// Title-to-id mapping workbook
    #[clap(long, short = 'm')]
    mapping: Option<PathBuf>,

    /// Sheet of the mapping workbook
    #[clap(long)]
    mapping_sheet: Option<String>,
}

impl SourceArgs {
    fn apply(&self, config: &mut RunConfig) {
        if let Some(document) = &self.document {
            config.document_path = document.clone();
        }
        if let Some(sheet) = &self.sheet {
            config.sheet_name = sheet.clone();
        }
        if let Some(mapping) = &self.mapping {
            config.mapping_path = mapping.clone();
        }
        if let Some(sheet) = &self.mapping_sheet {
            config.mapping_sheet_name = sheet.clone();
        }
    }
}

#[derive(Parser, Debug)]
struct RunArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Log commands instead of sending them to the browser
    #[clap(long)]
    dry_run: bool,

    /// Do not write computed cells back to the workbook
    #[clap(long)]
    no_save: bool,

    /// Seconds to wait for the browser extension to connect
    #[clap(long, default_value_t = 30)]
    connect_timeout: u64,

    /// Print the run report as JSON
    #[clap(long)]
    json: bool,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Print the classification as JSON
    #[clap(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Interpret a script sheet against the browser
    Run(RunArgs),
    /// Classify every cell without dispatching anything
    Inspect(InspectArgs),
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_dir = cli
        .log_dir
        .clone()
        .or_else(|| cli.log_to_file.then(logging::default_log_dir));
    let _guard = match logging::init_logging(log_dir.as_deref(), cli.verbose) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialise logging: {e}");
            None
        }
    };

    let result = match &cli.command {
        Commands::Run(args) => run(&cli, args).await,
        Commands::Inspect(args) => inspect_command(&cli, args),
    };

    if let Err(e) = result {
        eprintln!("{} {e:#}", "Error:".red().bold());
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli, source: &SourceArgs) -> RunConfig {
    let mut config = RunConfig::load_or_default(&cli.config);
    if let Some(base) = cli.config.parent().filter(|p| !p.as_os_str().is_empty()) {
        config = config.resolve_relative_to(base);
    }
    source.apply(&mut config);
    config
}

fn load_inputs(config: &RunConfig) -> Result<(formrunner::Document, MappingTable)> {
    let store = JsonWorkbookStore;
    let document = store
        .load(&config.document_path, &config.sheet_name)
        .with_context(|| format!("loading script {}", config.document_path.display()))?;
    let mapping = MappingTable::load(&store, &config.mapping_path, &config.mapping_sheet_name)
        .with_context(|| format!("loading mapping {}", config.mapping_path.display()))?;
    info!(entries = mapping.len(), "Mapping table loaded");
    Ok((document, mapping))
}

async fn build_actuator(
    config: &RunConfig,
    args: &RunArgs,
) -> Result<(Arc<dyn Actuator>, Arc<dyn Oracle>)> {
    if args.dry_run {
        info!("Dry run: commands are logged, not executed");
        let actuator: Arc<dyn Actuator> = Arc::new(DryRunActuator::new());
        let oracle: Arc<dyn Oracle> = Arc::new(NoopOracle);
        return Ok((actuator, oracle));
    }

    let bridge = BrowserBridge::start(&config.bridge_addr)
        .await
        .with_context(|| format!("starting browser bridge on {}", config.bridge_addr))?;
    info!("Waiting for the browser extension to connect...");
    if !bridge
        .wait_for_client(Duration::from_secs(args.connect_timeout))
        .await
    {
        bail!(
            "browser extension did not connect to {} within {}s",
            bridge.local_addr(),
            args.connect_timeout
        );
    }
    let actuator: Arc<dyn Actuator> = Arc::new(BrowserActuator::new(
        Arc::new(bridge),
        config.command_timeout(),
    ));

    let oracle: Arc<dyn Oracle> = match &config.helper_script {
        Some(script) => Arc::new(
            PythonOracle::new(config.python.clone(), script, config.command_timeout())
                .context("preparing helper script")?,
        ),
        None => {
            warn!("No helper_script configured; print confirmations will not save a PDF");
            Arc::new(NoopOracle)
        }
    };
    Ok((actuator, oracle))
}

async fn run(cli: &Cli, args: &RunArgs) -> Result<()> {
    let config = load_config(cli, &args.source);
    let (document, mapping) = load_inputs(&config)?;
    let (actuator, oracle) = build_actuator(&config, args).await?;

    let classifier = Classifier::new(DropdownMappingTable::with_overrides(&config.dropdowns));
    let mut interpreter = Interpreter::new(
        document,
        IdResolver::new(mapping),
        classifier,
        actuator,
        oracle,
    )
    .with_artifact_dir(&config.artifact_dir);

    let report = interpreter.run().await;

    let saved_to = if args.no_save {
        None
    } else {
        let document = interpreter.into_document();
        Some(persist::save_with_fallback(
            &JsonWorkbookStore,
            &config.document_path,
            &document,
        )?)
    };

    if args.json {
        let mut value = report.to_json();
        if let (Some(obj), Some(path)) = (value.as_object_mut(), &saved_to) {
            obj.insert("saved_to".into(), path.display().to_string().into());
        }
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        summary::display(&report, saved_to.as_deref());
    }
    Ok(())
}

fn inspect_command(cli: &Cli, args: &InspectArgs) -> Result<()> {
    let config = load_config(cli, &args.source);
    let (document, mapping) = load_inputs(&config)?;
    let classifier = Classifier::new(DropdownMappingTable::with_overrides(&config.dropdowns));
    let inspection = inspect::inspect(&document, &IdResolver::new(mapping), &classifier);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&inspection)?);
    } else {
        inspect::display(&inspection);
    }
    Ok(())
}
