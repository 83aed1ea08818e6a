//! StepRunner CLI Entry Point
//!
//! Loads a definition file, runs one workflow with the built-in actions and
//! prints every execution record.
//!
//! # Usage
//!
//! ```bash
//! # Run a workflow from a definition file
//! steprunner tiered.yaml parentWorkflow
//!
//! # Pick the collection and controller name explicitly
//! steprunner defs.yaml main --collection demo --controller nightly
//!
//! # Load engine settings and write records as JSON
//! steprunner defs.yaml main --config engine.yaml --output records.json
//! ```

use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use colored::Colorize;
use log::{error, info, warn};

use steprunner::records::RecordStatus;
use steprunner::{ActionCatalog, Controller, EngineConfig, ExecutionRecord, APP_NAME, VERSION};

/// Command-line configuration parsed from arguments.
#[derive(Debug, Default)]
struct Config {
    definition_path: Option<PathBuf>,
    workflow: Option<String>,
    collection: Option<String>,
    config_path: Option<PathBuf>,
    controller: Option<String>,
    workers: Option<usize>,
    output_path: Option<PathBuf>,
    verbose: bool,
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME, VERSION);
    println!("Workflow Execution Engine");
    println!();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: steprunner [OPTIONS] <DEFINITION> <WORKFLOW>");
    println!();
    println!("Arguments:");
    println!("  <DEFINITION>        Path to a workflow collection YAML file");
    println!("  <WORKFLOW>          Name of the workflow to run");
    println!();
    println!("Options:");
    println!("  --collection NAME   Collection holding the workflow (default: the file's)");
    println!("  --config FILE       Engine settings YAML file");
    println!("  --controller NAME   Controller name stamped on records");
    println!("  --workers N         Worker threads (default: CPU count)");
    println!("  --output FILE       Write the records as JSON");
    println!("  --verbose           Enable debug logging");
    println!("  --help              Show this help message");
    println!("  --version           Show version information");
    println!();
    println!("Examples:");
    println!("  steprunner tiered.yaml parentWorkflow");
    println!("  steprunner defs.yaml main --workers 2 --output records.json");
}

/// Returns the value following an option flag.
fn option_value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> Result<&'a str, String> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| format!("{} requires a value", flag))
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut positional_index = 0;
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--collection" => {
                config.collection = Some(option_value(args, &mut i, arg)?.to_string());
            }
            "--config" => {
                config.config_path = Some(PathBuf::from(option_value(args, &mut i, arg)?));
            }
            "--controller" => {
                config.controller = Some(option_value(args, &mut i, arg)?.to_string());
            }
            "--workers" => {
                let value = option_value(args, &mut i, arg)?;
                config.workers = Some(
                    value
                        .parse()
                        .map_err(|_| format!("Invalid workers value: {}", value))?,
                );
            }
            "--output" => {
                config.output_path = Some(PathBuf::from(option_value(args, &mut i, arg)?));
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                match positional_index {
                    0 => config.definition_path = Some(PathBuf::from(arg)),
                    1 => config.workflow = Some(arg.clone()),
                    _ => return Err(format!("Unexpected argument: {}", arg)),
                }
                positional_index += 1;
            }
        }
        i += 1;
    }

    Ok(config)
}

/// Builds engine settings from the optional file plus CLI overrides.
fn engine_config(config: &Config) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let mut engine = match config.config_path {
        Some(ref path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    if let Some(ref name) = config.controller {
        engine.set_controller(name.as_str())?;
    }
    if let Some(workers) = config.workers {
        engine.set_worker_threads(workers);
    }
    Ok(engine)
}

/// Prints one record as a status line.
fn print_record(record: &ExecutionRecord) {
    let label = match record.status {
        RecordStatus::Success => "ok".green().bold(),
        RecordStatus::Failure => "failed".red().bold(),
    };
    println!(
        "  [{}] {} {} {}",
        label,
        record.timestamp.format("%H:%M:%S%.3f"),
        record.ancestry.to_string().cyan(),
        record.result
    );
}

/// Main application entry point. Returns the number of failed records.
fn run() -> Result<usize, Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    let (Some(definition), Some(workflow)) = (config.definition_path.clone(), config.workflow.clone())
    else {
        print_usage();
        return Err("a definition file and a workflow name are required".into());
    };

    setup_logging(config.verbose);
    print_banner();

    let settings = engine_config(&config)?;
    info!(
        "Controller: {} ({} workers)",
        settings.controller, settings.worker_threads
    );

    let controller = Controller::from_config(settings, ActionCatalog::with_builtins());
    let keys = controller.load_file(&definition).map_err(|e| {
        error!("Failed to load definition: {}", e);
        format!("Could not load definition from '{}': {}", definition.display(), e)
    })?;

    let collection = match config.collection {
        Some(name) => name,
        None => keys
            .first()
            .map(|key| key.collection.clone())
            .ok_or("definition contains no workflows")?,
    };

    controller.init_threads()?;
    let id = controller.execute(&collection, &workflow)?;
    info!("Started {} ({}-{})", id, collection, workflow);
    controller.await_drain();
    controller.shutdown_threads();

    if controller.is_halted() {
        warn!("Engine halted: record store is full");
    }

    let records = controller.store().records();
    println!();
    println!("Records ({}):", records.len());
    for record in &records {
        print_record(record);
    }

    if let Some(ref path) = config.output_path {
        let json = serde_json::to_string_pretty(&records)?;
        fs::write(path, json)?;
        info!("Wrote {} records to {}", records.len(), path.display());
    }

    Ok(records.iter().filter(|r| r.is_failure()).count())
}

fn main() -> ExitCode {
    match run() {
        Ok(0) => ExitCode::SUCCESS,
        Ok(failed) => {
            eprintln!();
            eprintln!("{} step invocation(s) failed", failed);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!();
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
