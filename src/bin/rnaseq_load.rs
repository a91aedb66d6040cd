use std::process::ExitCode;

use camino::Utf8Path;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use rnaseq_load::app::{App, RunOptions};
use rnaseq_load::config::{ConfigLoader, ResolvedConfig, read_experiment_list};
use rnaseq_load::error::LoadError;
use rnaseq_load::output::{JsonOutput, OutputMode, TextOutput};
use rnaseq_load::registry::JsonRegistry;
use rnaseq_load::store::Store;

#[derive(Parser)]
#[command(name = "rnaseq-load")]
#[command(about = "Aggregate, QC-filter and quantile-normalize RNA-seq runs into bulk-load files")]
#[command(version, author)]
struct Cli {
    /// Print results as JSON on stdout.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Process the configured experiments")]
    Run(RunArgs),
    #[command(about = "Write the registry replicate sets of the configured experiments")]
    Sets(ConfigArgs),
    #[command(about = "List experiment ids unknown to the registry")]
    Check(CheckArgs),
}

#[derive(Args)]
struct ConfigArgs {
    #[arg(long)]
    config: Option<String>,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Compute everything but write no files.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args)]
struct CheckArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Experiment list to check instead of the configured experiments.
    #[arg(long)]
    experiments: Option<String>,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(error) = report.downcast_ref::<LoadError>() {
                return ExitCode::from(map_exit_code(error));
            }
            ExitCode::from(1)
        }
    }
}

fn map_exit_code(error: &LoadError) -> u8 {
    match error {
        LoadError::MissingConfig
        | LoadError::ConfigRead(_)
        | LoadError::ConfigParse(_)
        | LoadError::InvalidConfig(_)
        | LoadError::InvalidCutoff(_)
        | LoadError::InvalidExperimentId(_)
        | LoadError::MalformedInput { .. } => 2,
        LoadError::Registry { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };

    match cli.command {
        Command::Run(args) => run_load(args, mode),
        Command::Sets(args) => run_sets(args, mode),
        Command::Check(args) => run_check(args, mode),
    }
}

fn build_app(config_path: Option<&str>) -> miette::Result<(App<JsonRegistry>, ResolvedConfig)> {
    let config = ConfigLoader::resolve(config_path)?;
    let store = Store::new(config.output_dir.clone());
    let registry = JsonRegistry::new(config.registry.clone());
    Ok((App::new(store, registry), config))
}

fn run_load(args: RunArgs, mode: OutputMode) -> miette::Result<ExitCode> {
    let (app, config) = build_app(args.config.config.as_deref())?;
    let options = RunOptions {
        dry_run: args.dry_run,
    };
    match mode {
        OutputMode::Json => {
            let result = app.run(&config, options, &JsonOutput)?;
            JsonOutput::print_run(&result).into_diagnostic()?;
        }
        OutputMode::Text => {
            let result = app.run(&config, options, &TextOutput)?;
            TextOutput::print_run(&result).into_diagnostic()?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_sets(args: ConfigArgs, mode: OutputMode) -> miette::Result<ExitCode> {
    let (app, config) = build_app(args.config.as_deref())?;
    match mode {
        OutputMode::Json => {
            let result = app.sets(&config, &JsonOutput)?;
            JsonOutput::print_sets(&result).into_diagnostic()?;
        }
        OutputMode::Text => {
            let result = app.sets(&config, &TextOutput)?;
            TextOutput::print_sets(&result).into_diagnostic()?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_check(args: CheckArgs, mode: OutputMode) -> miette::Result<ExitCode> {
    let (app, config) = build_app(args.config.config.as_deref())?;
    let experiments = match &args.experiments {
        Some(path) => read_experiment_list(Utf8Path::new(path))?,
        None => config.experiment_ids(),
    };
    let result = match mode {
        OutputMode::Json => {
            let result = app.check(&experiments, &JsonOutput)?;
            JsonOutput::print_check(&result).into_diagnostic()?;
            result
        }
        OutputMode::Text => {
            let result = app.check(&experiments, &TextOutput)?;
            TextOutput::print_check(&result).into_diagnostic()?;
            result
        }
    };
    if result.is_ok() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(2))
    }
}
