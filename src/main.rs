use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use log::{error, info, warn};
use std::fs;
use std::path::PathBuf;

use airland_sweep::config::SweepConfig;
use airland_sweep::converter::{self, ConvertOptions};
use airland_sweep::datastructures::*;
use airland_sweep::kpi;
use airland_sweep::patcher;
use airland_sweep::summary;
use airland_sweep::sweep::{CancellationToken, SweepContext};

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
    #[command(flatten)]
    verbosity: Verbosity<InfoLevel>,
}

#[derive(Subcommand)]
enum Command {
    /// Convert raw instance files (*.txt) into solver data files (*.dat)
    Convert(ConvertArgs),
    /// Set the sweep parameter of a converted data file
    Patch(PatchArgs),
    /// Print the KPIs found in a saved solver log as json
    Extract(ExtractArgs),
    /// Run every model on every instance for every parameter value
    Sweep(SweepArgs),
    /// Aggregate a result table per model and parameter value
    Summarize(SummarizeArgs),
}

#[derive(Args)]
struct ConvertArgs {
    /// Directory with the raw instance files
    #[arg(short, long, value_name = "DIR", default_value = "raw_data")]
    raw_dir: PathBuf,
    /// Output directory, created if missing
    #[arg(short, long, value_name = "DIR", default_value = "data")]
    data_dir: PathBuf,
    /// Order of the separation rows in the raw files
    #[arg(short, long, value_parser, default_value = "interleaved")]
    layout: TokenLayout,
    /// Name of the patchable parameter written into every file
    #[arg(short, long, default_value = "R")]
    name: String,
    /// Initial value of the patchable parameter
    #[arg(short, long, default_value_t = 1)]
    initial_value: i64,
}

#[derive(Args)]
struct PatchArgs {
    /// Converted data file
    file: PathBuf,
    /// New parameter value
    value: i64,
    /// Parameter name
    #[arg(short, long, default_value = "R")]
    name: String,
    /// Rewrite the first matching line or all of them
    #[arg(short, long, value_parser, default_value = "first")]
    mode: PatchMode,
}

#[derive(Args)]
struct ExtractArgs {
    /// Saved solver console output
    log: PathBuf,
    /// Log dialect (CP or MILP)
    #[arg(short, long, value_parser)]
    dialect: Dialect,
}

#[derive(Args)]
struct SweepArgs {
    /// Path to the json config
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Solver executable
    #[arg(long)]
    solver: Option<String>,
    /// Directory containing the model files
    #[arg(short, long, value_name = "DIR")]
    models_dir: Option<PathBuf>,
    /// Directory containing the converted instance files
    #[arg(short, long, value_name = "DIR")]
    data_dir: Option<PathBuf>,
    /// Directory the result tables are written to
    #[arg(short, long, value_name = "DIR")]
    out_dir: Option<PathBuf>,
    /// Largest parameter value of the sweep
    #[arg(long)]
    max_parameter: Option<i64>,
    /// Last instance number of the sweep
    #[arg(long)]
    max_instance: Option<i64>,
    /// Timeout per solver run in seconds
    #[arg(short, long, value_parser)]
    timeout: Option<Timeout>,
    /// Convert the raw instances before sweeping
    #[arg(long)]
    convert: bool,
}

#[derive(Args)]
struct SummarizeArgs {
    /// Result table written by a sweep
    table: PathBuf,
}

fn load_config(args: &SweepArgs) -> Result<SweepConfig> {
    let mut config = match &args.config {
        Some(path) => SweepConfig::from_file(path)?,
        None => SweepConfig::default(),
    };
    if let Some(solver) = &args.solver {
        config.solver = solver.clone();
    }
    if let Some(models_dir) = &args.models_dir {
        config.models_dir = models_dir.to_path_buf();
    }
    if let Some(data_dir) = &args.data_dir {
        config.data_dir = data_dir.to_path_buf();
    }
    if let Some(out_dir) = &args.out_dir {
        config.out_dir = out_dir.to_path_buf();
    }
    if let Some(max_parameter) = args.max_parameter {
        config.parameter.range.max = max_parameter;
    }
    if let Some(max_instance) = args.max_instance {
        config.instances.max = max_instance;
    }
    if let Some(timeout) = args.timeout {
        config.timeout = timeout;
    }
    config.validate()?;
    Ok(config)
}

fn convert(args: ConvertArgs) -> Result<()> {
    let options = ConvertOptions {
        layout: args.layout,
        parameter: args.name,
        initial_value: args.initial_value,
    };
    let report =
        converter::convert_dir(&args.raw_dir, &args.data_dir, &options)?;
    info!(
        "Converted {} files, {} failed",
        report.converted.len(),
        report.failed.len()
    );
    for (path, err) in &report.failed {
        warn!("{:?}: {err}", path);
    }
    Ok(())
}

fn sweep(args: SweepArgs) -> Result<()> {
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(err) => {
            error!("Invalid configuration: {err:#}");
            std::process::exit(exitcode::CONFIG);
        }
    };
    if args.convert {
        let options = ConvertOptions {
            layout: config.layout,
            parameter: config.parameter.name.clone(),
            initial_value: config.parameter.range.min,
        };
        let report = converter::convert_dir(
            &config.raw_dir,
            &config.data_dir,
            &options,
        )?;
        for (path, err) in &report.failed {
            warn!("{:?}: {err}", path);
        }
    }
    let cancel = CancellationToken::new();
    signal_hook::flag::register(signal_hook::consts::SIGINT, cancel.flag())
        .context("registering SIGINT handler")?;

    let mut context = SweepContext::prepare(config)?;
    info!("Models: {:?}", context.models());
    match context.run(&cancel) {
        Ok(summary) => {
            info!("{summary}");
            Ok(())
        }
        Err(err) => {
            error!("Sweep aborted: {err}");
            std::process::exit(exitcode::SOFTWARE);
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.verbosity.log_level_filter())
        .parse_default_env()
        .init();
    match cli.command {
        Command::Convert(args) => convert(args),
        Command::Patch(args) => {
            let count = patcher::patch_parameter(
                &args.file,
                &args.name,
                args.value,
                args.mode,
            )?;
            info!("Patched {count} line(s) of {:?}", args.file);
            Ok(())
        }
        Command::Extract(args) => {
            let output = fs::read_to_string(&args.log)
                .with_context(|| format!("reading {:?}", args.log))?;
            let record = kpi::extract(&output, args.dialect);
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        Command::Sweep(args) => sweep(args),
        Command::Summarize(args) => {
            println!("{}", summary::summarize(&args.table)?);
            Ok(())
        }
    }
}
