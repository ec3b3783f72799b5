//! SentiLab CLI — position generation, start-end validation and universe commands.
//!
//! Commands:
//! - `positions` — build the position matrix, validate it and write artifacts
//! - `validate` — run only the start-end independence check
//! - `universe` — write the built-in ticker map as TOML

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::info;

use sentilab_core::data::TickerMap;
use sentilab_core::domain::parse_date;
use sentilab_core::validate::ValidationReport;
use sentilab_runner::config::{CalendarConfig, InputFormat, PipelineConfig};
use sentilab_runner::data_loader::{load_observations, LoadOptions};
use sentilab_runner::pipeline::{history_start, run_from_config, run_validation, PipelineResult};
use sentilab_runner::save_artifacts;

#[derive(Parser)]
#[command(
    name = "sentilab",
    about = "SentiLab CLI — sentiment to platform position matrices"
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate positions, run the start-end check and write artifacts.
    Positions {
        #[command(flatten)]
        input: InputArgs,

        /// Output directory for positions.json, positions.csv and manifest.json.
        #[arg(long, default_value = "output")]
        output_dir: PathBuf,

        /// Skip the start-end independence check.
        #[arg(long, default_value_t = false)]
        skip_validation: bool,
    },
    /// Run only the start-end independence check.
    Validate {
        #[command(flatten)]
        input: InputArgs,

        /// Print the report as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Write the built-in US ticker map as TOML.
    Universe {
        /// Destination file.
        #[arg(long, default_value = "tickers.toml")]
        output: PathBuf,
    },
}

/// Inputs shared by `positions` and `validate`. Flags override the config file.
#[derive(Args)]
struct InputArgs {
    /// Path to a TOML pipeline config.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Observation or mention CSV.
    #[arg(long)]
    observations: Option<PathBuf>,

    /// Layout of the input CSV.
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// Ticker map TOML for the mentions format.
    #[arg(long)]
    ticker_map: Option<PathBuf>,

    /// First session (YYYY-MM-DD or YYYYMMDD).
    #[arg(long)]
    start: Option<String>,

    /// Last session (YYYY-MM-DD or YYYYMMDD).
    #[arg(long)]
    end: Option<String>,

    /// Leverage applied to the notional base.
    #[arg(long)]
    leverage: Option<f64>,

    /// `weekday` or a path to a session list file.
    #[arg(long)]
    calendar: Option<String>,

    /// Use synthetic observations when the input file is missing.
    #[arg(long, default_value_t = false)]
    synthetic: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Observations,
    Mentions,
}

impl From<FormatArg> for InputFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Observations => InputFormat::Observations,
            FormatArg::Mentions => InputFormat::Mentions,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Positions {
            input,
            output_dir,
            skip_validation,
        } => run_positions_cmd(input, output_dir, skip_validation),
        Commands::Validate { input, json } => run_validate_cmd(input, json),
        Commands::Universe { output } => run_universe_cmd(output),
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn parse_cli_date(flag: &str, text: &str) -> Result<NaiveDate> {
    parse_date(text).with_context(|| format!("--{flag}"))
}

/// Build the pipeline config from a file and/or flags.
fn build_config(input: InputArgs) -> Result<PipelineConfig> {
    let mut config = match &input.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => {
            let (Some(start), Some(end)) = (&input.start, &input.end) else {
                bail!("--start and --end are required without --config");
            };
            PipelineConfig::new(parse_cli_date("start", start)?, parse_cli_date("end", end)?)
        }
    };

    if let Some(start) = &input.start {
        config.start_date = parse_cli_date("start", start)?;
    }
    if let Some(end) = &input.end {
        config.end_date = parse_cli_date("end", end)?;
    }
    if let Some(leverage) = input.leverage {
        config.leverage = leverage;
    }
    if let Some(path) = input.observations {
        config.observations.path = path;
    }
    if let Some(format) = input.format {
        config.observations.format = format.into();
    }
    if let Some(path) = input.ticker_map {
        config.observations.ticker_map = Some(path);
    }
    if input.synthetic {
        config.observations.synthetic = true;
    }
    if let Some(calendar) = input.calendar {
        config.calendar = match calendar.as_str() {
            "weekday" => CalendarConfig::default(),
            path => CalendarConfig::File {
                path: PathBuf::from(path),
            },
        };
    }

    config.validate()?;
    Ok(config)
}

fn run_positions_cmd(input: InputArgs, output_dir: PathBuf, skip_validation: bool) -> Result<()> {
    let mut config = build_config(input)?;
    if skip_validation {
        config.validation.enabled = false;
    }

    let calendar = config.calendar.build()?;
    let result = run_from_config(&config, calendar)?;

    print_summary(&result);
    let written = save_artifacts(&result, &output_dir)?;
    info!(files = written.len(), dir = %output_dir.display(), "artifacts written");
    println!("Artifacts saved to: {}", output_dir.display());

    if !result.is_valid() {
        eprintln!("Start-end validation FAILED; positions are not safe to submit.");
        std::process::exit(1);
    }
    Ok(())
}

fn run_validate_cmd(input: InputArgs, json: bool) -> Result<()> {
    let config = build_config(input)?;
    let calendar = config.calendar.build()?;

    let opts = LoadOptions::from_config(
        &config.observations,
        history_start(&config)?,
        config.end_date,
    );
    let loaded = load_observations(&opts)?;
    let report = run_validation(&config, calendar, &loaded.store)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if !report.passed {
        std::process::exit(1);
    }
    Ok(())
}

fn run_universe_cmd(output: PathBuf) -> Result<()> {
    let map = TickerMap::default_us();
    let text = map.to_toml()?;
    std::fs::write(&output, text)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("Wrote {} tickers to {}", map.len(), output.display());
    Ok(())
}

fn print_summary(result: &PipelineResult) {
    let s = &result.summary;
    println!();
    println!("=== Positions ===");
    println!("Run ID:         {}", result.run_id);
    println!(
        "Period:         {} to {}",
        result.config.start_date, result.config.end_date
    );
    println!("Leverage:       {}", result.config.leverage);
    println!("Calendar:       {}", result.calendar);
    println!("Sessions:       {}", s.sessions);
    println!("Securities:     {}", s.securities);
    println!("Max |position|: {:.2}", s.max_abs_position);
    println!("Avg gross:      {:.2}", s.avg_gross_exposure);
    println!("Avg active:     {:.1}", s.avg_active_positions);
    println!("Observations:   {}", result.observation_count);
    println!("Fingerprint:    {}", result.fingerprint);
    if result.has_synthetic {
        println!("Data:           SYNTHETIC");
    }
    match &result.validation {
        Some(report) => print_report(report),
        None => println!("Validation:     skipped"),
    }
}

fn print_report(report: &ValidationReport) {
    println!();
    println!("=== Start-End Validation ===");
    println!(
        "Lookback starts: {} / {}",
        report.lookback_starts[0], report.lookback_starts[1]
    );
    println!("End date:        {}", report.end_date);
    println!(
        "Sessions:        {} overlapping, {} compared",
        report.overlap_sessions, report.compared_sessions
    );
    println!(
        "Total |diff|:    {:.6} (threshold {})",
        report.total_abs_diff, report.threshold
    );
    println!("Overlap |diff|:  {:.6}", report.overlap_abs_diff);
    println!("Max cell diff:   {:.6}", report.max_cell_diff);
    for worst in &report.worst_securities {
        println!(
            "  {}  max |diff| {:.2}",
            worst.security_key, worst.max_abs_diff
        );
    }
    println!(
        "Result:          {}",
        if report.passed { "PASSED" } else { "FAILED" }
    );
}
