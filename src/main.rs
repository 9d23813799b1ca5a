use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use types::SessionWindow;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod aggregator;
mod batch;
mod config;
mod error;
mod evaluator;
mod extract;
mod intervals;
mod log_reader;
mod matcher;
mod report;
mod roster;
mod sessions;
mod table;
mod types;
mod utils;

#[derive(Parser)]
#[command(name = "rollcall")]
#[command(version)]
#[command(disable_help_subcommand = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log progress and skipped rows to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build per-session presence reports from meeting logs
    Generate(GenerateArgs),
    /// Reconcile a roster against a raw attendance log
    Match(MatchArgs),
    /// Reduce attendance reports to name + status columns
    Extract(ExtractArgs),
    /// Manage configuration
    Config(ConfigArgs),
}

#[derive(Args)]
struct GenerateArgs {
    /// Log files, directories or glob patterns
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Session as "START,END,REQUIRED_MINUTES" (repeatable)
    #[arg(long = "session", value_parser = sessions::parse_session_arg)]
    session: Vec<SessionWindow>,

    /// CSV file with Session Start, Session End, Time Required and optional File columns
    #[arg(long)]
    sessions: Option<PathBuf>,

    /// Directory for generated files (defaults to next to each input)
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Metadata lines preceding the participant header
    #[arg(long)]
    skip_rows: Option<usize>,

    /// Decimal places for durations in the attendance table
    #[arg(long)]
    decimal_places: Option<usize>,

    /// Print each report as JSON instead of the session summary
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Args)]
struct MatchArgs {
    /// Roster CSV with email and participant name columns
    #[arg(long)]
    roster: PathBuf,

    /// Raw attendance CSV with a name column and session status columns
    #[arg(long)]
    raw: PathBuf,

    /// Minimum token-set similarity (0-100) for a match
    #[arg(long)]
    threshold: Option<f64>,

    /// Directory for generated files (defaults to next to the roster)
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

#[derive(Args)]
struct ExtractArgs {
    /// Attendance reports produced by `generate`
    #[arg(required = true)]
    reports: Vec<PathBuf>,

    /// Directory for generated files (defaults to next to each report)
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

#[derive(Args)]
struct ConfigArgs {
    #[command(subcommand)]
    subcommand: ConfigSubcommands,
}

#[derive(Subcommand)]
enum ConfigSubcommands {
    /// Create default configuration file
    Init {
        #[arg(long, default_value_t = false)]
        overwrite: bool,
    },
    /// Show current configuration
    Show,
    /// Set configuration value
    Set {
        /// Configuration key (skip-rows, threshold, output-dir, decimal-places)
        key: String,
        /// Configuration value
        value: String,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        std::env::var("ROLLCALL_LOG")
            .or_else(|_| std::env::var("RUST_LOG"))
            .map(EnvFilter::new)
            .unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Load config file to get defaults
    let config = config::Config::load().unwrap_or(None).unwrap_or_default();

    match cli.command {
        Commands::Generate(args) => match run_generate(args, &config) {
            Ok(true) => {}
            Ok(false) => std::process::exit(1),
            Err(e) => {
                eprintln!("Error generating reports: {e:#}");
                std::process::exit(1);
            }
        },
        Commands::Match(args) => {
            if let Err(e) = run_match(args, &config) {
                eprintln!("Error matching names: {e:#}");
                std::process::exit(1);
            }
        }
        Commands::Extract(args) => {
            if !run_extract(args, &config) {
                std::process::exit(1);
            }
        }
        Commands::Config(config_args) => handle_config_subcommand(config_args),
    }
}

/// Returns `Ok(false)` when at least one input failed.
fn run_generate(args: GenerateArgs, config: &config::Config) -> Result<bool> {
    let mut sessions = args.session;
    if let Some(path) = &args.sessions {
        let from_file = sessions::read_session_config(path)
            .with_context(|| format!("Failed to load sessions from {}", path.display()))?;
        sessions.extend(from_file);
    }

    let options = batch::GenerateOptions {
        skip_rows: args.skip_rows.unwrap_or(config.log.skip_rows),
        out_dir: args.out_dir.or_else(|| config.output_dir()),
        decimal_places: args
            .decimal_places
            .unwrap_or(config.output.decimal_places),
    };

    let inputs = batch::discover_inputs(&args.inputs)?;
    let outcomes = batch::run_batch(&inputs, &sessions, &options)?;

    let mut all_ok = true;
    for outcome in outcomes {
        match outcome.result {
            Ok(generated) => {
                if args.json {
                    println!("{}", simd_json::to_string_pretty(&generated)?);
                } else {
                    println!("{}", outcome.input.display());
                    print!("{}", report::summary_text(&generated.report));
                    println!("   -> {}", generated.attendance_path.display());
                    println!("   -> {}", generated.summary_path.display());
                }
            }
            Err(e) => {
                all_ok = false;
                eprintln!("{e:#}");
            }
        }
    }

    Ok(all_ok)
}

fn run_match(args: MatchArgs, config: &config::Config) -> Result<()> {
    let threshold = args.threshold.unwrap_or(config.matching.threshold);
    if !(0.0..=100.0).contains(&threshold) {
        anyhow::bail!("Threshold must be between 0 and 100, got {}", threshold);
    }
    let options = matcher::MatchOptions { threshold };
    let out_dir = args.out_dir.or_else(|| config.output_dir());

    let run = roster::run_match(&args.roster, &args.raw, out_dir.as_deref(), &options)?;
    println!(
        "Matched {} of {} roster entries; {} raw names unmatched",
        run.matched_rows, run.roster_rows, run.unmatched_raw_rows
    );
    println!("   -> {}", run.matched_path.display());
    println!("   -> {}", run.unmatched_path.display());
    Ok(())
}

/// Returns false when at least one report could not be extracted.
fn run_extract(args: ExtractArgs, config: &config::Config) -> bool {
    let out_dir = args.out_dir.or_else(|| config.output_dir());
    let mut all_ok = true;
    for report_path in &args.reports {
        match extract::run_extract(report_path, out_dir.as_deref()) {
            Ok(path) => println!("{}", path.display()),
            Err(e) => {
                all_ok = false;
                eprintln!("Error extracting {}: {e:#}", report_path.display());
            }
        }
    }
    all_ok
}

fn handle_config_subcommand(config_args: ConfigArgs) {
    match config_args.subcommand {
        ConfigSubcommands::Init { overwrite } => {
            if let Err(e) = config::create_default_config(overwrite) {
                eprintln!("Error creating config: {e}");
                std::process::exit(1);
            }
        }
        ConfigSubcommands::Show => {
            if let Err(e) = config::show_config() {
                eprintln!("Error showing config: {e}");
                std::process::exit(1);
            }
        }
        ConfigSubcommands::Set { key, value } => {
            if let Err(e) = config::set_config_value(&key, &value) {
                eprintln!("Error setting config: {e}");
                std::process::exit(1);
            }
        }
    }
}
