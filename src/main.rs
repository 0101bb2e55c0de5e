//! diskmap
//!
//! Generates udev rules that give ASM candidate disks stable names of the
//! form `udevlinks/<HOST>_<POOL>_<N>`. Rules (or the map-dump table) go to
//! stdout, logs go to stderr.

use clap::Parser;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use diskmap::pipeline::resolve_hostname;
use diskmap::{
    DiskmapConfig, EmitMode, OutputMode, Pipeline, PolicyChoice, Result, RunOptions, SystemRunner,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Emit udev rules binding ASM disks to persistent diskgroup names
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Only emit rules for identifiers not already in the rules file
    #[arg(short = 'd', long)]
    delta: bool,

    /// Print the persisted rules resolved against current devices and exit
    #[arg(short = 'm', long)]
    map: bool,

    /// Classify devices by the diskgroup label in their on-disk header
    #[arg(short = 'o', long)]
    od: bool,

    /// Assign diskgroups from a "<device> <pool>" grammar file
    #[arg(short = 'g', long, value_name = "FILE", conflicts_with = "od")]
    grammar: Option<PathBuf>,

    /// YAML configuration file
    #[arg(long, env = "DISKMAP_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Persisted rules file
    #[arg(long, env = "DISKMAP_RULES_FILE", value_name = "FILE")]
    rules_file: Option<PathBuf>,

    /// Host name used in link names (defaults to the system host name)
    #[arg(long, value_name = "NAME")]
    hostname: Option<String>,

    /// Print the map dump as JSON
    #[arg(long, requires = "map")]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

impl Args {
    fn policy(&self) -> PolicyChoice {
        match (&self.grammar, self.od) {
            (Some(path), _) => PolicyChoice::Grammar(path.clone()),
            (None, true) => PolicyChoice::Content,
            (None, false) => PolicyChoice::Capacity,
        }
    }

    fn output(&self) -> OutputMode {
        if self.map {
            OutputMode::MapDump { json: self.json }
        } else if self.delta {
            OutputMode::Rules(EmitMode::Delta)
        } else {
            OutputMode::Rules(EmitMode::Full)
        }
    }
}

// =============================================================================
// Main
// =============================================================================

fn main() -> ExitCode {
    let args = Args::parse();

    init_logging(&args);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            if err.is_utility_failure() {
                error!("Check that the utility is installed and runnable as this user");
            }
            eprintln!("diskmap: {}", err);
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => DiskmapConfig::load(path)?,
        None => DiskmapConfig::default(),
    };

    // CLI overrides
    if let Some(path) = &args.rules_file {
        config.rules_path = path.clone();
    }
    if let Some(name) = &args.hostname {
        config.hostname = Some(name.clone());
    }
    config.validate()?;

    let mut options = RunOptions::new(resolve_hostname(&config)?);
    options.policy = args.policy();
    options.output = args.output();

    info!("Starting diskmap {}", diskmap::VERSION);
    debug!("  Host: {}", options.hostname);
    debug!("  Policy: {:?}", options.policy);
    debug!("  Output: {:?}", options.output);
    debug!("  Rules file: {}", config.rules_path.display());

    let runner = SystemRunner::new();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let summary = Pipeline::new(&runner, &config).run(&options, &mut out)?;

    info!(
        "Finished on {} host: {} canonical devices, {} excluded",
        summary.platform,
        summary.canonical,
        summary.exclusions.len()
    );
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(io::stderr))
            .init();
    }
}
