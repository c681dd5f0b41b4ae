use clap::{Parser as ClapParser, ValueEnum};
use log::info;
use miette::{IntoDiagnostic, Result, bail};
use pulsebench::{
    BenchConfig, ConfigError, RunSettings, ScenarioMatrix, TimeLimit, Variant, reference_model,
    run_matrix,
};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum VariantArg {
    /// `out` only
    Basic,
    /// `out` plus the padded `window` output
    Window,
}

impl From<VariantArg> for Variant {
    fn from(arg: VariantArg) -> Self {
        match arg {
            VariantArg::Basic => Variant::Basic,
            VariantArg::Window => Variant::Window,
        }
    }
}

#[derive(ClapParser)]
#[command(
    name = "pulsebench",
    about = "Check PWM duty cycle, period and window timing against closed-form expectations"
)]
struct Cli {
    /// Parameter file (TOML); built-in defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Device interface to verify
    #[arg(long, value_enum, default_value_t = VariantArg::Basic)]
    variant: VariantArg,

    /// Write one VCD waveform per scenario into this directory
    #[arg(long)]
    vcd_dir: Option<PathBuf>,

    /// Print the report as JSON instead of a summary
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Unless the parameter file sets `time_limit_us`, each scenario is bounded
/// by a limit derived from its expected period, so a device that never
/// toggles fails its scenario instead of hanging.
fn run_settings(config: &BenchConfig) -> Result<RunSettings, ConfigError> {
    let settings = RunSettings::from_bench(&config.bench)?;
    Ok(match settings.time_limit {
        TimeLimit::Unlimited => settings.derived_time_limit(),
        _ => settings,
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => BenchConfig::load(path).into_diagnostic()?,
        None => BenchConfig::default(),
    };
    let scenarios = ScenarioMatrix::from_config(&config, cli.variant.into())
        .and_then(|matrix| matrix.scenarios())
        .into_diagnostic()?;

    let mut settings = run_settings(&config).into_diagnostic()?;
    if let Some(dir) = &cli.vcd_dir {
        fs::create_dir_all(dir).into_diagnostic()?;
        settings = settings.vcd_dir(dir);
    }
    info!(
        "{} scenarios, {} samples each, clock period {}",
        scenarios.len(),
        settings.samples,
        settings.clock_period
    );

    let report = run_matrix(&scenarios, &settings, reference_model);
    if cli.json {
        println!("{}", report.to_json().into_diagnostic()?);
    } else {
        println!("{report}");
    }

    if !report.is_success() {
        bail!(
            "{} of {} scenarios failed",
            report.failed(),
            report.outcomes.len()
        );
    }
    Ok(())
}
