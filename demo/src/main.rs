//! attest search reference demo CLI
//!
//! Runs one or all of the search contract scenarios against mock responses,
//! and inspects the snapshots they leave behind.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- missing-user-id
//!   cargo run -p demo -- background
//!   cargo run -p demo -- inspect --rule guarantee_failure
//!   cargo run -p demo -- --config attest.toml run-all
//!
//! Statistics lines are emitted on the `attest::stats` tracing target; set
//! `RUST_LOG=attest::stats=debug` to see them.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

use attest_contracts::{
    config::AttestConfig,
    error::{AttestError, AttestResult},
    invocation::Invocation,
};
use attest_core::Contract;
use attest_ref_search::{
    scenarios::{self, background, Scenario},
    SearchContract,
};
use attest_sampler::{FileSampler, SampleLocator};

// ── CLI definition ────────────────────────────────────────────────────────────

/// attest: runtime contract verification demo.
///
/// Each scenario wraps a mock search client in `SearchContract` and shows how
/// the engine reports, samples and logs the outcome.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "attest search reference demo",
    long_about = "Runs attest demo scenarios showing guarantee and expectation checks,\n\
                  background verification, rate-limited sampling, and sample inspection."
)]
struct Cli {
    /// TOML configuration file. Environment variables are applied on top.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every scenario in sequence.
    RunAll,
    /// Complete response: the contract holds via `non_empty_search`.
    Healthy,
    /// No results: the contract holds via `empty_search`.
    EmptySearch,
    /// A status without a user id: `guarantee_failure`.
    MissingUserId,
    /// Users without screen name or follower count: `expectation_failure`.
    MissingFollowers,
    /// A bare error string instead of a response: `guarantee_failure`.
    Malformed,
    /// The search itself fails: `unexpected_error`.
    UpstreamTimeout,
    /// Verify in the background and recover the failure from its sample.
    Background,
    /// Decode a persisted sample.
    Inspect(InspectArgs),
}

#[derive(Args)]
struct InspectArgs {
    /// Snapshot file to read.
    #[arg(long, conflicts_with_all = ["rule", "period"])]
    path: Option<PathBuf>,

    /// Rule the sample was taken under, e.g. `guarantee_failure`.
    #[arg(long, required_unless_present = "path")]
    rule: Option<String>,

    /// Period bucket; defaults to the current one.
    #[arg(long, allow_negative_numbers = true)]
    period: Option<i64>,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Initialize structured logging.  Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let config = match attest_config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(2);
        }
    };
    info!(
        root = %config.root_path.display(),
        enabled = config.is_enabled(SearchContract::NAME),
        period_secs = config.period_secs_for(SearchContract::NAME),
        "configuration loaded"
    );

    let result = match cli.command {
        Command::Inspect(args) => inspect(&config, args),
        command => {
            print_banner(&config);
            run(&config, command)
        }
    };

    match result {
        Ok(()) => {}
        Err(e) => {
            eprintln!("Demo error: {}", e);
            std::process::exit(1);
        }
    }
}

// ── Scenario dispatch ─────────────────────────────────────────────────────────

fn run(config: &AttestConfig, command: Command) -> AttestResult<()> {
    let scenario = match command {
        Command::RunAll => {
            scenarios::run_all(config)?;
            println!("All scenarios completed.");
            return Ok(());
        }
        Command::Background => return background::run_scenario(config),
        Command::Healthy => Scenario::Healthy,
        Command::EmptySearch => Scenario::EmptySearch,
        Command::MissingUserId => Scenario::MissingUserId,
        Command::MissingFollowers => Scenario::MissingFollowers,
        Command::Malformed => Scenario::Malformed,
        Command::UpstreamTimeout => Scenario::UpstreamTimeout,
        Command::Inspect(args) => return inspect(config, args),
    };
    scenarios::run_scenario(scenario, config)
}

fn inspect(config: &AttestConfig, args: InspectArgs) -> AttestResult<()> {
    let sampler = FileSampler::new(
        &config.root_path,
        SearchContract::NAME,
        config.period_secs_for(SearchContract::NAME),
    );

    let locator = match (args.path, args.rule) {
        (Some(path), _) => SampleLocator::Path(path),
        (None, Some(rule)) => SampleLocator::Rule {
            rule,
            period: args.period,
        },
        // clap requires one of the two.
        (None, None) => SampleLocator::Rule {
            rule: "guarantee_failure".to_string(),
            period: args.period,
        },
    };

    let invocation: Invocation<Value> = sampler.read(&locator)?;
    let rendered =
        serde_json::to_string_pretty(&invocation).map_err(|e| AttestError::Serialization {
            reason: e.to_string(),
        })?;
    println!("{}", rendered);
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner(config: &AttestConfig) {
    println!();
    println!("attest — Runtime Contract Verification");
    println!("Search Reference Demo");
    println!("======================================");
    println!();
    println!("Verification pipeline per call:");
    println!("  [1] The wrapped action runs and its output is captured");
    println!("  [2] Guarantees are checked in order; the first false one fails the call");
    println!("  [3] Expectations are checked in order; the first true one satisfies it");
    println!("  [4] The outcome is sampled (once per rule and period) and logged");
    println!();
    println!("  Sample root: {}", config.root_path.display());
    println!();
}
