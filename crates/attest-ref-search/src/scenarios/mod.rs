//! Reference scenarios for the search contract.
//!
//! Each scenario wires a real `VerificationEngine` (file sampler, statistics
//! sink, background pool) to one mock search fixture and shows a distinct
//! verification outcome.

pub mod background;

use std::sync::Arc;

use serde_json::Value;

use attest_contracts::{
    config::AttestConfig,
    error::{AttestError, AttestResult},
    invocation::Meta,
};
use attest_core::{CallOptions, VerificationEngine, VerificationPool};

use crate::client::{engagement, top_users, MockSearchClient, SearchService};
use crate::contract::SearchContract;
use crate::mock_data::Fixture;

/// Query used by every scenario.
pub const QUERY: &str = "rust";

/// The synchronous scenarios: each returns its verdict to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    Healthy,
    EmptySearch,
    MissingUserId,
    MissingFollowers,
    Malformed,
    UpstreamTimeout,
}

impl Scenario {
    pub const ALL: [Scenario; 6] = [
        Scenario::Healthy,
        Scenario::EmptySearch,
        Scenario::MissingUserId,
        Scenario::MissingFollowers,
        Scenario::Malformed,
        Scenario::UpstreamTimeout,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Scenario::Healthy => "Healthy response",
            Scenario::EmptySearch => "Empty search",
            Scenario::MissingUserId => "Status without user id",
            Scenario::MissingFollowers => "Users missing profile data",
            Scenario::Malformed => "Malformed response",
            Scenario::UpstreamTimeout => "Upstream timeout",
        }
    }

    pub fn fixture(&self) -> Fixture {
        match self {
            Scenario::Healthy => Fixture::Healthy,
            Scenario::EmptySearch => Fixture::Empty,
            Scenario::MissingUserId => Fixture::MissingUserId,
            Scenario::MissingFollowers => Fixture::MissingFollowers,
            Scenario::Malformed => Fixture::Malformed,
            Scenario::UpstreamTimeout => Fixture::Timeout,
        }
    }
}

/// What one scenario run produced.
#[derive(Debug)]
pub struct ScenarioReport {
    pub scenario: Scenario,
    pub result: AttestResult<Value>,
}

impl ScenarioReport {
    /// True when the only error is a contract violation, which is what the
    /// failing scenarios set out to show.
    pub fn is_expected(&self) -> bool {
        match &self.result {
            Ok(_) => true,
            Err(e) => e.is_contract_violation(),
        }
    }
}

/// Build a search service for `fixture` against `config`.
pub fn service(config: &AttestConfig, fixture: Fixture, pool: Arc<VerificationPool>) -> SearchService {
    let engine = VerificationEngine::<SearchContract>::builder(config)
        .pool(pool)
        .build();
    SearchService::new(MockSearchClient::new(fixture), engine)
}

/// Run `scenario` synchronously without printing.
pub fn execute(scenario: Scenario, config: &AttestConfig) -> ScenarioReport {
    let service = service(config, scenario.fixture(), VerificationPool::shared());
    ScenarioReport {
        scenario,
        result: service.search(QUERY, CallOptions::sync()),
    }
}

/// Run `scenario` and print what the engine reported.
///
/// Contract violations are the point of most scenarios and are printed,
/// not returned. A broken sampler or statistics sink is returned.
pub fn run_scenario(scenario: Scenario, config: &AttestConfig) -> AttestResult<()> {
    println!("=== {} ===", scenario.title());
    println!();
    println!("  Query:    {}", QUERY);
    println!("  Fixture:  {:?}", scenario.fixture());
    println!("  Mode:     sync");
    println!();

    let report = execute(scenario, config);
    let expected = report.is_expected();
    match report.result {
        Ok(response) => print_response(&response),
        Err(e) if expected => print_violation(&e),
        Err(e) => return Err(e),
    }

    println!();
    Ok(())
}

/// Every synchronous scenario, then the background one.
pub fn run_all(config: &AttestConfig) -> AttestResult<()> {
    for scenario in Scenario::ALL {
        run_scenario(scenario, config)?;
    }
    background::run_scenario(config)
}

fn print_response(response: &Value) {
    let users = top_users(response, 10);
    println!("  Contract:               HELD");
    if users.is_empty() {
        println!("  Nothing found in recent statuses for `{}`.", QUERY);
        return;
    }
    println!(
        "  Engagement:             ~{} users reached",
        engagement(&users)
    );
    println!("  Top users:");
    for user in &users {
        println!("    - {} has {} followers", user.screen_name, user.followers);
    }
}

fn print_violation(err: &AttestError) {
    println!("  Contract:               VIOLATED");
    println!("  Error:                  {}", err);
    if let Some(meta) = err.meta() {
        print_meta(meta);
    }
}

pub(crate) fn print_meta(meta: &Meta) {
    println!("  Checked:                {}", meta.checked.join(" → "));
    match &meta.sample_path {
        Some(path) => println!("  Sample:                 {}", path),
        None => println!("  Sample:                 (already sampled this period)"),
    }
    for (key, value) in &meta.notes {
        println!("  {:<24}{}", format!("{}:", key), value);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
