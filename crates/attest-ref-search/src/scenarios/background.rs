//! Background verification: the caller gets the response at once, and a
//! violation only shows up later as a sample and a statistics line.
//!
//! Walk-through:
//!   1. The search runs on the caller's thread and its response is returned
//!   2. Guarantees and expectations run on a `VerificationPool` worker
//!   3. The worker samples the failure under `<root>/SearchContract/guarantee_failure/`
//!   4. The sample is read back from disk for offline inspection

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use attest_contracts::{
    config::AttestConfig,
    error::AttestResult,
    invocation::Invocation,
    traits::{Sampler, SnapshotFn},
};
use attest_core::{CallOptions, Contract, VerificationEngine, VerificationPool};
use attest_sampler::{FileSampler, SampleLocator};

use crate::client::{MockSearchClient, SearchService};
use crate::contract::SearchContract;
use crate::mock_data::Fixture;

use super::{print_meta, QUERY};

/// Rule the background failure is sampled under.
pub const RULE: &str = "guarantee_failure";

/// A `FileSampler` that remembers the last snapshot it wrote, so the
/// scenario reads back exactly the file its own call produced.
struct PathRecorder {
    inner: Arc<FileSampler>,
    written: Mutex<Option<PathBuf>>,
}

impl Sampler for PathRecorder {
    fn sample(&self, rule: &str, snapshot: &SnapshotFn<'_>) -> AttestResult<Option<PathBuf>> {
        let path = self.inner.sample(rule, snapshot)?;
        if let Some(path) = &path {
            *self.written.lock() = Some(path.clone());
        }
        Ok(path)
    }
}

/// Search with a broken fixture in the contract's default (background)
/// mode, wait for the pool, and load the sample it left behind.
///
/// The sample is `None` when an earlier call already sampled `RULE` in the
/// current period, so this call wrote nothing.
pub fn execute(config: &AttestConfig) -> AttestResult<(Value, Option<Invocation<Value>>)> {
    let pool = Arc::new(VerificationPool::new(1, 16));
    let files = Arc::new(FileSampler::new(
        &config.root_path,
        SearchContract::NAME,
        config.period_secs_for(SearchContract::NAME),
    ));
    let recorder = Arc::new(PathRecorder {
        inner: Arc::clone(&files),
        written: Mutex::new(None),
    });

    let engine = VerificationEngine::<SearchContract>::builder(config)
        .sampler(Arc::clone(&recorder) as Arc<dyn Sampler>)
        .pool(Arc::clone(&pool))
        .build();
    let service = SearchService::new(MockSearchClient::new(Fixture::MissingUserId), engine);

    let response = service.search(QUERY, CallOptions::default())?;
    pool.drain();

    let written = recorder.written.lock().take();
    let sampled = match written {
        Some(path) => Some(files.read(&SampleLocator::Path(path))?),
        None => None,
    };

    Ok((response, sampled))
}

/// Run the background scenario and print the recovered sample.
pub fn run_scenario(config: &AttestConfig) -> AttestResult<()> {
    println!("=== Background verification ===");
    println!();
    println!("  Query:    {}", QUERY);
    println!("  Fixture:  {:?}", Fixture::MissingUserId);
    println!("  Mode:     async (contract default)");
    println!();

    let (response, sampled) = execute(config)?;
    let statuses = response["statuses"].as_array().map_or(0, Vec::len);

    println!("  Caller received:        {} statuses, no error", statuses);
    match sampled {
        Some(sampled) => {
            println!("  Sample recovered:       invocation {}", sampled.id());
            println!("  Captured at:            {}", sampled.captured_at());
            print_meta(sampled.meta());
        }
        None => println!("  Sample:                 (already sampled this period)"),
    }
    println!();
    Ok(())
}
