//! A mock search client and the service that wraps it in `SearchContract`.
//!
//! `MockSearchClient` plays the role of a remote search API. `SearchService`
//! is the application code: it calls the client through a
//! `VerificationEngine` and summarizes who is talking about the query.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use attest_contracts::{error::AttestResult, invocation::Input};
use attest_core::{CallOptions, VerificationEngine};

use crate::contract::SearchContract;
use crate::mock_data::{response_for, Fixture};

/// Failure talking to the search backend.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search for '{query}' timed out after {timeout_ms} ms")]
    Timeout { query: String, timeout_ms: u64 },
}

/// Serves one fixed fixture for every query.
#[derive(Debug, Clone)]
pub struct MockSearchClient {
    fixture: Fixture,
    timeout_ms: u64,
}

impl MockSearchClient {
    pub fn new(fixture: Fixture) -> Self {
        Self {
            fixture,
            timeout_ms: 2_000,
        }
    }

    pub fn search(&self, query: &str) -> Result<Value, SearchError> {
        debug!(query = %query, fixture = ?self.fixture, "mock search");
        response_for(self.fixture, query).ok_or_else(|| SearchError::Timeout {
            query: query.to_string(),
            timeout_ms: self.timeout_ms,
        })
    }
}

/// One row of the engagement summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserStat {
    pub screen_name: String,
    pub followers: u64,
}

/// Searches through the contract-verified client.
pub struct SearchService {
    client: MockSearchClient,
    engine: VerificationEngine<SearchContract>,
}

impl SearchService {
    pub fn new(client: MockSearchClient, engine: VerificationEngine<SearchContract>) -> Self {
        Self { client, engine }
    }

    pub fn engine(&self) -> &VerificationEngine<SearchContract> {
        &self.engine
    }

    /// Run `query` against the backend under `SearchContract`.
    pub fn search(&self, query: &str, options: CallOptions) -> AttestResult<Value> {
        let input = Input::new().arg(query);
        self.engine
            .try_call(input, options, || self.client.search(query))
    }
}

/// Users in `response`, most-followed first, capped at `limit`.
///
/// Statuses without a screen name are skipped; a missing follower count
/// reads as zero. A user seen in several statuses is listed once.
pub fn top_users(response: &Value, limit: usize) -> Vec<UserStat> {
    let mut users: BTreeMap<String, u64> = BTreeMap::new();
    if let Some(statuses) = response.get("statuses").and_then(Value::as_array) {
        for status in statuses {
            let user = &status["user"];
            if let Some(name) = user["screen_name"].as_str() {
                let followers = user["followers_count"].as_u64().unwrap_or(0);
                users.insert(name.to_string(), followers);
            }
        }
    }

    let mut stats: Vec<UserStat> = users
        .into_iter()
        .map(|(screen_name, followers)| UserStat {
            screen_name,
            followers,
        })
        .collect();
    stats.sort_by(|a, b| b.followers.cmp(&a.followers));
    stats.truncate(limit);
    stats
}

/// Total followers across the listed users.
pub fn engagement(users: &[UserStat]) -> u64 {
    users.iter().map(|u| u.followers).sum()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
