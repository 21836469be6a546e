//! The contract a search response must honour.
//!
//! Guarantee:
//!   - `response_structure`: the response is an object with a `statuses`
//!     array and every status names its user by id
//!
//! Expectations (one must hold):
//!   - `empty_search`: nothing was found
//!   - `non_empty_search`: every user has a screen name and a follower count
//!
//! Predicates annotate the audit trail so a sampled failure explains itself:
//! `response_type`, `tweets_count_without_user_id`,
//! `user_ids_without_screen_name` and `user_ids_without_followers_count`.

use serde_json::Value;

use attest_contracts::{
    error::PredicateResult,
    invocation::Invocation,
    outcome::ExecutionMode,
};
use attest_core::{Contract, DefinitionBuilder};

/// Contract for the search client. Verifies in the background by default.
#[derive(Debug, Default)]
pub struct SearchContract {
    /// Statuses that carry a user id, kept from the guarantee for the
    /// expectations.
    tweets: Vec<Value>,
}

impl Contract for SearchContract {
    type Output = Value;
    const NAME: &'static str = "SearchContract";

    fn define(def: DefinitionBuilder<Self>) -> DefinitionBuilder<Self> {
        def.predicate("guarantee_response_structure", Self::response_structure)
            .predicate("expect_empty_search", Self::empty_search)
            .predicate("expect_non_empty_search", Self::non_empty_search)
            .default_mode(ExecutionMode::Async)
    }
}

impl SearchContract {
    fn response_structure(&mut self, inv: &mut Invocation<Value>) -> PredicateResult {
        let Some(response) = inv.output() else {
            inv.note("response_type", "none");
            return Ok(false);
        };
        let response_type = json_type(response);
        let Some(statuses) = response.get("statuses").and_then(Value::as_array) else {
            inv.note("response_type", response_type);
            return Ok(false);
        };

        let tweets: Vec<Value> = statuses
            .iter()
            .filter(|s| !user_field(s, "id").is_null())
            .cloned()
            .collect();
        let without_user_id = statuses.len() - tweets.len();

        inv.note("response_type", response_type);
        inv.note("tweets_count_without_user_id", without_user_id);
        self.tweets = tweets;

        Ok(without_user_id == 0)
    }

    fn empty_search(&mut self, _inv: &mut Invocation<Value>) -> PredicateResult {
        Ok(self.tweets.is_empty())
    }

    fn non_empty_search(&mut self, inv: &mut Invocation<Value>) -> PredicateResult {
        let without_name = self.user_ids_lacking("screen_name");
        let names_ok = without_name.is_empty();
        inv.note("user_ids_without_screen_name", without_name);
        if !names_ok {
            return Ok(false);
        }

        let without_followers = self.user_ids_lacking("followers_count");
        let followers_ok = without_followers.is_empty();
        inv.note("user_ids_without_followers_count", without_followers);
        Ok(followers_ok)
    }

    fn user_ids_lacking(&self, field: &str) -> Vec<Value> {
        self.tweets
            .iter()
            .filter(|s| user_field(s, field).is_null())
            .map(|s| user_field(s, "id").clone())
            .collect()
    }
}

/// `status.user.<field>`, or `Null` when any step is missing.
fn user_field<'a>(status: &'a Value, field: &str) -> &'a Value {
    &status["user"][field]
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
