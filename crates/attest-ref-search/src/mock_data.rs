//! Simulated search API responses for the attest reference integration.
//!
//! All data in this module is hardcoded and fictional. No external systems are
//! contacted. Each fixture mirrors the shape a social search endpoint returns:
//! an object with a `statuses` array, each status carrying a nested `user`.

use serde_json::{json, Value};

// ── Fixtures ─────────────────────────────────────────────────────────────────

/// Which canned response the mock client serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fixture {
    /// Every status has a complete user record.
    Healthy,
    /// The search matched nothing.
    Empty,
    /// One status has lost its `user.id`.
    MissingUserId,
    /// Users are identified but some lack a screen name or follower count.
    MissingFollowers,
    /// The upstream answered with a bare error string instead of an object.
    Malformed,
    /// The upstream never answered.
    Timeout,
}

impl Fixture {
    pub const ALL: [Fixture; 6] = [
        Fixture::Healthy,
        Fixture::Empty,
        Fixture::MissingUserId,
        Fixture::MissingFollowers,
        Fixture::Malformed,
        Fixture::Timeout,
    ];
}

fn status(id: u64, text: &str, user: Value) -> Value {
    json!({
        "id": id,
        "text": text,
        "user": user
    })
}

/// Three statuses from three fully described users.
pub fn healthy_response(query: &str) -> Value {
    json!({
        "statuses": [
            status(1001, &format!("Shipping a new {query} release today"), json!({
                "id": 11, "screen_name": "ferris_fan", "followers_count": 4210
            })),
            status(1002, &format!("Notes from the {query} meetup"), json!({
                "id": 12, "screen_name": "borrowck", "followers_count": 880
            })),
            status(1003, &format!("Why we moved our parser to {query}"), json!({
                "id": 13, "screen_name": "lifetimes", "followers_count": 15030
            })),
        ],
        "search_metadata": { "query": query, "count": 3 }
    })
}

pub fn empty_response(query: &str) -> Value {
    json!({
        "statuses": [],
        "search_metadata": { "query": query, "count": 0 }
    })
}

/// The second status's user object has no `id`.
pub fn missing_user_id_response(query: &str) -> Value {
    json!({
        "statuses": [
            status(2001, &format!("{query} in production"), json!({
                "id": 21, "screen_name": "ops_team", "followers_count": 310
            })),
            status(2002, &format!("{query} question"), json!({
                "screen_name": "anonymous", "followers_count": 2
            })),
        ],
        "search_metadata": { "query": query, "count": 2 }
    })
}

/// User 32 has no screen name and user 33 has no follower count.
pub fn missing_followers_response(query: &str) -> Value {
    json!({
        "statuses": [
            status(3001, &format!("{query} tips"), json!({
                "id": 31, "screen_name": "tipster", "followers_count": 57
            })),
            status(3002, &format!("{query} benchmark"), json!({
                "id": 32, "followers_count": 12
            })),
            status(3003, &format!("{query} rant"), json!({
                "id": 33, "screen_name": "ranter"
            })),
        ],
        "search_metadata": { "query": query, "count": 3 }
    })
}

pub fn malformed_response() -> Value {
    json!("Rate limit exceeded")
}

/// The canned response for `fixture`, or `None` for `Timeout`.
pub fn response_for(fixture: Fixture, query: &str) -> Option<Value> {
    match fixture {
        Fixture::Healthy => Some(healthy_response(query)),
        Fixture::Empty => Some(empty_response(query)),
        Fixture::MissingUserId => Some(missing_user_id_response(query)),
        Fixture::MissingFollowers => Some(missing_followers_response(query)),
        Fixture::Malformed => Some(malformed_response()),
        Fixture::Timeout => None,
    }
}
