//! # attest-ref-search
//!
//! Reference integration for the attest contract runtime.
//!
//! A search client is wrapped in `SearchContract`, which guarantees every
//! returned status names its user and expects the result to be either empty
//! or made of complete user profiles. The scenarios drive the contract with
//! mock responses:
//!
//! 1. **Healthy / empty**: the contract holds via `non_empty_search` or
//!    `empty_search`.
//! 2. **Missing user id / malformed**: `response_structure` fails.
//! 3. **Missing profile data**: no expectation matches.
//! 4. **Upstream timeout**: the action itself fails (`unexpected_error`).
//! 5. **Background**: verification runs on the pool and the failure is
//!    recovered from its sample.
//!
//! All data is hardcoded and fictional. No external API calls are made.

pub mod client;
pub mod contract;
pub mod mock_data;
pub mod scenarios;

pub use client::{MockSearchClient, SearchService};
pub use contract::SearchContract;
