//! # attest-core
//!
//! Runtime contract verification around arbitrary actions.
//!
//! This crate provides:
//! - The `Contract` trait and the `PredicateRegistry` that freezes each
//!   contract's guarantees and expectations into a shared definition
//! - The `VerificationEngine` that runs an action, checks its contract and
//!   feeds failures to the sampler and statistics sink
//! - The `VerificationPool` background workers used in asynchronous mode
//!
//! ## Usage
//!
//! ```rust,ignore
//! use attest_core::{CallOptions, Contract, DefinitionBuilder, VerificationEngine};
//!
//! let engine = VerificationEngine::<SearchContract>::new(&config);
//! let response = engine.call(Input::new().kwarg("q", "rust"), CallOptions::default(), || {
//!     client.search("rust")
//! })?;
//! ```

pub mod engine;
pub mod pool;
pub mod registry;

pub use engine::{CallOptions, EngineBuilder, VerificationEngine};
pub use pool::{PoolStats, RejectReason, Rejected, VerificationPool};
pub use registry::{Contract, ContractDefinition, DefinitionBuilder, PredicateRef, PredicateRegistry};

// ── Tests ─────────────────────────────────────────────────────────────────────
