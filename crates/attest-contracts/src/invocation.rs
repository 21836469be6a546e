//! Per-call invocation state.
//!
//! An `Invocation` is created by the engine for every verified call and
//! discarded when the call completes. It holds the captured input, the
//! action's output (set exactly once, at construction) and the mutable
//! `Meta` audit trail that predicates and the engine append to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Unique identifier for a single verified call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvocationId(pub uuid::Uuid);

impl InvocationId {
    /// Create a new, unique invocation ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for InvocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InvocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// The arguments a wrapped call was made with, captured verbatim.
///
/// Positional arguments keep their order. Named arguments are kept in a
/// JSON object so predicates can look them up by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Input {
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Set a named argument, replacing any previous value under `name`.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(name.into(), value.into());
        self
    }

    /// Look up a named argument.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.kwargs.get(name)
    }

    /// Named argument interpreted as a flag. Missing or non-boolean values
    /// read as `false`.
    pub fn flag(&self, name: &str) -> bool {
        self.get(name).and_then(Value::as_bool).unwrap_or(false)
    }
}

/// The audit trail of one invocation.
///
/// `checked` grows monotonically as predicates run, across both the
/// guarantee and the expectation phase. `notes` holds free-form annotations
/// written by predicates and is serialized flat next to the fixed keys.
/// `Invocation::note` keeps note names clear of `RESERVED_KEYS`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    /// Predicate identifiers in evaluation order.
    pub checked: Vec<String>,

    /// Where the sampler persisted this invocation, if it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_path: Option<String>,

    /// Snapshot of the call input.
    pub input: Input,

    #[serde(flatten)]
    pub notes: Map<String, Value>,
}

impl Meta {
    /// Keys owned by the fixed fields.
    pub const RESERVED_KEYS: [&'static str; 3] = ["checked", "sample_path", "input"];

    /// Prefix given to a note whose name collides with a fixed field.
    pub const NOTE_PREFIX: &'static str = "note_";

    /// The key a note called `key` is stored under.
    pub fn note_key(key: String) -> String {
        if Self::RESERVED_KEYS.contains(&key.as_str()) {
            format!("{}{}", Self::NOTE_PREFIX, key)
        } else {
            key
        }
    }
}

/// Everything the engine knows about one verified call.
///
/// `O` is the contract's output type. The output is `None` only when the
/// wrapped action itself failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation<O> {
    id: InvocationId,
    contract_name: String,
    captured_at: DateTime<Utc>,
    input: Input,
    output: Option<O>,
    meta: Meta,
}

impl<O> Invocation<O> {
    /// Capture a new invocation. `meta.input` starts as a copy of `input`.
    pub fn new(
        contract_name: impl Into<String>,
        input: Input,
        output: Option<O>,
        captured_at: DateTime<Utc>,
    ) -> Self {
        let meta = Meta {
            input: input.clone(),
            ..Meta::default()
        };
        Self {
            id: InvocationId::new(),
            contract_name: contract_name.into(),
            captured_at,
            input,
            output,
            meta,
        }
    }

    pub fn id(&self) -> InvocationId {
        self.id
    }

    pub fn contract_name(&self) -> &str {
        &self.contract_name
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn input(&self) -> &Input {
        &self.input
    }

    /// The action's output, or `None` if the action failed.
    pub fn output(&self) -> Option<&O> {
        self.output.as_ref()
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    /// Record a free-form annotation in the audit trail.
    ///
    /// A key that names a fixed `Meta` field is stored as `note_<key>`.
    pub fn note(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.meta
            .notes
            .insert(Meta::note_key(key.into()), value.into());
    }

    /// Append a predicate identifier to `meta.checked`.
    ///
    /// Called by the engine immediately before the predicate is evaluated.
    pub fn mark_checked(&mut self, predicate: impl Into<String>) {
        self.meta.checked.push(predicate.into());
    }

    /// Record where the sampler persisted this invocation.
    pub fn attach_sample_path(&mut self, path: impl Into<String>) {
        self.meta.sample_path = Some(path.into());
    }

    pub fn into_meta(self) -> Meta {
        self.meta
    }
}
