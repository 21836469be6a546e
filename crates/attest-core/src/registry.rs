//! Predicate registration and discovery.
//!
//! A contract type declares its predicates once, in `Contract::define`,
//! as an explicit table of identifier → function. The registry freezes that
//! table into a `ContractDefinition` the first time the type is used and
//! shares it, read-only, with every later invocation on any thread.
//!
//! Naming conventions carried by identifiers:
//!
//! - `guarantee_<id>` / `expect_<id>`: class prefixes understood by
//!   `DefinitionBuilder::predicate`; the stored identifier drops the prefix
//! - `<id>_async`: marks the predicate asynchronous; any such predicate
//!   makes the contract verify in the background by default
//!
//! Within each class predicates are ordered lexicographically by
//! identifier, so evaluation order and the `checked` trail are reproducible.

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use attest_contracts::{
    error::PredicateResult,
    invocation::Invocation,
    outcome::ExecutionMode,
};

/// Method-name prefix that marks a guarantee.
pub const GUARANTEE_PREFIX: &str = "guarantee_";

/// Method-name prefix that marks an expectation.
pub const EXPECTATION_PREFIX: &str = "expect_";

/// Identifier suffix that marks a predicate asynchronous.
pub const ASYNC_SUFFIX: &str = "_async";

/// A predicate: inspects the invocation (and may annotate its meta) through
/// a per-invocation contract instance.
pub type PredicateFn<C> = fn(&mut C, &mut Invocation<<C as Contract>::Output>) -> PredicateResult;

/// A contract type: a name, an output type, and a predicate table.
///
/// A fresh `Default` instance is created for every invocation, so fields on
/// the implementing type can carry intermediate results from one predicate
/// to the next within a single call.
///
/// ```rust,ignore
/// #[derive(Default)]
/// struct UserLookup;
///
/// impl Contract for UserLookup {
///     type Output = serde_json::Value;
///     const NAME: &'static str = "UserLookup";
///
///     fn define(def: DefinitionBuilder<Self>) -> DefinitionBuilder<Self> {
///         def.guarantee("has_user_id", |_, inv| {
///             Ok(inv.output().is_some_and(|o| o["user"]["id"].is_number()))
///         })
///     }
/// }
/// ```
pub trait Contract: Default + Send + 'static {
    /// What the wrapped action returns.
    type Output: Clone + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Namespace for samples, log records, and configuration.
    const NAME: &'static str;

    /// Register this contract's predicates.
    fn define(definition: DefinitionBuilder<Self>) -> DefinitionBuilder<Self>;
}

/// One registered predicate.
pub struct PredicateRef<C: Contract> {
    id: String,
    is_async: bool,
    check: PredicateFn<C>,
}

impl<C: Contract> PredicateRef<C> {
    fn new(id: String, check: PredicateFn<C>) -> Self {
        let is_async = id.ends_with(ASYNC_SUFFIX);
        Self { id, is_async, check }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_async(&self) -> bool {
        self.is_async
    }

    /// Run the predicate against `invocation`.
    pub fn evaluate(&self, contract: &mut C, invocation: &mut Invocation<C::Output>) -> PredicateResult {
        (self.check)(contract, invocation)
    }
}

impl<C: Contract> Clone for PredicateRef<C> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            is_async: self.is_async,
            check: self.check,
        }
    }
}

impl<C: Contract> std::fmt::Debug for PredicateRef<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredicateRef")
            .field("id", &self.id)
            .field("is_async", &self.is_async)
            .finish()
    }
}

/// The frozen predicate table of one contract type.
pub struct ContractDefinition<C: Contract> {
    name: &'static str,
    guarantees: Vec<PredicateRef<C>>,
    expectations: Vec<PredicateRef<C>>,
    default_mode: ExecutionMode,
}

impl<C: Contract> ContractDefinition<C> {
    /// Run `C::define` and freeze the result. Prefer
    /// `PredicateRegistry::definition_of`, which builds each type only once.
    pub fn build() -> Self {
        C::define(DefinitionBuilder::new()).build()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Guarantees in evaluation order.
    pub fn guarantees(&self) -> &[PredicateRef<C>] {
        &self.guarantees
    }

    /// Expectations in evaluation order.
    pub fn expectations(&self) -> &[PredicateRef<C>] {
        &self.expectations
    }

    /// Mode used when neither the call nor the configuration picks one.
    pub fn default_mode(&self) -> ExecutionMode {
        self.default_mode
    }
}

impl<C: Contract> std::fmt::Debug for ContractDefinition<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractDefinition")
            .field("name", &self.name)
            .field("guarantees", &self.guarantees)
            .field("expectations", &self.expectations)
            .field("default_mode", &self.default_mode)
            .finish()
    }
}

/// Collects predicates for `Contract::define`.
///
/// Registering an identifier twice in the same class replaces the earlier
/// predicate.
pub struct DefinitionBuilder<C: Contract> {
    guarantees: BTreeMap<String, PredicateRef<C>>,
    expectations: BTreeMap<String, PredicateRef<C>>,
    default_mode: Option<ExecutionMode>,
}

impl<C: Contract> DefinitionBuilder<C> {
    fn new() -> Self {
        Self {
            guarantees: BTreeMap::new(),
            expectations: BTreeMap::new(),
            default_mode: None,
        }
    }

    /// Register a guarantee: it must hold for every invocation.
    pub fn guarantee(mut self, id: impl Into<String>, check: PredicateFn<C>) -> Self {
        let id = id.into();
        self.guarantees.insert(id.clone(), PredicateRef::new(id, check));
        self
    }

    /// Register an expectation: at least one must hold per invocation.
    pub fn expectation(mut self, id: impl Into<String>, check: PredicateFn<C>) -> Self {
        let id = id.into();
        self.expectations.insert(id.clone(), PredicateRef::new(id, check));
        self
    }

    /// Register by method-style name, classifying on `guarantee_` /
    /// `expect_`. Names with neither prefix are helpers and are skipped.
    pub fn predicate(self, name: &str, check: PredicateFn<C>) -> Self {
        if let Some(id) = name.strip_prefix(GUARANTEE_PREFIX) {
            self.guarantee(id, check)
        } else if let Some(id) = name.strip_prefix(EXPECTATION_PREFIX) {
            self.expectation(id, check)
        } else {
            debug!(contract = %C::NAME, name = %name, "not a predicate name; skipped");
            self
        }
    }

    /// Declare the contract's default execution mode explicitly.
    pub fn default_mode(mut self, mode: ExecutionMode) -> Self {
        self.default_mode = Some(mode);
        self
    }

    fn build(self) -> ContractDefinition<C> {
        let any_async = self
            .guarantees
            .values()
            .chain(self.expectations.values())
            .any(PredicateRef::is_async);
        let default_mode = self.default_mode.unwrap_or(if any_async {
            ExecutionMode::Async
        } else {
            ExecutionMode::Sync
        });

        ContractDefinition {
            name: C::NAME,
            guarantees: self.guarantees.into_values().collect(),
            expectations: self.expectations.into_values().collect(),
            default_mode,
        }
    }
}

type DefinitionMap = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

fn definitions() -> &'static RwLock<DefinitionMap> {
    static DEFINITIONS: OnceLock<RwLock<DefinitionMap>> = OnceLock::new();
    DEFINITIONS.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Process-wide cache of contract definitions.
pub struct PredicateRegistry;

impl PredicateRegistry {
    /// The definition of `C`, built on first access and shared afterwards.
    pub fn definition_of<C: Contract>() -> Arc<ContractDefinition<C>> {
        let key = TypeId::of::<C>();

        if let Some(existing) = definitions().read().get(&key) {
            return downcast(Arc::clone(existing));
        }

        // Built outside the lock; if two threads race, the first insert wins
        // and both return the same Arc.
        let built: Arc<dyn Any + Send + Sync> = Arc::new(ContractDefinition::<C>::build());
        let stored = Arc::clone(definitions().write().entry(key).or_insert(built));

        let definition = downcast::<C>(stored);
        debug!(
            contract = %C::NAME,
            guarantees = definition.guarantees().len(),
            expectations = definition.expectations().len(),
            "contract definition registered"
        );
        definition
    }

    /// `C`'s guarantees in evaluation order.
    pub fn guarantees_of<C: Contract>() -> Vec<PredicateRef<C>> {
        Self::definition_of::<C>().guarantees().to_vec()
    }

    /// `C`'s expectations in evaluation order.
    pub fn expectations_of<C: Contract>() -> Vec<PredicateRef<C>> {
        Self::definition_of::<C>().expectations().to_vec()
    }
}

fn downcast<C: Contract>(entry: Arc<dyn Any + Send + Sync>) -> Arc<ContractDefinition<C>> {
    entry
        .downcast::<ContractDefinition<C>>()
        .unwrap_or_else(|_| panic!("definition registry entry for '{}' has the wrong type", C::NAME))
}
