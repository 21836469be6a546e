//! The verification engine: runs a wrapped action and checks its contract.
//!
//! Every call follows the same pipeline:
//!
//!   Action → Enabled? → Guarantees (AND) → Expectations (OR) → Sample → Stats
//!
//! The action always runs on the caller's thread and its output is always
//! captured. When the contract is disabled nothing else happens. Otherwise
//! the predicate phases run either inline (`Sync`), with violations returned
//! to the caller, or as one unit on the `VerificationPool` (`Async`), where
//! the caller gets the output back immediately and violations are only
//! visible through samples and statistics.

use std::convert::Infallible;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use attest_contracts::{
    clock::{Clock, SystemClock},
    config::{AttestConfig, ContractSettings},
    error::{AttestError, AttestResult, PredicateError},
    invocation::{Input, Invocation, InvocationId, Meta},
    outcome::{ExecutionMode, FailureKind, Outcome},
    traits::{LogBoundary, Sampler, StatisticsSink},
};
use attest_sampler::{codec, FileSampler};
use attest_stats::{Statistics, TracingLog};

use crate::pool::{panic_message, VerificationPool};
use crate::registry::{Contract, ContractDefinition, PredicateRegistry};

/// Per-call options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// Overrides the configured and declared execution mode for this call.
    pub mode: Option<ExecutionMode>,
}

impl CallOptions {
    /// Verify inline and return violations to the caller.
    pub fn sync() -> Self {
        Self {
            mode: Some(ExecutionMode::Sync),
        }
    }

    /// Verify in the background.
    pub fn asynchronous() -> Self {
        Self {
            mode: Some(ExecutionMode::Async),
        }
    }
}

/// Builds a `VerificationEngine` for contract `C`.
///
/// Collaborators not supplied explicitly are derived from the configuration:
/// a `FileSampler` under `root_path`, a `Statistics` sink writing through
/// `TracingLog`, the shared `VerificationPool`, and the system clock.
pub struct EngineBuilder<C: Contract> {
    root_path: PathBuf,
    period_secs: u64,
    settings: ContractSettings,
    sampler: Option<Arc<dyn Sampler>>,
    stats: Option<Arc<dyn StatisticsSink>>,
    logger: Option<Arc<dyn LogBoundary>>,
    pool: Option<Arc<VerificationPool>>,
    clock: Option<Arc<dyn Clock>>,
    _contract: PhantomData<fn() -> C>,
}

impl<C: Contract> EngineBuilder<C> {
    fn new(config: &AttestConfig) -> Self {
        Self {
            root_path: config.root_path.clone(),
            period_secs: config.period_secs_for(C::NAME),
            settings: config.settings_for(C::NAME),
            sampler: None,
            stats: None,
            logger: None,
            pool: None,
            clock: None,
            _contract: PhantomData,
        }
    }

    pub fn sampler(mut self, sampler: Arc<dyn Sampler>) -> Self {
        self.sampler = Some(sampler);
        self
    }

    pub fn stats(mut self, stats: Arc<dyn StatisticsSink>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Logging boundary for the default statistics sink. Ignored when a
    /// sink is supplied with `stats`.
    pub fn logger(mut self, logger: Arc<dyn LogBoundary>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn pool(mut self, pool: Arc<VerificationPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Time source for capture timestamps and the default collaborators.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> VerificationEngine<C> {
        let definition = PredicateRegistry::definition_of::<C>();
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let sampler = self.sampler.unwrap_or_else(|| {
            Arc::new(
                FileSampler::new(self.root_path, C::NAME, self.period_secs)
                    .with_clock(Arc::clone(&clock)),
            )
        });
        let stats = self.stats.unwrap_or_else(|| {
            let logger = self.logger.unwrap_or_else(|| Arc::new(TracingLog));
            Arc::new(Statistics::with_logger(C::NAME, logger).with_clock(Arc::clone(&clock)))
        });
        let pool = self.pool.unwrap_or_else(VerificationPool::shared);

        debug!(
            contract = %C::NAME,
            enabled = self.settings.enabled,
            default_mode = ?definition.default_mode(),
            configured_mode = ?self.settings.mode,
            "verification engine built"
        );

        VerificationEngine {
            core: Arc::new(EngineCore {
                definition,
                sampler,
                stats,
            }),
            enabled: self.settings.enabled,
            configured_mode: self.settings.mode,
            pool,
            clock,
        }
    }
}

/// Verifies calls against contract `C`.
///
/// An engine is cheap to share: wrap it in an `Arc` and call it from any
/// number of threads. Each call gets its own `Invocation` and its own
/// contract instance.
pub struct VerificationEngine<C: Contract> {
    core: Arc<EngineCore<C>>,
    enabled: bool,
    configured_mode: Option<ExecutionMode>,
    pool: Arc<VerificationPool>,
    clock: Arc<dyn Clock>,
}

impl<C: Contract> VerificationEngine<C> {
    /// An engine for `C` with default collaborators derived from `config`.
    pub fn new(config: &AttestConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: &AttestConfig) -> EngineBuilder<C> {
        EngineBuilder::new(config)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn definition(&self) -> &ContractDefinition<C> {
        &self.core.definition
    }

    /// The mode a call with `options` runs in: the call's own choice, then
    /// the configured mode, then the contract's declared default.
    pub fn mode_for(&self, options: &CallOptions) -> ExecutionMode {
        options
            .mode
            .or(self.configured_mode)
            .unwrap_or_else(|| self.core.definition.default_mode())
    }

    /// Run `action` and verify its output against `C`.
    ///
    /// # Errors
    ///
    /// In `Sync` mode a violation is returned as `Guarantees`,
    /// `Expectations` or `Unexpected`, and a broken sampler or statistics
    /// sink surfaces as its own error when the contract otherwise held. In
    /// `Async` mode this only fails if the wrapped action fails, which
    /// `call` never does.
    ///
    /// # Panics
    ///
    /// A panic in `action` propagates to the caller unchanged and nothing is
    /// sampled or logged for it. Panics in predicates are caught and
    /// recorded as `unexpected_error`.
    pub fn call<F>(&self, input: Input, options: CallOptions, action: F) -> AttestResult<C::Output>
    where
        F: FnOnce() -> C::Output,
    {
        self.try_call(input, options, || Ok::<_, Infallible>(action()))
    }

    /// Like `call`, for an action that can fail.
    ///
    /// An action error is classified `unexpected_error`, sampled, logged and
    /// returned as `AttestError::Unexpected` in either mode, since there is
    /// no output to hand back.
    pub fn try_call<F, E>(&self, input: Input, options: CallOptions, action: F) -> AttestResult<C::Output>
    where
        F: FnOnce() -> Result<C::Output, E>,
        E: Into<PredicateError>,
    {
        let result = action();
        let captured_at = self.clock.now();

        if !self.enabled {
            return result.map_err(|e| AttestError::Unexpected {
                contract: C::NAME.to_string(),
                meta: Box::new(Meta {
                    input,
                    ..Meta::default()
                }),
                source: e.into(),
            });
        }

        let output = match result {
            Ok(output) => output,
            Err(e) => {
                let invocation = Invocation::new(C::NAME, input, None, captured_at);
                warn!(
                    contract = %C::NAME,
                    invocation_id = %invocation.id(),
                    "wrapped action failed"
                );
                return Err(self.core.fail(invocation, FailureKind::UnexpectedError, Some(e.into())));
            }
        };

        let invocation = Invocation::new(C::NAME, input, Some(output.clone()), captured_at);

        match self.mode_for(&options) {
            ExecutionMode::Sync => {
                let mut invocation = invocation;
                let outcome = self.core.evaluate(&mut invocation);
                self.core.complete(invocation, outcome)?;
            }
            ExecutionMode::Async => self.schedule(invocation),
        }

        Ok(output)
    }

    /// Hand the predicate phases for `invocation` to the pool. If the pool
    /// refuses the unit it runs here instead; either way nothing is returned
    /// to the caller.
    fn schedule(&self, mut invocation: Invocation<C::Output>) {
        let invocation_id = invocation.id();
        let worker_core = Arc::clone(&self.core);
        let observer_core = Arc::clone(&self.core);

        let submitted = self.pool.submit_with_callback(
            move || {
                let outcome = worker_core.evaluate(&mut invocation);
                (invocation, outcome)
            },
            move |result| observer_core.observe(invocation_id, result),
        );

        if let Err(rejected) = submitted {
            warn!(
                contract = %C::NAME,
                invocation_id = %invocation_id,
                reason = ?rejected.reason(),
                "verification pool rejected unit, verifying inline"
            );
            rejected.run_inline();
        } else {
            debug!(
                contract = %C::NAME,
                invocation_id = %invocation_id,
                "verification scheduled"
            );
        }
    }

    /// Serialize an invocation into the opaque snapshot form samples use.
    pub fn serialize(invocation: &Invocation<C::Output>) -> AttestResult<Vec<u8>> {
        codec::serialize(invocation)
    }

    /// Decode a snapshot written by `serialize`.
    pub fn deserialize(bytes: &[u8]) -> AttestResult<Invocation<C::Output>> {
        codec::deserialize(bytes)
    }
}

/// The state a background unit needs; shared between the engine and its
/// in-flight units.
struct EngineCore<C: Contract> {
    definition: Arc<ContractDefinition<C>>,
    sampler: Arc<dyn Sampler>,
    stats: Arc<dyn StatisticsSink>,
}

impl<C: Contract> EngineCore<C> {
    /// Run both predicate phases against a fresh contract instance.
    ///
    /// Predicate errors and panics become `unexpected_error`.
    fn evaluate(&self, invocation: &mut Invocation<C::Output>) -> Outcome {
        let mut contract = C::default();
        let phases = std::panic::catch_unwind(AssertUnwindSafe(|| {
            self.run_phases(&mut contract, invocation)
        }));

        match phases {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => Outcome::unexpected(e),
            Err(payload) => Outcome::unexpected(
                format!("predicate panicked: {}", panic_message(payload.as_ref())).into(),
            ),
        }
    }

    fn run_phases(
        &self,
        contract: &mut C,
        invocation: &mut Invocation<C::Output>,
    ) -> Result<Outcome, PredicateError> {
        for guarantee in self.definition.guarantees() {
            invocation.mark_checked(guarantee.id());
            if !guarantee.evaluate(contract, invocation)? {
                return Ok(Outcome::failure(FailureKind::GuaranteeFailure));
            }
        }

        let expectations = self.definition.expectations();
        if expectations.is_empty() {
            return Ok(Outcome::Success { matched: None });
        }

        for expectation in expectations {
            invocation.mark_checked(expectation.id());
            if expectation.evaluate(contract, invocation)? {
                return Ok(Outcome::Success {
                    matched: Some(expectation.id().to_string()),
                });
            }
        }

        Ok(Outcome::failure(FailureKind::ExpectationFailure))
    }

    /// Record `outcome`; a failure becomes the caller-facing error.
    ///
    /// A success with no matched expectation is not recorded.
    fn complete(&self, mut invocation: Invocation<C::Output>, outcome: Outcome) -> AttestResult<()> {
        match outcome {
            Outcome::Success { matched: None } => {
                debug!(
                    contract = %C::NAME,
                    invocation_id = %invocation.id(),
                    "contract held with no expectations"
                );
                Ok(())
            }
            Outcome::Success { matched: Some(rule) } => {
                debug!(
                    contract = %C::NAME,
                    invocation_id = %invocation.id(),
                    rule = %rule,
                    "contract held"
                );
                self.record(&mut invocation, &rule, None)
            }
            Outcome::Failure { kind, error } => Err(self.fail(invocation, kind, error)),
        }
    }

    /// Record a failure and build the error the caller sees for it.
    ///
    /// Diagnostic errors are logged by `record`; the violation takes
    /// precedence over them.
    fn fail(
        &self,
        mut invocation: Invocation<C::Output>,
        kind: FailureKind,
        error: Option<PredicateError>,
    ) -> AttestError {
        let error_text = error.as_ref().map(|e| e.to_string());
        warn!(
            contract = %C::NAME,
            invocation_id = %invocation.id(),
            rule = %kind,
            checked = ?invocation.meta().checked,
            error = error_text.as_deref().unwrap_or(""),
            "contract violated"
        );

        let _ = self.record(&mut invocation, kind.rule(), error_text.as_deref());
        Self::violation(kind, error, invocation.into_meta())
    }

    /// Sample the invocation under `rule` and emit its statistics record.
    ///
    /// The sink is called even if the sampler failed; the first diagnostic
    /// error is returned.
    fn record(
        &self,
        invocation: &mut Invocation<C::Output>,
        rule: &str,
        error: Option<&str>,
    ) -> AttestResult<()> {
        let sampled = self.sampler.sample(rule, &|| codec::serialize(&*invocation));
        let sampled = match sampled {
            Ok(Some(path)) => {
                info!(
                    contract = %C::NAME,
                    invocation_id = %invocation.id(),
                    rule = %rule,
                    path = %path.display(),
                    "invocation sampled"
                );
                invocation.attach_sample_path(path.display().to_string());
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => {
                error!(
                    contract = %C::NAME,
                    invocation_id = %invocation.id(),
                    rule = %rule,
                    error = %e,
                    "sampler failed"
                );
                Err(e)
            }
        };

        let logged = self.stats.log(rule, invocation.meta(), error).map_err(|e| {
            error!(
                contract = %C::NAME,
                invocation_id = %invocation.id(),
                rule = %rule,
                error = %e,
                "statistics sink failed"
            );
            e
        });

        sampled.and(logged)
    }

    /// Completion callback for a background unit. Nothing reaches the
    /// original caller from here.
    fn observe(
        &self,
        invocation_id: InvocationId,
        result: std::thread::Result<(Invocation<C::Output>, Outcome)>,
    ) {
        match result {
            Ok((invocation, outcome)) => {
                let _ = self.complete(invocation, outcome);
            }
            Err(payload) => error!(
                contract = %C::NAME,
                invocation_id = %invocation_id,
                panic = %panic_message(payload.as_ref()),
                "background verification aborted"
            ),
        }
    }

    fn violation(kind: FailureKind, error: Option<PredicateError>, meta: Meta) -> AttestError {
        let contract = C::NAME.to_string();
        let meta = Box::new(meta);
        match kind {
            FailureKind::GuaranteeFailure => AttestError::Guarantees { contract, meta },
            FailureKind::ExpectationFailure => AttestError::Expectations { contract, meta },
            FailureKind::UnexpectedError => AttestError::Unexpected {
                contract,
                meta,
                source: error.unwrap_or_else(|| "unknown error".into()),
            },
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
