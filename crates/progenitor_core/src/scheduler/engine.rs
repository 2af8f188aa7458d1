use super::tiers::Tier;
use crate::division::DivisionPolicy;
use crate::error::{ProcessError, Result, SimulationError};
use crate::listener::{Listener, ListenerLog, RecordSink};
use crate::metrics::Metrics;
use crate::process::{Delta, StepContext};
use crate::state::{AllocationPolicy, AllocationRound, GrantEntry, SimulationState, StateManager};
use progenitor_data::{GrantRecord, ListenerRecord};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;

/// Where the scheduler is within its step cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    TierExecuting(usize),
    ListenersRunning,
    DivisionCheck,
    StepComplete,
    Terminated,
}

/// Result of one successful step.
#[derive(Debug)]
pub enum StepOutcome {
    Continued,
    Divided,
}

/// How a [`Scheduler::run`] loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    Divided,
    StepLimit,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerOptions {
    pub policy: AllocationPolicy,
    pub seed: u64,
    pub dt: f64,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            policy: AllocationPolicy::default(),
            seed: 0,
            dt: 1.0,
        }
    }
}

/// Per-unit random stream, independent of thread scheduling.
fn unit_rng(seed: u64, step: u64, tier: usize, unit: usize) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(step).wrapping_add(0x5EED));
    rng.set_stream(((tier as u64) << 32) | unit as u64);
    rng
}

/// Applies one unit's delta to `state`.
///
/// Fails with [`SimulationError::ResourceConservationViolation`] if any count
/// would turn negative; `diagnostics` is attached to the error.
pub fn apply_delta(
    state: &mut SimulationState,
    delta: Delta,
    tier: usize,
    diagnostics: &SimulationState,
) -> Result<()> {
    let violation = |resource: String, detail: String| SimulationError::ResourceConservationViolation {
        step: diagnostics.step,
        tier,
        resource,
        detail,
        diagnostics: Box::new(diagnostics.snapshot()),
    };

    for (id, change) in &delta.bulk {
        state
            .bulk
            .apply_delta(id, *change)
            .map_err(|e| violation(format!("bulk:{}", id), e.to_string()))?;
    }
    for (id, change) in &delta.environment {
        state
            .environment
            .apply_delta(id, *change)
            .map_err(|e| violation(format!("environment:{}", id), e.to_string()))?;
    }
    for id in &delta.destroyed {
        if state.unique.destroy(*id).is_none() {
            return Err(violation(
                format!("unique#{}", id),
                "object destroyed twice or never existed".to_string(),
            ));
        }
    }
    for object in delta.created {
        state.unique.create(&object.kind, object.mass_fg, state.step);
    }
    Ok(())
}

/// Drives one cell through discrete time steps.
///
/// Each step runs every tier in order. Within a tier all units request
/// against the tier-start state, grants are resolved, `evolve` runs in
/// parallel and the deltas are merged in unit order. Listeners then observe
/// the merged state and the division policy gets the last word.
///
/// A step works on a private copy of the state. Any error discards the copy,
/// so the committed state is always the one before the failed step.
pub struct Scheduler {
    tiers: Vec<Tier>,
    listeners: Vec<Box<dyn Listener>>,
    division: Option<Box<dyn DivisionPolicy>>,
    sink: Option<Box<dyn RecordSink>>,
    metrics: Option<Arc<Metrics>>,
    options: SchedulerOptions,
    state: SimulationState,
    phase: Phase,
    log: ListenerLog,
    last_grants: Vec<GrantRecord>,
    daughters: Option<(SimulationState, SimulationState)>,
}

impl Scheduler {
    pub fn new(tiers: Vec<Tier>, state: SimulationState, options: SchedulerOptions) -> Result<Self> {
        if !(options.dt > 0.0 && options.dt.is_finite()) {
            return Err(SimulationError::configuration(format!(
                "time step must be positive, got {}",
                options.dt
            )));
        }
        let mut ids = std::collections::BTreeSet::new();
        for unit in tiers.iter().flat_map(|t| &t.units) {
            if !ids.insert(unit.id().to_string()) {
                return Err(SimulationError::configuration(format!(
                    "duplicate process unit '{}'",
                    unit.id()
                )));
            }
        }
        Ok(Self {
            tiers,
            listeners: Vec::new(),
            division: None,
            sink: None,
            metrics: None,
            options,
            state,
            phase: Phase::Idle,
            log: ListenerLog::default(),
            last_grants: Vec::new(),
            daughters: None,
        })
    }

    /// Listeners run in the order they were added.
    pub fn add_listener(&mut self, listener: Box<dyn Listener>) {
        self.listeners.push(listener);
    }

    pub fn set_division(&mut self, division: Box<dyn DivisionPolicy>) {
        self.division = Some(division);
    }

    pub fn set_sink(&mut self, sink: Box<dyn RecordSink>) {
        self.sink = Some(sink);
    }

    /// Returns the sink, e.g. to finish a record file after the run.
    pub fn take_sink(&mut self) -> Option<Box<dyn RecordSink>> {
        self.sink.take()
    }

    pub fn set_metrics(&mut self, metrics: Arc<Metrics>) {
        self.metrics = Some(metrics);
    }

    #[must_use]
    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn log(&self) -> &ListenerLog {
        &self.log
    }

    /// Grants logged during the last committed step.
    #[must_use]
    pub fn last_grants(&self) -> &[GrantRecord] {
        &self.last_grants
    }

    #[must_use]
    pub fn daughters(&self) -> Option<&(SimulationState, SimulationState)> {
        self.daughters.as_ref()
    }

    pub fn take_daughters(&mut self) -> Option<(SimulationState, SimulationState)> {
        self.daughters.take()
    }

    #[must_use]
    pub fn tier_names(&self) -> Vec<&str> {
        self.tiers.iter().map(|t| t.name.as_str()).collect()
    }

    /// Executes one full step.
    pub fn step(&mut self) -> Result<StepOutcome> {
        if self.phase == Phase::Terminated {
            return Err(SimulationError::Terminated(self.state.step));
        }
        let started = Instant::now();
        match self.execute_step() {
            Ok((working, records, grants, daughters)) => {
                if let Some(sink) = self.sink.as_mut() {
                    for record in &records {
                        if let Err(source) = sink.write_record(record) {
                            self.phase = Phase::Idle;
                            return Err(SimulationError::RecordSink {
                                step: working.step,
                                source,
                            });
                        }
                    }
                }

                self.state = working;
                for listener in &mut self.listeners {
                    listener.commit(&self.state);
                }
                self.log.append(records);
                self.last_grants = grants;
                if let Some(metrics) = &self.metrics {
                    metrics.record_step(
                        started.elapsed(),
                        self.state.step,
                        self.state.dry_mass_fg(),
                        self.state.unique.len(),
                    );
                }

                if let Some(pair) = daughters {
                    tracing::info!(
                        step = self.state.step,
                        cell = %self.state.identity.cell_id,
                        "Division criterion met"
                    );
                    self.daughters = Some(pair);
                    self.phase = Phase::Terminated;
                    Ok(StepOutcome::Divided)
                } else {
                    self.phase = Phase::StepComplete;
                    Ok(StepOutcome::Continued)
                }
            }
            Err(e) => {
                tracing::error!(step = self.state.step, error = %e, "Step aborted");
                self.phase = Phase::Idle;
                Err(e)
            }
        }
    }

    #[allow(clippy::type_complexity)]
    fn execute_step(
        &mut self,
    ) -> Result<(
        SimulationState,
        Vec<ListenerRecord>,
        Vec<GrantRecord>,
        Option<(SimulationState, SimulationState)>,
    )> {
        let committed = &self.state;
        let mut working = committed.clone();
        let step = committed.step;
        let mut grants: Vec<GrantRecord> = Vec::new();

        for (tier_idx, tier) in self.tiers.iter().enumerate() {
            self.phase = Phase::TierExecuting(tier_idx);
            let ctx = StepContext {
                step,
                time_s: working.time_s,
                dt: self.options.dt,
                tier: tier_idx,
            };

            let mut round = AllocationRound::new(self.options.policy);
            for unit in &tier.units {
                let idx = round.register(unit.id());
                for request in unit.request(&working, &ctx) {
                    round.request(idx, request);
                }
            }
            let (allocations, entries) = round.finalize(&working);
            grants.extend(entries.into_iter().map(|e: GrantEntry| GrantRecord {
                step,
                tier: tier_idx,
                resource: e.resource.to_string(),
                requester: e.requester,
                requested: e.requested,
                granted: e.granted,
            }));

            let seed = self.options.seed;
            let tier_view = &working;
            let results: Vec<std::result::Result<Delta, ProcessError>> = tier
                .units
                .par_iter()
                .zip(allocations.par_iter())
                .enumerate()
                .map(|(unit_idx, (unit, allocation))| {
                    let mut rng = unit_rng(seed, step, tier_idx, unit_idx);
                    let delta = unit.evolve(allocation, tier_view, &ctx, &mut rng)?;
                    delta.check_within(allocation, tier_view)?;
                    Ok(delta)
                })
                .collect();

            for (unit, result) in tier.units.iter().zip(results) {
                let delta = result.map_err(|source| SimulationError::UnitExecutionFailure {
                    step,
                    tier: tier_idx,
                    unit: unit.id().to_string(),
                    source,
                })?;
                apply_delta(&mut working, delta, tier_idx, committed)?;
            }
            tracing::trace!(step, tier = tier_idx, name = %tier.name, "Tier merged");
        }

        working.step = step + 1;
        working.time_s += self.options.dt;

        self.phase = Phase::ListenersRunning;
        let records: Vec<ListenerRecord> = self
            .listeners
            .iter()
            .map(|l| l.observe(&working, &grants))
            .collect();

        self.phase = Phase::DivisionCheck;
        let daughters = self.division.as_ref().and_then(|d| d.divide(&working));

        Ok((working, records, grants, daughters))
    }

    /// Steps until division or until `max_steps` steps have run.
    pub fn run(&mut self, max_steps: u64) -> Result<RunEnd> {
        for _ in 0..max_steps {
            if let StepOutcome::Divided = self.step()? {
                return Ok(RunEnd::Divided);
            }
        }
        Ok(RunEnd::StepLimit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Process;
    use crate::state::{Allocation, BulkMolecules, CellIdentity, LocalEnvironment, Request, UniqueMolecules};
    use uuid::Uuid;

    struct Consume {
        id: &'static str,
        molecule: &'static str,
        amount: u64,
    }

    impl Process for Consume {
        fn id(&self) -> &str {
            self.id
        }

        fn request(&self, _state: &SimulationState, _ctx: &StepContext) -> Vec<Request> {
            vec![Request::bulk(self.molecule, self.amount)]
        }

        fn evolve(
            &self,
            allocation: &Allocation,
            _state: &SimulationState,
            _ctx: &StepContext,
            _rng: &mut ChaCha8Rng,
        ) -> std::result::Result<Delta, ProcessError> {
            let mut delta = Delta::noop();
            delta.add_bulk(self.molecule, -(allocation.bulk(self.molecule) as i64));
            Ok(delta)
        }
    }

    struct Fail;

    impl Process for Fail {
        fn id(&self) -> &str {
            "fail"
        }

        fn request(&self, _state: &SimulationState, _ctx: &StepContext) -> Vec<Request> {
            Vec::new()
        }

        fn evolve(
            &self,
            _allocation: &Allocation,
            _state: &SimulationState,
            _ctx: &StepContext,
            _rng: &mut ChaCha8Rng,
        ) -> std::result::Result<Delta, ProcessError> {
            Err(ProcessError::failed("boom"))
        }
    }

    fn state(atp: u64) -> SimulationState {
        let mut bulk = BulkMolecules::default();
        bulk.insert("ATP", atp, 1.0);
        SimulationState {
            identity: CellIdentity {
                cell_id: Uuid::nil(),
                parent_id: None,
                generation: 0,
            },
            step: 0,
            time_s: 0.0,
            bulk,
            unique: UniqueMolecules::default(),
            environment: LocalEnvironment::default(),
        }
    }

    fn consume(id: &'static str, amount: u64) -> Box<dyn Process> {
        Box::new(Consume {
            id,
            molecule: "ATP",
            amount,
        })
    }

    #[test]
    fn test_oversubscribed_tier_is_scaled() {
        let tiers = vec![Tier::new("t0", vec![consume("a", 80), consume("b", 80)])];
        let mut scheduler = Scheduler::new(tiers, state(100), SchedulerOptions::default()).unwrap();
        scheduler.step().unwrap();
        let grants = scheduler.last_grants();
        assert_eq!(grants.len(), 2);
        assert_eq!(grants[0].granted, 50);
        assert_eq!(grants[1].granted, 50);
        assert_eq!(scheduler.state().bulk.available("ATP"), 0);
        assert_eq!(scheduler.phase(), Phase::StepComplete);
    }

    #[test]
    fn test_later_tier_sees_merged_state() {
        let tiers = vec![
            Tier::new("t0", vec![consume("a", 60)]),
            Tier::new("t1", vec![consume("b", 60)]),
        ];
        let mut scheduler = Scheduler::new(tiers, state(100), SchedulerOptions::default()).unwrap();
        scheduler.step().unwrap();
        let grants = scheduler.last_grants();
        assert_eq!(grants[0].granted, 60);
        assert_eq!(grants[1].granted, 40);
    }

    #[test]
    fn test_failing_unit_commits_nothing() {
        let tiers = vec![
            Tier::new("t0", vec![consume("a", 10)]),
            Tier::new("t1", vec![Box::new(Fail) as Box<dyn Process>]),
        ];
        let mut scheduler = Scheduler::new(tiers, state(100), SchedulerOptions::default()).unwrap();
        let err = scheduler.step().unwrap_err();
        match err {
            SimulationError::UnitExecutionFailure { step, tier, unit, .. } => {
                assert_eq!(step, 0);
                assert_eq!(tier, 1);
                assert_eq!(unit, "fail");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(scheduler.state().bulk.available("ATP"), 100);
        assert_eq!(scheduler.state().step, 0);
        assert!(scheduler.log().is_empty());
    }

    #[test]
    fn test_negative_delta_is_conservation_violation() {
        let mut s = state(5);
        let before = s.clone();
        let mut delta = Delta::noop();
        delta.add_bulk("ATP", -6);
        let err = apply_delta(&mut s, delta, 2, &before).unwrap_err();
        assert!(matches!(
            err,
            SimulationError::ResourceConservationViolation { tier: 2, .. }
        ));
    }

    #[test]
    fn test_duplicate_unit_ids_rejected() {
        let tiers = vec![Tier::new("t0", vec![consume("a", 1), consume("a", 1)])];
        assert!(Scheduler::new(tiers, state(1), SchedulerOptions::default()).is_err());
    }
}
