//! Potato analysis of one timed event.
//!
//! The potato is the set of states in which the event is active. While the
//! chain stays inside it the timer runs; the potato is left either by a CTMC
//! transition to a successor or by the timer firing. [`Potato`] computes, per
//! entrance state:
//!
//! - the expected time spent in each potato state before leaving,
//! - the distribution over states right after leaving,
//! - the expected reward accumulated on the way.
//!
//! Work happens lazily in three stages: the uniformized chain is built on
//! first use and kept; the precision plan, Poisson truncation and timer
//! kernel need κ and are dropped whenever κ changes; per-entrance results
//! are cached inside the truncated stage.

pub mod chain;
pub mod evaluator;
pub mod precision;
pub mod transient;

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use bigdecimal::BigDecimal;
use gsmp_common::{AnalysisConfig, Error, Result};
use gsmp_math::{from_f64, Polynomial};
use num_traits::Zero;
use tracing::{debug, info};

pub use chain::PotatoChain;
pub use evaluator::{compute_integral_ceil, EntranceResults, RewardResults, TimerKernel, WeibullKernel};
pub use precision::PrecisionPlan;
pub use transient::{Direction, Iteration, Truncation};

use crate::logging::targets;
use crate::model::{Actmc, Event, EventDistribution, RewardModel};

/// Everything that depends on κ.
#[derive(Debug)]
struct Analysis {
    plan: PrecisionPlan,
    truncation: Truncation,
    kernel: TimerKernel,
    entrances: BTreeMap<usize, EntranceResults>,
    rewards: Option<RewardResults>,
}

#[derive(Debug)]
enum Stage {
    Empty,
    ChainBuilt(PotatoChain),
    Truncated(PotatoChain, Box<Analysis>),
}

/// Lazy, cached potato analysis of `event` inside `actmc`.
pub struct Potato<'a> {
    actmc: &'a Actmc,
    event: &'a Event,
    rewards: Option<&'a dyn RewardModel>,
    config: AnalysisConfig,
    kappa: Option<BigDecimal>,
    stage: Stage,
}

impl std::fmt::Debug for Potato<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Potato")
            .field("event", &self.event.id())
            .field("kappa", &self.kappa)
            .field("has_rewards", &self.rewards.is_some())
            .field("stage", &self.stage)
            .finish()
    }
}

impl<'a> Potato<'a> {
    /// A potato with default settings and no κ yet.
    pub fn new(actmc: &'a Actmc, event: &'a Event) -> Self {
        Self {
            actmc,
            event,
            rewards: None,
            config: AnalysisConfig::default(),
            kappa: None,
            stage: Stage::Empty,
        }
    }

    /// Use `config` for guards, caps and growth limits, and take κ from it.
    pub fn with_config(mut self, config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        let kappa = config.kappa;
        self.config = config;
        self.set_kappa(kappa)?;
        Ok(self)
    }

    pub fn with_rewards(mut self, rewards: &'a dyn RewardModel) -> Self {
        self.rewards = Some(rewards);
        if let Stage::Truncated(_, analysis) = &mut self.stage {
            analysis.rewards = None;
        }
        self
    }

    pub fn event(&self) -> &'a Event {
        self.event
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn kappa(&self) -> Option<&BigDecimal> {
        self.kappa.as_ref()
    }

    /// Set the error bound κ in (0, 1).
    ///
    /// A different κ drops the truncation and every cached result; the
    /// chain survives.
    pub fn set_kappa(&mut self, kappa: f64) -> Result<()> {
        if !(kappa.is_finite() && kappa > 0.0 && kappa < 1.0) {
            return Err(Error::InvalidParameter(format!("kappa must lie in (0, 1), got {kappa}")));
        }
        let kappa = from_f64(kappa).ok_or_else(|| Error::InvalidParameter(format!("kappa {kappa} is not finite")))?;
        if self.kappa.as_ref() == Some(&kappa) {
            return Ok(());
        }
        self.kappa = Some(kappa);
        self.stage = match std::mem::replace(&mut self.stage, Stage::Empty) {
            Stage::Truncated(chain, _) => {
                debug!(target: targets::PRECISION, event = self.event.id(), "kappa changed, dropping truncation");
                Stage::ChainBuilt(chain)
            }
            other => other,
        };
        Ok(())
    }

    /// The uniformized chain, built on first use.
    pub fn chain(&mut self) -> Result<&PotatoChain> {
        if let Stage::Empty = self.stage {
            let chain = PotatoChain::build(self.actmc, self.event)?;
            self.stage = Stage::ChainBuilt(chain);
        }
        match &self.stage {
            Stage::ChainBuilt(chain) | Stage::Truncated(chain, _) => Ok(chain),
            Stage::Empty => Err(Error::InvalidModel(format!(
                "potato chain of event {:?} is unavailable",
                self.event.id()
            ))),
        }
    }

    /// Potato states in ascending order.
    pub fn states(&mut self) -> Result<&[usize]> {
        Ok(self.chain()?.states())
    }

    pub fn entrances(&mut self) -> Result<Vec<usize>> {
        Ok(self.chain()?.entrances().iter().copied().collect())
    }

    pub fn successors(&mut self) -> Result<&[usize]> {
        Ok(self.chain()?.successors())
    }

    pub fn uniformization_rate(&mut self) -> Result<&BigDecimal> {
        Ok(self.chain()?.uniformization_rate())
    }

    fn analysis(&mut self) -> Result<(&PotatoChain, &mut Analysis)> {
        self.chain()?;
        if let Stage::ChainBuilt(chain) = &self.stage {
            let kappa = self.kappa.clone().ok_or_else(|| {
                Error::MissingPrecision(format!("no kappa set for event {:?}", self.event.id()))
            })?;
            let analysis = prepare(chain, self.actmc, self.event, &kappa, &self.config)?;
            if let Stage::ChainBuilt(chain) = std::mem::replace(&mut self.stage, Stage::Empty) {
                self.stage = Stage::Truncated(chain, Box::new(analysis));
            }
        }
        match &mut self.stage {
            Stage::Truncated(chain, analysis) => Ok((&*chain, &mut **analysis)),
            _ => Err(Error::InvalidModel(format!(
                "potato analysis of event {:?} is unavailable",
                self.event.id()
            ))),
        }
    }

    /// Precision plan for the current κ.
    pub fn precision(&mut self) -> Result<&PrecisionPlan> {
        let (_, analysis) = self.analysis()?;
        Ok(&analysis.plan)
    }

    /// Inclusive Poisson truncation window `(left, right)`.
    pub fn truncation_window(&mut self) -> Result<(usize, usize)> {
        let (_, analysis) = self.analysis()?;
        Ok((analysis.truncation.left(), analysis.truncation.right()))
    }

    /// Weibull Taylor data and integration cutoff; `None` for other families.
    pub fn weibull_kernel(&mut self) -> Result<Option<&WeibullKernel>> {
        let (_, analysis) = self.analysis()?;
        Ok(analysis.kernel.weibull())
    }

    fn entrance(&mut self, state: usize) -> Result<&EntranceResults> {
        let event = self.event;
        let (chain, analysis) = self.analysis()?;
        let local = potato_local(chain, state)?;
        let ctx = analysis.plan.working();
        match analysis.entrances.entry(state) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let results = evaluator::evaluate_entrance(chain, &analysis.truncation, &analysis.kernel, event, local, ctx)?;
                Ok(entry.insert(results))
            }
        }
    }

    /// Expected time spent in each potato state, starting from `entrance`.
    pub fn mean_times(&mut self, entrance: usize) -> Result<&BTreeMap<usize, BigDecimal>> {
        Ok(&self.entrance(entrance)?.mean_times)
    }

    /// Distribution over successors right after leaving the potato.
    pub fn mean_distribution(&mut self, entrance: usize) -> Result<&BTreeMap<usize, BigDecimal>> {
        Ok(&self.entrance(entrance)?.mean_distribution)
    }

    /// Distribution over potato states and successors at the firing time,
    /// before the firing kernel is applied.
    pub fn before_event_distribution(&mut self, entrance: usize) -> Result<&BTreeMap<usize, BigDecimal>> {
        Ok(&self.entrance(entrance)?.before_event)
    }

    /// Last power-iteration vector from `entrance`, by global state.
    pub fn final_iterate(&mut self, entrance: usize) -> Result<&BTreeMap<usize, BigDecimal>> {
        Ok(&self.entrance(entrance)?.final_iterate)
    }

    /// Symbolic mean-time polynomials, by potato state.
    pub fn mean_times_polynomials(&mut self, entrance: usize) -> Result<&BTreeMap<usize, Polynomial>> {
        Ok(&self.entrance(entrance)?.times_polynomials)
    }

    /// Symbolic after-event polynomials, by successor.
    pub fn mean_distribution_polynomials(&mut self, entrance: usize) -> Result<&BTreeMap<usize, Polynomial>> {
        Ok(&self.entrance(entrance)?.distribution_polynomials)
    }

    fn rewards(&mut self) -> Result<&RewardResults> {
        let actmc = self.actmc;
        let event = self.event;
        let rewards = self.rewards.ok_or_else(|| {
            Error::InvalidParameter(format!("no reward model attached to the potato of {:?}", event.id()))
        })?;
        let (chain, analysis) = self.analysis()?;
        if analysis.rewards.is_none() {
            let results = evaluator::evaluate_rewards(
                chain,
                &analysis.truncation,
                &analysis.kernel,
                actmc,
                event,
                rewards,
                analysis.plan.working(),
            )?;
            analysis.rewards = Some(results);
        }
        analysis
            .rewards
            .as_ref()
            .ok_or_else(|| Error::NumericalInstability("reward results were not stored".into()))
    }

    fn check_potato(&mut self, state: usize) -> Result<()> {
        potato_local(self.chain()?, state).map(|_| ())
    }

    /// Expected reward from `entrance` until the potato is left, including
    /// the firing reward.
    pub fn mean_reward(&mut self, entrance: usize) -> Result<&BigDecimal> {
        self.check_potato(entrance)?;
        self.rewards()?
            .total
            .get(&entrance)
            .ok_or(Error::NotInPotato { state: entrance })
    }

    /// Expected reward accumulated from `entrance` before the potato is left.
    pub fn mean_reward_before_event(&mut self, entrance: usize) -> Result<&BigDecimal> {
        self.check_potato(entrance)?;
        self.rewards()?
            .before_event
            .get(&entrance)
            .ok_or(Error::NotInPotato { state: entrance })
    }

    /// Symbolic reward polynomials from `entrance`: accumulated state reward
    /// and firing reward.
    pub fn mean_rewards_polynomials(&mut self, entrance: usize) -> Result<(Polynomial, Polynomial)> {
        self.check_potato(entrance)?;
        let results = self.rewards()?;
        let accumulated = results.accumulated_polynomials.get(&entrance).cloned().unwrap_or_default();
        let firing = results.firing_polynomials.get(&entrance).cloned().unwrap_or_default();
        Ok((accumulated, firing))
    }

    /// After-event distribution from `entrance` for a Dirac timer at a
    /// different `timeout`, reusing the cached polynomials.
    ///
    /// Precision and Poisson window were sized for the configured timeout, so
    /// `timeout` may not exceed it: build the event with the longest timeout
    /// of interest and re-evaluate at the shorter ones.
    pub fn reevaluate_dirac(&mut self, entrance: usize, timeout: f64) -> Result<BTreeMap<usize, BigDecimal>> {
        let configured = match *self.event.distribution() {
            EventDistribution::Dirac { timeout: configured } => configured,
            other => {
                return Err(Error::UnsupportedDistribution(format!(
                    "re-evaluation needs a dirac timer, event {:?} is {}",
                    self.event.id(),
                    other.family()
                )))
            }
        };
        EventDistribution::Dirac { timeout }.validate()?;
        if timeout > configured {
            return Err(Error::InvalidParameter(format!(
                "re-evaluation timeout {timeout} exceeds the configured {configured} the truncation was sized for"
            )));
        }
        let event = self.event;
        self.entrance(entrance)?;
        let (chain, analysis) = self.analysis()?;
        let ctx = analysis.plan.working();
        let results = analysis
            .entrances
            .get(&entrance)
            .ok_or(Error::NotInPotato { state: entrance })?;
        let raw: Vec<Polynomial> = (0..chain.num_states())
            .map(|local| results.occupancy.get(&chain.to_global(local)).cloned().unwrap_or_default())
            .collect();

        let timeout = from_f64(timeout)
            .ok_or_else(|| Error::InvalidParameter(format!("dirac timeout {timeout} is not finite")))?;
        let damping = ctx.exp(&-ctx.mul(analysis.truncation.rate(), &timeout));
        let kernel = TimerKernel::Dirac { timeout, damping };

        let mut distribution = BTreeMap::new();
        let mut total = BigDecimal::zero();
        for (state, poly) in evaluator::redistribute(chain, event, &raw, ctx)? {
            let value = kernel.value(&poly, ctx)?;
            total = ctx.add(&total, &value);
            distribution.insert(state, value);
        }
        if total <= BigDecimal::zero() {
            return Err(Error::NumericalInstability(format!(
                "re-evaluated distribution from {entrance} has no mass"
            )));
        }
        for value in distribution.values_mut() {
            *value = ctx.div(value, &total);
        }
        Ok(distribution)
    }
}

fn potato_local(chain: &PotatoChain, state: usize) -> Result<usize> {
    chain
        .to_local(state)
        .filter(|&local| chain.is_potato_local(local))
        .ok_or(Error::NotInPotato { state })
}

/// Derive the plan, truncate and build the timer kernel.
fn prepare(
    chain: &PotatoChain,
    actmc: &Actmc,
    event: &Event,
    kappa: &BigDecimal,
    config: &AnalysisConfig,
) -> Result<Analysis> {
    let lambda = gsmp_math::to_f64(chain.uniformization_rate());
    let plan = PrecisionPlan::derive(event.distribution(), kappa, lambda, actmc.max_exit_rate(), config)?;
    let truncation = Truncation::compute(chain, &plan, config)?;
    let kernel = TimerKernel::build(event.distribution(), &truncation, kappa, config, plan.working())?;
    info!(
        target: targets::TRANSIENT,
        event = event.id(),
        family = event.distribution().family(),
        digits = plan.working().digits(),
        left = truncation.left(),
        right = truncation.right(),
        "potato truncated"
    );
    Ok(Analysis {
        plan,
        truncation,
        kernel,
        entrances: BTreeMap::new(),
        rewards: None,
    })
}
