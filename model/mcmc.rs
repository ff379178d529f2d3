//! # Metropolis-Hastings Step Engine
//!
//! One step for one individual:
//!
//! 1. Pick a move kind from a single uniform draw: parameter move with
//!    probability `parameter_move_probability`, infection-time move with
//!    probability `time_move_probability` (infected states only; otherwise the
//!    draw falls through), state flip for the remainder.
//! 2. Evaluate the unnormalized log-posterior of the current and candidate
//!    states. The current log-likelihood is recomputed, not read from cache.
//! 3. Accept iff `ln(v) < log_alpha` with `v ~ U(0, 1)` and
//!    `log_alpha = log_post(candidate) - log_post(current)`. All moves are
//!    treated as symmetric, so no proposal-density term enters the ratio.
//!
//! The reported acceptance probability is `min(1, exp(log_alpha))`
//! regardless of the coin flip.

use crate::likelihood::{PosteriorTerms, log_posterior};
use crate::proposal::{
    DEFAULT_BOOST_FLOOR, propose_infection_state, propose_infection_time, propose_parameters,
};
use crate::rng::RandomSource;
use crate::types::{AntibodyParams, Individual, LatentState, ParameterState, StudyParams};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tuning of the proposal kernel and the move mixture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Standard deviation of the baseline random walk.
    pub baseline_step: f64,
    /// Standard deviation of the boost random walk.
    pub boost_step: f64,
    /// Lower bound applied to a proposed boost.
    pub boost_floor: f64,
    /// Infection-time random walk SD as a fraction of the study duration.
    pub time_step_fraction: f64,
    /// Boost assigned when flipping an uninfected state to infected.
    pub flip_boost: f64,
    pub parameter_move_probability: f64,
    pub time_move_probability: f64,
}

impl SamplerConfig {
    /// Probability of a state flip when the time move is available.
    pub fn flip_move_probability(&self) -> f64 {
        1.0 - self.parameter_move_probability - self.time_move_probability
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            baseline_step: 0.1,
            boost_step: 0.2,
            boost_floor: DEFAULT_BOOST_FLOOR,
            time_step_fraction: 0.1,
            flip_boost: 1.0,
            parameter_move_probability: 0.5,
            time_move_probability: 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveKind {
    Parameters,
    InfectionTime,
    InfectionState,
}

impl MoveKind {
    pub const ALL: [MoveKind; 3] = [Self::Parameters, Self::InfectionTime, Self::InfectionState];

    pub fn describe(self) -> &'static str {
        match self {
            Self::Parameters => "baseline/boost random walk",
            Self::InfectionTime => "infection time random walk",
            Self::InfectionState => "infection state flip",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::Parameters => 0,
            Self::InfectionTime => 1,
            Self::InfectionState => 2,
        }
    }
}

impl fmt::Display for MoveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Outcome of one Metropolis-Hastings step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct McmcStepResult {
    /// The state the chain holds after this step.
    pub state: ParameterState,
    pub accepted: bool,
    pub move_kind: MoveKind,
    /// `min(1, exp(log_alpha))`, reported even when the step rejected.
    pub acceptance_probability: f64,
}

/// Single-individual sampler owning its random stream.
#[derive(Debug, Clone)]
pub struct Sampler {
    rng: RandomSource,
    config: SamplerConfig,
}

impl Sampler {
    pub fn new(config: SamplerConfig, rng: RandomSource) -> Self {
        Self { rng, config }
    }

    pub fn with_seed(config: SamplerConfig, seed: u64) -> Self {
        Self::new(config, RandomSource::new(seed))
    }

    /// Runs one full step: choose a move, propose, then accept or reject.
    pub fn step(
        &mut self,
        individual: &Individual,
        current: &ParameterState,
        antibody: &AntibodyParams,
        study: &StudyParams,
    ) -> McmcStepResult {
        step_with(&mut self.rng, &self.config, individual, current, antibody, study)
    }

    /// Accept/reject an externally constructed candidate.
    ///
    /// This is the second half of [`Sampler::step`]; it consumes exactly one
    /// uniform draw.
    pub fn step_with_candidate(
        &mut self,
        individual: &Individual,
        current: &ParameterState,
        candidate: LatentState,
        move_kind: MoveKind,
        antibody: &AntibodyParams,
        study: &StudyParams,
    ) -> McmcStepResult {
        accept_or_reject(
            &mut self.rng,
            individual,
            current,
            candidate,
            move_kind,
            antibody,
            study,
        )
    }
}

/// One step with the default [`SamplerConfig`], drawing from `rng`.
pub fn mcmc_step_individual(
    rng: &mut RandomSource,
    individual: &Individual,
    current: &ParameterState,
    antibody: &AntibodyParams,
    study: &StudyParams,
) -> McmcStepResult {
    step_with(rng, &SamplerConfig::default(), individual, current, antibody, study)
}

fn choose_move(rng: &mut RandomSource, config: &SamplerConfig, infected: bool) -> MoveKind {
    let u = rng.uniform();
    if u < config.parameter_move_probability {
        MoveKind::Parameters
    } else if u < config.parameter_move_probability + config.time_move_probability && infected {
        MoveKind::InfectionTime
    } else {
        MoveKind::InfectionState
    }
}

fn step_with(
    rng: &mut RandomSource,
    config: &SamplerConfig,
    individual: &Individual,
    current: &ParameterState,
    antibody: &AntibodyParams,
    study: &StudyParams,
) -> McmcStepResult {
    let latent = current.latent();
    let move_kind = choose_move(rng, config, latent.is_infected());
    let candidate = match move_kind {
        MoveKind::Parameters => propose_parameters(
            rng,
            latent,
            config.baseline_step,
            config.boost_step,
            config.boost_floor,
        ),
        MoveKind::InfectionTime => {
            propose_infection_time(rng, latent, study, config.time_step_fraction)
        }
        MoveKind::InfectionState => propose_infection_state(rng, latent, study, config.flip_boost),
    };
    accept_or_reject(rng, individual, current, candidate, move_kind, antibody, study)
}

fn accept_or_reject(
    rng: &mut RandomSource,
    individual: &Individual,
    current: &ParameterState,
    candidate: LatentState,
    move_kind: MoveKind,
    antibody: &AntibodyParams,
    study: &StudyParams,
) -> McmcStepResult {
    let current_terms = log_posterior(individual, current.latent(), antibody, study);
    let candidate_terms = log_posterior(individual, &candidate, antibody, study);
    let log_alpha = candidate_terms.total() - current_terms.total();
    let acceptance_probability = acceptance_probability(log_alpha);

    let accepted = rng.uniform().ln() < log_alpha;
    log::trace!(
        "individual {}: {} log_alpha={:.4} accepted={}",
        individual.id,
        move_kind,
        log_alpha,
        accepted
    );

    let state = if accepted {
        settle(candidate, candidate_terms)
    } else {
        settle(*current.latent(), current_terms)
    };

    McmcStepResult {
        state,
        accepted,
        move_kind,
        acceptance_probability,
    }
}

fn settle(latent: LatentState, terms: PosteriorTerms) -> ParameterState {
    ParameterState::from_parts(latent, terms.log_likelihood)
}

/// `min(1, exp(log_alpha))`. An undefined ratio (both posteriors `-inf`)
/// reports zero; such a step always rejects because `ln(v) < NaN` is false.
pub fn acceptance_probability(log_alpha: f64) -> f64 {
    if log_alpha.is_nan() {
        0.0
    } else {
        log_alpha.exp().min(1.0)
    }
}
