//! Single-individual chain driver.
//!
//! Repeats [`Sampler::step`] for one individual, discards a burn-in prefix,
//! thins the remainder, and summarizes the retained draws. Running several
//! individuals is left to the caller: give each its own [`Sampler`] built from
//! [`crate::rng::RandomSource::for_stream`].

use crate::kinetics::predict_trajectory;
use crate::mcmc::{MoveKind, Sampler};
use crate::types::{AntibodyParams, Individual, ParameterState, StudyParams};
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub n_steps: usize,
    /// Leading steps excluded from the retained draws.
    pub burnin: usize,
    /// Keep every `thin`-th post-burn-in state.
    pub thin: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            n_steps: 2000,
            burnin: 500,
            thin: 1,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("Individual {0} is not present in the study data.")]
    UnknownIndividual(usize),
    #[error("Chain configuration is invalid: burn-in ({burnin}) must be smaller than the number of steps ({n_steps}).")]
    BurninTooLong { burnin: usize, n_steps: usize },
    #[error("Chain configuration is invalid: thinning interval must be at least 1.")]
    ZeroThinning,
}

impl ChainConfig {
    pub fn validate(&self) -> Result<(), ChainError> {
        if self.thin == 0 {
            return Err(ChainError::ZeroThinning);
        }
        if self.burnin >= self.n_steps {
            return Err(ChainError::BurninTooLong {
                burnin: self.burnin,
                n_steps: self.n_steps,
            });
        }
        Ok(())
    }

    /// Number of states a run with this configuration retains.
    pub fn retained_len(&self) -> usize {
        if self.thin == 0 || self.burnin >= self.n_steps {
            return 0;
        }
        (self.n_steps - self.burnin).div_ceil(self.thin)
    }
}

/// Observer for reporting incremental progress while a chain runs.
pub trait ChainProgressObserver {
    fn on_start(&mut self, individual_id: usize, total_steps: usize) {
        let _ = (individual_id, total_steps);
    }
    fn on_advance(&mut self, completed_steps: usize) {
        let _ = completed_steps;
    }
    fn on_finish(&mut self) {}
}

#[derive(Default)]
pub struct NoopChainProgress;

impl ChainProgressObserver for NoopChainProgress {}

/// Steps between observer notifications.
const PROGRESS_STRIDE: usize = 100;

/// Acceptance counts for one move kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveTally {
    pub proposed: usize,
    pub accepted: usize,
}

impl MoveTally {
    pub fn rate(&self) -> Option<f64> {
        (self.proposed > 0).then(|| self.accepted as f64 / self.proposed as f64)
    }
}

#[derive(Debug, Clone)]
pub struct ChainResult {
    pub individual_id: usize,
    /// Post-burn-in, thinned states in chain order.
    pub draws: Vec<ParameterState>,
    /// Final state of the chain, retained or not.
    pub final_state: ParameterState,
    /// Indexed by [`MoveKind::index`].
    pub tallies: [MoveTally; 3],
    /// Mean Metropolis-Hastings acceptance probability over all steps.
    pub mean_acceptance_probability: f64,
}

impl ChainResult {
    pub fn tally(&self, kind: MoveKind) -> MoveTally {
        self.tallies[kind.index()]
    }

    pub fn n_steps(&self) -> usize {
        self.tallies.iter().map(|t| t.proposed).sum()
    }

    /// Fraction of all steps that accepted their candidate.
    pub fn acceptance_rate(&self) -> f64 {
        let steps = self.n_steps();
        if steps == 0 {
            return 0.0;
        }
        self.tallies.iter().map(|t| t.accepted).sum::<usize>() as f64 / steps as f64
    }

    pub fn summary(&self) -> PosteriorSummary {
        PosteriorSummary::from_draws(&self.draws, self.acceptance_rate())
    }

    /// Pointwise mean of the retained draws' noiseless trajectories over
    /// `times`. NaN everywhere when no draws were retained.
    pub fn posterior_mean_trajectory(
        &self,
        decay_rate: f64,
        times: ArrayView1<f64>,
    ) -> Array1<f64> {
        let mut total = Array1::<f64>::zeros(times.len());
        for draw in &self.draws {
            total += &predict_trajectory(draw.latent(), decay_rate, times);
        }
        total / self.draws.len() as f64
    }
}

/// Posterior summary of one individual's retained draws.
#[derive(Debug, Clone, PartialEq)]
pub struct PosteriorSummary {
    pub n_draws: usize,
    /// Share of draws in the infected state.
    pub infection_probability: f64,
    pub baseline_mean: f64,
    /// Mean boost over infected draws.
    pub boost_mean: Option<f64>,
    /// (25th percentile, median, 75th percentile) of infection time over
    /// infected draws.
    pub infection_time_quartiles: Option<(f64, f64, f64)>,
    pub acceptance_rate: f64,
}

impl PosteriorSummary {
    pub fn from_draws(draws: &[ParameterState], acceptance_rate: f64) -> Self {
        let n = draws.len();
        let baseline_mean = if n == 0 {
            f64::NAN
        } else {
            draws.iter().map(ParameterState::baseline).sum::<f64>() / n as f64
        };

        let boosts: Vec<f64> = draws.iter().filter_map(ParameterState::boost).collect();
        let mut times: Vec<f64> = draws
            .iter()
            .filter_map(ParameterState::infection_time)
            .collect();
        times.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let infection_probability = if n == 0 {
            0.0
        } else {
            boosts.len() as f64 / n as f64
        };
        let boost_mean =
            (!boosts.is_empty()).then(|| boosts.iter().sum::<f64>() / boosts.len() as f64);
        let infection_time_quartiles = (!times.is_empty()).then(|| {
            (
                quantile_sorted(&times, 0.25),
                quantile_sorted(&times, 0.5),
                quantile_sorted(&times, 0.75),
            )
        });

        Self {
            n_draws: n,
            infection_probability,
            baseline_mean,
            boost_mean,
            infection_time_quartiles,
            acceptance_rate,
        }
    }
}

impl fmt::Display for PosteriorSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "draws retained:        {}", self.n_draws)?;
        writeln!(f, "P(infected):           {:.3}", self.infection_probability)?;
        writeln!(f, "baseline (mean):       {:.3}", self.baseline_mean)?;
        match self.boost_mean {
            Some(b) => writeln!(f, "boost (mean|infected): {b:.3}")?,
            None => writeln!(f, "boost (mean|infected): n/a")?,
        }
        match self.infection_time_quartiles {
            Some((q1, med, q3)) => writeln!(
                f,
                "infection time:        median {med:.2} (IQR {q1:.2} to {q3:.2})"
            )?,
            None => writeln!(f, "infection time:        n/a")?,
        }
        write!(f, "acceptance rate:       {:.3}", self.acceptance_rate)
    }
}

/// Nearest-rank quantile of an ascending slice (`floor(n * p)`).
fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    let idx = ((sorted.len() as f64) * p).floor() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Runs one individual's chain for `config.n_steps` steps from `initial`.
pub fn run_chain(
    sampler: &mut Sampler,
    individual: &Individual,
    initial: ParameterState,
    antibody: &AntibodyParams,
    study: &StudyParams,
    config: &ChainConfig,
    observer: &mut dyn ChainProgressObserver,
) -> Result<ChainResult, ChainError> {
    config.validate()?;
    log::debug!(
        "Starting chain for individual {} ({} steps, burn-in {}, thin {})",
        individual.id,
        config.n_steps,
        config.burnin,
        config.thin
    );
    observer.on_start(individual.id, config.n_steps);

    let mut state = initial;
    let mut draws = Vec::with_capacity(config.retained_len());
    let mut tallies = [MoveTally::default(); 3];
    let mut probability_sum = 0.0;

    for step in 0..config.n_steps {
        let result = sampler.step(individual, &state, antibody, study);
        let tally = &mut tallies[result.move_kind.index()];
        tally.proposed += 1;
        if result.accepted {
            tally.accepted += 1;
        }
        probability_sum += result.acceptance_probability;
        state = result.state;

        if step >= config.burnin && (step - config.burnin) % config.thin == 0 {
            draws.push(state);
        }
        if (step + 1) % PROGRESS_STRIDE == 0 || step + 1 == config.n_steps {
            observer.on_advance(step + 1);
        }
    }
    observer.on_finish();

    let result = ChainResult {
        individual_id: individual.id,
        draws,
        final_state: state,
        tallies,
        mean_acceptance_probability: probability_sum / config.n_steps as f64,
    };
    log::info!(
        "Chain for individual {} finished: acceptance rate {:.3}, P(infected) {:.3}",
        individual.id,
        result.acceptance_rate(),
        result.summary().infection_probability
    );
    for kind in MoveKind::ALL {
        if let Some(rate) = result.tally(kind).rate() {
            log::debug!("  {kind}: acceptance {rate:.3}");
        }
    }
    Ok(result)
}

/// Finds the individual with `id` in a simulated study.
pub fn find_individual(individuals: &[Individual], id: usize) -> Result<&Individual, ChainError> {
    individuals
        .iter()
        .find(|ind| ind.id == id)
        .ok_or(ChainError::UnknownIndividual(id))
}
