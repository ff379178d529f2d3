//! Log-likelihood and log-prior evaluation.
//!
//! Infected and uninfected states live in spaces of different dimension.
//! The infection prior is therefore a probability mass for the uninfected
//! state but a mass times a uniform density over infection time for the
//! infected state. The two are only ever compared inside the
//! Metropolis-Hastings ratio built by [`crate::mcmc`].

use crate::kinetics::predict_for_state;
use crate::types::{AntibodyParams, Individual, LatentState, StudyParams};
use std::f64::consts::PI;

/// Gaussian log-density of `x` under `N(mean, sd^2)`.
#[inline]
pub fn gaussian_log_density(x: f64, mean: f64, sd: f64) -> f64 {
    let variance = sd * sd;
    let residual = x - mean;
    -0.5 * (2.0 * PI * variance).ln() - 0.5 * residual * residual / variance
}

/// Sum over samples of the Gaussian log-density of each observed titre
/// around the kinetics prediction, with the fixed `observation_sd`.
pub fn log_likelihood(
    individual: &Individual,
    latent: &LatentState,
    antibody: &AntibodyParams,
) -> f64 {
    individual
        .observations()
        .map(|(time, titre)| {
            let predicted = predict_for_state(latent, antibody.decay_rate, time);
            gaussian_log_density(titre, predicted, antibody.observation_sd)
        })
        .sum()
}

pub fn log_prior_baseline(value: f64, antibody: &AntibodyParams) -> f64 {
    gaussian_log_density(value, antibody.baseline_mean, antibody.baseline_sd)
}

/// Normal prior truncated to `(0, inf)`, unnormalized.
///
/// Non-positive boosts get `-inf`, which forces rejection of any candidate
/// carrying one.
pub fn log_prior_boost(value: f64, antibody: &AntibodyParams) -> f64 {
    if value <= 0.0 {
        return f64::NEG_INFINITY;
    }
    gaussian_log_density(value, antibody.boost_mean, antibody.boost_sd)
}

/// Joint prior on infection status and infection time.
///
/// Infected: `ln(rate) + ln(1 / duration)`. Uninfected: `ln(1 - rate)`.
pub fn log_prior_infection(latent: &LatentState, study: &StudyParams) -> f64 {
    if latent.is_infected() {
        study.infection_rate.ln() + (1.0 / study.duration()).ln()
    } else {
        (1.0 - study.infection_rate).ln()
    }
}

/// Total log-prior: baseline + infection, plus boost when infected.
pub fn log_prior(latent: &LatentState, antibody: &AntibodyParams, study: &StudyParams) -> f64 {
    let mut total =
        log_prior_baseline(latent.baseline(), antibody) + log_prior_infection(latent, study);
    if let Some(boost) = latent.boost() {
        total += log_prior_boost(boost, antibody);
    }
    total
}

/// Likelihood and prior terms of an unnormalized log-posterior.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PosteriorTerms {
    pub log_likelihood: f64,
    pub log_prior: f64,
}

impl PosteriorTerms {
    pub fn total(&self) -> f64 {
        self.log_likelihood + self.log_prior
    }
}

pub fn log_posterior(
    individual: &Individual,
    latent: &LatentState,
    antibody: &AntibodyParams,
    study: &StudyParams,
) -> PosteriorTerms {
    PosteriorTerms {
        log_likelihood: log_likelihood(individual, latent, antibody),
        log_prior: log_prior(latent, antibody, study),
    }
}
