//! # Study Simulation
//!
//! Synthesizes individuals with a known infection status, infection time and
//! baseline, sampled on an even grid across the study window with Gaussian
//! observation noise. Draws are consumed from the supplied [`RandomSource`]
//! in a fixed order, so a seed reproduces a study bit for bit:
//!
//! 1. infection indicator (uniform)
//! 2. baseline (normal)
//! 3. infection time (uniform), only if infected
//! 4. per sample: boost (normal, only if infected), then noise (normal)
//!
//! The boost is redrawn at every sample rather than once per individual.
//! This gives each observation its own stochastic response magnitude and is
//! part of the model's behavior, not an accident.

use crate::kinetics::predict_titre;
use crate::rng::RandomSource;
use crate::types::{AntibodyParams, GroundTruth, Individual, StudyParams};
use ndarray::Array1;

/// Evenly spaced sample times over `[study_start, study_end]`, both ends
/// included. A single sample is placed at `study_start`.
pub fn sample_schedule(study: &StudyParams, n_samples: usize) -> Array1<f64> {
    match n_samples {
        0 => Array1::zeros(0),
        1 => Array1::from_elem(1, study.study_start),
        n => {
            let span = study.duration();
            let last = (n - 1) as f64;
            Array1::from_shape_fn(n, |i| (i as f64 / last) * span + study.study_start)
        }
    }
}

/// Simulates one individual. See the module docs for the draw order.
pub fn simulate_individual(
    rng: &mut RandomSource,
    id: usize,
    study: &StudyParams,
    antibody: &AntibodyParams,
    n_samples: usize,
) -> Individual {
    let infected = rng.uniform() < study.infection_rate;
    let baseline = rng.normal(antibody.baseline_mean, antibody.baseline_sd);
    let infection_time = if infected {
        Some(rng.uniform_between(study.study_start, study.study_end))
    } else {
        None
    };

    let sample_times = sample_schedule(study, n_samples);
    let mut titres = Array1::<f64>::zeros(n_samples);
    for (titre, &sample_time) in titres.iter_mut().zip(sample_times.iter()) {
        let true_titre = match infection_time {
            Some(t_inf) => {
                let boost = rng.normal(antibody.boost_mean, antibody.boost_sd);
                predict_titre(baseline, boost, antibody.decay_rate, t_inf, sample_time)
            }
            None => baseline,
        };
        *titre = rng.normal(true_titre, antibody.observation_sd);
    }

    Individual {
        id,
        sample_times,
        titres,
        truth: Some(GroundTruth {
            infected,
            infection_time,
            baseline,
        }),
    }
}

/// Simulates `study.n_individuals` individuals with ids `1..=n`, in order.
pub fn simulate_study(
    rng: &mut RandomSource,
    study: &StudyParams,
    antibody: &AntibodyParams,
    n_samples_per_individual: usize,
) -> Vec<Individual> {
    let individuals: Vec<Individual> = (1..=study.n_individuals)
        .map(|id| simulate_individual(rng, id, study, antibody, n_samples_per_individual))
        .collect();

    let n_infected = individuals
        .iter()
        .filter(|ind| ind.truth.is_some_and(|t| t.infected))
        .count();
    log::debug!(
        "Simulated {} individuals ({} infected) with {} samples each",
        individuals.len(),
        n_infected,
        n_samples_per_individual
    );

    individuals
}
