//! # Antibody Kinetics
//!
//! A single infection produces an instantaneous boost on top of the
//! individual's baseline, which then wanes exponentially:
//!
//! ```text
//! titre(t) = baseline                                   if t <= t_inf
//! titre(t) = baseline + boost * exp(-decay * (t - t_inf))   otherwise
//! ```
//!
//! The boundary is inclusive: a sample taken exactly at the infection time
//! shows no response yet.

use crate::types::LatentState;
use ndarray::{Array1, ArrayView1};

/// Predicted titre at `sample_time`.
///
/// `decay_rate` is expected to be non-negative; a negative rate produces
/// unbounded growth and is not guarded against.
#[inline]
pub fn predict_titre(
    baseline: f64,
    boost: f64,
    decay_rate: f64,
    infection_time: f64,
    sample_time: f64,
) -> f64 {
    if sample_time <= infection_time {
        baseline
    } else {
        let elapsed = sample_time - infection_time;
        baseline + boost * (-decay_rate * elapsed).exp()
    }
}

/// Predicted titre for a latent state. Uninfected states are flat at baseline.
#[inline]
pub fn predict_for_state(latent: &LatentState, decay_rate: f64, sample_time: f64) -> f64 {
    match *latent {
        LatentState::Uninfected { baseline } => baseline,
        LatentState::Infected {
            baseline,
            boost,
            infection_time,
        } => predict_titre(baseline, boost, decay_rate, infection_time, sample_time),
    }
}

/// Noiseless trajectory of a latent state over a grid of times.
pub fn predict_trajectory(
    latent: &LatentState,
    decay_rate: f64,
    times: ArrayView1<f64>,
) -> Array1<f64> {
    times.mapv(|t| predict_for_state(latent, decay_rate, t))
}
