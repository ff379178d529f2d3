//! # Proposal Moves
//!
//! Three move kinds, each returning a complete candidate [`LatentState`]:
//!
//! - parameter move: Gaussian random walk on baseline (and boost when infected)
//! - infection-time move: Gaussian random walk on infection time, reflected
//!   into the study window
//! - state flip: infected <-> uninfected
//!
//! The random walks are symmetric, and reflection at the window boundaries
//! keeps them symmetric, so the step engine uses a plain posterior ratio.

use crate::rng::RandomSource;
use crate::types::{LatentState, StudyParams};

/// Upper bound on mirror operations before falling back to clamping.
pub const MAX_REFLECTIONS: usize = 1000;

/// Smallest boost a parameter move may produce.
pub const DEFAULT_BOOST_FLOOR: f64 = 0.001;

/// Perturbs baseline by `N(0, baseline_step)` and, for infected states, boost
/// by `N(0, boost_step)` floored at `boost_floor`.
///
/// The floor keeps the candidate numerically positive; the `-inf` boost
/// prior is still what enforces positivity in the posterior.
pub fn propose_parameters(
    rng: &mut RandomSource,
    current: &LatentState,
    baseline_step: f64,
    boost_step: f64,
    boost_floor: f64,
) -> LatentState {
    let baseline = current.baseline() + rng.standard_normal() * baseline_step;
    match *current {
        LatentState::Uninfected { .. } => LatentState::Uninfected { baseline },
        LatentState::Infected {
            boost,
            infection_time,
            ..
        } => {
            let boost = (boost + rng.standard_normal() * boost_step).max(boost_floor);
            LatentState::Infected {
                baseline,
                boost,
                infection_time,
            }
        }
    }
}

/// Perturbs infection time by `N(0, step_fraction * duration)` and reflects the
/// result into the study window. Uninfected states are returned unchanged
/// without consuming a draw.
pub fn propose_infection_time(
    rng: &mut RandomSource,
    current: &LatentState,
    study: &StudyParams,
    step_fraction: f64,
) -> LatentState {
    match *current {
        LatentState::Uninfected { .. } => *current,
        LatentState::Infected {
            baseline,
            boost,
            infection_time,
        } => {
            let step = study.duration() * step_fraction;
            let raw = infection_time + rng.standard_normal() * step;
            LatentState::Infected {
                baseline,
                boost,
                infection_time: reflect_into_window(raw, study.study_start, study.study_end),
            }
        }
    }
}

/// Mirrors `value` at whichever boundary it violates until it lies within
/// `[start, end]`.
///
/// Each mirror pass moves an out-of-range value at most one window width
/// closer, so very large excursions are capped at [`MAX_REFLECTIONS`] passes
/// and then clamped. Non-finite input is clamped directly (NaN maps to
/// `start`).
pub fn reflect_into_window(value: f64, start: f64, end: f64) -> f64 {
    if value.is_nan() {
        return start;
    }
    if !value.is_finite() {
        return value.clamp(start, end);
    }

    let mut reflected = value;
    for _ in 0..MAX_REFLECTIONS {
        if reflected >= start && reflected <= end {
            return reflected;
        }
        if reflected < start {
            reflected = 2.0 * start - reflected;
        }
        if reflected > end {
            reflected = 2.0 * end - reflected;
        }
    }

    if reflected < start || reflected > end {
        log::warn!(
            "Infection time {value} still outside [{start}, {end}] after {MAX_REFLECTIONS} reflections; clamping"
        );
        reflected = reflected.clamp(start, end);
    }
    reflected
}

/// Flips the infection status, always returning a fully specified state.
///
/// Infected -> uninfected drops boost and infection time. Uninfected ->
/// infected starts the boost at `flip_boost` and draws the infection time
/// uniformly over the study window.
pub fn propose_infection_state(
    rng: &mut RandomSource,
    current: &LatentState,
    study: &StudyParams,
    flip_boost: f64,
) -> LatentState {
    match *current {
        LatentState::Infected { baseline, .. } => LatentState::Uninfected { baseline },
        LatentState::Uninfected { baseline } => LatentState::Infected {
            baseline,
            boost: flip_boost,
            infection_time: rng.uniform_between(study.study_start, study.study_end),
        },
    }
}
