use crate::likelihood;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

// --- Externally supplied parameters ---
// Both records are fixed for the lifetime of a run and are serialized as
// sections of the TOML run configuration.

/// Population-level antibody kinetics hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AntibodyParams {
    pub baseline_mean: f64,
    pub baseline_sd: f64,
    pub boost_mean: f64,
    pub boost_sd: f64,
    /// Exponential waning rate of the boost, per unit time. Assumed `>= 0`.
    pub decay_rate: f64,
    /// Measurement noise of an observed titre.
    pub observation_sd: f64,
}

impl Default for AntibodyParams {
    fn default() -> Self {
        Self {
            baseline_mean: 2.0,
            baseline_sd: 0.5,
            boost_mean: 3.0,
            boost_sd: 1.0,
            decay_rate: 0.1,
            observation_sd: 0.2,
        }
    }
}

/// Study design and population infection rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyParams {
    pub study_start: f64,
    pub study_end: f64,
    pub n_individuals: usize,
    /// Probability that an individual is infected during the study window.
    pub infection_rate: f64,
    /// Time-varying infection hazard. Carried for hosts that supply one; the
    /// model itself uses the constant `infection_rate`.
    #[serde(default)]
    pub infection_hazard: Vec<f64>,
}

impl StudyParams {
    pub fn duration(&self) -> f64 {
        self.study_end - self.study_start
    }

    pub fn contains(&self, time: f64) -> bool {
        time >= self.study_start && time <= self.study_end
    }
}

impl Default for StudyParams {
    fn default() -> Self {
        Self {
            study_start: 0.0,
            study_end: 100.0,
            n_individuals: 20,
            infection_rate: 0.3,
            infection_hazard: Vec::new(),
        }
    }
}

// --- Individuals ---

/// Simulation-only truth attached to a synthetic individual.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundTruth {
    pub infected: bool,
    /// At most one infection per individual in this model.
    pub infection_time: Option<f64>,
    pub baseline: f64,
}

/// One individual's observed titre series.
#[derive(Debug, Clone, PartialEq)]
pub struct Individual {
    pub id: usize,
    /// Ascending sample times within the study window.
    pub sample_times: Array1<f64>,
    /// Observed titres, parallel to `sample_times`.
    pub titres: Array1<f64>,
    /// Present only for simulated individuals.
    pub truth: Option<GroundTruth>,
}

impl Individual {
    /// An individual built from real observations, with no known truth.
    ///
    /// # Panics
    /// Panics if `sample_times` and `titres` differ in length.
    pub fn observed(id: usize, sample_times: Array1<f64>, titres: Array1<f64>) -> Self {
        assert_eq!(
            sample_times.len(),
            titres.len(),
            "sample times and titres must be parallel"
        );
        Self {
            id,
            sample_times,
            titres,
            truth: None,
        }
    }

    /// An observed individual from unordered `(time, titre)` pairs, sorted by
    /// time. Ties keep their input order.
    pub fn from_series(id: usize, mut observations: Vec<(f64, f64)>) -> Self {
        observations.sort_by(|a, b| a.0.total_cmp(&b.0));
        let (times, titres): (Vec<f64>, Vec<f64>) = observations.into_iter().unzip();
        Self::observed(id, Array1::from(times), Array1::from(titres))
    }

    pub fn n_samples(&self) -> usize {
        self.sample_times.len()
    }

    /// Iterates `(sample_time, titre)` pairs in sampling order.
    pub fn observations(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.sample_times
            .iter()
            .copied()
            .zip(self.titres.iter().copied())
    }
}

// --- Latent state ---

/// The per-individual latent state explored by the sampler.
///
/// The two variants have different dimensionality: an uninfected individual
/// has no boost and no infection time at all.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LatentState {
    Uninfected {
        baseline: f64,
    },
    Infected {
        baseline: f64,
        /// Strictly positive.
        boost: f64,
        /// Within `[study_start, study_end]`.
        infection_time: f64,
    },
}

impl LatentState {
    pub fn baseline(&self) -> f64 {
        match *self {
            Self::Uninfected { baseline } | Self::Infected { baseline, .. } => baseline,
        }
    }

    pub fn is_infected(&self) -> bool {
        matches!(self, Self::Infected { .. })
    }

    pub fn boost(&self) -> Option<f64> {
        match *self {
            Self::Infected { boost, .. } => Some(boost),
            Self::Uninfected { .. } => None,
        }
    }

    pub fn infection_time(&self) -> Option<f64> {
        match *self {
            Self::Infected { infection_time, .. } => Some(infection_time),
            Self::Uninfected { .. } => None,
        }
    }
}

/// A latent state together with its log-likelihood for one individual.
///
/// The cached log-likelihood always matches `latent`. Public constructors
/// compute it; the step engine reuses the value it just evaluated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterState {
    latent: LatentState,
    log_likelihood: f64,
}

impl ParameterState {
    pub fn evaluate(latent: LatentState, individual: &Individual, antibody: &AntibodyParams) -> Self {
        let log_likelihood = likelihood::log_likelihood(individual, &latent, antibody);
        Self {
            latent,
            log_likelihood,
        }
    }

    /// Chain starting point: uninfected, baseline at the prior mean.
    pub fn initial(individual: &Individual, antibody: &AntibodyParams) -> Self {
        Self::evaluate(
            LatentState::Uninfected {
                baseline: antibody.baseline_mean,
            },
            individual,
            antibody,
        )
    }

    pub(crate) fn from_parts(latent: LatentState, log_likelihood: f64) -> Self {
        Self {
            latent,
            log_likelihood,
        }
    }

    pub fn latent(&self) -> &LatentState {
        &self.latent
    }

    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    pub fn baseline(&self) -> f64 {
        self.latent.baseline()
    }

    pub fn is_infected(&self) -> bool {
        self.latent.is_infected()
    }

    pub fn boost(&self) -> Option<f64> {
        self.latent.boost()
    }

    pub fn infection_time(&self) -> Option<f64> {
        self.latent.infection_time()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn latent_accessors_follow_variant() {
        let uninfected = LatentState::Uninfected { baseline: 1.5 };
        assert_eq!(uninfected.baseline(), 1.5);
        assert!(!uninfected.is_infected());
        assert_eq!(uninfected.boost(), None);
        assert_eq!(uninfected.infection_time(), None);

        let infected = LatentState::Infected {
            baseline: 2.0,
            boost: 3.0,
            infection_time: 40.0,
        };
        assert!(infected.is_infected());
        assert_eq!(infected.boost(), Some(3.0));
        assert_eq!(infected.infection_time(), Some(40.0));
    }

    #[test]
    fn evaluated_state_caches_matching_log_likelihood() {
        let individual = Individual::observed(1, array![0.0, 50.0, 100.0], array![2.0, 2.1, 1.9]);
        let antibody = AntibodyParams::default();
        let latent = LatentState::Uninfected { baseline: 2.0 };
        let state = ParameterState::evaluate(latent, &individual, &antibody);
        assert_eq!(
            state.log_likelihood(),
            likelihood::log_likelihood(&individual, &latent, &antibody)
        );
    }

    #[test]
    fn initial_state_is_uninfected_at_prior_mean() {
        let individual = Individual::observed(1, array![0.0, 10.0], array![2.0, 2.0]);
        let antibody = AntibodyParams::default();
        let state = ParameterState::initial(&individual, &antibody);
        assert!(!state.is_infected());
        assert_eq!(state.baseline(), antibody.baseline_mean);
        assert!(state.log_likelihood().is_finite());
    }

    #[test]
    #[should_panic(expected = "parallel")]
    fn observed_rejects_mismatched_series() {
        let _ = Individual::observed(1, array![0.0, 1.0], array![2.0]);
    }

    #[test]
    fn from_series_sorts_by_time() {
        let individual = Individual::from_series(3, vec![(20.0, 2.4), (0.0, 2.0), (10.0, 3.1)]);
        assert_eq!(individual.sample_times, array![0.0, 10.0, 20.0]);
        assert_eq!(individual.titres, array![2.0, 3.1, 2.4]);
        assert_eq!(individual.truth, None);
    }

    #[test]
    fn latent_state_serializes_with_status_tag() {
        let infected = LatentState::Infected {
            baseline: 2.0,
            boost: 3.0,
            infection_time: 40.0,
        };
        let text = toml::to_string(&infected).unwrap();
        assert!(text.contains("status = \"infected\""), "{text}");
        let back: LatentState = toml::from_str(&text).unwrap();
        assert_eq!(back, infected);
    }
}
