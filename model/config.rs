//! # Run Configuration
//!
//! A run is described by one human-readable TOML file holding the study
//! design, the antibody hyperparameters, the sampler tuning, the chain length
//! and the master seed. Values are validated on load, so the numerical core
//! can assume sane inputs (positive standard deviations, a non-empty study
//! window, a probability for the infection rate).

use crate::chain::{ChainConfig, ChainError};
use crate::mcmc::SamplerConfig;
use crate::types::{AntibodyParams, StudyParams};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Master seed. Simulation uses it directly; chains derive per-individual
    /// streams from it.
    pub seed: u64,
    pub samples_per_individual: usize,
    pub study: StudyParams,
    pub antibody: AntibodyParams,
    #[serde(default)]
    pub sampler: SamplerConfig,
    #[serde(default)]
    pub chain: ChainConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: 12345,
            samples_per_individual: 5,
            study: StudyParams::default(),
            antibody: AntibodyParams::default(),
            sampler: SamplerConfig::default(),
            chain: ChainConfig::default(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read or write configuration file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML configuration: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize configuration to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("study_end ({end}) must be greater than study_start ({start}).")]
    EmptyStudyWindow { start: f64, end: f64 },
    #[error("infection_rate must lie in [0, 1], found {0}.")]
    InfectionRateOutOfRange(f64),
    #[error("'{name}' must be strictly positive and finite, found {value}.")]
    NonPositive { name: &'static str, value: f64 },
    #[error("decay_rate must be non-negative, found {0}.")]
    NegativeDecay(f64),
    #[error(
        "Move probabilities must be non-negative and sum to at most 1 (parameter {parameter}, time {time})."
    )]
    InvalidMoveMixture { parameter: f64, time: f64 },
    #[error("samples_per_individual must be at least 1.")]
    NoSamples,
    #[error("{0}")]
    Chain(#[from] ChainError),
}

fn require_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { name, value })
    }
}

pub fn validate_study(study: &StudyParams) -> Result<(), ConfigError> {
    if !(study.study_end > study.study_start) {
        return Err(ConfigError::EmptyStudyWindow {
            start: study.study_start,
            end: study.study_end,
        });
    }
    if !(0.0..=1.0).contains(&study.infection_rate) {
        return Err(ConfigError::InfectionRateOutOfRange(study.infection_rate));
    }
    Ok(())
}

pub fn validate_antibody(antibody: &AntibodyParams) -> Result<(), ConfigError> {
    require_positive("baseline_sd", antibody.baseline_sd)?;
    require_positive("boost_sd", antibody.boost_sd)?;
    require_positive("observation_sd", antibody.observation_sd)?;
    if !(antibody.decay_rate >= 0.0) {
        return Err(ConfigError::NegativeDecay(antibody.decay_rate));
    }
    Ok(())
}

pub fn validate_sampler(sampler: &SamplerConfig) -> Result<(), ConfigError> {
    require_positive("baseline_step", sampler.baseline_step)?;
    require_positive("boost_step", sampler.boost_step)?;
    require_positive("boost_floor", sampler.boost_floor)?;
    require_positive("time_step_fraction", sampler.time_step_fraction)?;
    require_positive("flip_boost", sampler.flip_boost)?;
    let parameter = sampler.parameter_move_probability;
    let time = sampler.time_move_probability;
    if !(parameter >= 0.0 && time >= 0.0 && parameter + time <= 1.0) {
        return Err(ConfigError::InvalidMoveMixture { parameter, time });
    }
    Ok(())
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_study(&self.study)?;
        validate_antibody(&self.antibody)?;
        validate_sampler(&self.sampler)?;
        self.chain.validate()?;
        if self.samples_per_individual == 0 {
            return Err(ConfigError::NoSamples);
        }
        Ok(())
    }

    /// Loads and validates a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves the configuration in a human-readable TOML format.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let text = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(text.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_config_is_valid() {
        RunConfig::default().validate().unwrap();
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.toml");
        let mut config = RunConfig::default();
        config.seed = 99;
        config.study.infection_rate = 0.45;
        config.chain.burnin = 100;
        config.save(&path).unwrap();

        let loaded = RunConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let text = r#"
seed = 7
samples_per_individual = 4

[study]
study_start = 0.0
study_end = 50.0
n_individuals = 3
infection_rate = 0.2

[antibody]
baseline_mean = 2.0
baseline_sd = 0.5
boost_mean = 3.0
boost_sd = 1.0
decay_rate = 0.1
observation_sd = 0.2

[sampler]
baseline_step = 0.05
"#;
        let config: RunConfig = toml::from_str(text).unwrap();
        config.validate().unwrap();
        assert_eq!(config.sampler.baseline_step, 0.05);
        assert_eq!(config.sampler.boost_step, SamplerConfig::default().boost_step);
        assert_eq!(config.chain, ChainConfig::default());
        assert!(config.study.infection_hazard.is_empty());
    }

    #[test]
    fn rejects_empty_study_window() {
        let mut config = RunConfig::default();
        config.study.study_end = config.study.study_start;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyStudyWindow { .. })
        ));
    }

    #[test]
    fn rejects_out_of_range_rate_and_bad_sds() {
        let mut config = RunConfig::default();
        config.study.infection_rate = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InfectionRateOutOfRange(_))
        ));

        let mut config = RunConfig::default();
        config.antibody.observation_sd = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositive {
                name: "observation_sd",
                ..
            })
        ));

        let mut config = RunConfig::default();
        config.antibody.decay_rate = -0.1;
        assert!(matches!(config.validate(), Err(ConfigError::NegativeDecay(_))));
    }

    #[test]
    fn rejects_overfull_move_mixture() {
        let mut config = RunConfig::default();
        config.sampler.parameter_move_probability = 0.8;
        config.sampler.time_move_probability = 0.4;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidMoveMixture { .. })
        ));
    }

    #[test]
    fn chain_errors_surface_through_config() {
        let mut config = RunConfig::default();
        config.chain.burnin = config.chain.n_steps;
        assert!(matches!(config.validate(), Err(ConfigError::Chain(_))));
    }

    #[test]
    fn load_reports_parse_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "seed = \"not a number\"").unwrap();
        assert!(matches!(
            RunConfig::load(&path),
            Err(ConfigError::TomlParseError(_))
        ));
    }
}
