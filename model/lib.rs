#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

pub mod chain;
pub mod config;
pub mod data;
pub mod export;
pub mod kinetics;
pub mod likelihood;
pub mod mcmc;
pub mod proposal;
pub mod rng;
pub mod simulate;
pub mod types;

pub use chain::{ChainConfig, ChainResult, PosteriorSummary, run_chain};
pub use mcmc::{McmcStepResult, MoveKind, Sampler, SamplerConfig, mcmc_step_individual};
pub use rng::RandomSource;
pub use simulate::{simulate_individual, simulate_study};
pub use types::{AntibodyParams, GroundTruth, Individual, LatentState, ParameterState, StudyParams};
