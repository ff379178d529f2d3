use ndarray::Array1;
use serojump::chain::{ChainConfig, NoopChainProgress, run_chain};
use serojump::kinetics::predict_titre;
use serojump::{
    AntibodyParams, Individual, LatentState, ParameterState, RandomSource, Sampler, SamplerConfig,
    StudyParams, mcmc_step_individual,
};

fn study() -> StudyParams {
    StudyParams {
        study_start: 0.0,
        study_end: 100.0,
        n_individuals: 1,
        infection_rate: 0.3,
        infection_hazard: Vec::new(),
    }
}

fn grid() -> Array1<f64> {
    Array1::linspace(0.0, 100.0, 21)
}

fn infected_at_thirty() -> Individual {
    let times = grid();
    let titres = times.mapv(|t| predict_titre(2.0, 3.0, 0.1, 30.0, t));
    Individual::observed(1, times, titres)
}

fn never_infected() -> Individual {
    let times = grid();
    let titres = Array1::from_elem(times.len(), 2.0);
    Individual::observed(2, times, titres)
}

fn chain_config() -> ChainConfig {
    ChainConfig {
        n_steps: 6000,
        burnin: 2000,
        thin: 1,
    }
}

#[test]
fn infected_trajectory_is_recognized() {
    let individual = infected_at_thirty();
    let antibody = AntibodyParams::default();
    let s = study();
    let mut sampler = Sampler::with_seed(SamplerConfig::default(), 2024);
    let result = run_chain(
        &mut sampler,
        &individual,
        ParameterState::initial(&individual, &antibody),
        &antibody,
        &s,
        &chain_config(),
        &mut NoopChainProgress,
    )
    .unwrap();

    let summary = result.summary();
    assert!(
        summary.infection_probability > 0.9,
        "P(infected) = {}",
        summary.infection_probability
    );
    let (_, median, _) = summary.infection_time_quartiles.expect("infected draws exist");
    assert!((median - 30.0).abs() < 10.0, "median infection time {median}");
    let boost = summary.boost_mean.unwrap();
    assert!((boost - 3.0).abs() < 1.0, "boost mean {boost}");
    assert!((summary.baseline_mean - 2.0).abs() < 0.2);
}

#[test]
fn flat_trajectory_is_mostly_uninfected() {
    let individual = never_infected();
    let antibody = AntibodyParams::default();
    let s = study();
    let mut sampler = Sampler::with_seed(SamplerConfig::default(), 99);
    let result = run_chain(
        &mut sampler,
        &individual,
        ParameterState::initial(&individual, &antibody),
        &antibody,
        &s,
        &chain_config(),
        &mut NoopChainProgress,
    )
    .unwrap();

    let summary = result.summary();
    assert!(
        summary.infection_probability < 0.3,
        "P(infected) = {}",
        summary.infection_probability
    );
    assert!((summary.baseline_mean - 2.0).abs() < 0.2);
}

#[test]
fn chain_state_invariants_hold_at_every_step() {
    let individual = infected_at_thirty();
    let antibody = AntibodyParams::default();
    let s = study();
    let mut rng = RandomSource::new(5);
    let mut state = ParameterState::initial(&individual, &antibody);
    for _ in 0..3000 {
        let result = mcmc_step_individual(&mut rng, &individual, &state, &antibody, &s);
        state = result.state;
        assert!((0.0..=1.0).contains(&result.acceptance_probability));
        if let LatentState::Infected {
            boost,
            infection_time,
            ..
        } = *state.latent()
        {
            assert!(boost > 0.0);
            assert!(s.contains(infection_time));
        }
        assert!(state.log_likelihood().is_finite());
    }
}

#[test]
fn chains_are_reproducible_per_stream() {
    let individual = infected_at_thirty();
    let antibody = AntibodyParams::default();
    let s = study();
    let config = ChainConfig {
        n_steps: 500,
        burnin: 100,
        thin: 5,
    };
    let run = |stream| {
        let mut sampler = Sampler::new(SamplerConfig::default(), RandomSource::for_stream(42, stream));
        run_chain(
            &mut sampler,
            &individual,
            ParameterState::initial(&individual, &antibody),
            &antibody,
            &s,
            &config,
            &mut NoopChainProgress,
        )
        .unwrap()
    };

    let a = run(1);
    let b = run(1);
    assert_eq!(a.draws, b.draws);
    assert_eq!(a.tallies, b.tallies);

    let c = run(2);
    assert_ne!(a.draws, c.draws);
}
