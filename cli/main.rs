#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process;

use serojump::chain::{ChainProgressObserver, find_individual, run_chain};
use serojump::config::RunConfig;
use serojump::data::load_observations;
use serojump::export::FlatStudy;
use serojump::{Individual, ParameterState, RandomSource, Sampler, simulate_study};

#[derive(Parser)]
#[command(
    name = "serojump",
    about = "Simulate antibody titre studies and infer per-individual infection by MCMC",
    long_about = "Simulates individual antibody trajectories under a latent infection process and \
                 infers infection status, infection time and kinetics parameters for one individual \
                 with a Metropolis-Hastings sampler."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a run configuration with default values
    #[command(about = "Write a default run configuration (outputs: run.toml)")]
    InitConfig {
        /// Destination of the configuration file
        #[arg(long, default_value = "run.toml")]
        out: PathBuf,
    },

    /// Simulate a study and write its samples as TSV
    #[command(about = "Simulate a study (outputs: study.tsv)")]
    Simulate {
        /// Path to the run configuration (.toml)
        #[arg(long)]
        config: PathBuf,

        /// Destination of the flattened sample table
        #[arg(long, default_value = "study.tsv")]
        out: PathBuf,
    },

    /// Run one individual's chain and summarize it
    #[command(about = "Fit one individual by MCMC, simulated or from observed data")]
    Fit {
        /// Path to the run configuration (.toml)
        #[arg(long)]
        config: PathBuf,

        /// Identifier of the individual to fit
        #[arg(long, value_name = "ID")]
        individual: usize,

        /// Observed titres (CSV with columns person_id,time,biomarker_value).
        /// When omitted, the study is simulated from the configuration.
        #[arg(long)]
        data: Option<PathBuf>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::InitConfig { out } => init_config_command(&out),
        Commands::Simulate { config, out } => simulate_command(&config, &out),
        Commands::Fit {
            config,
            individual,
            data,
        } => fit_command(&config, individual, data.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn init_config_command(out: &Path) -> Result<(), Box<dyn std::error::Error>> {
    RunConfig::default().save(out)?;
    println!("Default configuration written to: {}", out.display());
    Ok(())
}

fn simulate_study_from(config: &RunConfig) -> Vec<Individual> {
    let mut rng = RandomSource::new(config.seed);
    simulate_study(
        &mut rng,
        &config.study,
        &config.antibody,
        config.samples_per_individual,
    )
}

fn simulate_command(config_path: &Path, out: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Loading configuration from: {}", config_path.display());
    let config = RunConfig::load(config_path)?;

    let individuals = simulate_study_from(&config);
    let flat = FlatStudy::from_individuals(&individuals);
    println!(
        "Simulated {} individuals ({} infected), {} samples in total",
        flat.n_individuals(),
        flat.n_infected(),
        flat.total_samples()
    );

    flat.save_tsv(out)?;
    println!("Samples saved to: {}", out.display());
    Ok(())
}

fn fit_command(
    config_path: &Path,
    individual_id: usize,
    data_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Loading configuration from: {}", config_path.display());
    let config = RunConfig::load(config_path)?;

    let individuals = match data_path {
        Some(path) => {
            println!("Loading observations from: {}", path.display());
            load_observations(path)?
        }
        None => simulate_study_from(&config),
    };
    let individual = find_individual(&individuals, individual_id)?;
    println!(
        "Fitting individual {} ({} samples)",
        individual.id,
        individual.n_samples()
    );
    if individual.observations().any(|(t, _)| !config.study.contains(t)) {
        log::warn!(
            "Individual {} has samples outside the study window [{}, {}]",
            individual.id,
            config.study.study_start,
            config.study.study_end
        );
    }
    log::info!(
        "Move mixture: parameters {:.2}, infection time {:.2}, flip {:.2} (flip takes the time share when uninfected)",
        config.sampler.parameter_move_probability,
        config.sampler.time_move_probability,
        config.sampler.flip_move_probability()
    );

    let rng = RandomSource::for_stream(config.seed, individual.id as u64);
    let mut sampler = Sampler::new(config.sampler, rng);
    let initial = ParameterState::initial(individual, &config.antibody);
    let mut progress = BarProgress::new();
    let result = run_chain(
        &mut sampler,
        individual,
        initial,
        &config.antibody,
        &config.study,
        &config.chain,
        &mut progress,
    )?;

    println!("{}", result.summary());
    println!(
        "mean MH acceptance:    {:.3}",
        result.mean_acceptance_probability
    );
    if let Some(truth) = individual.truth {
        match truth.infection_time {
            Some(t) => println!(
                "truth:                 infected at {t:.2}, baseline {:.3}",
                truth.baseline
            ),
            None => println!("truth:                 uninfected, baseline {:.3}", truth.baseline),
        }
    }

    let fitted =
        result.posterior_mean_trajectory(config.antibody.decay_rate, individual.sample_times.view());
    println!("\n{:>10}  {:>10}  {:>10}", "time", "observed", "fitted");
    for ((time, observed), fitted) in individual.observations().zip(fitted.iter()) {
        println!("{time:>10.2}  {observed:>10.3}  {fitted:>10.3}");
    }
    Ok(())
}

/// Progress bar drawn to stderr when it is a terminal.
struct BarProgress {
    bar: Option<ProgressBar>,
}

impl BarProgress {
    fn new() -> Self {
        Self { bar: None }
    }
}

impl ChainProgressObserver for BarProgress {
    fn on_start(&mut self, individual_id: usize, total_steps: usize) {
        let draw_target = if std::io::stderr().is_terminal() {
            ProgressDrawTarget::stderr_with_hz(20)
        } else {
            ProgressDrawTarget::hidden()
        };
        let bar = ProgressBar::with_draw_target(Some(total_steps as u64), draw_target);
        if let Ok(style) = ProgressStyle::with_template(
            "> [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        ) {
            bar.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
        }
        bar.set_message(format!("individual {individual_id}"));
        self.bar = Some(bar);
    }

    fn on_advance(&mut self, completed_steps: usize) {
        if let Some(bar) = &self.bar {
            bar.set_position(completed_steps as u64);
        }
    }

    fn on_finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}
