use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use ihtp_search::builder::instance_build;
use ihtp_search::config::SearchConfig;
use ihtp_search::ot_and_room_assignment::build_initial_state;
use ihtp_search::search::{
    run_controller, run_pipeline, Checkpoint, ControllerKind, NoCheckpoint, SolutionFileCheckpoint,
};
use ihtp_search::solution::SolutionFile;
use ihtp_search::telemetry::Telemetry;
use ihtp_search::validator::validate;

#[derive(Parser)]
#[command(name = "ihtp", version, about = "Integrated healthcare timetabling search")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Recompute violations and costs of a solution file.
    Validate {
        instance: PathBuf,
        solution: PathBuf,
        /// Log every violation found.
        #[arg(long)]
        verbose: bool,
    },
    /// Build a first plan from the instance alone.
    Seed {
        instance: PathBuf,
        #[arg(long, short)]
        output: PathBuf,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Improve a plan within a time limit.
    Solve {
        instance: PathBuf,
        /// Starting solution; a fresh seed plan when absent.
        #[arg(long)]
        initial: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = Controller::Pipeline)]
        controller: Controller,
        /// Seconds; overrides the config file.
        #[arg(long)]
        time_limit: Option<f64>,
        #[arg(long)]
        config: Option<PathBuf>,
        /// CSV file for progress rows.
        #[arg(long)]
        telemetry: Option<PathBuf>,
        /// Rewritten on every improvement.
        #[arg(long, short)]
        output: Option<PathBuf>,
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Controller {
    HillClimb,
    Annealing,
    Pails,
    Pipeline,
}

impl Controller {
    fn kind(self) -> Option<ControllerKind> {
        match self {
            Controller::HillClimb => Some(ControllerKind::HillClimb),
            Controller::Annealing => Some(ControllerKind::Annealing),
            Controller::Pails => Some(ControllerKind::Pails),
            Controller::Pipeline => None,
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    fmt().with_env_filter(filter).with_target(false).init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let verbose = matches!(cli.command, Command::Validate { verbose: true, .. });
    init_logging(verbose);

    match cli.command {
        Command::Validate { instance, solution, .. } => {
            let instance = instance_build(&instance)
                .with_context(|| format!("loading instance {}", instance.display()))?;
            let file = SolutionFile::read(&solution)
                .with_context(|| format!("loading solution {}", solution.display()))?;
            let report = validate(&instance, &file)?;
            print!("{}", report);
        }
        Command::Seed { instance, output, seed } => {
            let instance = instance_build(&instance)
                .with_context(|| format!("loading instance {}", instance.display()))?;
            let mut rng = StdRng::seed_from_u64(seed.unwrap_or(SearchConfig::default().seed));
            let state = build_initial_state(&instance, &mut rng)?;
            SolutionFile::from_state(&state)
                .write(&output)
                .with_context(|| format!("writing {}", output.display()))?;
            info!(path = %output.display(), hard = state.hard_violations, soft = state.soft_cost, "seed written");
        }
        Command::Solve {
            instance,
            initial,
            controller,
            time_limit,
            config,
            telemetry,
            output,
            seed,
        } => {
            let mut config = match config {
                Some(path) => SearchConfig::load(&path).with_context(|| format!("loading config {}", path.display()))?,
                None => SearchConfig::default(),
            };
            if let Some(secs) = time_limit {
                config.time_limit_secs = secs;
            }
            if let Some(seed) = seed {
                config.seed = seed;
            }

            let instance = instance_build(&instance)
                .with_context(|| format!("loading instance {}", instance.display()))?;
            let state = match initial {
                Some(path) => SolutionFile::read(&path)
                    .and_then(|file| file.to_state(&instance))
                    .with_context(|| format!("loading initial solution {}", path.display()))?,
                None => build_initial_state(&instance, &mut StdRng::seed_from_u64(config.seed))?,
            };

            let mut telemetry = match telemetry {
                Some(path) => Telemetry::to_path(&path).with_context(|| format!("creating {}", path.display()))?,
                None => Telemetry::disabled(),
            };
            let mut checkpoint: Box<dyn Checkpoint> = match &output {
                Some(path) => Box::new(SolutionFileCheckpoint::new(path)),
                None => Box::new(NoCheckpoint),
            };

            let budget = config.time_limit();
            let outcome = match controller.kind() {
                Some(kind) => run_controller(kind, state, budget, &config, &mut telemetry, checkpoint.as_mut())?,
                None => run_pipeline(state, budget, &config, &mut telemetry, checkpoint.as_mut())?,
            };

            if let Some(path) = &output {
                SolutionFile::from_state(&outcome.best)
                    .write(path)
                    .with_context(|| format!("writing {}", path.display()))?;
            }
            let report = validate(&instance, &SolutionFile::from_state(&outcome.best))?;
            info!(
                iterations = outcome.iterations,
                violations = report.total_violations(),
                cost = report.total_cost(),
                "search finished"
            );
            print!("{}", report);
        }
    }
    Ok(())
}
