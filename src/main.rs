use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info};

use fleetplan::config::{Config, Preset};
use fleetplan::solver::{BundledSolver, Solver, SolverError};

#[derive(Parser)]
#[clap(name = "fleetplan", version, about = "Containership fleet deployment planner")]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build and solve the deployment model, then print the plan
    Solve {
        /// Path to the JSON configuration
        #[clap(value_parser)]
        config: PathBuf,
        #[clap(long, value_enum)]
        preset: Option<PresetArg>,
        /// Wall clock limit in seconds
        #[clap(long, value_parser)]
        time_limit: Option<f64>,
        /// Relative optimality gap
        #[clap(long, value_parser)]
        gap: Option<f64>,
        #[clap(long, value_enum, default_value_t = Engine::Bundled)]
        engine: Engine,
        #[clap(long, value_enum, default_value_t = Format::Text)]
        format: Format,
        /// Write the report here instead of stdout
        #[clap(short, long, value_parser)]
        output: Option<PathBuf>,
        /// Follow one commodity, e.g. SHA->LAX, through the text report. Repeatable.
        #[clap(long, value_parser)]
        trace: Vec<String>,
    },
    /// Build the model and print its size without solving
    Inspect {
        #[clap(value_parser)]
        config: PathBuf,
        #[clap(long, value_enum)]
        preset: Option<PresetArg>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PresetArg {
    Baseline,
    Strict,
    Exploratory,
}

impl From<PresetArg> for Preset {
    fn from(arg: PresetArg) -> Self {
        match arg {
            PresetArg::Baseline => Preset::Baseline,
            PresetArg::Strict => Preset::Strict,
            PresetArg::Exploratory => Preset::Exploratory,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Engine {
    Bundled,
    Gurobi,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn engine(engine: Engine) -> Result<Box<dyn Solver>, SolverError> {
    match engine {
        Engine::Bundled => Ok(Box::new(BundledSolver::new())),
        #[cfg(feature = "gurobi")]
        Engine::Gurobi => Ok(Box::new(fleetplan::solver::GurobiSolver::new(
            "fleet_deployment",
        )?)),
        #[cfg(not(feature = "gurobi"))]
        Engine::Gurobi => Err(SolverError::Unavailable("gurobi".to_string())),
    }
}

fn load(path: &Path, preset: Option<PresetArg>) -> Result<Config, Box<dyn Error>> {
    let mut config = Config::from_path(path)?;
    if let Some(preset) = preset {
        config.apply_preset(preset.into());
    }
    Ok(config)
}

/// Runs a command. `Ok(false)` means the run finished without a plan.
fn run(cli: Cli) -> Result<bool, Box<dyn Error>> {
    match cli.command {
        Command::Solve {
            config,
            preset,
            time_limit,
            gap,
            engine: choice,
            format,
            output,
            trace,
        } => {
            let mut config = load(&config, preset)?;
            if time_limit.is_some() {
                config.solver.time_limit_secs = time_limit;
            }
            if let Some(gap) = gap {
                config.solver.mip_gap = gap;
            }

            let mut solver = engine(choice)?;
            let report = fleetplan::plan(&config, &mut *solver)?;
            let rendered = match format {
                Format::Text => {
                    let mut text = report.to_string();
                    if report.is_solved() {
                        for commodity in &trace {
                            text.push('\n');
                            text.push_str(&report.trace(commodity).to_string());
                        }
                    }
                    text
                }
                Format::Json => report.to_json()?,
            };
            match output {
                Some(path) => {
                    fs::write(&path, rendered)?;
                    info!("Report written to {}", path.display());
                }
                None => println!("{}", rendered),
            }

            Ok(report.is_solved())
        }
        Command::Inspect { config, preset } => {
            let config = load(&config, preset)?;
            let mut solver = BundledSolver::new();
            let stats = fleetplan::inspect(&config, &mut solver)?;
            print!("{}", stats);
            Ok(true)
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()) {
        Ok(true) => (),
        Ok(false) => process::exit(2),
        Err(err) => {
            error!("{}", err);
            process::exit(1);
        }
    }
}
