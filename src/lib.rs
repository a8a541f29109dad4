//! Containership fleet deployment planning.
//!
//! A run reads a [`Config`], derives the immutable [`Problem`] from it, builds the
//! time-expanded multi-commodity deployment model on a [`Solver`], solves it and decodes
//! the solution into a [`Report`].

pub mod config;
pub mod decode;
pub mod models;
pub mod problem;
pub mod report;
pub mod solver;

use std::fmt;

use derive_more::Display;
use log::warn;

use config::{Config, ConfigError};
use decode::{undeliverable, SolutionDecoder};
use models::deployment::{DeploymentOutcome, DeploymentSolver, Parameters, Sets, Variables};
use problem::Problem;
use report::Report;
use solver::{Solver, SolverError};

#[derive(Debug, Display)]
pub enum PlanError {
    #[display(fmt = "invalid configuration: {}", _0)]
    Config(ConfigError),
    #[display(fmt = "{}", _0)]
    Solver(SolverError),
}

impl std::error::Error for PlanError {}

impl From<ConfigError> for PlanError {
    fn from(err: ConfigError) -> Self {
        PlanError::Config(err)
    }
}

impl From<SolverError> for PlanError {
    fn from(err: SolverError) -> Self {
        PlanError::Solver(err)
    }
}

/// Builds the deployment model for `problem` on `solver`
pub fn build<S: Solver + ?Sized>(
    problem: &Problem,
    solver: &mut S,
) -> Result<(Sets, Parameters, Variables), SolverError> {
    let sets = Sets::new(problem);
    let parameters = Parameters::new(problem, &sets);
    let variables = DeploymentSolver::build(&sets, &parameters, solver)?;
    Ok((sets, parameters, variables))
}

/// Plans the deployment described by `config`. A run without a solution is reported,
/// not returned as an error.
pub fn plan<S: Solver + ?Sized>(config: &Config, solver: &mut S) -> Result<Report, PlanError> {
    let problem = Problem::new(config)?;
    let (sets, parameters, variables) = build(&problem, solver)?;

    match DeploymentSolver::solve(&variables, solver, &config.solver)? {
        DeploymentOutcome::Solved(result) => {
            let decoder = SolutionDecoder::new(&problem, &sets, &parameters, &config.report);
            Ok(decoder.decode(&result))
        }
        DeploymentOutcome::NoSolution(reason) => {
            warn!("No solution: {}", reason);
            Ok(Report::no_solution(reason, undeliverable(&problem)))
        }
    }
}

/// Size of the problem and of the model built for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelStats {
    pub ports: usize,
    pub routes: usize,
    pub ships: usize,
    pub commodities: usize,
    pub checkpoints: usize,
    pub voyages: usize,
    pub variables: usize,
    pub constraints: usize,
    pub undeliverable: Vec<String>,
}

/// Builds the model for `config` without solving it
pub fn inspect<S: Solver + ?Sized>(config: &Config, solver: &mut S) -> Result<ModelStats, PlanError> {
    let problem = Problem::new(config)?;
    let (sets, _, _) = build(&problem, solver)?;

    Ok(ModelStats {
        ports: problem.network().ports().len(),
        routes: problem.network().routes().len(),
        ships: problem.fleet().len(),
        commodities: problem.demand().len(),
        checkpoints: sets.D.len(),
        voyages: sets.Y.len(),
        variables: solver.num_vars(),
        constraints: solver.num_constrs(),
        undeliverable: undeliverable(&problem),
    })
}

impl fmt::Display for ModelStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Ports:        {}", self.ports)?;
        writeln!(f, "Routes:       {}", self.routes)?;
        writeln!(f, "Ships:        {}", self.ships)?;
        writeln!(f, "Commodities:  {}", self.commodities)?;
        writeln!(f, "Checkpoints:  {}", self.checkpoints)?;
        writeln!(f, "Voyages:      {}", self.voyages)?;
        writeln!(f, "Variables:    {}", self.variables)?;
        writeln!(f, "Constraints:  {}", self.constraints)?;
        if self.undeliverable.is_empty() {
            writeln!(f, "Undeliverable: none")
        } else {
            writeln!(f, "Undeliverable: {}", self.undeliverable.join(", "))
        }
    }
}
