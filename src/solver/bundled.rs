//! A pure-Rust engine: the model is buffered and handed to `good_lp`'s default
//! solver (`microlp` branch-and-bound) when solved.
//!
//! The engine runs on a worker thread. When the time limit passes first the solve
//! is abandoned and reported as [`NoSolutionReason::BudgetExhausted`], since
//! `microlp` keeps no incumbent to fall back on.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{channel, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use good_lp::{
    constraint, default_solver, variable, Expression, ProblemVariables, ResolutionError,
    Solution as _, SolverModel, Variable,
};
use log::{debug, info};

use super::{
    Constraint, LinExpr, NoSolutionReason, Outcome, Sense, Solution, SolveParams, Solver,
    SolverError, VarId,
};

#[derive(Debug, Clone, Copy)]
enum Domain {
    Binary,
    Continuous { lower: f64 },
}

#[derive(Debug, Clone)]
struct Declared {
    name: String,
    domain: Domain,
}

/// Buffers declarations, constraints and the objective until [`Solver::solve`]
#[derive(Debug, Default)]
pub struct BundledSolver {
    vars: Vec<Declared>,
    constrs: Vec<(String, Constraint)>,
    objective: LinExpr,
}

impl BundledSolver {
    pub fn new() -> BundledSolver {
        BundledSolver::default()
    }

    /// The constraints added so far, with their names
    pub fn constraints(&self) -> &[(String, Constraint)] {
        &self.constrs
    }

    pub fn objective(&self) -> &LinExpr {
        &self.objective
    }

    pub fn var_name(&self, var: VarId) -> Option<&str> {
        self.vars.get(*var).map(|d| d.name.as_str())
    }

    pub fn is_binary(&self, var: VarId) -> bool {
        matches!(
            self.vars.get(*var).map(|d| d.domain),
            Some(Domain::Binary)
        )
    }

    fn declare(&mut self, name: &str, domain: Domain) -> VarId {
        self.vars.push(Declared {
            name: name.to_string(),
            domain,
        });
        VarId::from(self.vars.len() - 1)
    }
}

fn expression(expr: &LinExpr, handles: &[Variable]) -> Expression {
    let mut out = Expression::with_capacity(expr.terms().len());
    for &(var, coeff) in expr.terms() {
        out.add_mul(coeff, handles[*var]);
    }
    out
}

/// A snapshot of the buffered model that can be moved to the worker thread
struct Job {
    vars: Vec<Domain>,
    rows: Vec<Constraint>,
    objective: LinExpr,
}

impl Job {
    fn run(self) -> Result<Outcome, SolverError> {
        let mut problem_vars = ProblemVariables::new();
        let handles: Vec<Variable> = self
            .vars
            .iter()
            .map(|domain| match *domain {
                Domain::Binary => problem_vars.add(variable().binary()),
                Domain::Continuous { lower } => problem_vars.add(variable().min(lower)),
            })
            .collect();

        let mut problem = problem_vars
            .minimise(expression(&self.objective, &handles))
            .using(default_solver);

        for constr in &self.rows {
            let lhs = expression(&constr.expr, &handles);
            let rhs = constr.rhs;
            problem = match constr.sense {
                Sense::Le => problem.with(constraint!(lhs <= rhs)),
                Sense::Ge => problem.with(constraint!(lhs >= rhs)),
                Sense::Eq => problem.with(constraint!(lhs == rhs)),
            };
        }

        match problem.solve() {
            Ok(solved) => {
                let values: Vec<f64> = handles.iter().map(|&h| solved.value(h)).collect();
                let objective = self.objective.eval(|var| values[*var]);
                info!("Solved, objective {:.2}", objective);
                Ok(Outcome::Solved(Solution::new(objective, values)))
            }
            Err(ResolutionError::Infeasible) => Ok(Outcome::NoSolution(NoSolutionReason::Infeasible)),
            Err(ResolutionError::Unbounded) => Ok(Outcome::NoSolution(NoSolutionReason::Unbounded)),
            Err(err) => Err(SolverError::Engine(err.to_string())),
        }
    }
}

/// Runs `job` on a worker thread and waits for it at most `limit`, or indefinitely
/// without one. `Ok(None)` means the limit passed first; the worker is then left to
/// finish on its own and its result is discarded.
fn with_budget<T, F>(limit: Option<Duration>, job: F) -> Result<Option<T>, SolverError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = channel();
    thread::Builder::new()
        .name("bundled-solver".into())
        .spawn(move || {
            // the receiver is gone once the budget ran out
            let _ = tx.send(catch_unwind(AssertUnwindSafe(job)));
        })
        .map_err(|err| SolverError::Engine(format!("could not start the solver thread: {}", err)))?;

    let received = match limit {
        Some(limit) => match rx.recv_timeout(limit) {
            Ok(received) => received,
            Err(RecvTimeoutError::Timeout) => return Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                return Err(SolverError::Engine("the solver thread exited without a result".to_string()))
            }
        },
        None => rx
            .recv()
            .map_err(|_| SolverError::Engine("the solver thread exited without a result".to_string()))?,
    };

    received
        .map(Some)
        .map_err(|_| SolverError::Engine("the solver panicked".to_string()))
}

impl Solver for BundledSolver {
    fn add_binary(&mut self, name: &str) -> Result<VarId, SolverError> {
        Ok(self.declare(name, Domain::Binary))
    }

    fn add_continuous(&mut self, name: &str, lower: f64) -> Result<VarId, SolverError> {
        Ok(self.declare(name, Domain::Continuous { lower }))
    }

    fn add_constr(&mut self, name: &str, constr: Constraint) -> Result<(), SolverError> {
        if let Some(&(var, _)) = constr.expr.terms().iter().find(|(v, _)| **v >= self.vars.len()) {
            return Err(SolverError::Engine(format!(
                "constraint `{}` refers to undeclared variable {:?}",
                name, var
            )));
        }
        self.constrs.push((name.to_string(), constr));
        Ok(())
    }

    fn set_objective(&mut self, objective: LinExpr) -> Result<(), SolverError> {
        self.objective = objective;
        Ok(())
    }

    fn solve(&mut self, params: &SolveParams) -> Result<Outcome, SolverError> {
        // branch-and-bound runs to a proven optimum, which meets any gap
        debug!(
            "bundled engine: gap {} met by proving optimality, feasibility emphasis {} not applied",
            params.mip_gap, params.emphasize_feasibility
        );
        info!(
            "Solving with the bundled engine: {} variables, {} constraints",
            self.vars.len(),
            self.constrs.len()
        );

        let mut rows = Vec::with_capacity(self.constrs.len());
        for (name, constr) in &self.constrs {
            // rows without variables are decided here, the engine does not accept them
            if constr.expr.is_empty() {
                if constr.is_satisfied(|_| 0.0, 1e-9) {
                    continue;
                }
                info!("Constraint `{}` can never hold", name);
                return Ok(Outcome::NoSolution(NoSolutionReason::Infeasible));
            }
            rows.push(constr.clone());
        }

        let limit = params
            .time_limit_secs
            .map(|secs| {
                Duration::try_from_secs_f64(secs)
                    .map_err(|_| SolverError::Engine(format!("invalid time limit {}", secs)))
            })
            .transpose()?;
        let job = Job {
            vars: self.vars.iter().map(|declared| declared.domain).collect(),
            rows,
            objective: self.objective.clone(),
        };

        match with_budget(limit, move || job.run())? {
            Some(outcome) => outcome,
            None => {
                info!(
                    "Time limit of {:.1} s reached without a solution",
                    params.time_limit_secs.unwrap_or_default()
                );
                Ok(Outcome::NoSolution(NoSolutionReason::BudgetExhausted))
            }
        }
    }

    fn num_vars(&self) -> usize {
        self.vars.len()
    }

    fn num_constrs(&self) -> usize {
        self.constrs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::LinSum;

    #[test]
    fn solves_a_small_knapsack() {
        // maximise 5a + 4b + 3c with 2a + 3b + c <= 4, i.e. minimise the negation
        let mut solver = BundledSolver::new();
        let a = solver.add_binary("a").unwrap();
        let b = solver.add_binary("b").unwrap();
        let c = solver.add_binary("c").unwrap();
        let weight = 2.0 * a + 3.0 * b + 1.0 * c;
        solver.add_constr("weight", weight.leq(4.0)).unwrap();
        solver
            .set_objective(-(5.0 * a + 4.0 * b + 3.0 * c))
            .unwrap();

        match solver.solve(&SolveParams::default()).unwrap() {
            Outcome::Solved(solution) => {
                assert!((solution.objective() + 8.0).abs() < 1e-6);
                assert!(solution.value(a) > 0.5);
                assert!(solution.value(b) < 0.5);
                assert!(solution.value(c) > 0.5);
            }
            Outcome::NoSolution(reason) => panic!("unexpected: {}", reason),
        }
    }

    #[test]
    fn reports_infeasibility() {
        let mut solver = BundledSolver::new();
        let x = solver.add_continuous("x", 0.0).unwrap();
        let y = solver.add_binary("y").unwrap();
        solver
            .add_constr("cap", LinExpr::from(x).leq(10.0 * y))
            .unwrap();
        solver.add_constr("need", LinExpr::from(x).geq(20.0)).unwrap();
        solver.set_objective([x, y].lin_sum()).unwrap();

        assert!(matches!(
            solver.solve(&SolveParams::default()).unwrap(),
            Outcome::NoSolution(NoSolutionReason::Infeasible)
        ));
    }

    #[test]
    fn empty_rows_are_decided_without_the_engine() {
        let mut solver = BundledSolver::new();
        let x = solver.add_continuous("x", 0.0).unwrap();
        solver.add_constr("trivial", LinExpr::new().leq(1.0)).unwrap();
        solver.set_objective(LinExpr::from(x)).unwrap();
        assert!(matches!(
            solver.solve(&SolveParams::default()).unwrap(),
            Outcome::Solved(_)
        ));

        solver.add_constr("impossible", LinExpr::new().geq(5.0)).unwrap();
        assert!(matches!(
            solver.solve(&SolveParams::default()).unwrap(),
            Outcome::NoSolution(NoSolutionReason::Infeasible)
        ));
    }

    #[test]
    fn budget_expires_before_a_slow_job() {
        let slow = with_budget(Some(Duration::from_millis(20)), || {
            thread::sleep(Duration::from_secs(2));
            1
        });
        assert!(matches!(slow, Ok(None)));

        assert!(matches!(with_budget(None, || 7), Ok(Some(7))));
        assert!(matches!(
            with_budget(Some(Duration::from_secs(30)), || 7),
            Ok(Some(7))
        ));
    }

    #[test]
    fn a_panicking_engine_is_an_error() {
        let result: Result<Option<()>, _> = with_budget(None, || panic!("boom"));
        assert!(matches!(result, Err(SolverError::Engine(_))));
    }

    #[test]
    fn negative_time_limits_are_rejected() {
        let mut solver = BundledSolver::new();
        let x = solver.add_continuous("x", 0.0).unwrap();
        solver.add_constr("floor", LinExpr::from(x).geq(1.0)).unwrap();
        solver.set_objective(LinExpr::from(x)).unwrap();

        let params = SolveParams {
            time_limit_secs: Some(-1.0),
            ..SolveParams::default()
        };
        assert!(matches!(solver.solve(&params), Err(SolverError::Engine(_))));
    }

    #[test]
    fn rejects_foreign_variables() {
        let mut solver = BundledSolver::new();
        let bogus = LinExpr::from(VarId::from(3));
        assert!(solver.add_constr("bogus", bogus.eq(1.0)).is_err());
        assert_eq!(solver.num_constrs(), 0);
    }
}
