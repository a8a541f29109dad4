//! Gurobi engine through the `grb` bindings. Needs a local Gurobi installation.

use grb::prelude::*;
use log::{debug, info};

use super::{
    Constraint, LinExpr, NoSolutionReason, Outcome, Sense, Solution, SolveParams, Solver,
    SolverError, VarId,
};

impl From<grb::Error> for SolverError {
    fn from(err: grb::Error) -> Self {
        SolverError::Engine(err.to_string())
    }
}

pub struct GurobiSolver {
    model: Model,
    vars: Vec<Var>,
    constrs: usize,
}

impl GurobiSolver {
    pub fn new(name: &str) -> grb::Result<GurobiSolver> {
        let mut model = Model::new(name)?;
        // Disable console output
        model.set_param(param::OutputFlag, 0)?;

        Ok(GurobiSolver {
            model,
            vars: Vec::new(),
            constrs: 0,
        })
    }

    fn expr(&self, expr: &LinExpr) -> grb::expr::LinExpr {
        let mut out = grb::expr::LinExpr::new();
        for &(var, coeff) in expr.terms() {
            out.add_term(coeff, self.vars[*var]);
        }
        out.add_constant(expr.constant());
        out
    }
}

impl Solver for GurobiSolver {
    fn add_binary(&mut self, name: &str) -> Result<VarId, SolverError> {
        let var = add_binvar!(self.model, name: name)?;
        self.vars.push(var);
        Ok(VarId::from(self.vars.len() - 1))
    }

    fn add_continuous(&mut self, name: &str, lower: f64) -> Result<VarId, SolverError> {
        let var = add_ctsvar!(self.model, name: name, bounds: lower..)?;
        self.vars.push(var);
        Ok(VarId::from(self.vars.len() - 1))
    }

    fn add_constr(&mut self, name: &str, constr: Constraint) -> Result<(), SolverError> {
        let lhs = self.expr(&constr.expr);
        let rhs = constr.rhs;
        match constr.sense {
            Sense::Le => self.model.add_constr(name, c!(lhs <= rhs))?,
            Sense::Ge => self.model.add_constr(name, c!(lhs >= rhs))?,
            Sense::Eq => self.model.add_constr(name, c!(lhs == rhs))?,
        };
        self.constrs += 1;
        Ok(())
    }

    fn set_objective(&mut self, objective: LinExpr) -> Result<(), SolverError> {
        let objective = self.expr(&objective);
        self.model.set_objective(objective, Minimize)?;
        Ok(())
    }

    fn solve(&mut self, params: &SolveParams) -> Result<Outcome, SolverError> {
        if let Some(limit) = params.time_limit_secs {
            self.model.set_param(param::TimeLimit, limit)?;
        }
        self.model.set_param(param::MIPGap, params.mip_gap)?;
        if params.emphasize_feasibility {
            self.model.set_param(param::MIPFocus, 1)?;
        }
        debug!("Gurobi parameters: {:?}", params);

        self.model.update()?;
        info!(
            "Solving with Gurobi: {} variables, {} constraints",
            self.vars.len(),
            self.constrs
        );
        self.model.optimize()?;

        let status = self.model.status()?;
        match status {
            Status::Infeasible | Status::InfOrUnbd => {
                return Ok(Outcome::NoSolution(NoSolutionReason::Infeasible))
            }
            Status::Unbounded => return Ok(Outcome::NoSolution(NoSolutionReason::Unbounded)),
            _ => (),
        }

        // Any other status (optimal, time limit, interrupted) is only usable with an incumbent
        if self.model.get_attr(attr::SolCount)? == 0 {
            info!("Gurobi stopped with status {:?} and no incumbent", status);
            return Ok(Outcome::NoSolution(NoSolutionReason::BudgetExhausted));
        }

        let values = self
            .vars
            .iter()
            .map(|var| self.model.get_obj_attr(attr::X, var))
            .collect::<grb::Result<Vec<f64>>>()?;
        let objective = self.model.get_attr(attr::ObjVal)?;
        info!("Gurobi status {:?}, objective {:.2}", status, objective);

        Ok(Outcome::Solved(Solution::new(objective, values)))
    }

    fn num_vars(&self) -> usize {
        self.vars.len()
    }

    fn num_constrs(&self) -> usize {
        self.constrs
    }
}
