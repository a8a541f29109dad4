//! The boundary between the deployment model and a mixed-integer solving engine.
//!
//! The model only ever declares variables, adds linear constraints, sets a linear
//! objective to minimise and asks for a solve through [`Solver`]. Which engine sits
//! behind the trait does not change the model.

pub mod bundled;
#[cfg(feature = "gurobi")]
pub mod gurobi;

use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

use derive_more::{Deref, Display, From, Into};
use serde::{Deserialize, Serialize};

pub use bundled::BundledSolver;
#[cfg(feature = "gurobi")]
pub use gurobi::GurobiSolver;

/// A dense handle to a variable declared on a [`Solver`]
#[derive(Deref, Debug, PartialEq, Eq, PartialOrd, Ord, From, Into, Clone, Copy, Hash)]
pub struct VarId(usize);

/// An affine expression `Σ coeff · var + constant`
#[derive(Debug, Clone, Default)]
pub struct LinExpr {
    terms: Vec<(VarId, f64)>,
    constant: f64,
}

impl LinExpr {
    pub fn new() -> LinExpr {
        LinExpr::default()
    }

    /// The terms, possibly with repeated variables
    pub fn terms(&self) -> &[(VarId, f64)] {
        &self.terms
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Evaluates the expression for the given variable values
    pub fn eval<F: Fn(VarId) -> f64>(&self, value: F) -> f64 {
        self.terms
            .iter()
            .map(|&(var, coeff)| coeff * value(var))
            .sum::<f64>()
            + self.constant
    }

    /// `self <= rhs`
    pub fn leq(self, rhs: impl Into<LinExpr>) -> Constraint {
        Constraint::new(self - rhs, Sense::Le)
    }

    /// `self >= rhs`
    pub fn geq(self, rhs: impl Into<LinExpr>) -> Constraint {
        Constraint::new(self - rhs, Sense::Ge)
    }

    /// `self == rhs`
    pub fn eq(self, rhs: impl Into<LinExpr>) -> Constraint {
        Constraint::new(self - rhs, Sense::Eq)
    }
}

impl From<VarId> for LinExpr {
    fn from(var: VarId) -> Self {
        LinExpr {
            terms: vec![(var, 1.0)],
            constant: 0.0,
        }
    }
}

impl From<&VarId> for LinExpr {
    fn from(var: &VarId) -> Self {
        LinExpr::from(*var)
    }
}

impl From<f64> for LinExpr {
    fn from(constant: f64) -> Self {
        LinExpr {
            terms: Vec::new(),
            constant,
        }
    }
}

impl<T: Into<LinExpr>> Add<T> for LinExpr {
    type Output = LinExpr;

    fn add(mut self, rhs: T) -> Self::Output {
        self += rhs;
        self
    }
}

impl<T: Into<LinExpr>> AddAssign<T> for LinExpr {
    fn add_assign(&mut self, rhs: T) {
        let rhs = rhs.into();
        self.terms.extend(rhs.terms);
        self.constant += rhs.constant;
    }
}

impl<T: Into<LinExpr>> Sub<T> for LinExpr {
    type Output = LinExpr;

    fn sub(self, rhs: T) -> Self::Output {
        let rhs: LinExpr = rhs.into();
        self + (-rhs)
    }
}

impl Neg for LinExpr {
    type Output = LinExpr;

    fn neg(self) -> Self::Output {
        self * -1.0
    }
}

impl Mul<f64> for LinExpr {
    type Output = LinExpr;

    fn mul(mut self, rhs: f64) -> Self::Output {
        self.terms.iter_mut().for_each(|(_, coeff)| *coeff *= rhs);
        self.constant *= rhs;
        self
    }
}

impl Mul<VarId> for f64 {
    type Output = LinExpr;

    fn mul(self, rhs: VarId) -> Self::Output {
        LinExpr {
            terms: vec![(rhs, self)],
            constant: 0.0,
        }
    }
}

impl<T: Into<LinExpr>> Sum<T> for LinExpr {
    fn sum<I: Iterator<Item = T>>(iter: I) -> Self {
        iter.fold(LinExpr::new(), |acc, x| acc + x)
    }
}

/// Sums any iterator of variables or expressions into a [`LinExpr`]
pub trait LinSum {
    fn lin_sum(self) -> LinExpr;
}

impl<I> LinSum for I
where
    I: IntoIterator,
    I::Item: Into<LinExpr>,
{
    fn lin_sum(self) -> LinExpr {
        self.into_iter().sum()
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    #[display(fmt = "<=")]
    Le,
    #[display(fmt = ">=")]
    Ge,
    #[display(fmt = "==")]
    Eq,
}

/// A linear constraint `expr (<=|>=|==) rhs`, where `expr` carries no constant
#[derive(Debug, Clone)]
pub struct Constraint {
    pub expr: LinExpr,
    pub sense: Sense,
    pub rhs: f64,
}

impl Constraint {
    /// Moves the constant of `lhs - rhs` to the right hand side
    fn new(mut diff: LinExpr, sense: Sense) -> Constraint {
        let rhs = -diff.constant;
        diff.constant = 0.0;
        Constraint {
            expr: diff,
            sense,
            rhs,
        }
    }

    /// Whether the constraint holds for the given values, up to `tolerance`
    pub fn is_satisfied<F: Fn(VarId) -> f64>(&self, value: F, tolerance: f64) -> bool {
        let lhs = self.expr.eval(value);
        match self.sense {
            Sense::Le => lhs <= self.rhs + tolerance,
            Sense::Ge => lhs >= self.rhs - tolerance,
            Sense::Eq => (lhs - self.rhs).abs() <= tolerance,
        }
    }
}

/// Limits and emphasis handed to the engine for one solve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolveParams {
    /// Wall clock limit in seconds, `None` for no limit
    pub time_limit_secs: Option<f64>,
    /// Relative optimality gap at which the search may stop
    pub mip_gap: f64,
    /// Prefer finding any feasible solution quickly over proving optimality
    pub emphasize_feasibility: bool,
}

impl Default for SolveParams {
    fn default() -> Self {
        Self {
            time_limit_secs: Some(120.0),
            mip_gap: 0.02,
            emphasize_feasibility: true,
        }
    }
}

/// Why a solve returned without a solution
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoSolutionReason {
    #[display(fmt = "the model is proven infeasible")]
    Infeasible,
    #[display(fmt = "the model is unbounded")]
    Unbounded,
    #[display(fmt = "no solution found within the time/gap budget")]
    BudgetExhausted,
}

/// The values assigned to every declared variable, with the objective they attain
#[derive(Debug, Clone)]
pub struct Solution {
    objective: f64,
    values: Vec<f64>,
}

impl Solution {
    pub fn new(objective: f64, values: Vec<f64>) -> Solution {
        Solution { objective, values }
    }

    pub fn objective(&self) -> f64 {
        self.objective
    }

    /// The value of `var`. Variables the engine did not report are zero.
    pub fn value(&self, var: VarId) -> f64 {
        self.values.get(*var).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Solved(Solution),
    NoSolution(NoSolutionReason),
}

#[derive(Debug, Display)]
pub enum SolverError {
    #[display(fmt = "solver engine error: {}", _0)]
    Engine(String),
    #[display(fmt = "engine `{}` is not available in this build", _0)]
    Unavailable(String),
}

impl std::error::Error for SolverError {}

/// A mixed-integer linear programming engine
pub trait Solver {
    /// Declares a variable restricted to {0, 1}
    fn add_binary(&mut self, name: &str) -> Result<VarId, SolverError>;

    /// Declares a continuous variable in `[lower, ∞)`
    fn add_continuous(&mut self, name: &str, lower: f64) -> Result<VarId, SolverError>;

    fn add_constr(&mut self, name: &str, constr: Constraint) -> Result<(), SolverError>;

    /// Sets the objective to minimise
    fn set_objective(&mut self, objective: LinExpr) -> Result<(), SolverError>;

    fn solve(&mut self, params: &SolveParams) -> Result<Outcome, SolverError>;

    fn num_vars(&self) -> usize;

    fn num_constrs(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(i: usize) -> VarId {
        VarId::from(i)
    }

    #[test]
    fn constants_move_to_the_right_hand_side() {
        let lhs = LinExpr::from(v(0)) + 2.0 * v(1) + 3.0;
        let c = lhs.leq(LinExpr::from(v(2)) + 10.0);

        assert_eq!(c.sense, Sense::Le);
        assert_eq!(c.rhs, 7.0);
        assert_eq!(c.expr.constant(), 0.0);
        assert_eq!(c.expr.terms(), &[(v(0), 1.0), (v(1), 2.0), (v(2), -1.0)]);
    }

    #[test]
    fn sums_and_scaling() {
        let e = [v(0), v(1), v(2)].iter().lin_sum() * 2.0;
        assert_eq!(e.eval(|x| *x as f64), 6.0);

        let empty: LinExpr = Vec::<VarId>::new().lin_sum();
        assert!(empty.is_empty());
        assert_eq!(empty.eval(|_| 1.0), 0.0);
    }

    #[test]
    fn satisfaction_respects_sense_and_tolerance() {
        let values = |x: VarId| [1.0, 2.0][*x];
        let sum = LinExpr::from(v(0)) + v(1);

        assert!(sum.clone().eq(3.0).is_satisfied(values, 1e-9));
        assert!(sum.clone().leq(3.0).is_satisfied(values, 1e-9));
        assert!(!sum.clone().geq(3.5).is_satisfied(values, 1e-9));
        assert!(sum.geq(3.0 + 1e-7).is_satisfied(values, 1e-6));
    }

    #[test]
    fn missing_values_read_as_zero() {
        let solution = Solution::new(1.0, vec![0.5]);
        assert_eq!(solution.value(v(0)), 0.5);
        assert_eq!(solution.value(v(4)), 0.0);
    }
}
