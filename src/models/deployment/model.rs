use std::collections::HashMap;

use itertools::iproduct;
use log::{debug, info, trace};

use super::sets_and_parameters::{Parameters, Sets, VoyageKey};
use crate::models::utils::{AddVars, ConvertVars};
use crate::problem::demand::CommodityIndex;
use crate::problem::fleet::ShipIndex;
use crate::problem::network::PortIndex;
use crate::problem::Week;
use crate::solver::{
    LinExpr, LinSum, NoSolutionReason, Outcome, Solution, SolveParams, Solver, SolverError,
    VarId,
};

pub struct DeploymentSolver {}

impl DeploymentSolver {
    /// adds variables to the given solver according to the given sets and parameters
    fn add_variables<S: Solver + ?Sized>(
        sets: &Sets,
        parameters: &Parameters,
        solver: &mut S,
    ) -> Result<Variables, SolverError> {
        // 1 if ship k is stationed at port p in week t, indexed (k,p,t)
        let x = sets.X.binary(solver, "x")?;

        // 1 if ship k sails route r departing in week t
        let y = sets.Y.binary(solver, "y")?;

        // cargo of commodity c carried on a voyage
        let z = sets.Y_c.cont(solver, "z")?;

        // cargo of commodity c held by ship k at port p through week t
        let z_stay = sets.X_c.cont(solver, "z_stay")?;

        // delivered beyond the requirement of checkpoint i of commodity c, indexed (c,i)
        let e = sets.D.cont(solver, "excess")?;

        // unmet part of checkpoint i of commodity c, only when demand is soft
        let u = match parameters.C_short {
            Some(_) => sets.D.cont(solver, "shortfall")?,
            None => HashMap::new(),
        };

        debug!(
            "Variables: {} presence, {} voyage, {} cargo on voyage, {} cargo at rest",
            x.len(),
            y.len(),
            z.len(),
            z_stay.len()
        );

        Ok(Variables {
            x,
            y,
            z,
            z_stay,
            e,
            u,
        })
    }

    /// adds constraints to the solver according to the given sets, parameters and variables
    fn add_constrs<S: Solver + ?Sized>(
        variables: &Variables,
        sets: &Sets,
        parameters: &Parameters,
        solver: &mut S,
    ) -> Result<(), SolverError> {
        let Variables {
            x,
            y,
            z,
            z_stay,
            e,
            u,
        } = variables;

        // voyages of ship k leaving port p in week t
        let departing = |k: ShipIndex, p: PortIndex, t: Week| {
            sets.departures(p, t)
                .iter()
                .map(|&route| y[&VoyageKey { ship: k, route, depart: t }])
                .lin_sum()
        };
        // voyages of ship k landing at port p in week t
        let arriving = |k: ShipIndex, p: PortIndex, t: Week| {
            sets.arrivals(p, t)
                .iter()
                .map(|&(route, depart)| y[&VoyageKey { ship: k, route, depart }])
                .lin_sum()
        };

        // ************* FLEET FLOW BALANCE ************

        // in week 0 every ship is either stationed at or departing from its home port
        for (&k, &p) in iproduct!(&sets.K, &sets.P) {
            let lhs = departing(k, p, 0) + x[&(k, p, 0)];
            let rhs = if parameters.O[k] == p { 1.0 } else { 0.0 };
            solver.add_constr(&format!("start_{}_{}", *k, *p), lhs.eq(rhs))?;
        }

        // a ship stationed or arriving at a port either stays or departs. No voyage departs
        // in the final week since it could not land within the horizon.
        for (&k, &p, t) in iproduct!(&sets.K, &sets.P, 1..=parameters.H) {
            let lhs = arriving(k, p, t) + x[&(k, p, t - 1)];
            let rhs = departing(k, p, t) + x[&(k, p, t)];
            solver.add_constr(&format!("balance_{}_{}_{}", *k, *p, t), lhs.eq(rhs))?;
        }

        // ************* CAPACITY ************

        for key in &sets.Y {
            let lhs = sets.C.iter().map(|&c| z[&(*key, c)]).lin_sum();
            let rhs = parameters.Q[key.ship] * y[key];
            solver.add_constr(
                &format!("voyage_capacity_{}_{}_{}", *key.ship, *key.route, key.depart),
                lhs.leq(rhs),
            )?;
        }

        for &(k, p, t) in &sets.X {
            let lhs = sets.C.iter().map(|&c| z_stay[&(k, p, t, c)]).lin_sum();
            let rhs = parameters.Q[k] * x[&(k, p, t)];
            solver.add_constr(
                &format!("rest_capacity_{}_{}_{}", *k, *p, t),
                lhs.leq(rhs),
            )?;
        }

        // ************* COMMODITY CONSERVATION ************

        for (&k, &c, &p, &t) in iproduct!(&sets.K, &sets.C, &sets.P, &sets.T) {
            // held over from the previous week plus cargo landing this week. Nothing is
            // inherited in week 0.
            let inflow = match t {
                0 => LinExpr::new(),
                _ => {
                    sets.arrivals(p, t)
                        .iter()
                        .map(|&(route, depart)| z[&(VoyageKey { ship: k, route, depart }, c)])
                        .lin_sum()
                        + z_stay[&(k, p, t - 1, c)]
                }
            };
            // held through this week plus cargo leaving this week
            let outflow = sets
                .departures(p, t)
                .iter()
                .map(|&route| z[&(VoyageKey { ship: k, route, depart: t }, c)])
                .lin_sum()
                + z_stay[&(k, p, t, c)];

            let name = format!("conservation_{}_{}_{}_{}", *k, *c, *p, t);
            if p == parameters.O_c[c] {
                // loading is only permitted at the origin
                if t > 0 {
                    solver.add_constr(&name, outflow.geq(inflow))?;
                }
            } else if p == parameters.D_c[c] {
                // everything is unloaded at the destination
                solver.add_constr(&name, outflow.eq(0.0))?;
            } else {
                solver.add_constr(&name, outflow.eq(inflow))?;
            }
        }

        // ************* DEMAND ************

        for &(c, i) in &sets.D {
            let checkpoint = parameters.S[c][i];
            let delivered = Self::delivered(sets, parameters, z, c, checkpoint.deadline);
            trace!(
                "checkpoint {} of commodity {}: {} by week {} over {} cargo terms",
                i,
                *c,
                checkpoint.required,
                checkpoint.deadline,
                delivered.terms().len()
            );

            let lhs = match u.get(&(c, i)) {
                Some(&shortfall) => delivered.clone() + shortfall,
                None => delivered.clone(),
            };
            solver.add_constr(
                &format!("demand_{}_{}", *c, i),
                lhs.geq(checkpoint.required),
            )?;

            // excess bounds the overshoot from above. Only a positive excess penalty pulls
            // it down to the overshoot itself, so read deliveries from the cargo instead.
            solver.add_constr(
                &format!("excess_{}_{}", *c, i),
                LinExpr::from(e[&(c, i)]).geq(delivered - checkpoint.required),
            )?;
        }

        Ok(())
    }

    /// Cargo of commodity `c` landing at its destination no later than `deadline`, summed
    /// over all ships
    fn delivered(
        sets: &Sets,
        parameters: &Parameters,
        z: &HashMap<(VoyageKey, CommodityIndex), VarId>,
        c: CommodityIndex,
        deadline: Week,
    ) -> LinExpr {
        iproduct!(sets.deliveries(parameters.D_c[c], deadline), &sets.K)
            .map(|((route, depart), &ship)| z[&(VoyageKey { ship, route, depart }, c)])
            .lin_sum()
    }

    fn add_objective<S: Solver + ?Sized>(
        variables: &Variables,
        sets: &Sets,
        parameters: &Parameters,
        solver: &mut S,
    ) -> Result<(), SolverError> {
        let Variables {
            x,
            y,
            z,
            z_stay,
            e,
            u,
        } = variables;

        let sailing = sets
            .Y
            .iter()
            .map(|key| parameters.C_y[key] * y[key])
            .lin_sum();
        let waiting = sets.X.iter().map(|key| x[key]).lin_sum() * parameters.C_wait;
        let holding = (sets.Y_c.iter().map(|key| z[key]).lin_sum()
            + sets.X_c.iter().map(|key| z_stay[key]).lin_sum())
            * parameters.C_hold;
        let excess = sets.D.iter().map(|key| e[key]).lin_sum() * parameters.C_excess;
        let shortfall = match parameters.C_short {
            Some(rate) => sets.D.iter().map(|key| u[key]).lin_sum() * rate,
            None => LinExpr::new(),
        };

        solver.set_objective(sailing + waiting + holding + excess + shortfall)
    }

    /// builds the deployment model on the given solver
    pub fn build<S: Solver + ?Sized>(
        sets: &Sets,
        parameters: &Parameters,
        solver: &mut S,
    ) -> Result<Variables, SolverError> {
        info!("Building deployment model");

        let variables = Self::add_variables(sets, parameters, solver)?;
        Self::add_constrs(&variables, sets, parameters, solver)?;
        Self::add_objective(&variables, sets, parameters, solver)?;

        info!(
            "Successfully built deployment model with {} variables and {} constraints",
            solver.num_vars(),
            solver.num_constrs()
        );

        Ok(variables)
    }

    pub fn solve<S: Solver + ?Sized>(
        variables: &Variables,
        solver: &mut S,
        params: &SolveParams,
    ) -> Result<DeploymentOutcome, SolverError> {
        info!("Solving deployment model");
        let outcome = solver.solve(params)?;
        info!("Finished optimizing deployment model");

        Ok(match outcome {
            Outcome::Solved(solution) => {
                DeploymentOutcome::Solved(DeploymentResult::new(variables, &solution))
            }
            Outcome::NoSolution(reason) => DeploymentOutcome::NoSolution(reason),
        })
    }
}

pub struct Variables {
    /// 1 if ship k is stationed at port p in week t, indexed (k,p,t)
    pub x: HashMap<(ShipIndex, PortIndex, Week), VarId>,
    /// 1 if the voyage is sailed
    pub y: HashMap<VoyageKey, VarId>,
    /// cargo of commodity c on a voyage, indexed (voyage, c)
    pub z: HashMap<(VoyageKey, CommodityIndex), VarId>,
    /// cargo of commodity c held by ship k at port p in week t, indexed (k,p,t,c)
    pub z_stay: HashMap<(ShipIndex, PortIndex, Week, CommodityIndex), VarId>,
    /// excess delivery at checkpoint i of commodity c, indexed (c,i)
    pub e: HashMap<(CommodityIndex, usize), VarId>,
    /// shortfall at checkpoint i of commodity c, indexed (c,i). Empty when demand is hard.
    pub u: HashMap<(CommodityIndex, usize), VarId>,
}

pub enum DeploymentOutcome {
    Solved(DeploymentResult),
    NoSolution(NoSolutionReason),
}

pub struct DeploymentResult {
    /// The objective value of the solution
    pub objective: f64,
    /// 1 if ship k is stationed at port p in week t, indexed (k,p,t)
    pub x: HashMap<(ShipIndex, PortIndex, Week), f64>,
    /// 1 if the voyage is sailed
    pub y: HashMap<VoyageKey, f64>,
    /// cargo of commodity c on a voyage, indexed (voyage, c)
    pub z: HashMap<(VoyageKey, CommodityIndex), f64>,
    /// cargo of commodity c held by ship k at port p in week t, indexed (k,p,t,c)
    pub z_stay: HashMap<(ShipIndex, PortIndex, Week, CommodityIndex), f64>,
    /// excess delivery at checkpoint i of commodity c, indexed (c,i)
    pub e: HashMap<(CommodityIndex, usize), f64>,
    /// shortfall at checkpoint i of commodity c, indexed (c,i)
    pub u: HashMap<(CommodityIndex, usize), f64>,
}

impl DeploymentResult {
    pub fn new(variables: &Variables, solution: &Solution) -> DeploymentResult {
        DeploymentResult {
            objective: solution.objective(),
            x: variables.x.convert(solution),
            y: variables.y.convert(solution),
            z: variables.z.convert(solution),
            z_stay: variables.z_stay.convert(solution),
            e: variables.e.convert(solution),
            u: variables.u.convert(solution),
        }
    }

    /// Cargo of commodity `c` landing at its destination no later than `deadline`
    pub fn delivered(
        &self,
        sets: &Sets,
        parameters: &Parameters,
        c: CommodityIndex,
        deadline: Week,
    ) -> f64 {
        iproduct!(sets.deliveries(parameters.D_c[c], deadline), &sets.K)
            .map(|((route, depart), &ship)| {
                self.z
                    .get(&(VoyageKey { ship, route, depart }, c))
                    .copied()
                    .unwrap_or(0.0)
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::problem::Problem;
    use crate::solver::{BundledSolver, Sense};

    fn config(shortfall: &str) -> Config {
        let json = format!(
            r#"{{
            "horizon": 3,
            "regions": [
                {{"name": "A", "role": "home", "ports": ["A"]}},
                {{"name": "B", "role": "foreign", "ports": ["B"]}}
            ],
            "routes": [{{"origin": "A", "destination": "B", "days": 7}}],
            "fleet": [
                {{"id": "s1", "class": "unrestricted", "capacity": 100, "home_port": "A", "weekly_cost": 10}},
                {{"id": "s2", "class": "unrestricted", "capacity": 80, "home_port": "B", "weekly_cost": 10}}
            ],
            "costs": {{"wait_cost": 1, "time_penalty": 1, "excess_penalty": 0.1, "holding_cost": 0.01,
                      "policy_fee_high": 0, "policy_fee_low": 0, "shortfall_penalty": {}}},
            "demand": [{{"origin": "A", "destination": "B", "checkpoints": [[2, 50], [3, 60]]}}]
        }}"#,
            shortfall
        );
        Config::from_reader(json.as_bytes()).unwrap()
    }

    fn problem(shortfall: &str) -> Problem {
        Problem::new(&config(shortfall)).unwrap()
    }

    fn build(problem: &Problem) -> (Sets, Parameters, BundledSolver, Variables) {
        let sets = Sets::new(problem);
        let parameters = Parameters::new(problem, &sets);
        let mut solver = BundledSolver::new();
        let variables = DeploymentSolver::build(&sets, &parameters, &mut solver).unwrap();
        (sets, parameters, solver, variables)
    }

    fn constraint<'a>(solver: &'a BundledSolver, name: &str) -> &'a crate::solver::Constraint {
        &solver
            .constraints()
            .iter()
            .find(|(n, _)| n == name)
            .unwrap_or_else(|| panic!("no constraint {}", name))
            .1
    }

    #[test]
    fn voyages_only_exist_when_they_land_within_the_horizon() {
        let problem = problem("null");
        let (sets, _, _, variables) = build(&problem);

        // two directions, departures in weeks 0..=2, two ships
        assert_eq!(sets.Y.len(), 2 * 3 * 2);
        assert!(sets.Y.iter().all(|y| y.depart + 1 <= 3));
        assert_eq!(variables.y.len(), sets.Y.len());
        assert_eq!(variables.z.len(), sets.Y.len());
        // 2 ships, 2 ports, weeks 0..=3
        assert_eq!(variables.x.len(), 16);
        assert_eq!(variables.z_stay.len(), 16);
        assert_eq!(variables.e.len(), 2);
        assert!(variables.u.is_empty());
    }

    #[test]
    fn week_zero_pins_every_ship_to_its_home() {
        let problem = problem("null");
        let (_, _, solver, variables) = build(&problem);

        let s2 = ShipIndex::from(1);
        let a = PortIndex::from(0);
        let b = PortIndex::from(1);
        let at_home = constraint(&solver, "start_1_1");
        let away = constraint(&solver, "start_1_0");

        assert_eq!(at_home.sense, Sense::Eq);
        assert_eq!(at_home.rhs, 1.0);
        assert_eq!(away.rhs, 0.0);
        assert!(at_home
            .expr
            .terms()
            .iter()
            .any(|&(var, _)| var == variables.x[&(s2, b, 0)]));
        assert!(away
            .expr
            .terms()
            .iter()
            .any(|&(var, _)| var == variables.x[&(s2, a, 0)]));
    }

    #[test]
    fn origin_skips_week_zero_while_others_forbid_loading() {
        let problem = problem("null");
        let (sets, _, solver, _) = build(&problem);
        let names: Vec<&str> = solver.constraints().iter().map(|(n, _)| n.as_str()).collect();

        // origin A is port 0, destination B is port 1
        assert!(!names.contains(&"conservation_0_0_0_0"));
        assert!(names.contains(&"conservation_0_0_0_1"));
        assert_eq!(constraint(&solver, "conservation_0_0_0_1").sense, Sense::Ge);
        assert_eq!(constraint(&solver, "conservation_0_0_1_0").sense, Sense::Eq);
        assert_eq!(
            names.iter().filter(|n| n.starts_with("conservation_")).count(),
            sets.K.len() * sets.C.len() * (sets.P.len() * sets.T.len() - 1)
        );
    }

    #[test]
    fn demand_counts_voyages_landing_by_the_deadline() {
        let problem = problem("null");
        let (sets, _, solver, variables) = build(&problem);

        // into B by week 2: departures in weeks 0 and 1 for both ships
        let demand = constraint(&solver, "demand_0_0");
        assert_eq!(demand.sense, Sense::Ge);
        assert_eq!(demand.rhs, 50.0);
        assert_eq!(demand.expr.terms().len(), 4);
        for &(var, coeff) in demand.expr.terms() {
            assert_eq!(coeff, 1.0);
            let key = variables
                .z
                .iter()
                .find(|(_, &v)| v == var)
                .map(|(k, _)| k.0)
                .unwrap();
            assert!(key.depart + 1 <= 2);
            assert!(sets.Y.binary_search(&key).is_ok());
        }

        let excess = constraint(&solver, "excess_0_1");
        assert_eq!(excess.rhs, -60.0);
        assert_eq!(excess.expr.terms().len(), 1 + 6);
    }

    #[test]
    fn soft_demand_adds_shortfall() {
        let problem = problem("1000");
        let (_, _, solver, variables) = build(&problem);

        assert_eq!(variables.u.len(), 2);
        let demand = constraint(&solver, "demand_0_0");
        let shortfall = variables.u[&(CommodityIndex::from(0), 0)];
        assert!(demand.expr.terms().contains(&(shortfall, 1.0)));
        assert!(solver
            .objective()
            .terms()
            .contains(&(shortfall, 1000.0)));
    }

    #[test]
    fn excess_stays_above_the_overshoot_without_a_penalty() {
        let mut config = config("null");
        config.costs.excess_penalty = 0.0;
        let problem = Problem::new(&config).unwrap();
        let (sets, parameters, mut solver, variables) = build(&problem);

        let result = match DeploymentSolver::solve(&variables, &mut solver, &config.solver).unwrap() {
            DeploymentOutcome::Solved(result) => result,
            DeploymentOutcome::NoSolution(reason) => panic!("no solution: {}", reason),
        };

        for &(c, i) in &sets.D {
            let checkpoint = parameters.S[c][i];
            let delivered = result.delivered(&sets, &parameters, c, checkpoint.deadline);
            assert!(delivered >= checkpoint.required - 1e-6);
            assert!(result.e[&(c, i)] >= delivered - checkpoint.required - 1e-6);
        }
    }
}
