pub mod demand;
pub mod fleet;
pub mod network;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::{Config, ConfigError};
use demand::{CommodityIndex, DemandSchedule};
use fleet::{FleetRegistry, ShipClass, ShipIndex};
use network::{NetworkModel, Port, RegionRole, RouteIndex};

/// The type used for week indices, 0 is the start of the horizon
pub type Week = usize;

/// Cost parameters, all in one consistent monetary scale
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Costs {
    /// Cost per week a ship spends stationed at a port
    pub wait_cost: f64,
    /// Cost per departure week, favouring early sailings
    pub time_penalty: f64,
    /// Cost per unit delivered beyond a checkpoint's requirement
    pub excess_penalty: f64,
    /// Cost per unit of cargo carried on a voyage or held at rest for a week
    pub holding_cost: f64,
    /// Fee paid by a restricted ship on a voyage matched by the fee trigger
    pub policy_fee_high: f64,
    /// Flat port-call fee paid on every other voyage
    pub policy_fee_low: f64,
    /// When set, unmet demand is allowed at this cost per unit instead of making
    /// the model infeasible
    #[serde(default)]
    pub shortfall_penalty: Option<f64>,
}

impl Costs {
    fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("wait_cost", self.wait_cost),
            ("time_penalty", self.time_penalty),
            ("excess_penalty", self.excess_penalty),
            ("holding_cost", self.holding_cost),
            ("policy_fee_high", self.policy_fee_high),
            ("policy_fee_low", self.policy_fee_low),
            ("shortfall_penalty", self.shortfall_penalty.unwrap_or(0.0)),
        ];
        for (what, value) in fields {
            if !(value >= 0.0) {
                return Err(ConfigError::NegativeCost {
                    what: what.to_string(),
                    value,
                });
            }
        }
        Ok(())
    }
}

/// Decides which voyages of restricted ships pay the high policy fee
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeTrigger {
    /// Any voyage ending in a regulated port
    RegulatedDestination,
    /// Only voyages from a home port to a regulated port
    HomeToRegulated,
}

impl FeeTrigger {
    pub fn applies(&self, class: ShipClass, origin: &Port, destination: &Port) -> bool {
        if class != ShipClass::Restricted || destination.role() != RegionRole::Regulated {
            return false;
        }
        match self {
            FeeTrigger::RegulatedDestination => true,
            FeeTrigger::HomeToRegulated => origin.role() == RegionRole::Home,
        }
    }
}

/// Everything the deployment model is built from. Constructed once per run from a
/// validated [`Config`] and passed around by reference.
#[derive(Debug, Clone)]
pub struct Problem {
    network: NetworkModel,
    demand: DemandSchedule,
    fleet: FleetRegistry,
    costs: Costs,
    fee_trigger: FeeTrigger,
    /// The last week of the horizon
    horizon: Week,
}

impl Problem {
    pub fn new(config: &Config) -> Result<Problem, ConfigError> {
        if config.horizon == 0 {
            return Err(ConfigError::ZeroHorizon);
        }
        config.costs.validate()?;

        let network = NetworkModel::new(
            &config.regions,
            &config.routes,
            config.planning.max_transit_weeks,
        )?;
        let fleet = FleetRegistry::new(&config.fleet, &network)?;
        let demand = DemandSchedule::new(
            &network,
            &config.routes,
            &config.demand,
            config.horizon,
            config.planning.checkpoint_cadence,
        )?;

        info!(
            "Problem: {} ports, {} routes, {} ships, {} commodities, horizon {} weeks",
            network.ports().len(),
            network.routes().len(),
            fleet.len(),
            demand.len(),
            config.horizon
        );

        let problem = Problem {
            network,
            demand,
            fleet,
            costs: config.costs.clone(),
            fee_trigger: config.planning.fee_trigger,
            horizon: config.horizon,
        };

        for c in problem.undeliverable() {
            let commodity = problem.demand.commodity(c);
            warn!(
                "commodity {} has no path below the {} week ceiling",
                problem
                    .network
                    .label(commodity.origin(), commodity.destination()),
                problem.network.max_transit_weeks()
            );
        }

        Ok(problem)
    }

    pub fn network(&self) -> &NetworkModel {
        &self.network
    }

    pub fn demand(&self) -> &DemandSchedule {
        &self.demand
    }

    pub fn fleet(&self) -> &FleetRegistry {
        &self.fleet
    }

    pub fn costs(&self) -> &Costs {
        &self.costs
    }

    pub fn horizon(&self) -> Week {
        self.horizon
    }

    /// The policy fee paid by `ship` for sailing `route`
    pub fn policy_fee(&self, ship: ShipIndex, route: RouteIndex) -> f64 {
        let route = self.network.route(route);
        let origin = self.network.port(route.origin());
        let destination = self.network.port(route.destination());
        if self
            .fee_trigger
            .applies(self.fleet.ship(ship).class(), origin, destination)
        {
            self.costs.policy_fee_high
        } else {
            self.costs.policy_fee_low
        }
    }

    /// The cost of `ship` sailing `route` when departing in week `depart`
    pub fn voyage_cost(&self, ship: ShipIndex, route: RouteIndex, depart: Week) -> f64 {
        let weeks = self.network.route(route).weeks() as f64;
        self.fleet.ship(ship).weekly_cost() * weeks
            + self.policy_fee(ship, route)
            + depart as f64 * self.costs.time_penalty
    }

    /// Commodities whose destination cannot be reached from their origin over the
    /// pruned routes. They can never be delivered.
    pub fn undeliverable(&self) -> Vec<CommodityIndex> {
        self.demand
            .commodities()
            .iter_enumerated()
            .filter(|(_, c)| !self.network.reachable(c.origin(), c.destination()))
            .map(|(i, _)| i)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn config(trigger: &str) -> Config {
        let json = format!(
            r#"{{
            "horizon": 8,
            "regions": [
                {{"name": "CN", "role": "home", "ports": ["SHA"]}},
                {{"name": "US", "role": "regulated", "ports": ["LAX"]}},
                {{"name": "TRANS", "role": "hub", "ports": ["MX"]}},
                {{"name": "EU", "role": "foreign", "ports": ["RTM"]}}
            ],
            "routes": [
                {{"origin": "SHA", "destination": "LAX", "annual_volume": 5200, "days": 16}},
                {{"origin": "SHA", "destination": "MX", "days": 14}},
                {{"origin": "MX", "destination": "LAX", "days": 4}},
                {{"origin": "SHA", "destination": "RTM", "annual_volume": 1040, "days": 90}}
            ],
            "fleet": [
                {{"id": "cn", "class": "restricted", "capacity": 100, "home_port": "SHA", "weekly_cost": 10}},
                {{"id": "other", "class": "unrestricted", "capacity": 100, "home_port": "SHA", "weekly_cost": 10}}
            ],
            "costs": {{"wait_cost": 1, "time_penalty": 2, "excess_penalty": 0.1, "holding_cost": 0.01,
                      "policy_fee_high": 2000, "policy_fee_low": 50}},
            "planning": {{"fee_trigger": "{}"}}
        }}"#,
            trigger
        );
        Config::from_reader(json.as_bytes()).unwrap()
    }

    fn fee(problem: &Problem, ship: usize, from: &str, to: &str) -> f64 {
        let net = problem.network();
        let route = net
            .route_between(net.port_index(from).unwrap(), net.port_index(to).unwrap())
            .unwrap();
        problem.policy_fee(ShipIndex::from(ship), route)
    }

    #[test]
    fn destination_trigger_charges_every_regulated_arrival() {
        let problem = Problem::new(&config("regulated_destination")).unwrap();

        assert_eq!(fee(&problem, 0, "SHA", "LAX"), 2000.0);
        assert_eq!(fee(&problem, 0, "MX", "LAX"), 2000.0);
        assert_eq!(fee(&problem, 0, "SHA", "MX"), 50.0);
        assert_eq!(fee(&problem, 0, "LAX", "SHA"), 50.0);
        assert_eq!(fee(&problem, 1, "SHA", "LAX"), 50.0);
    }

    #[test]
    fn home_trigger_leaves_relays_cheap() {
        let problem = Problem::new(&config("home_to_regulated")).unwrap();

        assert_eq!(fee(&problem, 0, "SHA", "LAX"), 2000.0);
        assert_eq!(fee(&problem, 0, "MX", "LAX"), 50.0);
        assert_eq!(fee(&problem, 1, "SHA", "LAX"), 50.0);
    }

    #[test]
    fn voyage_cost_combines_operation_fee_and_delay() {
        let problem = Problem::new(&config("regulated_destination")).unwrap();
        let net = problem.network();
        let route = net
            .route_between(net.port_index("SHA").unwrap(), net.port_index("LAX").unwrap())
            .unwrap();

        // 10 * 3 weeks + 2000 + 2 * 2
        assert_eq!(problem.voyage_cost(ShipIndex::from(0), route, 2), 2034.0);
    }

    #[test]
    fn unreachable_commodities_are_flagged() {
        let problem = Problem::new(&config("regulated_destination")).unwrap();
        let undeliverable = problem.undeliverable();

        assert_eq!(undeliverable.len(), 1);
        let commodity = problem.demand().commodity(undeliverable[0]);
        assert_eq!(problem.network().port(commodity.destination()).name(), "RTM");
    }

    #[test]
    fn zero_horizon_and_negative_costs_are_rejected() {
        let mut config = config("regulated_destination");
        config.horizon = 0;
        assert!(matches!(Problem::new(&config), Err(ConfigError::ZeroHorizon)));

        config.horizon = 8;
        config.costs.wait_cost = -1.0;
        assert!(matches!(
            Problem::new(&config),
            Err(ConfigError::NegativeCost { .. })
        ));
    }
}
