use std::collections::HashMap;

use itertools::iproduct;
use log::debug;
use typed_index_collections::TiVec;

use crate::problem::demand::{Checkpoint, CommodityIndex};
use crate::problem::fleet::ShipIndex;
use crate::problem::network::{PortIndex, RouteIndex};
use crate::problem::{Problem, Week};

/// A ship sailing a route, departing in a given week
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VoyageKey {
    pub ship: ShipIndex,
    pub route: RouteIndex,
    pub depart: Week,
}

#[allow(non_snake_case)]
pub struct Sets {
    /// Set of ships
    pub K: Vec<ShipIndex>,
    /// Set of ports
    pub P: Vec<PortIndex>,
    /// Set of commodities
    pub C: Vec<CommodityIndex>,
    /// Set of weeks, 0 to the horizon inclusive
    pub T: Vec<Week>,
    /// Set of (ship, port, week) states
    pub X: Vec<(ShipIndex, PortIndex, Week)>,
    /// Set of voyages that arrive within the horizon
    pub Y: Vec<VoyageKey>,
    /// Set of (ship, port, week, commodity) cargo holdings
    pub X_c: Vec<(ShipIndex, PortIndex, Week, CommodityIndex)>,
    /// Set of (voyage, commodity) cargo loads
    pub Y_c: Vec<(VoyageKey, CommodityIndex)>,
    /// Set of (commodity, checkpoint index) pairs
    pub D: Vec<(CommodityIndex, usize)>,
    /// Forward star: routes leaving port p that can depart in week t, indexed (p, t)
    pub Fs: HashMap<(PortIndex, Week), Vec<RouteIndex>>,
    /// Reverse star: (route, departure week) pairs landing at port p in week t, indexed (p, t)
    pub Rs: HashMap<(PortIndex, Week), Vec<(RouteIndex, Week)>>,
}

impl Sets {
    #[allow(non_snake_case)]
    pub fn new(problem: &Problem) -> Sets {
        let network = problem.network();
        let horizon = problem.horizon();

        let K: Vec<ShipIndex> = problem.fleet().ships().keys().collect();
        let P: Vec<PortIndex> = network.ports().keys().collect();
        let C: Vec<CommodityIndex> = problem.demand().commodities().keys().collect();
        let T: Vec<Week> = (0..=horizon).collect();

        let mut Fs: HashMap<(PortIndex, Week), Vec<RouteIndex>> = HashMap::new();
        let mut Rs: HashMap<(PortIndex, Week), Vec<(RouteIndex, Week)>> = HashMap::new();
        for &p in &P {
            // a voyage must land by the final week
            for &r in network.outbound(p) {
                let weeks = network.route(r).weeks();
                for depart in (0..=horizon).take_while(|depart| depart + weeks <= horizon) {
                    Fs.entry((p, depart)).or_default().push(r);
                }
            }
            for &r in network.inbound(p) {
                let weeks = network.route(r).weeks();
                for arrive in weeks..=horizon {
                    Rs.entry((p, arrive)).or_default().push((r, arrive - weeks));
                }
            }
        }

        let mut Y: Vec<VoyageKey> = iproduct!(&K, &Fs)
            .flat_map(|(&ship, (&(_, depart), routes))| {
                routes.iter().map(move |&route| VoyageKey {
                    ship,
                    route,
                    depart,
                })
            })
            .collect();
        Y.sort();

        let X: Vec<_> = iproduct!(K.iter().copied(), P.iter().copied(), T.iter().copied()).collect();
        let X_c = iproduct!(X.iter().copied(), C.iter().copied())
            .map(|((k, p, t), c)| (k, p, t, c))
            .collect();
        let Y_c = iproduct!(Y.iter().copied(), C.iter().copied()).collect();
        let D = problem
            .demand()
            .commodities()
            .iter_enumerated()
            .flat_map(|(c, commodity)| (0..commodity.checkpoints().len()).map(move |i| (c, i)))
            .collect();

        debug!(
            "Sets: {} ships, {} ports, {} weeks, {} commodities, {} voyages",
            K.len(),
            P.len(),
            T.len(),
            C.len(),
            Y.len()
        );

        Sets {
            K,
            P,
            C,
            T,
            X,
            Y,
            X_c,
            Y_c,
            D,
            Fs,
            Rs,
        }
    }

    /// Routes that can leave port `p` in week `t`
    pub fn departures(&self, p: PortIndex, t: Week) -> &[RouteIndex] {
        self.Fs.get(&(p, t)).map(Vec::as_slice).unwrap_or(&[])
    }

    /// (route, departure week) pairs that land at port `p` in week `t`
    pub fn arrivals(&self, p: PortIndex, t: Week) -> &[(RouteIndex, Week)] {
        self.Rs.get(&(p, t)).map(Vec::as_slice).unwrap_or(&[])
    }

    /// (route, departure week) pairs landing at `p` no later than `deadline`
    pub fn deliveries(&self, p: PortIndex, deadline: Week) -> impl Iterator<Item = (RouteIndex, Week)> + '_ {
        (0..=deadline).flat_map(move |t| self.arrivals(p, t).iter().copied())
    }
}

#[allow(non_snake_case)]
pub struct Parameters {
    /// The final week of the horizon
    pub H: Week,
    /// Capacity of ship k
    pub Q: TiVec<ShipIndex, f64>,
    /// Home port of ship k
    pub O: TiVec<ShipIndex, PortIndex>,
    /// Origin port of commodity c
    pub O_c: TiVec<CommodityIndex, PortIndex>,
    /// Destination port of commodity c
    pub D_c: TiVec<CommodityIndex, PortIndex>,
    /// Checkpoints of commodity c, ascending by deadline
    pub S: TiVec<CommodityIndex, Vec<Checkpoint>>,
    /// Cost of each voyage: operation, policy fee and departure delay
    pub C_y: HashMap<VoyageKey, f64>,
    /// Cost per week a ship is stationed at a port
    pub C_wait: f64,
    /// Cost per unit of cargo on a voyage or at rest
    pub C_hold: f64,
    /// Cost per unit delivered beyond a checkpoint
    pub C_excess: f64,
    /// Cost per unit of unmet demand, if demand is soft
    pub C_short: Option<f64>,
}

impl Parameters {
    pub fn new(problem: &Problem, sets: &Sets) -> Parameters {
        let fleet = problem.fleet();
        let demand = problem.demand();
        let costs = problem.costs();

        Parameters {
            H: problem.horizon(),
            Q: fleet.ships().iter().map(|s| s.capacity()).collect(),
            O: fleet.ships().iter().map(|s| s.home()).collect(),
            O_c: demand.commodities().iter().map(|c| c.origin()).collect(),
            D_c: demand.commodities().iter().map(|c| c.destination()).collect(),
            S: demand
                .commodities()
                .iter()
                .map(|c| c.checkpoints().to_vec())
                .collect(),
            C_y: sets
                .Y
                .iter()
                .map(|y| (*y, problem.voyage_cost(y.ship, y.route, y.depart)))
                .collect(),
            C_wait: costs.wait_cost,
            C_hold: costs.holding_cost,
            C_excess: costs.excess_penalty,
            C_short: costs.shortfall_penalty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn problem() -> Problem {
        let json = r#"{
            "horizon": 3,
            "regions": [
                {"name": "RA", "role": "home", "ports": ["A"]},
                {"name": "RB", "role": "foreign", "ports": ["B"]},
                {"name": "RC", "role": "foreign", "ports": ["C"]}
            ],
            "routes": [
                {"origin": "A", "destination": "B", "days": 7},
                {"origin": "B", "destination": "C", "days": 14}
            ],
            "fleet": [{"id": "s1", "class": "unrestricted", "capacity": 10, "home_port": "A", "weekly_cost": 1}],
            "costs": {"wait_cost": 1, "time_penalty": 1, "excess_penalty": 0.1, "holding_cost": 0.01,
                      "policy_fee_high": 0, "policy_fee_low": 0},
            "demand": [{"origin": "A", "destination": "C", "checkpoints": [[3, 5]]}]
        }"#;
        Problem::new(&Config::from_reader(json.as_bytes()).unwrap()).unwrap()
    }

    #[test]
    fn stars_follow_the_network_adjacency() {
        let problem = problem();
        let network = problem.network();
        let sets = Sets::new(&problem);

        for &p in &sets.P {
            for t in 0..=problem.horizon() {
                for &r in sets.departures(p, t) {
                    assert!(network.outbound(p).contains(&r));
                    assert!(t + network.route(r).weeks() <= problem.horizon());
                }
                for &(r, depart) in sets.arrivals(p, t) {
                    assert!(network.inbound(p).contains(&r));
                    assert_eq!(depart + network.route(r).weeks(), t);
                }
            }
        }

        // every voyage shows up once in each star
        let departures: usize = sets.Fs.values().map(Vec::len).sum();
        let arrivals: usize = sets.Rs.values().map(Vec::len).sum();
        assert_eq!(departures * sets.K.len(), sets.Y.len());
        assert_eq!(arrivals, departures);
    }

    #[test]
    fn long_legs_only_depart_early() {
        let problem = problem();
        let network = problem.network();
        let sets = Sets::new(&problem);
        let b = network.port_index("B").unwrap();
        let c = network.port_index("C").unwrap();
        let leg = network.route_between(b, c).unwrap();

        // two weeks at sea within a horizon of three
        let departs: Vec<Week> = sets
            .Y
            .iter()
            .filter(|y| y.route == leg)
            .map(|y| y.depart)
            .collect();
        assert_eq!(departs, vec![0, 1]);
        assert_eq!(sets.arrivals(c, 3), &[(leg, 1)]);
        assert!(sets.arrivals(c, 1).is_empty());
    }
}
