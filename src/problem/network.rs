use std::collections::{HashMap, VecDeque};

use derive_more::{Deref, From, Into};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use typed_index_collections::TiVec;

use crate::config::{ConfigError, RegionConfig, RouteConfig};

/// Transit duration reported for pairs of ports without a usable connection.
/// It lies above every pruning ceiling, so such pairs never become routes.
pub const UNREACHABLE: usize = usize::MAX;

/// The length of a week in days, used to convert voyage days into whole weeks
const DAYS_PER_WEEK: f64 = 7.0;

#[derive(Deref, Debug, PartialEq, Eq, PartialOrd, Ord, From, Into, Clone, Copy, Hash)]
pub struct PortIndex(usize);

#[derive(Deref, Debug, PartialEq, Eq, PartialOrd, Ord, From, Into, Clone, Copy, Hash)]
pub struct RouteIndex(usize);

/// The regulatory role of the region a port belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionRole {
    /// The home-regulated region whose ships may be restricted
    Home,
    /// A foreign region that levies the policy fee on restricted ships
    Regulated,
    /// Any other foreign region
    Foreign,
    /// A transit hub used for transshipment
    Hub,
}

#[derive(Debug, Clone)]
pub struct Port {
    /// The identifier of the port, e.g. "SHA"
    name: String,
    /// The name of the region the port is grouped under
    region: String,
    /// The role of the region
    role: RegionRole,
}

impl Port {
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn region(&self) -> &str {
        self.region.as_str()
    }

    pub fn role(&self) -> RegionRole {
        self.role
    }

    pub fn is_hub(&self) -> bool {
        self.role == RegionRole::Hub
    }
}

/// A directed sailing leg between two distinct ports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    origin: PortIndex,
    destination: PortIndex,
    weeks: usize,
}

impl Route {
    pub fn origin(&self) -> PortIndex {
        self.origin
    }

    pub fn destination(&self) -> PortIndex {
        self.destination
    }

    /// Transit duration in whole weeks, always at least one
    pub fn weeks(&self) -> usize {
        self.weeks
    }
}

/// Ports, pruned routes and the adjacency indices over them.
///
/// The inbound and outbound route lists are computed once here and shared by every
/// constraint family of the deployment model, so no constraint generation has to scan
/// the full port set to find the legs touching a port.
#[derive(Debug, Clone)]
pub struct NetworkModel {
    ports: TiVec<PortIndex, Port>,
    by_name: HashMap<String, PortIndex>,
    /// Transit weeks from the route table, including mirrored reverse directions
    table: HashMap<(PortIndex, PortIndex), usize>,
    routes: TiVec<RouteIndex, Route>,
    outbound: TiVec<PortIndex, Vec<RouteIndex>>,
    inbound: TiVec<PortIndex, Vec<RouteIndex>>,
    max_transit_weeks: usize,
}

impl NetworkModel {
    pub fn new(
        regions: &[RegionConfig],
        routes: &[RouteConfig],
        max_transit_weeks: usize,
    ) -> Result<NetworkModel, ConfigError> {
        let mut ports: TiVec<PortIndex, Port> = TiVec::new();
        let mut by_name = HashMap::new();

        for region in regions {
            for name in &region.ports {
                if by_name.contains_key(name) {
                    return Err(ConfigError::DuplicatePort(name.clone()));
                }
                let index = ports.push_and_get_key(Port {
                    name: name.clone(),
                    region: region.name.clone(),
                    role: region.role,
                });
                by_name.insert(name.clone(), index);
            }
        }

        let lookup = |name: &str| {
            by_name
                .get(name)
                .copied()
                .ok_or_else(|| ConfigError::UnknownPort(name.to_string()))
        };

        // Explicit entries first, so that a mirrored direction never overrides an explicit one
        let mut table = HashMap::new();
        for route in routes {
            let origin = lookup(&route.origin)?;
            let destination = lookup(&route.destination)?;
            if origin == destination {
                return Err(ConfigError::SelfRoute(route.origin.clone()));
            }
            if !(route.days > 0.0) {
                return Err(ConfigError::NonPositiveDays {
                    origin: route.origin.clone(),
                    destination: route.destination.clone(),
                });
            }
            if table
                .insert((origin, destination), weeks_from_days(route.days))
                .is_some()
            {
                return Err(ConfigError::DuplicateRoute {
                    origin: route.origin.clone(),
                    destination: route.destination.clone(),
                });
            }
        }
        let explicit: Vec<_> = table.iter().map(|(&k, &v)| (k, v)).collect();
        for ((origin, destination), weeks) in explicit {
            table.entry((destination, origin)).or_insert(weeks);
        }

        let mut network = NetworkModel {
            outbound: vec![Vec::new(); ports.len()].into(),
            inbound: vec![Vec::new(); ports.len()].into(),
            ports,
            by_name,
            table,
            routes: TiVec::new(),
            max_transit_weeks,
        };
        network.prune();

        Ok(network)
    }

    /// Keeps the ordered port pairs whose transit lies strictly below the ceiling, and
    /// indexes them by origin and destination.
    fn prune(&mut self) {
        for origin in self.ports.keys() {
            for destination in self.ports.keys() {
                if origin == destination {
                    continue;
                }
                let weeks = self.transit_weeks(origin, destination);
                if weeks >= self.max_transit_weeks {
                    trace!(
                        "pruned {} -> {} ({} weeks)",
                        self.ports[origin].name,
                        self.ports[destination].name,
                        weeks
                    );
                    continue;
                }
                let route = self.routes.push_and_get_key(Route {
                    origin,
                    destination,
                    weeks,
                });
                self.outbound[origin].push(route);
                self.inbound[destination].push(route);
            }
        }

        debug!(
            "{} of {} port pairs kept below the {} week ceiling",
            self.routes.len(),
            self.ports.len() * self.ports.len().saturating_sub(1),
            self.max_transit_weeks
        );
    }

    /// Transit duration in weeks between two ports. Never fails: pairs without data
    /// outside a shared region return [`UNREACHABLE`].
    pub fn transit_weeks(&self, origin: PortIndex, destination: PortIndex) -> usize {
        if origin == destination {
            return 0;
        }
        if let Some(&weeks) = self.table.get(&(origin, destination)) {
            return weeks;
        }
        if self.ports[origin].region == self.ports[destination].region {
            return 1;
        }
        UNREACHABLE
    }

    /// Whether `destination` can be reached from `origin` over the pruned routes
    pub fn reachable(&self, origin: PortIndex, destination: PortIndex) -> bool {
        let mut seen: TiVec<PortIndex, bool> = vec![false; self.ports.len()].into();
        let mut queue = VecDeque::from([origin]);
        seen[origin] = true;

        while let Some(port) = queue.pop_front() {
            if port == destination {
                return true;
            }
            for &route in &self.outbound[port] {
                let next = self.routes[route].destination;
                if !seen[next] {
                    seen[next] = true;
                    queue.push_back(next);
                }
            }
        }

        false
    }

    pub fn ports(&self) -> &TiVec<PortIndex, Port> {
        &self.ports
    }

    pub fn port(&self, index: PortIndex) -> &Port {
        &self.ports[index]
    }

    pub fn port_index(&self, name: &str) -> Option<PortIndex> {
        self.by_name.get(name).copied()
    }

    /// The routes that survived pruning
    pub fn routes(&self) -> &TiVec<RouteIndex, Route> {
        &self.routes
    }

    pub fn route(&self, index: RouteIndex) -> &Route {
        &self.routes[index]
    }

    /// The pruned route from `origin` to `destination`, if any
    pub fn route_between(&self, origin: PortIndex, destination: PortIndex) -> Option<RouteIndex> {
        self.outbound[origin]
            .iter()
            .copied()
            .find(|&r| self.routes[r].destination == destination)
    }

    /// Routes leaving `port`
    pub fn outbound(&self, port: PortIndex) -> &[RouteIndex] {
        &self.outbound[port]
    }

    /// Routes entering `port`
    pub fn inbound(&self, port: PortIndex) -> &[RouteIndex] {
        &self.inbound[port]
    }

    /// A label of the form "SHA->LAX"
    pub fn label(&self, origin: PortIndex, destination: PortIndex) -> String {
        format!(
            "{}->{}",
            self.ports[origin].name, self.ports[destination].name
        )
    }

    pub fn max_transit_weeks(&self) -> usize {
        self.max_transit_weeks
    }
}

/// Voyage days rounded up to whole weeks. A leg shorter than a week still occupies one.
pub fn weeks_from_days(days: f64) -> usize {
    ((days / DAYS_PER_WEEK).ceil() as usize).max(1)
}
