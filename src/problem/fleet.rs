use std::collections::HashSet;

use derive_more::{Deref, Display, From, Into};
use log::debug;
use serde::{Deserialize, Serialize};
use typed_index_collections::TiVec;

use crate::config::{ConfigError, ShipConfig};
use crate::problem::network::{NetworkModel, PortIndex};

#[derive(Deref, Debug, PartialEq, Eq, PartialOrd, Ord, From, Into, Clone, Copy, Hash)]
pub struct ShipIndex(usize);

/// Regulatory class of a ship. Restricted ships pay the high policy fee on the
/// voyages selected by the fee trigger.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipClass {
    #[display(fmt = "restricted")]
    Restricted,
    #[display(fmt = "unrestricted")]
    Unrestricted,
}

#[derive(Debug, Clone)]
pub struct Ship {
    /// The identifier of the ship
    id: String,
    /// The regulatory class of the ship
    class: ShipClass,
    /// The number of cargo units the ship can hold at once
    capacity: f64,
    /// The port the ship is located at in week 0
    home: PortIndex,
    /// The operating cost per week at sea
    weekly_cost: f64,
}

impl Ship {
    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    pub fn class(&self) -> ShipClass {
        self.class
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn home(&self) -> PortIndex {
        self.home
    }

    pub fn weekly_cost(&self) -> f64 {
        self.weekly_cost
    }
}

/// The roster of ships available during the horizon
#[derive(Debug, Clone)]
pub struct FleetRegistry {
    ships: TiVec<ShipIndex, Ship>,
}

impl FleetRegistry {
    pub fn new(roster: &[ShipConfig], network: &NetworkModel) -> Result<FleetRegistry, ConfigError> {
        let mut seen = HashSet::new();
        let mut ships = TiVec::new();

        for ship in roster {
            if !seen.insert(ship.id.as_str()) {
                return Err(ConfigError::DuplicateShip(ship.id.clone()));
            }
            if !(ship.capacity >= 0.0) {
                return Err(ConfigError::NegativeCapacity {
                    ship: ship.id.clone(),
                    capacity: ship.capacity,
                });
            }
            if !(ship.weekly_cost >= 0.0) {
                return Err(ConfigError::NegativeCost {
                    what: format!("weekly cost of ship `{}`", ship.id),
                    value: ship.weekly_cost,
                });
            }
            let home = network
                .port_index(&ship.home_port)
                .ok_or_else(|| ConfigError::UnknownPort(ship.home_port.clone()))?;

            ships.push(Ship {
                id: ship.id.clone(),
                class: ship.class,
                capacity: ship.capacity,
                home,
                weekly_cost: ship.weekly_cost,
            });
        }

        debug!("Fleet of {} ships", ships.len());
        Ok(FleetRegistry { ships })
    }

    pub fn ships(&self) -> &TiVec<ShipIndex, Ship> {
        &self.ships
    }

    pub fn ship(&self, index: ShipIndex) -> &Ship {
        &self.ships[index]
    }

    pub fn len(&self) -> usize {
        self.ships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ships.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegionConfig;
    use crate::problem::network::RegionRole;

    fn network() -> NetworkModel {
        let regions = vec![RegionConfig {
            name: "CN".to_string(),
            role: RegionRole::Home,
            ports: vec!["SHA".to_string()],
        }];
        NetworkModel::new(&regions, &[], 10).unwrap()
    }

    fn ship(id: &str, capacity: f64, home_port: &str) -> ShipConfig {
        ShipConfig {
            id: id.to_string(),
            class: ShipClass::Unrestricted,
            capacity,
            home_port: home_port.to_string(),
            weekly_cost: 140.0,
        }
    }

    #[test]
    fn roster_is_indexed_in_order() {
        let fleet =
            FleetRegistry::new(&[ship("a", 100.0, "SHA"), ship("b", 50.0, "SHA")], &network())
                .unwrap();

        assert_eq!(fleet.len(), 2);
        assert_eq!(fleet.ship(ShipIndex::from(1)).id(), "b");
        assert_eq!(fleet.ship(ShipIndex::from(1)).capacity(), 50.0);
    }

    #[test]
    fn invalid_ships_are_rejected() {
        let net = network();
        assert!(matches!(
            FleetRegistry::new(&[ship("a", 1.0, "SHA"), ship("a", 2.0, "SHA")], &net),
            Err(ConfigError::DuplicateShip(id)) if id == "a"
        ));
        assert!(matches!(
            FleetRegistry::new(&[ship("a", -1.0, "SHA")], &net),
            Err(ConfigError::NegativeCapacity { .. })
        ));
        assert!(matches!(
            FleetRegistry::new(&[ship("a", 1.0, "LAX")], &net),
            Err(ConfigError::UnknownPort(_))
        ));

        let mut costly = ship("a", 1.0, "SHA");
        costly.weekly_cost = -5.0;
        assert!(matches!(
            FleetRegistry::new(&[costly], &net),
            Err(ConfigError::NegativeCost { .. })
        ));
    }
}
