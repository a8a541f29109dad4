use derive_more::{Deref, From, Into};
use log::{debug, trace};
use typed_index_collections::TiVec;

use crate::config::{ConfigError, DemandConfig, RouteConfig};
use crate::problem::network::{NetworkModel, PortIndex};

/// The number of weeks in a year, used to spread the annual volume evenly
const WEEKS_PER_YEAR: f64 = 52.0;

#[derive(Deref, Debug, PartialEq, Eq, PartialOrd, Ord, From, Into, Clone, Copy, Hash)]
pub struct CommodityIndex(usize);

/// A cumulative delivery target: by the end of `deadline`, at least `required` units
/// must have arrived at the destination.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Checkpoint {
    pub deadline: usize,
    pub required: f64,
}

/// A directed demand flow from an origin port to a destination port
#[derive(Debug, Clone)]
pub struct Commodity {
    origin: PortIndex,
    destination: PortIndex,
    /// Ordered by ascending deadline, with non-decreasing requirements
    checkpoints: Vec<Checkpoint>,
}

impl Commodity {
    pub fn origin(&self) -> PortIndex {
        self.origin
    }

    pub fn destination(&self) -> PortIndex {
        self.destination
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }
}

/// The commodities of a run with their checkpoints
#[derive(Debug, Clone)]
pub struct DemandSchedule {
    commodities: TiVec<CommodityIndex, Commodity>,
}

impl DemandSchedule {
    /// Derives checkpoints from the route table, then applies explicit demand entries.
    ///
    /// Route rows with zero annual volume are pure transit links and produce no
    /// commodity. An explicit entry for an existing commodity replaces its derived
    /// checkpoints; otherwise it adds a new commodity.
    pub fn new(
        network: &NetworkModel,
        routes: &[RouteConfig],
        explicit: &[DemandConfig],
        horizon: usize,
        cadence: usize,
    ) -> Result<DemandSchedule, ConfigError> {
        if cadence == 0 {
            return Err(ConfigError::ZeroCadence);
        }

        let lookup = |name: &str| {
            network
                .port_index(name)
                .ok_or_else(|| ConfigError::UnknownPort(name.to_string()))
        };

        let mut commodities: TiVec<CommodityIndex, Commodity> = TiVec::new();

        for route in routes {
            if route.annual_volume < 0.0 {
                return Err(ConfigError::NegativeVolume {
                    origin: route.origin.clone(),
                    destination: route.destination.clone(),
                });
            }
            if route.annual_volume == 0.0 {
                continue;
            }
            let rate = weekly_rate(route.annual_volume);
            commodities.push(Commodity {
                origin: lookup(&route.origin)?,
                destination: lookup(&route.destination)?,
                checkpoints: generate_checkpoints(rate, horizon, cadence),
            });
        }

        let mut overridden = Vec::new();
        for demand in explicit {
            let origin = lookup(&demand.origin)?;
            let destination = lookup(&demand.destination)?;
            if origin == destination {
                return Err(ConfigError::SelfRoute(demand.origin.clone()));
            }
            if overridden.contains(&(origin, destination)) {
                return Err(ConfigError::DuplicateDemand {
                    origin: demand.origin.clone(),
                    destination: demand.destination.clone(),
                });
            }
            overridden.push((origin, destination));

            let checkpoints = validate_checkpoints(demand, horizon)?;
            match commodities
                .iter_mut()
                .find(|c| c.origin == origin && c.destination == destination)
            {
                Some(commodity) => commodity.checkpoints = checkpoints,
                None => commodities.push(Commodity {
                    origin,
                    destination,
                    checkpoints,
                }),
            }
        }

        for commodity in &commodities {
            trace!(
                "{}: {:?}",
                network.label(commodity.origin, commodity.destination),
                commodity.checkpoints
            );
        }
        debug!(
            "{} commodities with {} checkpoints in total",
            commodities.len(),
            commodities.iter().map(|c| c.checkpoints.len()).sum::<usize>()
        );

        Ok(DemandSchedule { commodities })
    }

    pub fn commodities(&self) -> &TiVec<CommodityIndex, Commodity> {
        &self.commodities
    }

    pub fn commodity(&self, index: CommodityIndex) -> &Commodity {
        &self.commodities[index]
    }

    pub fn len(&self) -> usize {
        self.commodities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commodities.is_empty()
    }
}

/// One-way weekly demand from an annual two-way volume
pub fn weekly_rate(annual_volume: f64) -> f64 {
    (annual_volume / 2.0) / WEEKS_PER_YEAR
}

/// Rounds halves away from zero for non-negative quantities: 2.5 -> 3, 2.49 -> 2.
/// Used for every quantity that must be reproducible across runs.
pub fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

/// Checkpoints every `cadence` weeks, plus the final week of the horizon when it is not
/// already a multiple of the cadence.
pub fn generate_checkpoints(rate: f64, horizon: usize, cadence: usize) -> Vec<Checkpoint> {
    let mut weeks: Vec<usize> = (cadence..=horizon).step_by(cadence).collect();
    if horizon % cadence != 0 {
        weeks.push(horizon);
    }

    weeks
        .into_iter()
        .map(|deadline| Checkpoint {
            deadline,
            required: round_half_up(rate * deadline as f64),
        })
        .collect()
}

fn validate_checkpoints(demand: &DemandConfig, horizon: usize) -> Result<Vec<Checkpoint>, ConfigError> {
    let non_monotonic = || ConfigError::NonMonotonicCheckpoints {
        origin: demand.origin.clone(),
        destination: demand.destination.clone(),
    };

    let mut checkpoints: Vec<Checkpoint> = Vec::with_capacity(demand.checkpoints.len());
    for &(deadline, required) in &demand.checkpoints {
        if deadline > horizon {
            return Err(ConfigError::CheckpointBeyondHorizon {
                origin: demand.origin.clone(),
                destination: demand.destination.clone(),
                deadline,
            });
        }
        if !(required >= 0.0) {
            return Err(non_monotonic());
        }
        if let Some(last) = checkpoints.last() {
            if deadline <= last.deadline || required < last.required {
                return Err(non_monotonic());
            }
        }
        checkpoints.push(Checkpoint { deadline, required });
    }

    Ok(checkpoints)
}
