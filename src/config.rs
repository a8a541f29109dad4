//! Input configuration of a planning run.
//!
//! A run is described by a single JSON document: ports grouped by region, the raw
//! route table, the fleet roster, cost parameters and the planning horizon. Optional
//! sections tune pruning, demand generation, the solve budget and the report.

use std::{fs::File, io::BufReader, io::Read, path::Path};

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::problem::{fleet::ShipClass, network::RegionRole, Costs, FeeTrigger};
use crate::solver::SolveParams;

#[derive(Debug, Display)]
pub enum ConfigError {
    #[display(fmt = "failed to read configuration: {}", _0)]
    Io(std::io::Error),
    #[display(fmt = "malformed configuration: {}", _0)]
    Json(serde_json::Error),
    #[display(fmt = "the planning horizon must be at least one week")]
    ZeroHorizon,
    #[display(fmt = "the checkpoint cadence must be at least one week")]
    ZeroCadence,
    #[display(fmt = "port `{}` is listed more than once", _0)]
    DuplicatePort(String),
    #[display(fmt = "unknown port `{}`", _0)]
    UnknownPort(String),
    #[display(fmt = "route or commodity from `{}` to itself", _0)]
    SelfRoute(String),
    #[display(fmt = "route {} -> {} is listed more than once", origin, destination)]
    DuplicateRoute { origin: String, destination: String },
    #[display(fmt = "route {} -> {} must have a positive number of days", origin, destination)]
    NonPositiveDays { origin: String, destination: String },
    #[display(fmt = "route {} -> {} has a negative annual volume", origin, destination)]
    NegativeVolume { origin: String, destination: String },
    #[display(fmt = "ship id `{}` is used more than once", _0)]
    DuplicateShip(String),
    #[display(fmt = "ship `{}` has negative capacity {}", ship, capacity)]
    NegativeCapacity { ship: String, capacity: f64 },
    #[display(fmt = "{} must not be negative (got {})", what, value)]
    NegativeCost { what: String, value: f64 },
    #[display(fmt = "checkpoints of {} -> {} are not monotonic", origin, destination)]
    NonMonotonicCheckpoints { origin: String, destination: String },
    #[display(
        fmt = "checkpoint week {} of {} -> {} lies beyond the horizon",
        deadline,
        origin,
        destination
    )]
    CheckpointBeyondHorizon {
        origin: String,
        destination: String,
        deadline: usize,
    },
    #[display(fmt = "demand for {} -> {} is given more than once", origin, destination)]
    DuplicateDemand { origin: String, destination: String },
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Json(err)
    }
}

/// A named group of ports sharing a regulatory role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionConfig {
    pub name: String,
    pub role: RegionRole,
    pub ports: Vec<String>,
}

/// One row of the raw route table. The annual volume counts both directions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    pub origin: String,
    pub destination: String,
    #[serde(default)]
    pub annual_volume: f64,
    pub days: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipConfig {
    pub id: String,
    pub class: ShipClass,
    pub capacity: f64,
    pub home_port: String,
    pub weekly_cost: f64,
}

/// Explicit cumulative checkpoints `(deadline week, required quantity)` for a commodity.
/// Replaces the checkpoints derived from the route table, if any.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandConfig {
    pub origin: String,
    pub destination: String,
    pub checkpoints: Vec<(usize, f64)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanningConfig {
    /// Routes with a transit of this many weeks or more are dropped
    pub max_transit_weeks: usize,
    /// Weeks between generated demand checkpoints
    pub checkpoint_cadence: usize,
    /// Which voyages of restricted ships pay the high policy fee
    pub fee_trigger: FeeTrigger,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            max_transit_weeks: 10,
            checkpoint_cadence: 4,
            fee_trigger: FeeTrigger::RegulatedDestination,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Cargo quantities below this are treated as solver noise
    pub cargo_noise_threshold: f64,
    /// Voyages paying more than this fee are tagged as high-penalty
    pub high_penalty_threshold: f64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            cargo_noise_threshold: 0.5,
            high_penalty_threshold: 500.0,
        }
    }
}

/// Named combinations of fee trigger, pruning ceiling and solve budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// Destination-only fee trigger, 10 week ceiling, 120 s at a 2% gap
    Baseline,
    /// Home-to-regulated fee trigger, 20 week ceiling, no time limit
    Strict,
    /// Destination-only fee trigger, 20 week ceiling, 60 s at a 5% gap
    Exploratory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Number of weeks in the planning horizon; weeks run from 0 to `horizon`
    pub horizon: usize,
    pub regions: Vec<RegionConfig>,
    pub routes: Vec<RouteConfig>,
    pub fleet: Vec<ShipConfig>,
    pub costs: Costs,
    #[serde(default)]
    pub demand: Vec<DemandConfig>,
    #[serde(default)]
    pub planning: PlanningConfig,
    #[serde(default)]
    pub solver: SolveParams,
    #[serde(default)]
    pub report: ReportConfig,
}

impl Config {
    pub fn from_reader<R: Read>(reader: R) -> Result<Config, ConfigError> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let file = File::open(path)?;
        Config::from_reader(BufReader::new(file))
    }

    /// Overrides the planning and solver sections with a preset
    pub fn apply_preset(&mut self, preset: Preset) {
        let (trigger, ceiling, time_limit, gap, feasibility) = match preset {
            Preset::Baseline => (FeeTrigger::RegulatedDestination, 10, Some(120.0), 0.02, true),
            Preset::Strict => (FeeTrigger::HomeToRegulated, 20, None, 1e-4, false),
            Preset::Exploratory => (FeeTrigger::RegulatedDestination, 20, Some(60.0), 0.05, true),
        };
        self.planning.fee_trigger = trigger;
        self.planning.max_transit_weeks = ceiling;
        self.solver.time_limit_secs = time_limit;
        self.solver.mip_gap = gap;
        self.solver.emphasize_feasibility = feasibility;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "horizon": 6,
        "regions": [
            {"name": "CN", "role": "home", "ports": ["SHA"]},
            {"name": "US", "role": "regulated", "ports": ["LAX"]}
        ],
        "routes": [{"origin": "SHA", "destination": "LAX", "annual_volume": 5200, "days": 16}],
        "fleet": [{"id": "s1", "class": "restricted", "capacity": 100, "home_port": "SHA", "weekly_cost": 10}],
        "costs": {"wait_cost": 1, "time_penalty": 1, "excess_penalty": 0.1, "holding_cost": 0.01,
                  "policy_fee_high": 2000, "policy_fee_low": 50}
    }"#;

    #[test]
    fn optional_sections_fall_back_to_defaults() {
        let config = Config::from_reader(MINIMAL.as_bytes()).unwrap();

        assert_eq!(config.horizon, 6);
        assert!(config.demand.is_empty());
        assert_eq!(config.planning.max_transit_weeks, 10);
        assert_eq!(config.planning.checkpoint_cadence, 4);
        assert_eq!(config.planning.fee_trigger, FeeTrigger::RegulatedDestination);
        assert_eq!(config.report.cargo_noise_threshold, 0.5);
        assert_eq!(config.costs.shortfall_penalty, None);
        assert_eq!(config.fleet[0].class, ShipClass::Restricted);
        assert_eq!(config.regions[1].role, RegionRole::Regulated);
    }

    #[test]
    fn presets_override_planning_and_budget() {
        let mut config = Config::from_reader(MINIMAL.as_bytes()).unwrap();

        config.apply_preset(Preset::Strict);
        assert_eq!(config.planning.fee_trigger, FeeTrigger::HomeToRegulated);
        assert_eq!(config.planning.max_transit_weeks, 20);
        assert_eq!(config.solver.time_limit_secs, None);

        config.apply_preset(Preset::Baseline);
        assert_eq!(config.planning.fee_trigger, FeeTrigger::RegulatedDestination);
        assert_eq!(config.solver.time_limit_secs, Some(120.0));
        assert_eq!(config.solver.mip_gap, 0.02);
        assert!(config.solver.emphasize_feasibility);
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = Config::from_reader("{\"horizon\": }".as_bytes()).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }
}
