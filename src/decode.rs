//! Turns solved variable values into an itinerary and a compliance report.

use std::cmp::Reverse;

use float_ord::FloatOrd;
use itertools::Itertools;
use log::{debug, info};

use crate::config::ReportConfig;
use crate::models::deployment::{DeploymentResult, Parameters, Sets, VoyageKey};
use crate::problem::demand::round_half_up;
use crate::problem::Problem;
use crate::report::{
    CheckpointCompliance, EventKind, ManifestEntry, Report, ShipSummary, Status, VoyageEvent,
};

/// Binary values above this count as chosen
const ACTIVE: f64 = 0.5;

/// Slack allowed when comparing delivered cargo against a requirement
const TOLERANCE: f64 = 1e-6;

pub struct SolutionDecoder<'a> {
    problem: &'a Problem,
    sets: &'a Sets,
    parameters: &'a Parameters,
    config: &'a ReportConfig,
}

impl<'a> SolutionDecoder<'a> {
    pub fn new(
        problem: &'a Problem,
        sets: &'a Sets,
        parameters: &'a Parameters,
        config: &'a ReportConfig,
    ) -> SolutionDecoder<'a> {
        SolutionDecoder {
            problem,
            sets,
            parameters,
            config,
        }
    }

    pub fn decode(&self, result: &DeploymentResult) -> Report {
        let events = self.events(result);
        let compliance = self.compliance(result);
        let ships = self.ships(result);

        info!(
            "Decoded {} voyages, {} of {} checkpoints met",
            events.len(),
            compliance.iter().filter(|c| c.met).count(),
            compliance.len()
        );

        Report {
            status: Status::Solved {
                objective: result.objective,
            },
            events,
            compliance,
            ships,
            undeliverable: undeliverable(self.problem),
        }
    }

    fn is_active(result: &DeploymentResult, key: &VoyageKey) -> bool {
        result.y.get(key).copied().unwrap_or(0.0) > ACTIVE
    }

    /// Sailed voyages ordered by departure week, then ship, then route
    pub fn events(&self, result: &DeploymentResult) -> Vec<VoyageEvent> {
        let network = self.problem.network();

        self.sets
            .Y
            .iter()
            .filter(|key| Self::is_active(result, key))
            .sorted_by_key(|key| (key.depart, key.ship, key.route))
            .map(|key| {
                let route = network.route(key.route);
                let ship = self.problem.fleet().ship(key.ship);
                let manifest = self.manifest(result, key);
                let fee = self.problem.policy_fee(key.ship, key.route);
                let kind = self.classify(key, fee, &manifest);

                VoyageEvent {
                    depart: key.depart,
                    arrive: key.depart + route.weeks(),
                    ship: ship.id().to_string(),
                    class: ship.class(),
                    origin: network.port(route.origin()).name().to_string(),
                    destination: network.port(route.destination()).name().to_string(),
                    manifest,
                    fee,
                    kind,
                }
            })
            .collect()
    }

    /// Cargo on a voyage above the noise threshold, largest first
    fn manifest(&self, result: &DeploymentResult, key: &VoyageKey) -> Vec<ManifestEntry> {
        let network = self.problem.network();

        self.sets
            .C
            .iter()
            .filter_map(|&c| {
                let quantity = result.z.get(&(*key, c)).copied().unwrap_or(0.0);
                if quantity < self.config.cargo_noise_threshold {
                    return None;
                }
                Some((c, round_half_up(quantity)))
            })
            .sorted_by_key(|&(_, quantity)| Reverse(FloatOrd(quantity)))
            .map(|(c, quantity)| ManifestEntry {
                commodity: network.label(self.parameters.O_c[c], self.parameters.D_c[c]),
                quantity,
            })
            .collect()
    }

    /// Reporting label of a voyage. The first matching rule wins.
    pub fn classify(&self, key: &VoyageKey, fee: f64, manifest: &[ManifestEntry]) -> EventKind {
        let network = self.problem.network();
        let origin = network.port(network.route(key.route).origin());

        if fee > self.config.high_penalty_threshold {
            EventKind::HighPenalty
        } else if origin.is_hub() {
            EventKind::Transshipment
        } else if manifest.is_empty() {
            EventKind::Reposition
        } else {
            EventKind::Standard
        }
    }

    /// Delivered against required for every checkpoint, counted the same way as the
    /// demand constraints
    pub fn compliance(&self, result: &DeploymentResult) -> Vec<CheckpointCompliance> {
        let network = self.problem.network();

        self.sets
            .D
            .iter()
            .map(|&(c, i)| {
                let checkpoint = self.parameters.S[c][i];
                let delivered = result.delivered(self.sets, self.parameters, c, checkpoint.deadline);
                let met = delivered + TOLERANCE >= checkpoint.required;
                if !met {
                    debug!(
                        "{} short by {:.1} at week {}",
                        network.label(self.parameters.O_c[c], self.parameters.D_c[c]),
                        checkpoint.required - delivered,
                        checkpoint.deadline
                    );
                }

                CheckpointCompliance {
                    commodity: network.label(self.parameters.O_c[c], self.parameters.D_c[c]),
                    deadline: checkpoint.deadline,
                    required: checkpoint.required,
                    delivered,
                    met,
                }
            })
            .collect()
    }

    /// Voyages sailed, weeks at sea and weeks stationed per ship
    pub fn ships(&self, result: &DeploymentResult) -> Vec<ShipSummary> {
        let network = self.problem.network();

        self.sets
            .K
            .iter()
            .map(|&k| {
                let sailed = self
                    .sets
                    .Y
                    .iter()
                    .filter(|key| key.ship == k && Self::is_active(result, key))
                    .collect::<Vec<_>>();
                let weeks_in_port = self
                    .sets
                    .X
                    .iter()
                    .filter(|(ship, _, _)| *ship == k)
                    .filter(|key| result.x.get(*key).copied().unwrap_or(0.0) > ACTIVE)
                    .count();

                ShipSummary {
                    ship: self.problem.fleet().ship(k).id().to_string(),
                    voyages: sailed.len(),
                    weeks_at_sea: sailed.iter().map(|key| network.route(key.route).weeks()).sum(),
                    weeks_in_port,
                }
            })
            .collect()
    }
}

/// Labels of the commodities that cannot reach their destination
pub fn undeliverable(problem: &Problem) -> Vec<String> {
    problem
        .undeliverable()
        .into_iter()
        .map(|c| {
            let commodity = problem.demand().commodity(c);
            problem
                .network()
                .label(commodity.origin(), commodity.destination())
        })
        .collect()
}
