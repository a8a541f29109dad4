//! The result of one planning run, rendered as a text table or serialized as JSON.

use std::fmt;

use derive_more::Display;
use itertools::Itertools;
use serde::Serialize;

use crate::problem::fleet::ShipClass;
use crate::problem::Week;
use crate::solver::NoSolutionReason;

/// Label attached to a sailed voyage for reporting. Never part of the optimization.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    #[display(fmt = "high-penalty")]
    HighPenalty,
    #[display(fmt = "transshipment")]
    Transshipment,
    #[display(fmt = "reposition")]
    Reposition,
    #[display(fmt = "standard")]
    Standard,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestEntry {
    /// The commodity, e.g. "SHA->LAX"
    pub commodity: String,
    /// Rounded half-up
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoyageEvent {
    pub depart: Week,
    pub arrive: Week,
    pub ship: String,
    pub class: ShipClass,
    pub origin: String,
    pub destination: String,
    pub manifest: Vec<ManifestEntry>,
    pub fee: f64,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckpointCompliance {
    pub commodity: String,
    pub deadline: Week,
    pub required: f64,
    pub delivered: f64,
    pub met: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShipSummary {
    pub ship: String,
    pub voyages: usize,
    pub weeks_at_sea: usize,
    pub weeks_in_port: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Status {
    Solved { objective: f64 },
    NoSolution { reason: NoSolutionReason },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    #[serde(flatten)]
    pub status: Status,
    /// Sailed voyages ordered by departure week, then ship, then route
    pub events: Vec<VoyageEvent>,
    pub compliance: Vec<CheckpointCompliance>,
    pub ships: Vec<ShipSummary>,
    /// Commodities with no path between their endpoints
    pub undeliverable: Vec<String>,
}

impl Report {
    /// A report for a run that ended without a solution
    pub fn no_solution(reason: NoSolutionReason, undeliverable: Vec<String>) -> Report {
        Report {
            status: Status::NoSolution { reason },
            events: Vec::new(),
            compliance: Vec::new(),
            ships: Vec::new(),
            undeliverable,
        }
    }

    pub fn is_solved(&self) -> bool {
        matches!(self.status, Status::Solved { .. })
    }

    pub fn objective(&self) -> Option<f64> {
        match self.status {
            Status::Solved { objective } => Some(objective),
            Status::NoSolution { .. } => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Voyages carrying `commodity` in event order, with the quantity on board
    pub fn carrying<'a>(
        &'a self,
        commodity: &'a str,
    ) -> impl Iterator<Item = (&'a VoyageEvent, f64)> + 'a {
        self.events.iter().filter_map(move |event| {
            event
                .manifest
                .iter()
                .find(|entry| entry.commodity == commodity)
                .map(|entry| (event, entry.quantity))
        })
    }

    /// The movements of one commodity through the plan
    pub fn trace<'a>(&'a self, commodity: &'a str) -> Trace<'a> {
        Trace {
            report: self,
            commodity,
        }
    }
}

/// Renders every voyage carrying one commodity, e.g. `SHA->LAX`
pub struct Trace<'a> {
    report: &'a Report,
    commodity: &'a str,
}

impl fmt::Display for Trace<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cargo trace for {}:", self.commodity)?;

        let mut moved = false;
        for (event, quantity) in self.report.carrying(self.commodity) {
            moved = true;
            writeln!(
                f,
                "  Week {}: {} carries {} on {} -> {} ({})",
                event.depart, event.ship, quantity, event.origin, event.destination, event.kind
            )?;
        }
        if !moved {
            writeln!(f, "  No movements of {}", self.commodity)?;
        }

        Ok(())
    }
}

fn manifest(entries: &[ManifestEntry]) -> String {
    if entries.is_empty() {
        return "Empty".to_string();
    }
    entries
        .iter()
        .map(|m| format!("{}:{}", m.commodity, m.quantity))
        .join(", ")
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(110);

        match &self.status {
            Status::NoSolution { reason } => writeln!(f, "No solution: {}", reason)?,
            Status::Solved { objective } => writeln!(f, "Status: solved | Objective: {:.2}", objective)?,
        }
        if !self.undeliverable.is_empty() {
            writeln!(f, "Undeliverable commodities: {}", self.undeliverable.join(", "))?;
        }
        if !self.is_solved() {
            return Ok(());
        }

        writeln!(f)?;
        writeln!(f, "{}", rule)?;
        writeln!(
            f,
            "{:<4} | {:<4} | {:<15} | {:<13} | {:<40} | {:<13} | {}",
            "Week", "Arr", "Ship", "Route", "Cargo", "Type", "Fee"
        )?;
        writeln!(f, "{}", rule)?;
        for e in &self.events {
            writeln!(
                f,
                "{:<4} | {:<4} | {:<15} | {:<13} | {:<40} | {:<13} | {}",
                e.depart,
                e.arrive,
                e.ship,
                format!("{} -> {}", e.origin, e.destination),
                manifest(&e.manifest),
                e.kind.to_string(),
                e.fee
            )?;
        }
        writeln!(f, "{}", "-".repeat(110))?;

        writeln!(f)?;
        writeln!(
            f,
            "{:<13} | {:<8} | {:>10} | {:>10} | {}",
            "Commodity", "Deadline", "Required", "Delivered", "Status"
        )?;
        for c in &self.compliance {
            writeln!(
                f,
                "{:<13} | {:<8} | {:>10} | {:>10.1} | {}",
                c.commodity,
                c.deadline,
                c.required,
                c.delivered,
                if c.met { "met" } else { "SHORT" }
            )?;
        }

        writeln!(f)?;
        writeln!(
            f,
            "{:<15} | {:>7} | {:>7} | {:>7}",
            "Ship", "Voyages", "At sea", "In port"
        )?;
        for s in &self.ships {
            writeln!(
                f,
                "{:<15} | {:>7} | {:>7} | {:>7}",
                s.ship, s.voyages, s.weeks_at_sea, s.weeks_in_port
            )?;
        }

        Ok(())
    }
}
