//! The time-expanded multi-commodity deployment model

pub mod model;
pub mod sets_and_parameters;

pub use model::{DeploymentOutcome, DeploymentResult, DeploymentSolver, Variables};
pub use sets_and_parameters::{Parameters, Sets, VoyageKey};
