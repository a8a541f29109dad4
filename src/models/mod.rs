pub mod deployment;
pub mod utils;

pub use deployment::DeploymentSolver;
