//! Library half of the `symdec` command: scenario replay and reporting.

pub mod report;
pub mod scenario;

pub use report::{QueryOutcome, Report};
pub use scenario::{run, Scenario, ScenarioError};
