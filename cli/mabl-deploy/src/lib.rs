//! mabl deployment step.
//!
//! Triggers a mabl deployment event for an environment/application pair,
//! polls the resulting plan executions until every plan reaches a terminal
//! status, and reduces the outcome to pass/fail for the calling pipeline.
//!
//! ## Modules
//!
//! - `runner`: the trigger-and-poll orchestration
//! - `report`: progress lines written for the pipeline log
//! - `error`: failure classes and how they are printed
//! - `config`: command line / environment configuration
//! - `logging`: tracing subscriber setup

pub mod config;
pub mod error;
pub mod logging;
pub mod report;
pub mod runner;

pub use error::{Cancelled, RunError};
pub use report::Report;
pub use runner::{DeploymentRunner, RunnerConfig};
