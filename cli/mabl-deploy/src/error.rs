//! Failure classes for a deployment run and their display.

use colored::Colorize;
use mabl_api::ClientError;
use thiserror::Error;

use crate::config::ConfigError;

const API_ERROR_MESSAGE: &str = "Oh no!. There was an API error trying to run journeys in mabl.";
const PLAN_FAILURE_MESSAGE: &str = "One or more plans were unsuccessful running in mabl.";

/// Why a run stopped short of success.
#[derive(Debug, Error)]
pub enum RunError {
    /// mabl or the transport to it failed.
    #[error("{message}")]
    System {
        message: String,
        #[source]
        source: Option<ClientError>,
    },

    /// Every plan finished, but at least one did not succeed.
    #[error("{message}")]
    PlanFailure { message: String },

    /// Shutdown was requested while waiting between polls.
    #[error("Deployment run was cancelled")]
    Cancelled,

    /// Anything else: output failures, panics.
    #[error(transparent)]
    Unexpected(anyhow::Error),
}

impl RunError {
    /// A client call failed.
    pub fn api(source: ClientError) -> Self {
        Self::System {
            message: API_ERROR_MESSAGE.to_string(),
            source: Some(source),
        }
    }

    /// mabl has no record of a deployment it just created.
    pub fn missing_deployment(deployment_id: &str) -> Self {
        Self::System {
            message: format!(
                "Oh snap! No deployment event found for id [{}] in mabl.",
                deployment_id
            ),
            source: None,
        }
    }

    pub fn plan_failure() -> Self {
        Self::PlanFailure {
            message: PLAN_FAILURE_MESSAGE.to_string(),
        }
    }
}

impl From<std::io::Error> for RunError {
    fn from(err: std::io::Error) -> Self {
        Self::Unexpected(anyhow::Error::new(err).context("Failed to write progress output"))
    }
}

/// Returned to the caller when a run is cancelled before completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("mabl deployment run was cancelled")]
pub struct Cancelled;

/// Print a top-level error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    if let Some(config_err) = err.downcast_ref::<ConfigError>() {
        eprintln!(
            "\n{}",
            format!("Hint: {}", config_err.hint()).yellow()
        );
    } else if let Some(ClientError::Network(_)) = err.downcast_ref::<ClientError>() {
        eprintln!(
            "\n{}",
            "Hint: Check your network connection and --api-url.".yellow()
        );
    }
}
