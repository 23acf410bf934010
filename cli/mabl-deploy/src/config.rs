//! Command line and environment configuration.
//!
//! Every option can also be supplied through a `MABL_*` environment variable,
//! which is how CI systems usually hand over the API key.

use std::time::Duration;

use clap::{Parser, ValueEnum};
use mabl_api::{RestApiConfig, DEFAULT_API_URL};
use thiserror::Error;

use crate::runner::RunnerConfig;

/// Configuration problems detected before contacting mabl.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must not be blank")]
    Blank(&'static str),

    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),
}

impl ConfigError {
    /// Suggested fix shown with the error.
    pub fn hint(&self) -> &'static str {
        match self {
            Self::Blank("api key") => "Pass --api-key or set MABL_API_KEY.",
            Self::Blank(_) => {
                "Pass --environment-id and --application-id \
                 (or MABL_ENVIRONMENT_ID / MABL_APPLICATION_ID)."
            }
            Self::NotPositive(_) => "Intervals and timeouts are whole numbers above zero.",
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Trigger mabl journeys for a deployment and wait for the results.
#[derive(Parser)]
#[command(name = "mabl-deploy")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// mabl API key.
    #[arg(long, env = "MABL_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// mabl environment ID to run plans for.
    #[arg(long, env = "MABL_ENVIRONMENT_ID")]
    pub environment_id: String,

    /// mabl application ID to run plans for.
    #[arg(long, env = "MABL_APPLICATION_ID")]
    pub application_id: String,

    /// mabl API endpoint.
    #[arg(long, env = "MABL_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Milliseconds to wait between status polls.
    #[arg(long, env = "MABL_POLL_INTERVAL_MS", default_value_t = 10_000)]
    pub poll_interval_ms: u64,

    /// Give up waiting after this many seconds.
    #[arg(long, env = "MABL_TIMEOUT_SECS", default_value_t = 3_600)]
    pub timeout_secs: u64,

    /// Exit successfully even if a plan fails.
    #[arg(long, env = "MABL_CONTINUE_ON_PLAN_FAILURE")]
    pub continue_on_plan_failure: bool,

    /// Exit successfully even if mabl cannot be reached or errors.
    #[arg(long, env = "MABL_CONTINUE_ON_MABL_ERROR")]
    pub continue_on_mabl_error: bool,

    /// Log format for diagnostics written to stderr.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Cli {
    /// Reject values the runner assumes are valid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Blank("api key"));
        }
        if self.environment_id.trim().is_empty() {
            return Err(ConfigError::Blank("environment id"));
        }
        if self.application_id.trim().is_empty() {
            return Err(ConfigError::Blank("application id"));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::NotPositive("poll interval"));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::NotPositive("timeout"));
        }
        Ok(())
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            polling_interval: Duration::from_millis(self.poll_interval_ms),
            environment_id: self.environment_id.trim().to_string(),
            application_id: self.application_id.trim().to_string(),
            continue_on_plan_failure: self.continue_on_plan_failure,
            continue_on_mabl_error: self.continue_on_mabl_error,
        }
    }

    pub fn api_config(&self) -> RestApiConfig {
        RestApiConfig {
            api_url: self.api_url.clone(),
            ..RestApiConfig::new(self.api_key.trim())
        }
    }

    /// Overall deadline for the run.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
