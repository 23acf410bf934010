//! # mabl-api
//!
//! Client-side view of the mabl deployment API.
//!
//! ## Modules
//!
//! - `model`: deployment handle and execution result payloads, plus the
//!   completion/success rules evaluated over them
//! - `client`: the `ExecutionClient` capability and its REST implementation
//! - `error`: transport and API failures reported by clients

mod client;
mod error;
mod model;

pub use client::{ExecutionClient, RestApiClient, RestApiConfig, DEFAULT_API_URL};
pub use error::ClientError;
pub use model::{
    CreateDeploymentRequest, DeploymentHandle, ExecutionSnapshot, JourneyExecution,
    PlanExecution, PlanSummary, TERMINAL_STATUSES, UNKNOWN_PLAN_NAME,
};
