//! Deployment and execution result payloads.
//!
//! Everything the service reports about a plan other than its status is
//! treated as optional, so a malformed or newer payload still decodes.

use serde::{Deserialize, Serialize};

/// Plan statuses after which a plan will not change state again.
pub const TERMINAL_STATUSES: [&str; 5] = [
    "succeeded",
    "failed",
    "cancelled",
    "completed",
    "terminated",
];

/// Placeholder used wherever a plan has no usable name.
pub const UNKNOWN_PLAN_NAME: &str = "<Unknown Plan>";

/// Request body for triggering a deployment event.
#[derive(Debug, Clone, Serialize)]
pub struct CreateDeploymentRequest {
    pub environment_id: String,
    pub application_id: String,
}

/// A triggered deployment event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentHandle {
    /// Identifier assigned by mabl.
    pub id: String,
}

/// Point-in-time view of every plan run by a deployment event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionSnapshot {
    #[serde(default)]
    pub executions: Vec<PlanExecution>,
}

impl ExecutionSnapshot {
    /// True once every plan has reached a terminal status.
    ///
    /// Every plan is inspected; an empty snapshot is complete.
    pub fn is_complete(&self) -> bool {
        let mut complete = true;
        for plan in &self.executions {
            complete &= plan.is_terminal();
        }
        complete
    }

    /// True if every plan reports success. Only meaningful once complete.
    pub fn is_successful(&self) -> bool {
        let mut success = true;
        for plan in &self.executions {
            success &= plan.success;
        }
        success
    }

    /// Number of plans not yet in a terminal status.
    pub fn pending_count(&self) -> usize {
        self.executions.iter().filter(|p| !p.is_terminal()).count()
    }
}

/// One test plan's run within a deployment event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanExecution {
    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub success: bool,

    #[serde(default)]
    pub plan: Option<PlanSummary>,

    #[serde(default, alias = "journeyExecutions")]
    pub journey_executions: Vec<JourneyExecution>,
}

impl PlanExecution {
    /// Whether the status (case-insensitively) is terminal.
    pub fn is_terminal(&self) -> bool {
        let status = self.status.to_ascii_lowercase();
        TERMINAL_STATUSES.contains(&status.as_str())
    }

    /// Plan name for reporting, or [`UNKNOWN_PLAN_NAME`].
    pub fn plan_name(&self) -> &str {
        self.plan
            .as_ref()
            .and_then(|plan| plan.name.as_deref())
            .unwrap_or(UNKNOWN_PLAN_NAME)
    }
}

/// Descriptor of the plan being executed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanSummary {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub name: Option<String>,
}

/// One journey run within a plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JourneyExecution {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub status: String,
}
