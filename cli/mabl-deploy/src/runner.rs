//! Deployment trigger-and-poll orchestration.
//!
//! A run triggers one deployment event, then polls its execution results on a
//! fixed interval until every plan reaches a terminal status. There is no
//! internal deadline; the caller bounds the run, either by sending on the
//! shutdown channel or by dropping the future.
//!
//! All failures are absorbed into the boolean outcome:
//!
//! - success → `true`
//! - system error (API/transport failure, unknown deployment) → `continue_on_mabl_error`
//! - plan failure → `continue_on_plan_failure`
//! - anything unexpected → `continue_on_mabl_error`
//!
//! The client is closed exactly once on every exit path.

use std::any::Any;
use std::io::{self, Write};
use std::ops::Deref;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures_util::FutureExt;
use mabl_api::ExecutionClient;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::{Cancelled, RunError};
use crate::report::Report;

/// Fixed parameters of a single run.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Wait between execution result polls.
    pub polling_interval: Duration,

    pub environment_id: String,

    pub application_id: String,

    /// Report success even if a plan fails.
    pub continue_on_plan_failure: bool,

    /// Report success even if mabl (or the connection to it) fails.
    pub continue_on_mabl_error: bool,
}

/// Drives one deployment event to completion.
pub struct DeploymentRunner<C, W: Write> {
    client: C,
    report: Report<W>,
    config: RunnerConfig,
}

impl<C, W> DeploymentRunner<C, W>
where
    C: ExecutionClient,
    W: Write + Send,
{
    pub fn new(client: C, output: W, config: RunnerConfig) -> Self {
        Self {
            client,
            report: Report::new(output),
            config,
        }
    }

    /// Run to completion with no way to cancel other than dropping the future.
    pub async fn run(self) -> bool {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        self.run_until(shutdown_rx).await.unwrap_or(false)
    }

    /// Run to completion, stopping early if `shutdown` becomes `true` while
    /// waiting between polls.
    pub async fn run_until(self, mut shutdown: watch::Receiver<bool>) -> Result<bool, Cancelled> {
        let DeploymentRunner {
            client,
            mut report,
            config,
        } = self;

        let result = {
            let client = ClientLease::new(client);
            let attempt = AssertUnwindSafe(execute(&*client, &mut report, &config, &mut shutdown))
                .catch_unwind()
                .await;
            drop(client);

            attempt.unwrap_or_else(|panic| {
                Err(RunError::Unexpected(anyhow::anyhow!(
                    "panic during deployment run: {}",
                    panic_message(panic.as_ref())
                )))
            })
        };

        let outcome = match result {
            Ok(()) => {
                info!("All mabl plans succeeded");
                Ok(true)
            }
            Err(RunError::Cancelled) => {
                warn!("Deployment run cancelled");
                emit(report.cancelled());
                Err(Cancelled)
            }
            Err(err @ RunError::System { .. }) => {
                error!(error = %err, "mabl system error");
                emit(report.failure(&err));
                Ok(config.continue_on_mabl_error)
            }
            Err(err @ RunError::PlanFailure { .. }) => {
                warn!(error = %err, "mabl plan execution failed");
                emit(report.failure(&err));
                Ok(config.continue_on_plan_failure)
            }
            Err(RunError::Unexpected(err)) => {
                error!(error = %err, "Unexpected failure during deployment run");
                emit(report.unexpected(&err));
                Ok(config.continue_on_mabl_error)
            }
        };

        emit(report.completion_banner());
        outcome
    }
}

/// Trigger the deployment and poll until complete.
async fn execute<C, W>(
    client: &C,
    report: &mut Report<W>,
    config: &RunnerConfig,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<(), RunError>
where
    C: ExecutionClient,
    W: Write,
{
    report.start_banner()?;
    report.deployment_requested(&config.environment_id, &config.application_id)?;

    let deployment = client
        .create_deployment_event(&config.environment_id, &config.application_id)
        .await
        .map_err(RunError::api)?;

    info!(
        deployment_id = %deployment.id,
        environment_id = %config.environment_id,
        application_id = %config.application_id,
        "Deployment event created"
    );
    report.deployment_created(&deployment.id)?;

    let mut polls = 0u32;
    let snapshot = loop {
        tokio::select! {
            _ = tokio::time::sleep(config.polling_interval) => {}
            _ = shutdown_requested(shutdown) => {
                return Err(RunError::Cancelled);
            }
        }

        polls += 1;
        let snapshot = client
            .get_execution_results(&deployment.id)
            .await
            .map_err(RunError::api)?
            .ok_or_else(|| RunError::missing_deployment(&deployment.id))?;

        report.status_update(&snapshot)?;

        let complete = snapshot.is_complete();
        debug!(
            deployment_id = %deployment.id,
            polls,
            plans = snapshot.executions.len(),
            pending = snapshot.pending_count(),
            complete,
            "Polled execution results"
        );

        if complete {
            break snapshot;
        }
    };

    info!(deployment_id = %deployment.id, polls, "All plans reached a terminal status");
    report.final_statuses(&snapshot)?;

    if !snapshot.is_successful() {
        return Err(RunError::plan_failure());
    }

    Ok(())
}

/// Resolves once shutdown is signalled. Never resolves if the sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Owns the client for the duration of a run and closes it when dropped.
struct ClientLease<C: ExecutionClient> {
    client: C,
}

impl<C: ExecutionClient> ClientLease<C> {
    fn new(client: C) -> Self {
        Self { client }
    }
}

impl<C: ExecutionClient> Deref for ClientLease<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.client
    }
}

impl<C: ExecutionClient> Drop for ClientLease<C> {
    fn drop(&mut self) {
        self.client.close();
        debug!("Released mabl client");
    }
}

/// Log, but otherwise ignore, a failure to write the closing output.
fn emit(result: io::Result<()>) {
    if let Err(e) = result {
        warn!(error = %e, "Failed to write progress output");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
