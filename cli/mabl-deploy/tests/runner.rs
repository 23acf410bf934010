//! Deployment runner scenarios against a scripted execution client.
//!
//! Time is paused in every test, so poll intervals elapse instantly while the
//! order of sleeps and polls is preserved.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mabl_api::{
    ClientError, DeploymentHandle, ExecutionClient, ExecutionSnapshot, JourneyExecution,
    PlanExecution, PlanSummary,
};
use mabl_deploy::{Cancelled, DeploymentRunner, RunnerConfig};
use rstest::rstest;
use tokio::sync::watch;

const INTERVAL: Duration = Duration::from_secs(10);

/// What the client returns for one `get_execution_results` call.
enum Poll {
    Snapshot(ExecutionSnapshot),
    Absent,
    Fail(ClientError),
    Panic,
}

#[derive(Debug, Default, Clone, Copy)]
struct Calls {
    creates: usize,
    polls: usize,
    closes: usize,
    after_close: usize,
}

struct ScriptedClient {
    trigger: Mutex<Option<Result<DeploymentHandle, ClientError>>>,
    script: Mutex<VecDeque<Poll>>,
    calls: Arc<Mutex<Calls>>,
}

impl ScriptedClient {
    fn new(trigger: Result<DeploymentHandle, ClientError>, script: Vec<Poll>) -> Self {
        Self {
            trigger: Mutex::new(Some(trigger)),
            script: Mutex::new(script.into()),
            calls: Arc::new(Mutex::new(Calls::default())),
        }
    }

    fn deploying(script: Vec<Poll>) -> Self {
        Self::new(
            Ok(DeploymentHandle {
                id: "dep-1".to_string(),
            }),
            script,
        )
    }

    fn calls(&self) -> Arc<Mutex<Calls>> {
        Arc::clone(&self.calls)
    }

    fn record(&self, f: impl FnOnce(&mut Calls)) {
        let mut calls = self.calls.lock().unwrap();
        if calls.closes > 0 {
            calls.after_close += 1;
        }
        f(&mut calls);
    }
}

#[async_trait]
impl ExecutionClient for ScriptedClient {
    async fn create_deployment_event(
        &self,
        environment_id: &str,
        application_id: &str,
    ) -> Result<DeploymentHandle, ClientError> {
        assert_eq!(environment_id, "env-1");
        assert_eq!(application_id, "app-1");
        self.record(|c| c.creates += 1);
        self.trigger
            .lock()
            .unwrap()
            .take()
            .expect("deployment triggered twice")
    }

    async fn get_execution_results(
        &self,
        deployment_id: &str,
    ) -> Result<Option<ExecutionSnapshot>, ClientError> {
        assert_eq!(deployment_id, "dep-1");
        self.record(|c| c.polls += 1);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Poll::Snapshot(snapshot)) => Ok(Some(snapshot)),
            Some(Poll::Absent) => Ok(None),
            Some(Poll::Fail(err)) => Err(err),
            Some(Poll::Panic) => panic!("boom"),
            None => Ok(Some(snapshot(&[("Smoke", "running", false)]))),
        }
    }

    fn close(&mut self) {
        self.calls.lock().unwrap().closes += 1;
    }
}

/// Cloneable in-memory sink.
#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn plan(name: Option<&str>, status: &str, success: bool) -> PlanExecution {
    PlanExecution {
        status: status.to_string(),
        success,
        plan: name.map(|n| PlanSummary {
            id: Some(format!("plan-{}", n.to_lowercase())),
            name: Some(n.to_string()),
        }),
        journey_executions: vec![JourneyExecution {
            id: format!("journey-{}", name.unwrap_or("x").to_lowercase()),
            status: status.to_string(),
        }],
    }
}

fn snapshot(plans: &[(&str, &str, bool)]) -> ExecutionSnapshot {
    ExecutionSnapshot {
        executions: plans
            .iter()
            .map(|(name, status, success)| plan(Some(*name), status, *success))
            .collect(),
    }
}

fn config(continue_on_plan_failure: bool, continue_on_mabl_error: bool) -> RunnerConfig {
    RunnerConfig {
        polling_interval: INTERVAL,
        environment_id: "env-1".to_string(),
        application_id: "app-1".to_string(),
        continue_on_plan_failure,
        continue_on_mabl_error,
    }
}

fn assert_released_once(calls: &Arc<Mutex<Calls>>) {
    let calls = *calls.lock().unwrap();
    assert_eq!(calls.closes, 1, "client must be closed exactly once: {calls:?}");
    assert_eq!(calls.after_close, 0, "client used after close: {calls:?}");
}

#[tokio::test(start_paused = true)]
async fn polls_until_every_plan_succeeds() {
    let client = ScriptedClient::deploying(vec![
        Poll::Snapshot(snapshot(&[
            ("Smoke", "running", false),
            ("Regression", "running", false),
        ])),
        Poll::Snapshot(snapshot(&[
            ("Smoke", "succeeded", true),
            ("Regression", "succeeded", true),
        ])),
    ]);
    let calls = client.calls();
    let out = SharedBuffer::default();
    let started = tokio::time::Instant::now();

    let runner = DeploymentRunner::new(client, out.clone(), config(false, false));
    assert!(runner.run().await);

    assert!(started.elapsed() >= INTERVAL * 2);
    let c = *calls.lock().unwrap();
    assert_eq!(c.creates, 1);
    assert_eq!(c.polls, 2);
    assert_released_once(&calls);

    let expected = "\nmabl Jenkins plugging running...\n\
        mabl is creating a deployment event:\n\
        \x20 environment_id: env-1\n\
        \x20 application_id: app-1\n\
        Deployment event was created with id [dep-1] in mabl.\n\
        Running mabl journey(s) status update:\n\
        \x20 Plan [Smoke] is [running]\n\
        \x20 Journey [journey-smoke] is [running]\n\
        \x20 Plan [Regression] is [running]\n\
        \x20 Journey [journey-regression] is [running]\n\
        Running mabl journey(s) status update:\n\
        \x20 Plan [Smoke] is [succeeded]\n\
        \x20 Journey [journey-smoke] is [succeeded]\n\
        \x20 Plan [Regression] is [succeeded]\n\
        \x20 Journey [journey-regression] is [succeeded]\n\
        The Final Plan states in mabl:\n\
        \x20 Plan [Smoke] is SUCCESSFUL in state [succeeded]\n\
        \x20 Plan [Regression] is SUCCESSFUL in state [succeeded]\n\
        mabl journey execution step complete.\n\n";
    assert_eq!(out.contents(), expected);
}

#[rstest]
#[case(false)]
#[case(true)]
#[tokio::test(start_paused = true)]
async fn failed_plan_follows_plan_failure_flag(#[case] continue_on_plan_failure: bool) {
    let client = ScriptedClient::deploying(vec![Poll::Snapshot(snapshot(&[(
        "Checkout",
        "failed",
        false,
    )]))]);
    let calls = client.calls();
    let out = SharedBuffer::default();

    // The mabl error flag is set to the opposite value to show it is not consulted.
    let runner = DeploymentRunner::new(
        client,
        out.clone(),
        config(continue_on_plan_failure, !continue_on_plan_failure),
    );
    assert_eq!(runner.run().await, continue_on_plan_failure);

    assert_eq!(calls.lock().unwrap().polls, 1);
    assert_released_once(&calls);

    let output = out.contents();
    assert!(output.contains("  Plan [Checkout] is FAILED in state [failed]\n"));
    assert!(output.contains("One or more plans were unsuccessful running in mabl.\n"));
    assert!(output.ends_with("mabl journey execution step complete.\n\n"));
}

#[rstest]
#[case(false)]
#[case(true)]
#[tokio::test(start_paused = true)]
async fn absent_snapshot_is_system_error(#[case] continue_on_mabl_error: bool) {
    let client = ScriptedClient::deploying(vec![Poll::Absent]);
    let calls = client.calls();
    let out = SharedBuffer::default();

    let runner = DeploymentRunner::new(
        client,
        out.clone(),
        config(!continue_on_mabl_error, continue_on_mabl_error),
    );
    assert_eq!(runner.run().await, continue_on_mabl_error);

    assert_released_once(&calls);
    let output = out.contents();
    assert!(output.contains("Oh snap! No deployment event found for id [dep-1] in mabl.\n"));
    assert!(!output.contains("Caused by"));
    assert!(!output.contains("The Final Plan states in mabl:"));
}

#[rstest]
#[case(false)]
#[case(true)]
#[tokio::test(start_paused = true)]
async fn trigger_failure_skips_polling(#[case] continue_on_mabl_error: bool) {
    let client = ScriptedClient::new(
        Err(ClientError::Api {
            status: 503,
            body: "down".to_string(),
        }),
        vec![],
    );
    let calls = client.calls();
    let out = SharedBuffer::default();
    let started = tokio::time::Instant::now();

    let runner = DeploymentRunner::new(client, out.clone(), config(false, continue_on_mabl_error));
    assert_eq!(runner.run().await, continue_on_mabl_error);

    assert_eq!(started.elapsed(), Duration::ZERO);
    let c = *calls.lock().unwrap();
    assert_eq!(c.creates, 1);
    assert_eq!(c.polls, 0);
    assert_released_once(&calls);

    let output = out.contents();
    assert!(!output.contains("Deployment event was created"));
    assert!(output.contains(
        "Oh no!. There was an API error trying to run journeys in mabl.\n\
         Caused by: API error: HTTP 503: down\n"
    ));
    assert!(output.ends_with("mabl journey execution step complete.\n\n"));
}

#[tokio::test(start_paused = true)]
async fn poll_failure_stops_without_retry() {
    let client = ScriptedClient::deploying(vec![
        Poll::Snapshot(snapshot(&[("Smoke", "running", false)])),
        Poll::Fail(ClientError::Unauthorized { status: 401 }),
        Poll::Snapshot(snapshot(&[("Smoke", "succeeded", true)])),
    ]);
    let calls = client.calls();
    let out = SharedBuffer::default();

    let runner = DeploymentRunner::new(client, out.clone(), config(true, false));
    assert!(!runner.run().await);

    assert_eq!(calls.lock().unwrap().polls, 2);
    assert_released_once(&calls);
    assert!(out.contents().contains("Caused by: Not authorized (HTTP 401)"));
}

#[tokio::test(start_paused = true)]
async fn unrecognized_status_keeps_polling() {
    let client = ScriptedClient::deploying(vec![
        Poll::Snapshot(snapshot(&[("Smoke", "paused", false)])),
        Poll::Snapshot(snapshot(&[("Smoke", "COMPLETED", true)])),
    ]);
    let calls = client.calls();

    let runner = DeploymentRunner::new(client, SharedBuffer::default(), config(false, false));
    assert!(runner.run().await);
    assert_eq!(calls.lock().unwrap().polls, 2);
    assert_released_once(&calls);
}

#[tokio::test(start_paused = true)]
async fn missing_plan_names_use_placeholder() {
    let unnamed = ExecutionSnapshot {
        executions: vec![
            plan(None, "succeeded", true),
            PlanExecution {
                status: "succeeded".to_string(),
                success: true,
                plan: Some(PlanSummary {
                    id: Some("p-2".to_string()),
                    name: None,
                }),
                journey_executions: vec![],
            },
        ],
    };
    let client = ScriptedClient::deploying(vec![Poll::Snapshot(unnamed)]);
    let out = SharedBuffer::default();

    let runner = DeploymentRunner::new(client, out.clone(), config(false, false));
    assert!(runner.run().await);

    let output = out.contents();
    assert_eq!(output.matches("  Plan [<Unknown Plan>] is [succeeded]\n").count(), 2);
    assert_eq!(
        output
            .matches("  Plan [<Unknown Plan>] is SUCCESSFUL in state [succeeded]\n")
            .count(),
        2
    );
}

#[rstest]
#[case(false)]
#[case(true)]
#[tokio::test(start_paused = true)]
async fn panic_is_unexpected_fault(#[case] continue_on_mabl_error: bool) {
    let client = ScriptedClient::deploying(vec![Poll::Panic]);
    let calls = client.calls();
    let out = SharedBuffer::default();

    let runner = DeploymentRunner::new(client, out.clone(), config(false, continue_on_mabl_error));
    assert_eq!(runner.run().await, continue_on_mabl_error);

    assert_released_once(&calls);
    let output = out.contents();
    assert!(output.contains("Unexpected mabl exception\n"));
    assert!(output.contains("boom"));
    assert!(output.ends_with("mabl journey execution step complete.\n\n"));
}

#[tokio::test(start_paused = true)]
async fn shutdown_during_sleep_cancels_run() {
    let client = ScriptedClient::deploying(vec![]);
    let calls = client.calls();
    let out = SharedBuffer::default();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        tokio::time::sleep(INTERVAL + INTERVAL / 2).await;
        let _ = shutdown_tx.send(true);
    });

    let runner = DeploymentRunner::new(client, out.clone(), config(true, true));
    assert_eq!(runner.run_until(shutdown_rx).await, Err(Cancelled));

    assert_eq!(calls.lock().unwrap().polls, 1);
    assert_released_once(&calls);

    let output = out.contents();
    assert!(output.contains("interrupted before all plans completed"));
    assert!(!output.contains("The Final Plan states in mabl:"));
    assert!(output.ends_with("mabl journey execution step complete.\n\n"));
}

#[tokio::test(start_paused = true)]
async fn dropping_the_run_releases_client() {
    let client = ScriptedClient::deploying(vec![]);
    let calls = client.calls();

    let runner = DeploymentRunner::new(client, SharedBuffer::default(), config(false, false));
    let timed_out = tokio::time::timeout(INTERVAL * 3 + INTERVAL / 2, runner.run()).await;

    assert!(timed_out.is_err());
    assert_eq!(calls.lock().unwrap().polls, 3);
    assert_released_once(&calls);
}
