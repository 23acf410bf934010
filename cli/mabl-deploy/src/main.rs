//! mabl-deploy - run mabl journeys as a pipeline step.
//!
//! Exit codes: 0 when the run passes (or its failure is tolerated), 1 when it
//! fails or times out, 2 on invalid configuration, 130 when interrupted.

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use mabl_api::RestApiClient;
use mabl_deploy::config::Cli;
use mabl_deploy::error::print_error;
use mabl_deploy::{logging, Cancelled, DeploymentRunner};

const EXIT_FAILURE: i32 = 1;
const EXIT_CONFIG: i32 = 2;
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_format);

    if let Err(e) = cli.validate() {
        print_error(&e.into());
        std::process::exit(EXIT_CONFIG);
    }

    match run(cli).await {
        Ok(0) => Ok(()),
        Ok(code) => std::process::exit(code),
        Err(e) => {
            print_error(&e);
            std::process::exit(EXIT_FAILURE);
        }
    }
}

/// Run the deployment step under the configured deadline and Ctrl+C.
async fn run(cli: Cli) -> Result<i32> {
    let client =
        RestApiClient::new(&cli.api_config()).context("Failed to create mabl API client")?;
    let timeout = cli.timeout();
    let runner = DeploymentRunner::new(client, std::io::stdout(), cli.runner_config());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            let _ = shutdown_tx.send(true);
        }
    });

    match tokio::time::timeout(timeout, runner.run_until(shutdown_rx)).await {
        Ok(Ok(true)) => Ok(0),
        Ok(Ok(false)) => Ok(EXIT_FAILURE),
        Ok(Err(Cancelled)) => Ok(EXIT_INTERRUPTED),
        Err(_) => {
            error!(timeout_secs = timeout.as_secs(), "Deployment step timed out");
            println!(
                "mabl deployment step timed out after {} seconds.",
                timeout.as_secs()
            );
            Ok(EXIT_FAILURE)
        }
    }
}
