//! Progress output for the pipeline log.
//!
//! Line formats here are read by people scanning CI logs and by log scrapers,
//! so they are kept stable. Every block is flushed as soon as it is written.

use std::io::{self, Write};

use mabl_api::ExecutionSnapshot;

/// Writes run progress to a text sink.
pub struct Report<W: Write> {
    out: W,
}

impl<W: Write> Report<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Recover the underlying sink.
    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn start_banner(&mut self) -> io::Result<()> {
        write!(self.out, "\nmabl Jenkins plugging running...\n")?;
        self.out.flush()
    }

    pub fn deployment_requested(
        &mut self,
        environment_id: &str,
        application_id: &str,
    ) -> io::Result<()> {
        writeln!(self.out, "mabl is creating a deployment event:")?;
        writeln!(self.out, "  environment_id: {}", environment_id)?;
        writeln!(self.out, "  application_id: {}", application_id)?;
        self.out.flush()
    }

    pub fn deployment_created(&mut self, deployment_id: &str) -> io::Result<()> {
        writeln!(
            self.out,
            "Deployment event was created with id [{}] in mabl.",
            deployment_id
        )?;
        self.out.flush()
    }

    /// Current status of every plan and journey.
    pub fn status_update(&mut self, snapshot: &ExecutionSnapshot) -> io::Result<()> {
        writeln!(self.out, "Running mabl journey(s) status update:")?;
        for plan in &snapshot.executions {
            writeln!(self.out, "  Plan [{}] is [{}]", plan.plan_name(), plan.status)?;
            for journey in &plan.journey_executions {
                writeln!(self.out, "  Journey [{}] is [{}]", journey.id, journey.status)?;
            }
        }
        self.out.flush()
    }

    /// Outcome of every plan once the deployment is complete.
    pub fn final_statuses(&mut self, snapshot: &ExecutionSnapshot) -> io::Result<()> {
        writeln!(self.out, "The Final Plan states in mabl:")?;
        for plan in &snapshot.executions {
            let outcome = if plan.success { "SUCCESSFUL" } else { "FAILED" };
            writeln!(
                self.out,
                "  Plan [{}] is {} in state [{}]",
                plan.plan_name(),
                outcome,
                plan.status
            )?;
        }
        self.out.flush()
    }

    /// An error's message followed by each underlying cause.
    pub fn failure(&mut self, err: &(dyn std::error::Error + 'static)) -> io::Result<()> {
        writeln!(self.out, "{}", err)?;
        let mut cause = err.source();
        while let Some(inner) = cause {
            writeln!(self.out, "Caused by: {}", inner)?;
            cause = inner.source();
        }
        self.out.flush()
    }

    pub fn unexpected(&mut self, err: &anyhow::Error) -> io::Result<()> {
        writeln!(self.out, "Unexpected mabl exception")?;
        writeln!(self.out, "{:?}", err)?;
        self.out.flush()
    }

    pub fn cancelled(&mut self) -> io::Result<()> {
        writeln!(
            self.out,
            "mabl journey execution was interrupted before all plans completed."
        )?;
        self.out.flush()
    }

    pub fn completion_banner(&mut self) -> io::Result<()> {
        write!(self.out, "mabl journey execution step complete.\n\n")?;
        self.out.flush()
    }
}
