//! Collector process execution.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use feedback_core::{Error, Result, WorkerInvocation, WorkerInvoker, WorkerOutput};

/// Runs collector invocations as child processes.
///
/// The child is killed if the deadline passes or the awaiting task is dropped.
#[derive(Debug, Clone, Default)]
pub struct CommandInvoker;

impl CommandInvoker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl WorkerInvoker for CommandInvoker {
    async fn run(&self, invocation: &WorkerInvocation) -> Result<WorkerOutput> {
        debug!(command = %invocation, timeout_secs = invocation.timeout.as_secs(), "Spawning collector");

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(invocation.timeout, cmd.output())
            .await
            .map_err(|_| {
                warn!(command = %invocation, "Collector timed out");
                Error::WorkerInvocationFailed(format!(
                    "{} timed out after {}s",
                    invocation.program.display(),
                    invocation.timeout.as_secs_f64()
                ))
            })?
            .map_err(|e| {
                Error::WorkerInvocationFailed(format!(
                    "failed to execute {}: {}",
                    invocation.program.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::WorkerInvocationFailed(format!(
                "{} failed ({}): {}",
                invocation.program.display(),
                output.status,
                stderr.trim()
            )));
        }

        Ok(WorkerOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
