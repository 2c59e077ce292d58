//! Distribution query.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use feedback_core::defaults::{DISTRO_NAME_FLAG, DISTRO_RELEASE_FLAG};
use feedback_core::{DistroInfo, WorkerInvocation, WorkerInvoker};

/// Asks the collector for the distribution name and release.
#[derive(Clone)]
pub struct DistroQuery {
    invoker: Arc<dyn WorkerInvoker>,
    collector: PathBuf,
    timeout: Duration,
}

impl DistroQuery {
    pub fn new(invoker: Arc<dyn WorkerInvoker>, collector: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            invoker,
            collector: collector.into(),
            timeout,
        }
    }

    /// Query both fields. A field whose query fails is left empty.
    pub async fn fetch(&self) -> DistroInfo {
        DistroInfo {
            distro_name: self.query(DISTRO_NAME_FLAG).await,
            distro_release: self.query(DISTRO_RELEASE_FLAG).await,
        }
    }

    async fn query(&self, flag: &str) -> String {
        let invocation = WorkerInvocation::new(&self.collector, self.timeout).arg(flag);
        match self.invoker.run(&invocation).await {
            Ok(output) => output.stdout.trim().to_string(),
            Err(e) => {
                warn!(flag, error = %e, "Distribution query failed");
                String::new()
            }
        }
    }
}
