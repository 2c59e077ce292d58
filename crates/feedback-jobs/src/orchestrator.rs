//! Report orchestration.
//!
//! [`ReportOrchestrator::generate_report`] validates the caller, admits a new
//! request into the [`RequestTracker`] and returns its id immediately. The
//! collector then runs on its own task; when it returns (or fails, times out
//! or panics) the output directory is scanned for the request's artifacts and
//! exactly one `GenerateReportFinished` event is published as the id leaves
//! the working set.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use tokio::sync::watch;
use tracing::{error, info, warn};

use feedback_core::defaults::{
    ARCHIVE_EXTENSION, COLLECTOR_PATH, DISTRO_TIMEOUT_SECS, OUTPUT_PREFIX, PRIVACY_MODE_FLAG,
    REPORT_TIMEOUT_SECS,
};
use feedback_core::{
    CallerHandle, Category, DistroInfo, EventActor, EventBus, IdentityResolver, ReportRequest,
    RequestId, Result, ServerEvent, WorkerInvocation, WorkerInvoker,
};

use crate::artifacts::discover_artifacts;
use crate::catalog::CategoryCatalog;
use crate::distro::DistroQuery;
use crate::naming::output_stem;
use crate::tracker::RequestTracker;

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// External collector executable.
    pub collector_path: PathBuf,
    /// Directory the collector writes into and discovery scans.
    pub output_dir: PathBuf,
    /// First component of every output stem.
    pub output_prefix: String,
    /// Deadline for one report run.
    pub report_timeout: Duration,
    /// Deadline for each distribution query.
    pub distro_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            collector_path: PathBuf::from(COLLECTOR_PATH),
            output_dir: std::env::temp_dir(),
            output_prefix: OUTPUT_PREFIX.to_string(),
            report_timeout: Duration::from_secs(REPORT_TIMEOUT_SECS),
            distro_timeout: Duration::from_secs(DISTRO_TIMEOUT_SECS),
        }
    }
}

impl OrchestratorConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `FEEDBACK_CLI_PATH` | `/usr/bin/deepin-feedback-cli` | Collector executable |
    /// | `FEEDBACK_OUTPUT_DIR` | system temp dir | Artifact directory |
    /// | `FEEDBACK_OUTPUT_PREFIX` | `deepin-feedback` | Output stem prefix |
    /// | `FEEDBACK_REPORT_TIMEOUT_SECS` | `600` | Report run deadline |
    /// | `FEEDBACK_DISTRO_TIMEOUT_SECS` | `10` | Distribution query deadline |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let collector_path = std::env::var("FEEDBACK_CLI_PATH")
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.collector_path);

        let output_dir = std::env::var("FEEDBACK_OUTPUT_DIR")
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.output_dir);

        let output_prefix = std::env::var("FEEDBACK_OUTPUT_PREFIX")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.output_prefix);

        let report_timeout = std::env::var("FEEDBACK_REPORT_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.report_timeout);

        let distro_timeout = std::env::var("FEEDBACK_DISTRO_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.distro_timeout);

        Self {
            collector_path,
            output_dir,
            output_prefix,
            report_timeout,
            distro_timeout,
        }
    }

    pub fn with_collector_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.collector_path = path.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_output_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.output_prefix = prefix.into();
        self
    }

    pub fn with_report_timeout(mut self, timeout: Duration) -> Self {
        self.report_timeout = timeout;
        self
    }

    pub fn with_distro_timeout(mut self, timeout: Duration) -> Self {
        self.distro_timeout = timeout;
        self
    }
}

/// Accepts report requests and drives them to completion.
pub struct ReportOrchestrator {
    config: OrchestratorConfig,
    identity: Arc<dyn IdentityResolver>,
    invoker: Arc<dyn WorkerInvoker>,
    catalog: CategoryCatalog,
    tracker: Arc<RequestTracker>,
    distro: DistroQuery,
    /// Accepted callers that have not been admitted yet.
    pending: watch::Sender<usize>,
}

impl ReportOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        identity: Arc<dyn IdentityResolver>,
        invoker: Arc<dyn WorkerInvoker>,
        events: EventBus,
    ) -> Self {
        let distro = DistroQuery::new(
            invoker.clone(),
            config.collector_path.clone(),
            config.distro_timeout,
        );
        Self {
            config,
            identity,
            invoker,
            catalog: CategoryCatalog::builtin(),
            tracker: Arc::new(RequestTracker::new(events)),
            distro,
            pending: watch::channel(0).0,
        }
    }

    /// Replace the builtin category catalog.
    pub fn with_catalog(mut self, catalog: CategoryCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn tracker(&self) -> &Arc<RequestTracker> {
        &self.tracker
    }

    pub fn events(&self) -> &EventBus {
        self.tracker.events()
    }

    /// Start generating a report for `caller`.
    ///
    /// Only identity resolution can fail. Once an id is returned the request
    /// is in the working set and will leave it exactly once, with a
    /// `GenerateReportFinished` event, whatever the collector does.
    pub async fn generate_report(
        &self,
        caller: &CallerHandle,
        category: &str,
        allow_privacy: bool,
    ) -> Result<RequestId> {
        let username = match self.identity.resolve(caller) {
            Ok(username) => username,
            Err(e) => {
                warn!(caller = %caller, category, error = %e, "Rejecting report request");
                return Err(e);
            }
        };
        let pending = PendingCall::enter(&self.pending);

        if !self.catalog.contains(category) {
            warn!(category, "Category not in catalog, passing it to the collector as is");
        }

        let distro = self.distro.fetch().await;
        let created_at = Local::now();
        let stem = output_stem(
            &self.config.output_prefix,
            &distro,
            category,
            created_at.naive_local(),
        );
        let output_path = self
            .config
            .output_dir
            .join(format!("{}{}", stem, ARCHIVE_EXTENSION));

        let id = self.tracker.admit();
        drop(pending);
        let guard = CompletionGuard::new(self.tracker.clone(), id, username.clone());

        let request = ReportRequest {
            id,
            username,
            category: category.to_string(),
            allow_privacy,
            stem,
            output_path,
            created_at,
        };
        let invocation = self.invocation_for(&request);

        info!(
            request_id = %id,
            username = %request.username,
            category,
            allow_privacy,
            command = %invocation,
            "Report generation started"
        );

        tokio::spawn(run_report(
            self.invoker.clone(),
            self.config.output_dir.clone(),
            request,
            invocation,
            guard,
        ));

        Ok(id)
    }

    /// Distribution name and release, empty when the query fails.
    pub async fn distro_info(&self) -> DistroInfo {
        self.distro.fetch().await
    }

    pub fn categories(&self) -> Arc<[Category]> {
        self.catalog.list()
    }

    /// Ids currently in flight, ascending.
    pub fn working_set(&self) -> Vec<RequestId> {
        self.tracker.snapshot()
    }

    /// Whether any request is in flight.
    pub fn is_in_working(&self) -> bool {
        !self.tracker.is_empty()
    }

    /// In flight, or accepted and still waiting for its id.
    pub fn is_busy(&self) -> bool {
        *self.pending.borrow() > 0 || self.is_in_working()
    }

    /// Count of accepted callers not yet admitted to the working set.
    /// Changes whenever a call is accepted, admitted or abandoned.
    pub fn pending_requests(&self) -> watch::Receiver<usize> {
        self.pending.subscribe()
    }

    fn invocation_for(&self, request: &ReportRequest) -> WorkerInvocation {
        let invocation = WorkerInvocation::new(&self.config.collector_path, self.config.report_timeout)
            .args(["--username", request.username.as_str()])
            .arg("--output")
            .arg(request.output_path.to_string_lossy())
            .arg(request.category.as_str());
        if request.allow_privacy {
            invocation
        } else {
            invocation.arg(PRIVACY_MODE_FLAG)
        }
    }
}

async fn run_report(
    invoker: Arc<dyn WorkerInvoker>,
    output_dir: PathBuf,
    request: ReportRequest,
    invocation: WorkerInvocation,
    guard: CompletionGuard,
) {
    let start = Instant::now();

    let succeeded = match invoker.run(&invocation).await {
        Ok(_) => true,
        Err(e) => {
            warn!(request_id = %request.id, category = %request.category, error = %e, "Collector failed");
            false
        }
    };

    let files = match discover_artifacts(&output_dir, &request.stem) {
        Ok(files) => files,
        Err(e) => {
            warn!(request_id = %request.id, error = %e, "Artifact discovery failed");
            Vec::new()
        }
    };

    info!(
        request_id = %request.id,
        username = %request.username,
        category = %request.category,
        succeeded,
        artifact_count = files.len(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Report generation finished"
    );

    guard.finish(files);
}

/// Counts a call from identity success until admission. Dropping the
/// `generate_report` future early releases the count as well.
struct PendingCall<'a>(&'a watch::Sender<usize>);

impl<'a> PendingCall<'a> {
    fn enter(counter: &'a watch::Sender<usize>) -> Self {
        counter.send_modify(|n| *n += 1);
        Self(counter)
    }
}

impl Drop for PendingCall<'_> {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n = n.saturating_sub(1));
    }
}

/// Retires a request exactly once.
///
/// Created before the report task is spawned. If the task ends without
/// calling [`CompletionGuard::finish`] (panic, runtime shutdown) the drop
/// retires the request with no artifacts.
struct CompletionGuard {
    tracker: Arc<RequestTracker>,
    id: RequestId,
    username: String,
    armed: bool,
}

impl CompletionGuard {
    fn new(tracker: Arc<RequestTracker>, id: RequestId, username: String) -> Self {
        Self {
            tracker,
            id,
            username,
            armed: true,
        }
    }

    fn finish(mut self, files: Vec<PathBuf>) {
        self.armed = false;
        self.retire(files);
    }

    fn retire(&self, files: Vec<PathBuf>) {
        let completion = ServerEvent::GenerateReportFinished {
            request_id: self.id,
            files,
        };
        self.tracker
            .retire(self.id, completion, EventActor::user(self.username.clone()));
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if self.armed {
            error!(request_id = %self.id, "Report task ended abnormally, retiring request");
            self.armed = false;
            self.retire(Vec::new());
        }
    }
}
