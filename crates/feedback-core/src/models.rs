//! Domain models for report requests.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

// =============================================================================
// REQUEST IDENTIFIERS
// =============================================================================

/// Process-unique, monotonically increasing report request identifier.
///
/// Issued by the request tracker, never reused within a process lifetime and
/// never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl RequestId {
    /// Raw numeric value (wire representation).
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RequestId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

// =============================================================================
// CATEGORIES
// =============================================================================

/// A kind of diagnostic report the collector knows how to produce.
///
/// Serialized with the field names front-ends already consume
/// (`Value`, `BugzillaProject`, `Name`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Token passed to the collector (e.g. `"dde"`).
    #[serde(rename = "Value")]
    pub value: String,
    /// Bug-tracker product the report is filed under.
    #[serde(rename = "BugzillaProject")]
    pub project: String,
    /// Human readable label.
    #[serde(rename = "Name")]
    pub name: String,
}

impl Category {
    pub fn new(value: &str, project: &str, name: &str) -> Self {
        Self {
            value: value.to_string(),
            project: project.to_string(),
            name: name.to_string(),
        }
    }
}

// =============================================================================
// CALLERS
// =============================================================================

/// Transport-level description of the connection that issued a call.
///
/// Opaque to the orchestrator: only an [`crate::IdentityResolver`] interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerHandle {
    /// Remote end of the connection.
    pub peer: SocketAddr,
    /// Local (server) end of the connection, when known.
    pub local: Option<SocketAddr>,
}

impl CallerHandle {
    pub fn new(peer: SocketAddr) -> Self {
        Self { peer, local: None }
    }

    pub fn with_local(mut self, local: SocketAddr) -> Self {
        self.local = Some(local);
        self
    }
}

impl fmt::Display for CallerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.peer)
    }
}

// =============================================================================
// DISTRIBUTION
// =============================================================================

/// Distribution name and release as reported by the collector.
///
/// Both fields are empty when the query failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistroInfo {
    pub distro_name: String,
    pub distro_release: String,
}

// =============================================================================
// REPORT REQUESTS
// =============================================================================

/// One accepted report request. Lives only for the duration of its task.
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub id: RequestId,
    pub username: String,
    pub category: String,
    pub allow_privacy: bool,
    /// File-name prefix correlating collector output with this request.
    pub stem: String,
    /// Path handed to the collector via `--output`.
    pub output_path: PathBuf,
    pub created_at: DateTime<Local>,
}

/// A fully specified collector invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerInvocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl WorkerInvocation {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for WorkerInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured output of a successful collector run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerOutput {
    pub stdout: String,
    pub stderr: String,
}
