//! Collaborator traits for the report orchestrator.
//!
//! These traits define the boundaries to the outside world (who is calling,
//! how the collector is run) so the orchestrator can be exercised with
//! in-process implementations.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{CallerHandle, WorkerInvocation, WorkerOutput};

// =============================================================================
// IDENTITY
// =============================================================================

/// Maps a caller's connection to a local account name.
///
/// Resolution is synchronous, has no side effects and is never retried.
pub trait IdentityResolver: Send + Sync {
    /// Resolve the caller to a local account name.
    ///
    /// Fails with [`crate::Error::IdentityUnavailable`] when the identity
    /// authority cannot be consulted and [`crate::Error::IdentityLookupFailed`]
    /// when the numeric identity has no local account.
    fn resolve(&self, caller: &CallerHandle) -> Result<String>;
}

// =============================================================================
// COLLECTOR
// =============================================================================

/// Runs the external collector to completion or deadline.
#[async_trait]
pub trait WorkerInvoker: Send + Sync {
    /// Run `invocation`, waiting at most `invocation.timeout`.
    ///
    /// Returns the captured output when the process exits successfully.
    /// Launch failure, timeout and unsuccessful exit all map to
    /// [`crate::Error::WorkerInvocationFailed`].
    async fn run(&self, invocation: &WorkerInvocation) -> Result<WorkerOutput>;
}
