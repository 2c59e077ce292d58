//! # feedback-jobs
//!
//! Asynchronous report orchestration for the feedback daemon.
//!
//! This crate provides:
//! - Request id allocation and in-flight tracking with change notifications
//! - Caller identity resolution for loopback connections
//! - Collector invocation with deadlines
//! - Artifact discovery and exactly-once completion events
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use feedback_jobs::{
//!     CallerHandle, CommandInvoker, EventBus, OrchestratorConfig, PeerIdentityResolver,
//!     ReportOrchestrator,
//! };
//!
//! let events = EventBus::default();
//! let orchestrator = ReportOrchestrator::new(
//!     OrchestratorConfig::from_env(),
//!     Arc::new(PeerIdentityResolver::new()),
//!     Arc::new(CommandInvoker::new()),
//!     events.clone(),
//! );
//!
//! let mut rx = events.subscribe();
//! let id = orchestrator
//!     .generate_report(&CallerHandle::new(peer), "dde", false)
//!     .await?;
//!
//! while let Ok(envelope) = rx.recv().await {
//!     println!("Event: {:?}", envelope.payload);
//! }
//! ```

pub mod artifacts;
pub mod catalog;
pub mod distro;
pub mod identity;
pub mod invoker;
pub mod naming;
pub mod orchestrator;
pub mod tracker;

// Re-export core types
pub use feedback_core::*;

pub use artifacts::discover_artifacts;
pub use catalog::CategoryCatalog;
pub use distro::DistroQuery;
pub use identity::{AccountDirectory, PeerIdentityResolver, SystemAccounts};
pub use invoker::CommandInvoker;
pub use naming::output_stem;
pub use orchestrator::{OrchestratorConfig, ReportOrchestrator};
pub use tracker::RequestTracker;
