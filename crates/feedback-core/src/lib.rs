//! # feedback-core
//!
//! Core types, traits, and the event bus for the feedback daemon.
//!
//! This crate provides the data structures and collaborator traits that the
//! orchestration crate and the daemon binary depend on.

pub mod defaults;
pub mod error;
pub mod events;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use events::{EventActor, EventBus, EventEnvelope, ServerEvent};
pub use models::*;
pub use traits::*;
