//! HTTP handlers for feedback-daemon.

pub mod events;
pub mod reports;
