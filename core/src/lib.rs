//! Core building blocks for stockflow pipelines.
//!
//! This crate contains the shared types and traits used by the service
//! connector crates: the event envelope passed between tasks, the runner
//! trait every task implements, and client connection plumbing.

/// Client connection trait for external services.
pub mod client;
/// Event envelope, builder, and logging helpers.
pub mod event;
/// Task execution framework with runner trait and context.
pub mod task {
    /// Task execution context shared across all tasks of a flow.
    pub mod context;
    /// Base runner trait for all task implementations.
    pub mod runner;
}
