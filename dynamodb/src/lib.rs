//! DynamoDB connector tasks for stockflow pipelines.
//!
//! Provides the table listing, batch write, and conditional query tasks,
//! plus the tagged attribute-value conversions they share.

/// Tagged attribute values and batch-write payload conversions.
pub mod attr;
/// DynamoDB client construction.
pub mod client;
/// Configuration structures for DynamoDB tasks.
pub mod config;
/// Table listing source task.
pub mod list;
/// Conditional query task.
pub mod query;
/// Batch write task.
pub mod write;
