//! S3 connector tasks for stockflow pipelines.
//!
//! Provides the object fetch task that downloads a JSON document from a
//! bucket, plus S3 client construction.

/// S3 client construction.
pub mod client;
/// Configuration structures for S3 tasks.
pub mod config;
/// Object fetch task.
pub mod fetch;
