//! Base trait for all task execution implementations.
//!
//! Defines the common interface that every stockflow task type implements to
//! participate in a pipeline.

/// Trait for executing pipeline tasks asynchronously.
///
/// All task implementations (sources, processors, sinks) implement this trait
/// to provide a standardized execution interface for the runtime.
pub trait Runner {
    /// Error type for task execution failures.
    type Error;

    /// Executes the task until completion or error.
    ///
    /// # Returns
    /// Success or an error if the task execution fails
    fn run(self) -> impl std::future::Future<Output = Result<(), Self::Error>> + Send
    where
        Self: Sized;
}
