//! Client connection trait for external services.
//!
//! Provides a unified interface for establishing connections to the cloud
//! services a stockflow pipeline talks to.

/// Trait for establishing connections to external services.
///
/// Implemented by the per-service client wrappers so that connection logic
/// stays with the connector crate while callers share one seam.
pub trait Client {
    /// Error type for connection operations.
    type Error;

    /// Establishes a connection to the external service.
    ///
    /// # Returns
    /// The connected client instance or an error if connection fails
    fn connect(self) -> impl std::future::Future<Output = Result<Self, Self::Error>> + Send
    where
        Self: Sized;
}
