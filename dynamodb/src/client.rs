//! DynamoDB client construction.

use aws_config::{BehaviorVersion, Region};

/// Region used when no override is configured.
pub const DEFAULT_REGION: &str = "us-east-1";

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("Client is not connected, call connect() first")]
    NotConnected,
}

/// DynamoDB service client wrapper holding connection settings.
///
/// Credentials resolve through the SDK's standard provider chain; only the
/// region and an optional endpoint override are configured here.
pub struct Client {
    region: String,
    endpoint_url: Option<String>,
    inner: Option<aws_sdk_dynamodb::Client>,
}

impl Client {
    /// Returns the connected SDK client.
    pub fn into_inner(self) -> Result<aws_sdk_dynamodb::Client, Error> {
        self.inner.ok_or(Error::NotConnected)
    }
}

impl stockflow_core::client::Client for Client {
    type Error = Error;

    async fn connect(mut self) -> Result<Self, Error> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.region.clone()));
        if let Some(endpoint_url) = &self.endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }
        let shared_config = loader.load().await;
        self.inner = Some(aws_sdk_dynamodb::Client::new(&shared_config));
        Ok(self)
    }
}

/// Builder for DynamoDB client wrappers.
#[derive(Default)]
pub struct ClientBuilder {
    region: Option<String>,
    endpoint_url: Option<String>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the region, overriding the built-in default.
    pub fn region(mut self, region: String) -> Self {
        self.region = Some(region);
        self
    }

    /// Sets a custom endpoint, e.g. a local DynamoDB stand-in.
    pub fn endpoint_url(mut self, endpoint_url: String) -> Self {
        self.endpoint_url = Some(endpoint_url);
        self
    }

    pub fn build(self) -> Client {
        Client {
            region: self.region.unwrap_or_else(|| DEFAULT_REGION.to_string()),
            endpoint_url: self.endpoint_url,
            inner: None,
        }
    }
}
