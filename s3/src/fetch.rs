use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use serde_json::Value;
use std::sync::Arc;
use stockflow_core::event::{self, Event, EventBuilder, EventData, EventExt};
use stockflow_core::task::runner::Runner;
use tokio::sync::mpsc::{Receiver, Sender};
use tracing::error;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("Fetching object failed: {source}")]
    GetObject {
        #[source]
        source: SdkError<GetObjectError>,
    },
    #[error("Reading object body failed: {source}")]
    ReadBody {
        #[source]
        source: aws_smithy_types::byte_stream::error::Error,
    },
    #[error("Object body is not valid UTF-8: {source}")]
    Utf8 {
        #[source]
        source: std::str::Utf8Error,
    },
    #[error("Object body is not valid JSON: {source}")]
    SerdeJson {
        #[source]
        source: serde_json::Error,
    },
    #[error("Sending event to channel failed: {source}")]
    SendMessage {
        #[source]
        source: stockflow_core::event::Error,
    },
    #[error("Event builder failed with error: {source}")]
    EventBuilder {
        #[source]
        source: stockflow_core::event::Error,
    },
    #[error("Missing required builder attribute: {}", _0)]
    MissingBuilderAttribute(String),
}

/// Downloads the configured object and parses it as UTF-8 JSON.
pub struct EventHandler {
    /// Fetch configuration settings.
    config: Arc<super::config::FetchObject>,
    /// S3 client for the fetch call.
    client: aws_sdk_s3::Client,
    /// Channel sender for the parsed document event.
    tx: Option<Sender<Event>>,
    /// Current task identifier.
    task_id: usize,
    /// Task type for event categorization and logging.
    task_type: &'static str,
}

impl EventHandler {
    /// Fetches the object and returns its body parsed as JSON.
    async fn fetch_object(&self) -> Result<Value, Error> {
        let output = self
            .client
            .get_object()
            .bucket(&self.config.bucket)
            .key(&self.config.key)
            .send()
            .await
            .map_err(|source| Error::GetObject { source })?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|source| Error::ReadBody { source })?
            .into_bytes();

        let text = std::str::from_utf8(&bytes).map_err(|source| Error::Utf8 { source })?;
        serde_json::from_str(text).map_err(|source| Error::SerdeJson { source })
    }

    /// Processes a trigger event by emitting the fetched document downstream.
    async fn handle(&self, _event: Event) -> Result<(), Error> {
        let document = self.fetch_object().await?;

        let e = EventBuilder::new()
            .subject(self.config.name.to_owned())
            .data(EventData::Json(document))
            .task_id(self.task_id)
            .task_type(self.task_type)
            .build()
            .map_err(|source| Error::EventBuilder { source })?;

        e.send_with_logging(self.tx.as_ref())
            .context("bucket", &self.config.bucket)
            .context("key", &self.config.key)
            .await
            .map_err(|source| Error::SendMessage { source })?;

        Ok(())
    }
}

/// Object fetch task triggered by the previous task's event.
#[derive(Debug)]
pub struct FetchProcessor {
    /// Fetch configuration settings.
    config: Arc<super::config::FetchObject>,
    /// S3 client injected at flow startup.
    client: aws_sdk_s3::Client,
    /// Receiver for incoming events.
    rx: Receiver<Event>,
    /// Channel sender for processed events.
    tx: Option<Sender<Event>>,
    /// Current task identifier for event filtering.
    task_id: usize,
    /// Task execution context providing flow metadata.
    _task_context: Arc<stockflow_core::task::context::TaskContext>,
    /// Task type for event categorization and logging.
    task_type: &'static str,
}

impl Runner for FetchProcessor {
    type Error = Error;

    #[tracing::instrument(skip(self), name = "task.run", fields(task = %self.config.name, task_id = self.task_id, task_type = %self.task_type))]
    async fn run(mut self) -> Result<(), Error> {
        let event_handler = EventHandler {
            config: Arc::clone(&self.config),
            client: self.client.clone(),
            tx: self.tx.clone(),
            task_id: self.task_id,
            task_type: self.task_type,
        };

        while let Some(e) = self.rx.recv().await {
            if Some(e.task_id) != self.task_id.checked_sub(1) {
                continue;
            }
            if let Err(err) = event_handler.handle(e).await {
                error!(error = %err, "Fetching object failed");
                event::forward_absent(
                    &self.config.name,
                    self.tx.as_ref(),
                    self.task_id,
                    self.task_type,
                )
                .await;
            }
        }

        Ok(())
    }
}

/// Builder pattern for constructing FetchProcessor instances.
#[derive(Default)]
pub struct FetchProcessorBuilder {
    /// Fetch configuration settings.
    config: Option<Arc<super::config::FetchObject>>,
    /// S3 client injected at flow startup.
    client: Option<aws_sdk_s3::Client>,
    /// Receiver for incoming events.
    rx: Option<Receiver<Event>>,
    /// Event channel sender.
    tx: Option<Sender<Event>>,
    /// Current task identifier.
    task_id: usize,
    /// Task execution context providing flow metadata.
    task_context: Option<Arc<stockflow_core::task::context::TaskContext>>,
    /// Task type for event categorization and logging.
    task_type: Option<&'static str>,
}

impl FetchProcessorBuilder {
    pub fn new() -> FetchProcessorBuilder {
        FetchProcessorBuilder {
            ..Default::default()
        }
    }

    /// Sets the fetch configuration.
    pub fn config(mut self, config: Arc<super::config::FetchObject>) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the S3 client.
    pub fn client(mut self, client: aws_sdk_s3::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Sets the event receiver.
    pub fn receiver(mut self, receiver: Receiver<Event>) -> Self {
        self.rx = Some(receiver);
        self
    }

    /// Sets the event sender.
    pub fn sender(mut self, sender: Sender<Event>) -> Self {
        self.tx = Some(sender);
        self
    }

    /// Sets the current task identifier.
    pub fn task_id(mut self, task_id: usize) -> Self {
        self.task_id = task_id;
        self
    }

    pub fn task_context(
        mut self,
        task_context: Arc<stockflow_core::task::context::TaskContext>,
    ) -> Self {
        self.task_context = Some(task_context);
        self
    }

    pub fn task_type(mut self, task_type: &'static str) -> Self {
        self.task_type = Some(task_type);
        self
    }

    /// Builds the FetchProcessor instance, validating required fields.
    pub async fn build(self) -> Result<FetchProcessor, Error> {
        Ok(FetchProcessor {
            config: self
                .config
                .ok_or_else(|| Error::MissingBuilderAttribute("config".to_string()))?,
            client: self
                .client
                .ok_or_else(|| Error::MissingBuilderAttribute("client".to_string()))?,
            rx: self
                .rx
                .ok_or_else(|| Error::MissingBuilderAttribute("receiver".to_string()))?,
            tx: self.tx,
            task_id: self.task_id,
            _task_context: self
                .task_context
                .ok_or_else(|| Error::MissingBuilderAttribute("task_context".to_string()))?,
            task_type: self
                .task_type
                .ok_or_else(|| Error::MissingBuilderAttribute("task_type".to_string()))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
    use aws_smithy_http_client::test_util::{ReplayEvent, StaticReplayClient};
    use aws_smithy_types::body::SdkBody;
    use serde_json::json;

    fn replay_client(status: u16, response_body: &str) -> aws_sdk_s3::Client {
        let http_client = StaticReplayClient::new(vec![ReplayEvent::new(
            http::Request::builder()
                .uri("https://s3.us-east-1.amazonaws.com/")
                .body(SdkBody::empty())
                .unwrap(),
            http::Response::builder()
                .status(status)
                .body(SdkBody::from(response_body.to_string()))
                .unwrap(),
        )]);
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(Credentials::new("akid", "secret", None, None, "test"))
            .region(Region::new("us-east-1"))
            .retry_config(aws_sdk_s3::config::retry::RetryConfig::disabled())
            .http_client(http_client)
            .build();
        aws_sdk_s3::Client::from_conf(config)
    }

    fn event_handler(client: aws_sdk_s3::Client, tx: Option<Sender<Event>>) -> EventHandler {
        EventHandler {
            config: Arc::new(super::super::config::FetchObject::default()),
            client,
            tx,
            task_id: 1,
            task_type: "s3_fetch_object",
        }
    }

    fn trigger_event() -> Event {
        EventBuilder::new()
            .subject("list_tables".to_string())
            .data(EventData::Json(json!(["test-table"])))
            .task_id(0)
            .task_type("dynamodb_list_tables")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_object_parses_json_body() {
        let body = r#"{"test-table":[{"PutRequest":{"Item":{"Id":{"N":"1"}}}}]}"#;
        let client = replay_client(200, body);
        let handler = event_handler(client, None);

        let document = handler.fetch_object().await.unwrap();
        assert_eq!(
            document,
            json!({"test-table": [{"PutRequest": {"Item": {"Id": {"N": "1"}}}}]})
        );
    }

    #[tokio::test]
    async fn test_fetch_object_invalid_json_is_an_error() {
        let client = replay_client(200, "not json at all");
        let handler = event_handler(client, None);

        let result = handler.fetch_object().await;
        assert!(matches!(result, Err(Error::SerdeJson { .. })));
    }

    #[tokio::test]
    async fn test_fetch_object_missing_object_is_an_error() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?><Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message></Error>"#;
        let client = replay_client(404, body);
        let handler = event_handler(client, None);

        let result = handler.fetch_object().await;
        assert!(matches!(result, Err(Error::GetObject { .. })));
    }

    #[tokio::test]
    async fn test_handle_emits_document_downstream() {
        let client = replay_client(200, r#"{"hello": "world"}"#);
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        let handler = event_handler(client, Some(tx));

        handler.handle(trigger_event()).await.unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.task_id, 1);
        match event.data {
            EventData::Json(value) => assert_eq!(value, json!({"hello": "world"})),
        }
    }

    #[tokio::test]
    async fn test_builder_missing_client() {
        let task_context = Arc::new(
            stockflow_core::task::context::TaskContextBuilder::new()
                .flow_name("test".to_string())
                .build()
                .unwrap(),
        );

        let result = FetchProcessorBuilder::new()
            .config(Arc::new(super::super::config::FetchObject::default()))
            .task_context(task_context)
            .task_type("s3_fetch_object")
            .build()
            .await;

        assert!(matches!(
            result,
            Err(Error::MissingBuilderAttribute(attr)) if attr == "client"
        ));
    }
}
