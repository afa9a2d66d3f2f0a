use crate::attr;
use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::query::QueryError;
use serde_json::Value;
use std::sync::Arc;
use stockflow_core::event::{self, Event, EventBuilder, EventData, EventExt};
use stockflow_core::task::runner::Runner;
use tokio::sync::mpsc::{Receiver, Sender};
use tracing::error;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("Query failed: {source}")]
    Query {
        #[source]
        source: SdkError<QueryError>,
    },
    #[error("Attribute value conversion failed: {source}")]
    Attr {
        #[source]
        source: attr::Error,
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

/// Runs the configured key-condition query when triggered.
pub struct EventHandler {
    /// Query configuration settings.
    config: Arc<super::config::Query>,
    /// DynamoDB client for the query call.
    client: aws_sdk_dynamodb::Client,
    /// Channel sender for the result event.
    tx: Option<Sender<Event>>,
    /// Current task identifier.
    task_id: usize,
    /// Task type for event categorization and logging.
    task_type: &'static str,
}

impl EventHandler {
    /// Runs the query and returns matching items in service order.
    async fn query_items(&self) -> Result<Vec<Value>, Error> {
        let mut request = self
            .client
            .query()
            .table_name(&self.config.table_name)
            .key_condition_expression(&self.config.key_condition_expression);
        if let Some(index_name) = &self.config.index_name {
            request = request.index_name(index_name);
        }
        for (token, value) in &self.config.expression_attribute_values {
            request = request.expression_attribute_values(
                token,
                attr::attribute_value_from_json(value).map_err(|source| Error::Attr { source })?,
            );
        }

        let output = request
            .send()
            .await
            .map_err(|source| Error::Query { source })?;

        output
            .items
            .unwrap_or_default()
            .iter()
            .map(|item| attr::item_to_json(item).map_err(|source| Error::Attr { source }))
            .collect()
    }

    /// Prints matching items and emits them as the result event.
    ///
    /// The incoming event only triggers the step; the query parameters are
    /// fixed by configuration.
    async fn handle(&self, _event: Event) -> Result<(), Error> {
        let items = self.query_items().await?;

        println!("Items that matched the above condition:");
        for item in &items {
            println!("{item}");
        }

        let num_items = items.len();
        let e = EventBuilder::new()
            .subject(self.config.name.to_owned())
            .data(EventData::Json(Value::Array(items)))
            .task_id(self.task_id)
            .task_type(self.task_type)
            .build()
            .map_err(|source| Error::EventBuilder { source })?;

        e.send_with_logging(self.tx.as_ref())
            .context("num_items", num_items)
            .await
            .map_err(|source| Error::SendMessage { source })?;

        Ok(())
    }
}

/// Conditional query task triggered by the previous task's event.
#[derive(Debug)]
pub struct QueryProcessor {
    /// Query configuration settings.
    config: Arc<super::config::Query>,
    /// DynamoDB client injected at flow startup.
    client: aws_sdk_dynamodb::Client,
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

impl Runner for QueryProcessor {
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
                error!(error = %err, "Query failed");
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

/// Builder pattern for constructing QueryProcessor instances.
#[derive(Default)]
pub struct QueryProcessorBuilder {
    /// Query configuration settings.
    config: Option<Arc<super::config::Query>>,
    /// DynamoDB client injected at flow startup.
    client: Option<aws_sdk_dynamodb::Client>,
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

impl QueryProcessorBuilder {
    pub fn new() -> QueryProcessorBuilder {
        QueryProcessorBuilder {
            ..Default::default()
        }
    }

    /// Sets the query configuration.
    pub fn config(mut self, config: Arc<super::config::Query>) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the DynamoDB client.
    pub fn client(mut self, client: aws_sdk_dynamodb::Client) -> Self {
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

    /// Builds the QueryProcessor instance, validating required fields.
    pub async fn build(self) -> Result<QueryProcessor, Error> {
        Ok(QueryProcessor {
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
    use aws_sdk_dynamodb::config::{BehaviorVersion, Credentials, Region};
    use aws_smithy_http_client::test_util::{ReplayEvent, StaticReplayClient};
    use aws_smithy_types::body::SdkBody;
    use serde_json::json;

    fn replay_client(status: u16, response_body: &str) -> aws_sdk_dynamodb::Client {
        let http_client = StaticReplayClient::new(vec![ReplayEvent::new(
            http::Request::builder()
                .uri("https://dynamodb.us-east-1.amazonaws.com/")
                .body(SdkBody::from("{}"))
                .unwrap(),
            http::Response::builder()
                .status(status)
                .body(SdkBody::from(response_body.to_string()))
                .unwrap(),
        )]);
        let config = aws_sdk_dynamodb::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(Credentials::new("akid", "secret", None, None, "test"))
            .region(Region::new("us-east-1"))
            .retry_config(aws_sdk_dynamodb::config::retry::RetryConfig::disabled())
            .http_client(http_client)
            .build();
        aws_sdk_dynamodb::Client::from_conf(config)
    }

    fn event_handler(
        client: aws_sdk_dynamodb::Client,
        tx: Option<Sender<Event>>,
    ) -> EventHandler {
        EventHandler {
            config: Arc::new(super::super::config::Query::default()),
            client,
            tx,
            task_id: 3,
            task_type: "dynamodb_query",
        }
    }

    fn trigger_event() -> Event {
        EventBuilder::new()
            .subject("batch_write".to_string())
            .data(EventData::Json(Value::Null))
            .task_id(2)
            .task_type("dynamodb_batch_write")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_query_items_returns_matches_in_service_order() {
        let client = replay_client(
            200,
            r#"{"Items":[{"ProductCategory":{"S":"Bike"},"Price":{"N":"250"}}],"Count":1,"ScannedCount":1}"#,
        );
        let handler = event_handler(client, None);

        let items = handler.query_items().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(
            items[0],
            json!({"ProductCategory": {"S": "Bike"}, "Price": {"N": "250"}})
        );
    }

    #[tokio::test]
    async fn test_query_items_empty_result() {
        let client = replay_client(200, r#"{"Items":[],"Count":0,"ScannedCount":0}"#);
        let handler = event_handler(client, None);

        let items = handler.query_items().await.unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_query_surfaces_service_error() {
        let client = replay_client(
            400,
            r#"{"__type":"com.amazonaws.dynamodb#ResourceNotFoundException"}"#,
        );
        let handler = event_handler(client, None);

        let result = handler.query_items().await;
        assert!(matches!(result, Err(Error::Query { .. })));
    }

    #[tokio::test]
    async fn test_handle_emits_items_downstream() {
        let client = replay_client(
            200,
            r#"{"Items":[{"ProductCategory":{"S":"Bike"},"Price":{"N":"250"}},{"ProductCategory":{"S":"Bike"},"Price":{"N":"300"}}],"Count":2,"ScannedCount":2}"#,
        );
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        let handler = event_handler(client, Some(tx));

        handler.handle(trigger_event()).await.unwrap();

        let event = rx.recv().await.unwrap();
        match event.data {
            EventData::Json(value) => {
                let items = value.as_array().unwrap();
                assert_eq!(items.len(), 2);
                assert_eq!(items[0]["Price"], json!({"N": "250"}));
                assert_eq!(items[1]["Price"], json!({"N": "300"}));
            }
        }
    }

    #[tokio::test]
    async fn test_invalid_expression_value_is_an_attr_error() {
        let client = replay_client(200, "{}");
        let mut config = super::super::config::Query::default();
        config
            .expression_attribute_values
            .insert(":bad".to_string(), json!({"X": "nope"}));
        let handler = EventHandler {
            config: Arc::new(config),
            client,
            tx: None,
            task_id: 3,
            task_type: "dynamodb_query",
        };

        let result = handler.query_items().await;
        assert!(matches!(result, Err(Error::Attr { .. })));
    }

    #[tokio::test]
    async fn test_builder_missing_config() {
        let task_context = Arc::new(
            stockflow_core::task::context::TaskContextBuilder::new()
                .flow_name("test".to_string())
                .build()
                .unwrap(),
        );

        let result = QueryProcessorBuilder::new()
            .client(replay_client(200, "{}"))
            .task_context(task_context)
            .task_type("dynamodb_query")
            .build()
            .await;

        assert!(matches!(
            result,
            Err(Error::MissingBuilderAttribute(attr)) if attr == "config"
        ));
    }
}
