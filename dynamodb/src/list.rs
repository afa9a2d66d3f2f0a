use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::list_tables::ListTablesError;
use serde_json::json;
use std::sync::Arc;
use stockflow_core::event::{Event, EventBuilder, EventData, EventExt};
use stockflow_core::task::runner::Runner;
use tokio::sync::mpsc::Sender;
use tracing::error;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("Listing tables failed: {source}")]
    ListTables {
        #[source]
        source: SdkError<ListTablesError>,
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

/// Handles the single table-listing round trip.
pub struct EventHandler {
    /// Listing configuration settings.
    config: Arc<super::config::ListTables>,
    /// DynamoDB client for the listing call.
    client: aws_sdk_dynamodb::Client,
    /// Channel sender for the table-list event.
    tx: Option<Sender<Event>>,
    /// Current task identifier.
    task_id: usize,
    /// Task type for event categorization and logging.
    task_type: &'static str,
}

impl EventHandler {
    /// Asks the service for all table names in the region, in service order.
    async fn list_tables(&self) -> Result<Vec<String>, Error> {
        let output = self
            .client
            .list_tables()
            .send()
            .await
            .map_err(|source| Error::ListTables { source })?;
        Ok(output.table_names.unwrap_or_default())
    }

    /// Prints the table listing and emits it downstream when nonempty.
    async fn handle(&self) -> Result<(), Error> {
        let table_names = self.list_tables().await?;

        if table_names.is_empty() {
            println!("No tables in region.");
            return Ok(());
        }

        for name in &table_names {
            println!("Table name: {name}");
        }

        let num_tables = table_names.len();
        let e = EventBuilder::new()
            .subject(self.config.name.to_owned())
            .data(EventData::Json(json!(table_names)))
            .task_id(self.task_id)
            .task_type(self.task_type)
            .build()
            .map_err(|source| Error::EventBuilder { source })?;

        e.send_with_logging(self.tx.as_ref())
            .context("num_tables", num_tables)
            .await
            .map_err(|source| Error::SendMessage { source })?;

        Ok(())
    }
}

/// Source task that lists tables once and starts the chain.
///
/// An empty region ends the chain: no event is emitted and the output channel
/// closes when the task finishes.
#[derive(Debug)]
pub struct ListTablesProcessor {
    /// Listing configuration settings.
    config: Arc<super::config::ListTables>,
    /// DynamoDB client injected at flow startup.
    client: aws_sdk_dynamodb::Client,
    /// Channel sender for the table-list event.
    tx: Option<Sender<Event>>,
    /// Current task identifier.
    task_id: usize,
    /// Task execution context providing flow metadata.
    _task_context: Arc<stockflow_core::task::context::TaskContext>,
    /// Task type for event categorization and logging.
    task_type: &'static str,
}

impl Runner for ListTablesProcessor {
    type Error = Error;

    #[tracing::instrument(skip(self), name = "task.run", fields(task = %self.config.name, task_id = self.task_id, task_type = %self.task_type))]
    async fn run(self) -> Result<(), Error> {
        let event_handler = EventHandler {
            config: self.config,
            client: self.client,
            tx: self.tx,
            task_id: self.task_id,
            task_type: self.task_type,
        };

        // A failed listing ends the chain; there is nothing to continue with.
        if let Err(e) = event_handler.handle().await {
            error!(error = %e, "Listing tables failed");
        }

        Ok(())
    }
}

/// Builder pattern for constructing ListTablesProcessor instances.
#[derive(Default)]
pub struct ListTablesProcessorBuilder {
    /// Listing configuration settings.
    config: Option<Arc<super::config::ListTables>>,
    /// DynamoDB client injected at flow startup.
    client: Option<aws_sdk_dynamodb::Client>,
    /// Event channel sender.
    tx: Option<Sender<Event>>,
    /// Current task identifier.
    task_id: usize,
    /// Task execution context providing flow metadata.
    task_context: Option<Arc<stockflow_core::task::context::TaskContext>>,
    /// Task type for event categorization and logging.
    task_type: Option<&'static str>,
}

impl ListTablesProcessorBuilder {
    pub fn new() -> ListTablesProcessorBuilder {
        ListTablesProcessorBuilder {
            ..Default::default()
        }
    }

    /// Sets the listing configuration.
    pub fn config(mut self, config: Arc<super::config::ListTables>) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the DynamoDB client.
    pub fn client(mut self, client: aws_sdk_dynamodb::Client) -> Self {
        self.client = Some(client);
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

    /// Builds the ListTablesProcessor instance, validating required fields.
    pub async fn build(self) -> Result<ListTablesProcessor, Error> {
        Ok(ListTablesProcessor {
            config: self
                .config
                .ok_or_else(|| Error::MissingBuilderAttribute("config".to_string()))?,
            client: self
                .client
                .ok_or_else(|| Error::MissingBuilderAttribute("client".to_string()))?,
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
