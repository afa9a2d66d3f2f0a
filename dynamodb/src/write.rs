use crate::attr;
use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::batch_write_item::BatchWriteItemError;
use serde_json::Value;
use std::sync::Arc;
use stockflow_core::event::{self, Event, EventBuilder, EventData, EventExt};
use stockflow_core::task::runner::Runner;
use tokio::sync::mpsc::{Receiver, Sender};
use tracing::{error, warn};

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("Batch write failed: {source}")]
    BatchWrite {
        #[source]
        source: SdkError<BatchWriteItemError>,
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

/// Handles one incoming payload by submitting it as a batch write.
pub struct EventHandler {
    /// Batch write configuration settings.
    config: Arc<super::config::BatchWrite>,
    /// DynamoDB client for the write call.
    client: aws_sdk_dynamodb::Client,
    /// Channel sender for the unprocessed-items event.
    tx: Option<Sender<Event>>,
    /// Current task identifier.
    task_id: usize,
    /// Task type for event categorization and logging.
    task_type: &'static str,
}

impl EventHandler {
    /// Submits one batch write and returns the unprocessed subset unchanged.
    ///
    /// The service may apply the batch only partially; whatever it reports as
    /// unprocessed is handed back for the caller to re-drive.
    async fn write_batch(&self, payload: &Value) -> Result<Value, Error> {
        let request_items =
            attr::request_items_from_json(payload).map_err(|source| Error::Attr { source })?;

        let output = self
            .client
            .batch_write_item()
            .set_request_items(Some(request_items))
            .send()
            .await
            .map_err(|source| Error::BatchWrite { source })?;

        let unprocessed = output.unprocessed_items.unwrap_or_default();
        attr::request_items_to_json(&unprocessed).map_err(|source| Error::Attr { source })
    }

    async fn forward(&self, payload: Value, enabled: bool) -> Result<(), Error> {
        let e = EventBuilder::new()
            .subject(self.config.name.to_owned())
            .data(EventData::Json(payload))
            .task_id(self.task_id)
            .task_type(self.task_type)
            .build()
            .map_err(|source| Error::EventBuilder { source })?;

        e.send_with_logging(self.tx.as_ref())
            .context("enabled", enabled)
            .await
            .map_err(|source| Error::SendMessage { source })?;

        Ok(())
    }

    /// Processes an event: writes the payload when enabled, forwards it otherwise.
    async fn handle(&self, event: Event) -> Result<(), Error> {
        let EventData::Json(payload) = &event.data;

        if !self.config.enabled {
            // The write path is deliberately off; pass the payload through untouched.
            return self.forward(payload.clone(), false).await;
        }

        if !payload.is_object() {
            // An upstream step yielded no document; nothing to write.
            warn!(task = %self.config.name, "No batch payload to write");
            return self.forward(payload.clone(), true).await;
        }

        let unprocessed = self.write_batch(payload).await?;
        println!("Unprocessed items: {unprocessed}");

        let num_tables = unprocessed.as_object().map(|tables| tables.len()).unwrap_or(0);
        let e = EventBuilder::new()
            .subject(self.config.name.to_owned())
            .data(EventData::Json(unprocessed))
            .task_id(self.task_id)
            .task_type(self.task_type)
            .build()
            .map_err(|source| Error::EventBuilder { source })?;

        e.send_with_logging(self.tx.as_ref())
            .context("num_unprocessed_tables", num_tables)
            .await
            .map_err(|source| Error::SendMessage { source })?;

        Ok(())
    }
}

/// Batch write task that processes payload events from the previous task.
#[derive(Debug)]
pub struct BatchWriteProcessor {
    /// Batch write configuration settings.
    config: Arc<super::config::BatchWrite>,
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

impl Runner for BatchWriteProcessor {
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
                error!(error = %err, "Batch write failed");
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

/// Builder pattern for constructing BatchWriteProcessor instances.
#[derive(Default)]
pub struct BatchWriteProcessorBuilder {
    /// Batch write configuration settings.
    config: Option<Arc<super::config::BatchWrite>>,
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

impl BatchWriteProcessorBuilder {
    pub fn new() -> BatchWriteProcessorBuilder {
        BatchWriteProcessorBuilder {
            ..Default::default()
        }
    }

    /// Sets the batch write configuration.
    pub fn config(mut self, config: Arc<super::config::BatchWrite>) -> Self {
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

    /// Builds the BatchWriteProcessor instance, validating required fields.
    pub async fn build(self) -> Result<BatchWriteProcessor, Error> {
        Ok(BatchWriteProcessor {
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
