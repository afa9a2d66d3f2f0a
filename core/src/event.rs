//! Event system for passing data between pipeline tasks.
//!
//! Provides the event envelope, builder validation, and logging helpers used
//! by every task in a stockflow pipeline.

use chrono::Utc;
use serde_json::Value;
use tracing::info;

/// Builder for sending events with structured logging context.
pub struct EventLogger<'a> {
    event: Event,
    tx: Option<&'a tokio::sync::mpsc::Sender<Event>>,
    fields: Vec<(&'static str, String)>,
}

impl<'a> EventLogger<'a> {
    /// Add a context field to the structured log output.
    ///
    /// # Example
    /// ```ignore
    /// event.send_with_logging(Some(&tx))
    ///     .context("num_tables", 3)
    ///     .await?;
    /// ```
    pub fn context(mut self, key: &'static str, value: impl std::fmt::Display) -> Self {
        self.fields.push((key, value.to_string()));
        self
    }
}

// Implement IntoFuture to make EventLogger awaitable
impl<'a> std::future::IntoFuture for EventLogger<'a> {
    type Output = Result<(), Error>;
    type IntoFuture =
        std::pin::Pin<Box<dyn std::future::Future<Output = Self::Output> + Send + 'a>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let event_id = match &self.event.id {
                Some(ref id) => id.to_string(),
                None => self.event.timestamp.to_string(),
            };
            let subject = self.event.subject.clone();

            if let Some(tx) = self.tx {
                tx.send(self.event).await.map_err(|_| Error::SendMessage)?;
            }

            // Build structured log with context fields
            if self.fields.is_empty() {
                info!(
                    event.subject = %subject,
                    event.id = %event_id,
                );
            } else {
                let field_str = self
                    .fields
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join(", ");

                info!(
                    event.subject = %subject,
                    event.id = %event_id,
                    context = %field_str,
                );
            }

            Ok(())
        })
    }
}

/// Extension trait for event processing with logging.
pub trait EventExt {
    /// Logs event processing and optionally sends to the next task.
    ///
    /// This method always logs the event, then sends it to the next task if a
    /// sender is provided. Returns a builder that allows adding context fields
    /// via `.context()` calls; the builder implements `IntoFuture`, so it can
    /// be awaited directly.
    fn send_with_logging<'a>(
        self,
        tx: Option<&'a tokio::sync::mpsc::Sender<Event>>,
    ) -> EventLogger<'a>;
}

impl EventExt for Event {
    fn send_with_logging<'a>(
        self,
        tx: Option<&'a tokio::sync::mpsc::Sender<Event>>,
    ) -> EventLogger<'a> {
        EventLogger {
            event: self,
            tx,
            fields: Vec::new(),
        }
    }
}

/// Errors that can occur during event processing operations.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("JSON error: {source}")]
    SerdeJson {
        #[source]
        source: serde_json::error::Error,
    },
    #[error("Missing required builder attribute: {}", _0)]
    MissingBuilderAttribute(String),
    #[error("Error sending event to channel (receiver dropped)")]
    SendMessage,
}

/// Core event structure containing data and metadata for pipeline processing.
#[derive(Debug, Clone)]
pub struct Event {
    /// Event payload.
    pub data: EventData,
    /// Subject identifier for event routing and filtering.
    pub subject: String,
    /// Optional unique identifier for the event.
    pub id: Option<String>,
    /// Event creation timestamp in microseconds since Unix epoch.
    pub timestamp: i64,
    /// Task identifier for tracking event flow through pipeline stages.
    pub task_id: usize,
    /// Task type for categorization and logging.
    pub task_type: &'static str,
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let event_data = Value::from(&self.data);

        let event_json = serde_json::json!({
            "subject": self.subject,
            "data": event_data,
            "id": self.id,
            "timestamp": self.timestamp,
            "task_id": self.task_id,
            "task_type": self.task_type,
        });

        let formatted =
            serde_json::to_string_pretty(&event_json).unwrap_or_else(|_| format!("{self:?}"));

        write!(f, "{formatted}")
    }
}

/// Event data payload.
#[derive(Debug, Clone)]
pub enum EventData {
    /// JSON format for structured data.
    Json(Value),
}

impl From<&EventData> for Value {
    fn from(event_data: &EventData) -> Self {
        match event_data {
            EventData::Json(data) => data.clone(),
        }
    }
}

/// Builder for constructing Event instances with validation.
#[derive(Default, Debug)]
pub struct EventBuilder {
    /// Event data payload (required for build).
    pub data: Option<EventData>,
    /// Event subject for routing (required for build).
    pub subject: Option<String>,
    /// Optional unique event identifier.
    pub id: Option<String>,
    /// Event timestamp, defaults to current time.
    pub timestamp: Option<i64>,
    /// Current task identifier for pipeline tracking.
    pub task_id: Option<usize>,
    /// Task type for categorization and logging (required for build).
    pub task_type: Option<&'static str>,
}

impl EventBuilder {
    /// Creates a new EventBuilder with the timestamp set to now.
    pub fn new() -> Self {
        EventBuilder {
            timestamp: Some(Utc::now().timestamp_micros()),
            ..Default::default()
        }
    }

    pub fn data(mut self, data: EventData) -> Self {
        self.data = Some(data);
        self
    }
    pub fn subject(mut self, subject: String) -> Self {
        self.subject = Some(subject);
        self
    }
    pub fn task_id(mut self, task_id: usize) -> Self {
        self.task_id = Some(task_id);
        self
    }
    pub fn id(mut self, id: String) -> Self {
        self.id = Some(id);
        self
    }
    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
    pub fn task_type(mut self, task_type: &'static str) -> Self {
        self.task_type = Some(task_type);
        self
    }

    pub fn build(self) -> Result<Event, Error> {
        Ok(Event {
            data: self
                .data
                .ok_or_else(|| Error::MissingBuilderAttribute("data".to_string()))?,
            subject: self
                .subject
                .ok_or_else(|| Error::MissingBuilderAttribute("subject".to_string()))?,
            id: self.id,
            timestamp: self
                .timestamp
                .ok_or_else(|| Error::MissingBuilderAttribute("timestamp".to_string()))?,
            task_id: self
                .task_id
                .ok_or_else(|| Error::MissingBuilderAttribute("task_id".to_string()))?,
            task_type: self
                .task_type
                .ok_or_else(|| Error::MissingBuilderAttribute("task_type".to_string()))?,
        })
    }
}

/// Keeps a chain moving after a failed call by emitting an absent payload.
///
/// Downstream tasks receive a `null` payload instead of nothing, so a failure
/// in one step does not silently stop the steps after it.
pub async fn forward_absent(
    subject: &str,
    tx: Option<&tokio::sync::mpsc::Sender<Event>>,
    task_id: usize,
    task_type: &'static str,
) {
    let event = EventBuilder::new()
        .subject(subject.to_owned())
        .data(EventData::Json(Value::Null))
        .task_id(task_id)
        .task_type(task_type)
        .build();

    match event {
        Ok(event) => {
            if let Err(e) = event.send_with_logging(tx).context("absent", true).await {
                tracing::error!(error = %e, "Forwarding absent payload failed");
            }
        }
        Err(e) => tracing::error!(error = %e, "Building absent payload event failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_builder_success() {
        let event = EventBuilder::new()
            .data(EventData::Json(json!({"test": "value"})))
            .subject("test.subject".to_string())
            .id("test-id".to_string())
            .task_id(1)
            .task_type("test")
            .build()
            .unwrap();

        assert_eq!(event.subject, "test.subject");
        assert_eq!(event.id, Some("test-id".to_string()));
        assert_eq!(event.task_id, 1);
        assert!(event.timestamp > 0);

        match event.data {
            EventData::Json(value) => assert_eq!(value, json!({"test": "value"})),
        }
    }

    #[test]
    fn test_event_builder_missing_data() {
        let result = EventBuilder::new()
            .subject("test.subject".to_string())
            .build();

        assert!(matches!(
            result,
            Err(Error::MissingBuilderAttribute(attr)) if attr == "data"
        ));
    }

    #[test]
    fn test_event_builder_missing_subject() {
        let result = EventBuilder::new()
            .data(EventData::Json(json!({"test": "value"})))
            .build();

        assert!(matches!(
            result,
            Err(Error::MissingBuilderAttribute(attr)) if attr == "subject"
        ));
    }

    #[test]
    fn test_event_data_json_conversion() {
        let json_data = json!({"field": "value", "number": 42});
        let event_data = EventData::Json(json_data.clone());

        assert_eq!(Value::from(&event_data), json_data);
    }

    #[tokio::test]
    async fn test_send_with_logging_delivers_event() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(1);

        let event = EventBuilder::new()
            .data(EventData::Json(json!(["a", "b"])))
            .subject("deliver".to_string())
            .task_id(0)
            .task_type("test")
            .build()
            .unwrap();

        event
            .send_with_logging(Some(&tx))
            .context("num_items", 2)
            .await
            .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.subject, "deliver");
        match received.data {
            EventData::Json(value) => assert_eq!(value, json!(["a", "b"])),
        }
    }

    #[tokio::test]
    async fn test_send_with_logging_dropped_receiver() {
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        drop(rx);

        let event = EventBuilder::new()
            .data(EventData::Json(Value::Null))
            .subject("dropped".to_string())
            .task_id(0)
            .task_type("test")
            .build()
            .unwrap();

        let result = event.send_with_logging(Some(&tx)).await;
        assert!(matches!(result, Err(Error::SendMessage)));
    }

    #[tokio::test]
    async fn test_forward_absent_emits_null_payload() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(1);

        forward_absent("failed.step", Some(&tx), 2, "test").await;

        let received = rx.recv().await.unwrap();
        assert_eq!(received.subject, "failed.step");
        assert_eq!(received.task_id, 2);
        match received.data {
            EventData::Json(value) => assert_eq!(value, Value::Null),
        }
    }
}
