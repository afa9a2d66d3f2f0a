//! Task execution context providing metadata shared across a flow.

/// Errors that can occur during TaskContext operations.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Required builder attribute was not provided.
    #[error("Missing required attribute: {}", _0)]
    MissingRequiredAttribute(String),
}

/// Context information shared by every task of a flow.
#[derive(Clone, Debug)]
pub struct TaskContext {
    /// Name of the flow the task belongs to.
    pub flow_name: String,
    /// Optional human-readable flow label for logging.
    pub flow_label: Option<String>,
}

/// Builder for constructing TaskContext instances.
#[derive(Default)]
pub struct TaskContextBuilder {
    /// Name of the flow (required for build).
    flow_name: Option<String>,
    /// Optional human-readable flow label.
    flow_label: Option<String>,
}

impl TaskContextBuilder {
    /// Creates a new TaskContextBuilder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flow name.
    pub fn flow_name(mut self, name: String) -> Self {
        self.flow_name = Some(name);
        self
    }

    /// Sets the optional human-readable flow label.
    pub fn flow_label(mut self, label: Option<String>) -> Self {
        self.flow_label = label;
        self
    }

    /// Builds the TaskContext instance.
    ///
    /// # Errors
    /// Returns `Error::MissingRequiredAttribute` if required fields are not set.
    pub fn build(self) -> Result<TaskContext, Error> {
        Ok(TaskContext {
            flow_name: self
                .flow_name
                .ok_or_else(|| Error::MissingRequiredAttribute("flow_name".to_string()))?,
            flow_label: self.flow_label,
        })
    }
}
