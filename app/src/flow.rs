//! Flow execution and task orchestration.
//!
//! Builds the linear chain for a flow: N tasks are connected by N-1 mpsc
//! channels, each task receiving from the previous channel and sending to the
//! next:
//!
//! ```text
//! [Task 0] --channel[0]--> [Task 1] --channel[1]--> [Task 2]
//! ```
//!
//! Service clients are constructed once here, at flow startup, and a handle is
//! passed into each task that needs one. When a task finishes it drops its
//! sender, the next task's receiver drains, and the chain winds down on its
//! own.

use crate::config::{AwsOptions, FlowConfig, TaskType};
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_s3::Client as S3Client;
use std::sync::Arc;
use stockflow_core::client::Client as _;
use stockflow_core::event::Event;
use stockflow_core::task::runner::Runner;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{error, info, Instrument};

/// Event buffer size for the channels between tasks. The chain is
/// data-sequential (one event per step), so a small buffer is plenty.
const DEFAULT_EVENT_BUFFER_SIZE: usize = 16;

/// Errors that can occur during flow execution.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Error in the table listing task.
    #[error(transparent)]
    ListTables(#[from] stockflow_dynamodb::list::Error),
    /// Error in the batch write task.
    #[error(transparent)]
    BatchWrite(#[from] stockflow_dynamodb::write::Error),
    /// Error in the conditional query task.
    #[error(transparent)]
    Query(#[from] stockflow_dynamodb::query::Error),
    /// Error in the object fetch task.
    #[error(transparent)]
    FetchObject(#[from] stockflow_s3::fetch::Error),
    /// Error constructing the DynamoDB client.
    #[error(transparent)]
    DynamoDbClient(#[from] stockflow_dynamodb::client::Error),
    /// Error constructing the S3 client.
    #[error(transparent)]
    S3Client(#[from] stockflow_s3::client::Error),
    /// Error building the task context.
    #[error(transparent)]
    TaskContext(#[from] stockflow_core::task::context::Error),
    /// Missing required builder attribute.
    #[error("Missing required builder attribute: {0}")]
    MissingBuilderAttribute(String),
}

/// Descriptor for a task with its channel endpoints.
#[derive(Debug)]
struct TaskDescriptor {
    /// Unique task identifier (from the task array index).
    id: usize,
    /// Task configuration and type.
    task_type: TaskType,
    /// Input channel receiver (None for the source task).
    input_rx: Option<mpsc::Receiver<Event>>,
    /// Output channel sender (None for the terminal task).
    output_tx: Option<mpsc::Sender<Event>>,
}

/// Registry of all tasks in a flow with channels wired.
#[derive(Debug)]
struct TaskRegistry {
    /// All tasks in execution order.
    tasks: Vec<TaskDescriptor>,
}

/// Type alias for a task join handle.
type TaskHandle = JoinHandle<Result<(), Error>>;

impl TaskRegistry {
    /// Creates a new builder for constructing a task registry.
    fn builder(flow_config: Arc<FlowConfig>, buffer_size: usize) -> TaskRegistryBuilder {
        TaskRegistryBuilder {
            flow_config,
            buffer_size,
        }
    }
}

/// Builder for constructing a task registry with proper channel wiring.
#[derive(Debug)]
struct TaskRegistryBuilder {
    flow_config: Arc<FlowConfig>,
    buffer_size: usize,
}

impl TaskRegistryBuilder {
    /// Builds a complete task registry with all channels properly wired.
    fn build(self) -> TaskRegistry {
        let tasks_config = &self.flow_config.flow.tasks;
        let task_count = tasks_config.len();

        if task_count == 0 {
            return TaskRegistry { tasks: Vec::new() };
        }

        // For N tasks, N-1 channels connect them.
        let mut channels: Vec<(mpsc::Sender<Event>, mpsc::Receiver<Event>)> = (0..task_count
            .saturating_sub(1))
            .map(|_| mpsc::channel(self.buffer_size))
            .collect();

        let mut task_descriptors = Vec::with_capacity(task_count);

        for (idx, task_type) in tasks_config.iter().enumerate() {
            // Wire input: task receives from the previous channel (if not the first task).
            let input_rx = if idx > 0 {
                channels.get_mut(idx - 1).map(|(_, rx)| {
                    // Take ownership of the receiver by replacing it with a dummy channel.
                    std::mem::replace(rx, mpsc::channel(1).1)
                })
            } else {
                None
            };

            // Wire output: task sends to the next channel (if not the last task).
            let output_tx = if idx < task_count - 1 {
                channels.get(idx).map(|(tx, _)| tx.clone())
            } else {
                None
            };

            task_descriptors.push(TaskDescriptor {
                id: idx,
                task_type: task_type.clone(),
                input_rx,
                output_tx,
            });
        }

        TaskRegistry {
            tasks: task_descriptors,
        }
    }
}

/// A flow execution context managing the task chain.
pub struct Flow {
    /// The flow's static configuration.
    pub config: Arc<FlowConfig>,
}

impl Flow {
    /// Returns the name of the flow.
    pub fn name(&self) -> &str {
        &self.config.flow.name
    }

    fn needs_dynamodb(&self) -> bool {
        self.config.flow.tasks.iter().any(|task| {
            matches!(
                task,
                TaskType::dynamodb_list_tables(_)
                    | TaskType::dynamodb_batch_write(_)
                    | TaskType::dynamodb_query(_)
            )
        })
    }

    fn needs_s3(&self) -> bool {
        self.config
            .flow
            .tasks
            .iter()
            .any(|task| matches!(task, TaskType::s3_fetch_object(_)))
    }

    /// Spawns every task in the chain with clients built once up front.
    async fn spawn_tasks(&self) -> Result<Vec<TaskHandle>, Error> {
        let aws = self.config.flow.aws.clone().unwrap_or_default();

        let task_context = Arc::new(
            stockflow_core::task::context::TaskContextBuilder::new()
                .flow_name(self.config.flow.name.clone())
                .build()?,
        );

        // One client per service for the whole run; tasks get handle clones.
        let dynamodb_client = if self.needs_dynamodb() {
            Some(connect_dynamodb(&aws).await?)
        } else {
            None
        };
        let s3_client = if self.needs_s3() {
            Some(connect_s3(&aws).await?)
        } else {
            None
        };

        let registry =
            TaskRegistry::builder(Arc::clone(&self.config), DEFAULT_EVENT_BUFFER_SIZE).build();

        let mut handles = Vec::with_capacity(registry.tasks.len());
        for task_desc in registry.tasks {
            handles.push(spawn_task(
                task_desc,
                Arc::clone(&task_context),
                dynamodb_client.clone(),
                s3_client.clone(),
            )?);
        }
        Ok(handles)
    }

    /// Runs the flow until every task completes.
    #[tracing::instrument(skip(self), name = "flow.run", fields(flow = %self.config.flow.name))]
    pub async fn run(self) -> Result<(), Error> {
        let handles = self.spawn_tasks().await?;

        let results = futures_util::future::join_all(handles).await;
        for (idx, result) in results.into_iter().enumerate() {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Task {} failed: {}", idx, e),
                Err(e) => error!("Task {} panicked: {}", idx, e),
            }
        }

        info!("All tasks completed for flow {}", self.config.flow.name);
        Ok(())
    }
}

/// Builds and connects the DynamoDB client for this run.
async fn connect_dynamodb(aws: &AwsOptions) -> Result<DynamoDbClient, Error> {
    let mut builder = stockflow_dynamodb::client::ClientBuilder::new();
    if let Some(region) = &aws.region {
        builder = builder.region(region.clone());
    }
    if let Some(endpoint_url) = &aws.endpoint_url {
        builder = builder.endpoint_url(endpoint_url.clone());
    }
    Ok(builder.build().connect().await?.into_inner()?)
}

/// Builds and connects the S3 client for this run.
async fn connect_s3(aws: &AwsOptions) -> Result<S3Client, Error> {
    let mut builder = stockflow_s3::client::ClientBuilder::new();
    if let Some(region) = &aws.region {
        builder = builder.region(region.clone());
    }
    if let Some(endpoint_url) = &aws.endpoint_url {
        builder = builder.endpoint_url(endpoint_url.clone());
    }
    Ok(builder.build().connect().await?.into_inner()?)
}

/// Spawns a single task based on its descriptor with proper channel wiring.
fn spawn_task(
    task_desc: TaskDescriptor,
    task_context: Arc<stockflow_core::task::context::TaskContext>,
    dynamodb_client: Option<DynamoDbClient>,
    s3_client: Option<S3Client>,
) -> Result<TaskHandle, Error> {
    let task_id = task_desc.id;
    let rx = task_desc.input_rx;
    let tx = task_desc.output_tx;
    let task_type_str = task_desc.task_type.as_str();
    let span = tracing::Span::current();

    let handle: TaskHandle = match task_desc.task_type {
        TaskType::dynamodb_list_tables(config) => {
            let client = dynamodb_client
                .ok_or_else(|| Error::MissingBuilderAttribute("dynamodb client".to_string()))?;
            let config = Arc::new(config);
            tokio::spawn(
                async move {
                    let mut builder =
                        stockflow_dynamodb::list::ListTablesProcessorBuilder::new()
                            .config(config)
                            .client(client)
                            .task_id(task_id)
                            .task_type(task_type_str)
                            .task_context(task_context);
                    if let Some(tx) = tx {
                        builder = builder.sender(tx);
                    }
                    builder.build().await?.run().await?;
                    Ok(())
                }
                .instrument(span),
            )
        }
        TaskType::s3_fetch_object(config) => {
            let client = s3_client
                .ok_or_else(|| Error::MissingBuilderAttribute("s3 client".to_string()))?;
            let config = Arc::new(config);
            tokio::spawn(
                async move {
                    let mut builder = stockflow_s3::fetch::FetchProcessorBuilder::new()
                        .config(config)
                        .client(client)
                        .task_id(task_id)
                        .task_type(task_type_str)
                        .task_context(task_context);
                    if let Some(rx) = rx {
                        builder = builder.receiver(rx);
                    }
                    if let Some(tx) = tx {
                        builder = builder.sender(tx);
                    }
                    builder.build().await?.run().await?;
                    Ok(())
                }
                .instrument(span),
            )
        }
        TaskType::dynamodb_batch_write(config) => {
            let client = dynamodb_client
                .ok_or_else(|| Error::MissingBuilderAttribute("dynamodb client".to_string()))?;
            let config = Arc::new(config);
            tokio::spawn(
                async move {
                    let mut builder =
                        stockflow_dynamodb::write::BatchWriteProcessorBuilder::new()
                            .config(config)
                            .client(client)
                            .task_id(task_id)
                            .task_type(task_type_str)
                            .task_context(task_context);
                    if let Some(rx) = rx {
                        builder = builder.receiver(rx);
                    }
                    if let Some(tx) = tx {
                        builder = builder.sender(tx);
                    }
                    builder.build().await?.run().await?;
                    Ok(())
                }
                .instrument(span),
            )
        }
        TaskType::dynamodb_query(config) => {
            let client = dynamodb_client
                .ok_or_else(|| Error::MissingBuilderAttribute("dynamodb client".to_string()))?;
            let config = Arc::new(config);
            tokio::spawn(
                async move {
                    let mut builder = stockflow_dynamodb::query::QueryProcessorBuilder::new()
                        .config(config)
                        .client(client)
                        .task_id(task_id)
                        .task_type(task_type_str)
                        .task_context(task_context);
                    if let Some(rx) = rx {
                        builder = builder.receiver(rx);
                    }
                    if let Some(tx) = tx {
                        builder = builder.sender(tx);
                    }
                    builder.build().await?.run().await?;
                    Ok(())
                }
                .instrument(span),
            )
        }
    };

    Ok(handle)
}

/// Builder for creating Flow instances.
#[derive(Default)]
pub struct FlowBuilder {
    /// Optional flow configuration.
    config: Option<Arc<FlowConfig>>,
}

impl FlowBuilder {
    /// Creates a new FlowBuilder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flow configuration.
    pub fn config(mut self, config: Arc<FlowConfig>) -> Self {
        self.config = Some(config);
        self
    }

    /// Builds a Flow instance from the configured options.
    ///
    /// # Errors
    /// Returns `Error::MissingBuilderAttribute` if required fields are not set.
    pub fn build(self) -> Result<Flow, Error> {
        Ok(Flow {
            config: self
                .config
                .ok_or_else(|| Error::MissingBuilderAttribute("config".to_string()))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{default_flow, Flow as FlowDefinition, FlowConfig};

    #[test]
    fn test_flow_builder_build_missing_config() {
        let result = FlowBuilder::new().build();

        assert!(matches!(
            result,
            Err(Error::MissingBuilderAttribute(attr)) if attr == "config"
        ));
    }

    #[test]
    fn test_flow_builder_build_success() {
        let flow_config = Arc::new(default_flow());
        let flow = FlowBuilder::new()
            .config(Arc::clone(&flow_config))
            .build()
            .unwrap();

        assert_eq!(flow.config, flow_config);
        assert_eq!(flow.name(), crate::config::DEFAULT_FLOW_NAME);
    }

    #[test]
    fn test_task_registry_creates_n_minus_1_channels() {
        let registry =
            TaskRegistry::builder(Arc::new(default_flow()), DEFAULT_EVENT_BUFFER_SIZE).build();

        assert_eq!(registry.tasks.len(), 4);

        assert!(
            registry.tasks[0].input_rx.is_none(),
            "First task should not have input"
        );
        assert!(
            registry.tasks[0].output_tx.is_some(),
            "First task should have output"
        );

        for task in &registry.tasks[1..3] {
            assert!(task.input_rx.is_some(), "Middle task should have input");
            assert!(task.output_tx.is_some(), "Middle task should have output");
        }

        assert!(
            registry.tasks[3].input_rx.is_some(),
            "Last task should have input"
        );
        assert!(
            registry.tasks[3].output_tx.is_none(),
            "Last task should not have output"
        );
    }

    #[test]
    fn test_task_registry_empty_flow() {
        let flow_config = Arc::new(FlowConfig {
            flow: FlowDefinition {
                name: "empty".to_string(),
                labels: None,
                aws: None,
                tasks: vec![],
            },
        });

        let registry = TaskRegistry::builder(flow_config, DEFAULT_EVENT_BUFFER_SIZE).build();
        assert_eq!(registry.tasks.len(), 0);
    }

    #[test]
    fn test_task_registry_preserves_task_order() {
        let registry =
            TaskRegistry::builder(Arc::new(default_flow()), DEFAULT_EVENT_BUFFER_SIZE).build();

        for (idx, task) in registry.tasks.iter().enumerate() {
            assert_eq!(task.id, idx);
        }
        assert_eq!(registry.tasks[0].task_type.as_str(), "dynamodb_list_tables");
        assert_eq!(registry.tasks[3].task_type.as_str(), "dynamodb_query");
    }

    #[test]
    fn test_flow_service_needs() {
        let flow = FlowBuilder::new()
            .config(Arc::new(default_flow()))
            .build()
            .unwrap();
        assert!(flow.needs_dynamodb());
        assert!(flow.needs_s3());

        let fetch_only = Arc::new(FlowConfig {
            flow: FlowDefinition {
                name: "fetch-only".to_string(),
                labels: None,
                aws: None,
                tasks: vec![crate::config::TaskType::s3_fetch_object(Default::default())],
            },
        });
        let flow = FlowBuilder::new().config(fetch_only).build().unwrap();
        assert!(!flow.needs_dynamodb());
        assert!(flow.needs_s3());
    }
}
