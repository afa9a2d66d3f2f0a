//! Configuration structures for the stockflow application and its flow.
//!
//! A flow definition can be loaded from a YAML or JSON file; without one the
//! built-in default flow runs with every task on its defaults.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name of the built-in flow used when no configuration file is provided.
pub const DEFAULT_FLOW_NAME: &str = "catalog-lab";

/// Top-level configuration for a flow.
#[derive(PartialEq, Clone, Debug, Deserialize, Serialize)]
pub struct FlowConfig {
    /// Flow definition containing name and tasks.
    pub flow: Flow,
}

/// Flow definition with name and task list.
#[derive(PartialEq, Clone, Debug, Deserialize, Serialize)]
pub struct Flow {
    /// Unique name for this flow.
    pub name: String,
    /// Optional labels for logging.
    pub labels: Option<Map<String, Value>>,
    /// Connection options shared by every task's service client.
    #[serde(default)]
    pub aws: Option<AwsOptions>,
    /// List of tasks to execute in this flow.
    pub tasks: Vec<TaskType>,
}

/// Connection options applied to both service clients.
#[derive(PartialEq, Clone, Debug, Deserialize, Serialize, Default)]
pub struct AwsOptions {
    /// Region override; each client falls back to its built-in default.
    pub region: Option<String>,
    /// Endpoint override for local service stand-ins.
    pub endpoint_url: Option<String>,
}

/// Available task types in a stockflow pipeline.
///
/// Each variant embeds the configuration of the matching processor from the
/// connector crates.
#[derive(PartialEq, Clone, Debug, Deserialize, Serialize)]
#[allow(non_camel_case_types)]
pub enum TaskType {
    /// Table listing source task.
    dynamodb_list_tables(stockflow_dynamodb::config::ListTables),
    /// Object fetch task.
    s3_fetch_object(stockflow_s3::config::FetchObject),
    /// Batch write task.
    dynamodb_batch_write(stockflow_dynamodb::config::BatchWrite),
    /// Conditional query task.
    dynamodb_query(stockflow_dynamodb::config::Query),
}

impl TaskType {
    /// Returns the task type as a static string for event categorization.
    pub const fn as_str(&self) -> &'static str {
        match self {
            TaskType::dynamodb_list_tables(_) => "dynamodb_list_tables",
            TaskType::s3_fetch_object(_) => "s3_fetch_object",
            TaskType::dynamodb_batch_write(_) => "dynamodb_batch_write",
            TaskType::dynamodb_query(_) => "dynamodb_query",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The built-in flow: list tables, fetch the seed document, batch-write it
/// (disabled by default), then run the conditional query.
pub fn default_flow() -> FlowConfig {
    FlowConfig {
        flow: Flow {
            name: DEFAULT_FLOW_NAME.to_string(),
            labels: None,
            aws: None,
            tasks: vec![
                TaskType::dynamodb_list_tables(Default::default()),
                TaskType::s3_fetch_object(Default::default()),
                TaskType::dynamodb_batch_write(Default::default()),
                TaskType::dynamodb_query(Default::default()),
            ],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_flow_shape() {
        let config = default_flow();
        assert_eq!(config.flow.name, DEFAULT_FLOW_NAME);
        assert_eq!(config.flow.tasks.len(), 4);
        assert!(matches!(
            config.flow.tasks[0],
            TaskType::dynamodb_list_tables(_)
        ));
        assert!(matches!(config.flow.tasks[1], TaskType::s3_fetch_object(_)));
        assert!(matches!(
            config.flow.tasks[2],
            TaskType::dynamodb_batch_write(_)
        ));
        assert!(matches!(config.flow.tasks[3], TaskType::dynamodb_query(_)));
    }

    #[test]
    fn test_default_flow_write_step_is_disabled() {
        let config = default_flow();
        let TaskType::dynamodb_batch_write(write) = &config.flow.tasks[2] else {
            panic!("Expected a batch write task");
        };
        assert!(!write.enabled);
    }

    #[test]
    fn test_task_type_as_str() {
        assert_eq!(
            TaskType::dynamodb_list_tables(Default::default()).as_str(),
            "dynamodb_list_tables"
        );
        assert_eq!(
            TaskType::s3_fetch_object(Default::default()).as_str(),
            "s3_fetch_object"
        );
        assert_eq!(
            TaskType::dynamodb_query(Default::default()).as_str(),
            "dynamodb_query"
        );
    }

    #[test]
    fn test_flow_config_deserialize_yaml() {
        let yaml = r#"
            flow:
              name: "catalog-lab"
              tasks:
                - dynamodb_list_tables:
                    name: "list_tables"
                - s3_fetch_object:
                    bucket: "aws-dev-associate-dynamodb-test"
                    key: "lab-data/test-table-items.json"
                - dynamodb_batch_write:
                    enabled: false
                - dynamodb_query:
                    table_name: "test-table"
        "#;

        let config: FlowConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.flow.name, "catalog-lab");
        assert_eq!(config.flow.tasks.len(), 4);
        assert!(config.flow.aws.is_none());

        let TaskType::s3_fetch_object(fetch) = &config.flow.tasks[1] else {
            panic!("Expected a fetch task");
        };
        assert_eq!(fetch.bucket, "aws-dev-associate-dynamodb-test");
    }

    #[test]
    fn test_flow_config_deserialize_aws_options() {
        let yaml = r#"
            flow:
              name: "local"
              aws:
                region: "eu-central-1"
                endpoint_url: "http://127.0.0.1:8000"
              tasks: []
        "#;

        let config: FlowConfig = serde_yaml::from_str(yaml).unwrap();
        let aws = config.flow.aws.unwrap();
        assert_eq!(aws.region.as_deref(), Some("eu-central-1"));
        assert_eq!(aws.endpoint_url.as_deref(), Some("http://127.0.0.1:8000"));
    }

    #[test]
    fn test_flow_config_serialization_roundtrip() {
        let config = default_flow();
        let serialized = serde_json::to_string(&config).unwrap();
        let deserialized: FlowConfig = serde_json::from_str(&serialized).unwrap();
        assert_eq!(config, deserialized);
    }
}
