//! Configuration structures for DynamoDB tasks.
//!
//! The catalog lab's fixed table, index, and filter values live here as named
//! defaults so a flow definition only has to override what it changes.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Table targeted by the conditional query.
pub const DEFAULT_TABLE_NAME: &str = "test-table";
/// Secondary index backing the category/price condition.
pub const DEFAULT_QUERY_INDEX: &str = "ProductCategory-Price-index";
/// Key condition with placeholder tokens bound from the expression values.
pub const DEFAULT_KEY_CONDITION: &str = "ProductCategory = :c AND Price <= :p";

/// Table listing task configuration.
#[derive(PartialEq, Clone, Debug, Deserialize, Serialize)]
pub struct ListTables {
    /// The unique name / identifier of the task.
    #[serde(default = "default_list_tables_name")]
    pub name: String,
}

impl Default for ListTables {
    fn default() -> Self {
        Self {
            name: default_list_tables_name(),
        }
    }
}

fn default_list_tables_name() -> String {
    "list_tables".to_string()
}

/// Batch write task configuration.
#[derive(PartialEq, Clone, Debug, Deserialize, Serialize)]
pub struct BatchWrite {
    /// The unique name / identifier of the task.
    #[serde(default = "default_batch_write_name")]
    pub name: String,
    /// Whether the write step actually runs. Off by default: the step then
    /// forwards its input untouched so later tasks still fire.
    #[serde(default)]
    pub enabled: bool,
}

impl Default for BatchWrite {
    fn default() -> Self {
        Self {
            name: default_batch_write_name(),
            enabled: false,
        }
    }
}

fn default_batch_write_name() -> String {
    "batch_write".to_string()
}

/// Conditional query task configuration.
#[derive(PartialEq, Clone, Debug, Deserialize, Serialize)]
pub struct Query {
    /// The unique name / identifier of the task.
    #[serde(default = "default_query_name")]
    pub name: String,
    /// Table to query.
    #[serde(default = "default_table_name")]
    pub table_name: String,
    /// Optional secondary index to query against.
    #[serde(default = "default_index_name")]
    pub index_name: Option<String>,
    /// Key condition restricting which rows match.
    #[serde(default = "default_key_condition")]
    pub key_condition_expression: String,
    /// Placeholder token to tagged value, e.g. `":c" -> {"S": "Bike"}`.
    #[serde(default = "default_expression_values")]
    pub expression_attribute_values: Map<String, Value>,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            name: default_query_name(),
            table_name: default_table_name(),
            index_name: default_index_name(),
            key_condition_expression: default_key_condition(),
            expression_attribute_values: default_expression_values(),
        }
    }
}

fn default_query_name() -> String {
    "query".to_string()
}

fn default_table_name() -> String {
    DEFAULT_TABLE_NAME.to_string()
}

fn default_index_name() -> Option<String> {
    Some(DEFAULT_QUERY_INDEX.to_string())
}

fn default_key_condition() -> String {
    DEFAULT_KEY_CONDITION.to_string()
}

/// The lab's fixed filter: category "Bike", price at most 300.
pub fn default_expression_values() -> Map<String, Value> {
    let mut values = Map::new();
    values.insert(":c".to_string(), json!({"S": "Bike"}));
    values.insert(":p".to_string(), json!({"N": "300"}));
    values
}
