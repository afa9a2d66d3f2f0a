//! Configuration structures for S3 tasks.

use serde::{Deserialize, Serialize};

/// Bucket holding the catalog seed document.
pub const DEFAULT_BUCKET: &str = "aws-dev-associate-dynamodb-test";
/// Object key of the catalog seed document.
pub const DEFAULT_OBJECT_KEY: &str = "lab-data/test-table-items.json";

/// Object fetch task configuration.
#[derive(PartialEq, Clone, Debug, Deserialize, Serialize)]
pub struct FetchObject {
    /// The unique name / identifier of the task.
    #[serde(default = "default_fetch_object_name")]
    pub name: String,
    /// Bucket to fetch from.
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Key of the object to fetch.
    #[serde(default = "default_object_key")]
    pub key: String,
}

impl Default for FetchObject {
    fn default() -> Self {
        Self {
            name: default_fetch_object_name(),
            bucket: default_bucket(),
            key: default_object_key(),
        }
    }
}

fn default_fetch_object_name() -> String {
    "fetch_object".to_string()
}

fn default_bucket() -> String {
    DEFAULT_BUCKET.to_string()
}

fn default_object_key() -> String {
    DEFAULT_OBJECT_KEY.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_object_defaults() {
        let config = FetchObject::default();
        assert_eq!(config.name, "fetch_object");
        assert_eq!(config.bucket, DEFAULT_BUCKET);
        assert_eq!(config.key, DEFAULT_OBJECT_KEY);
    }

    #[test]
    fn test_fetch_object_deserialize_overrides_bucket() {
        let yaml = r#"
            bucket: "other-bucket"
        "#;
        let config: FetchObject = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.bucket, "other-bucket");
        assert_eq!(config.key, DEFAULT_OBJECT_KEY);
    }
}
