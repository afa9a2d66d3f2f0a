//! Application lifecycle: load the flow definition, build it, run it.

use crate::config::{default_flow, FlowConfig};
use config::{Config, File, FileFormat};
use std::path::PathBuf;
use std::sync::Arc;
use stockflow_core::task::runner::Runner;
use tracing::info;

/// Errors that can occur during application execution.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Input/output operation failed.
    #[error("IO operation failed on path {path}: {source}")]
    IO {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Configuration parsing or deserialization error.
    #[error("Failed to parse configuration: {source}")]
    Config {
        #[source]
        source: config::ConfigError,
    },
    /// Flow build or execution error.
    #[error(transparent)]
    Flow(#[from] super::flow::Error),
}

/// Main application that loads the flow definition and runs it.
pub struct App {
    /// Path to a flow configuration file. Without one the built-in default
    /// flow runs with every task on its defaults.
    pub config_path: Option<PathBuf>,
}

impl App {
    fn load_flow_config(&self) -> Result<FlowConfig, Error> {
        let Some(path) = &self.config_path else {
            return Ok(default_flow());
        };

        info!("Loading flow: {:?}", path);
        let contents = std::fs::read_to_string(path).map_err(|source| Error::IO {
            path: path.clone(),
            source,
        })?;

        // Determine file format from extension.
        let file_format = match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            _ => FileFormat::Json,
        };

        let config = Config::builder()
            .add_source(File::from_str(&contents, file_format))
            .build()
            .map_err(|source| Error::Config { source })?;
        config
            .try_deserialize::<FlowConfig>()
            .map_err(|source| Error::Config { source })
    }
}

impl Runner for App {
    type Error = Error;

    #[tracing::instrument(skip(self), name = "app")]
    async fn run(self) -> Result<(), Error> {
        let flow_config = self.load_flow_config()?;

        let flow = super::flow::FlowBuilder::new()
            .config(Arc::new(flow_config))
            .build()?;
        flow.run().await?;

        Ok(())
    }
}
