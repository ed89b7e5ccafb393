use geo_layers_lib::EngineError;
use std::path::PathBuf;

/// Errors of the simulator binary
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize summary: {0}")]
    Summary(#[from] serde_json::Error),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Failed to start async runtime: {0}")]
    Runtime(std::io::Error),
}
