use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigLoaderError {
    #[error("failed to load configuration: {0}")]
    Build(#[from] config::ConfigError),

    #[error("failed to resolve {key}: cannot read {}: {source}", path.display())]
    FileRef {
        key: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to deserialize configuration: {0}")]
    Deserialize(#[source] config::ConfigError),
}
