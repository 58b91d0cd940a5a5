use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] draftsync_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Owner id is required: pass --owner or set DRAFTSYNC_OWNER")]
    MissingOwner,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Draft sync is not configured. Set api_base_url in the config file or DRAFTSYNC_API_BASE_URL.")]
    RemoteNotConfigured,
}
