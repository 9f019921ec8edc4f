use thiserror::Error;

use crate::{config::SettingsError, transport::TransportError};

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("no result is available; the last submission did not succeed")]
    NoResult,
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("invalid endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}
