use crate::api_client::error::ApiClientError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RequestError {
    /// Caller bug, e.g. an update for a record without an id. Never suppressed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Action name that is neither `create` nor `update`. Never suppressed.
    #[error("unsupported api action: {0}")]
    UnsupportedAction(String),

    #[error(transparent)]
    Transport(#[from] ApiClientError),

    #[error("malformed json response from {url}: {source}")]
    MalformedBody {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl RequestError {
    /// Whether the executor may turn this failure into a synthetic result.
    pub fn is_suppressible(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::MalformedBody { .. })
    }
}
