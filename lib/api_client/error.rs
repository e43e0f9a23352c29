use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiClientError {
    #[error("connection error: {0}")]
    ConnectError(String),
    #[error(transparent)]
    RequestError(#[from] reqwest::Error),
}
