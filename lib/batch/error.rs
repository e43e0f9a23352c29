use crate::request::error::RequestError;
use thiserror::Error;
use tokio::task::JoinError;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("{action} batch aborted: {source}")]
    Request {
        action: String,
        #[source]
        source: RequestError,
    },

    #[error("Task join error: {0}")]
    TaskJoinError(#[from] JoinError),
}
