use thiserror::Error;

use super::ImportState;
use crate::api_client::error::ApiClientError;
use crate::batch::error::BatchError;
use crate::data_source::DataSourceError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Api status check failed: {0}")]
    Status(#[source] ApiClientError),

    #[error("Api client error: {0}")]
    ApiClient(#[from] ApiClientError),

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error("Data source error: {0}")]
    DataSource(#[from] DataSourceError),

    #[error("cannot {step} an import in state {state:?}")]
    OutOfOrder {
        step: &'static str,
        state: ImportState,
    },
}
