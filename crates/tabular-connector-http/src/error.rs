//! HTTP transport error types

use tabular_connector::ConnectorError;
use thiserror::Error;

/// Errors raised while talking to a connector endpoint
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API returned status {status}: {body}")]
    Status { status: u16, body: String },
}

impl HttpError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, HttpError::Status { status: 404, .. })
    }
}

impl From<HttpError> for ConnectorError {
    fn from(err: HttpError) -> Self {
        if err.is_not_found() {
            ConnectorError::not_found(err.to_string())
        } else {
            ConnectorError::remote(err.to_string())
        }
    }
}
