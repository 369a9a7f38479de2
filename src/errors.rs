// errors.rs
use arrow_schema::ArrowError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use parquet::errors::ParquetError;
use thiserror::Error;
use tracing::error;

/// Failure of one batch invocation. Every variant carries the stage it came from.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("transform: {0}")]
    Transform(String),
    #[error("encoding: {0}")]
    Encoding(#[from] ArrowError),
    #[error("serialization: {0}")]
    Serialization(#[from] ParquetError),
    #[error("serialization: schema document: {0}")]
    Metadata(#[from] serde_json::Error),
    #[error("upload: {0:#}")]
    Upload(anyhow::Error),
}

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApplicationError {
    fn into_response(self) -> Response {
        match self {
            ApplicationError::InvalidPayload(message) => {
                (StatusCode::BAD_REQUEST, message).into_response()
            }
            error => {
                error!("Error: {:?}", error);

                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
                    .into_response()
            }
        }
    }
}

#[derive(Debug)]
pub struct ServerError(pub anyhow::Error);

impl<E> From<E> for ServerError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        ServerError(err.into())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        error!("Error: {:?}", self.0);

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error".to_string(),
        )
            .into_response()
    }
}
