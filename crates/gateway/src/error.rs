use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("No file part in the request")]
    NoFilePart,
    #[error("No selected file")]
    NoSelectedFile,
    #[error("Invalid file type")]
    InvalidFileType,
    #[error("Malformed multipart request")]
    Multipart(String),
    #[error("No objects detected in the image.")]
    NoObjectsDetected,
    #[error("No results returned by model.")]
    NoResults,
    #[error("Error parsing model results")]
    ResultParsing(String),
    #[error("Error processing the image")]
    Processing(String),
    #[error("An error occurred")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NoFilePart
            | ApiError::NoSelectedFile
            | ApiError::InvalidFileType
            | ApiError::Multipart(_)
            | ApiError::NoObjectsDetected => StatusCode::BAD_REQUEST,
            ApiError::NoResults
            | ApiError::ResultParsing(_)
            | ApiError::Processing(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Label used for the `outcome` metric attribute.
    pub fn outcome(&self) -> &'static str {
        match self {
            ApiError::NoFilePart
            | ApiError::NoSelectedFile
            | ApiError::InvalidFileType
            | ApiError::Multipart(_) => "invalid_request",
            ApiError::NoObjectsDetected => "no_detections",
            ApiError::NoResults => "no_results",
            ApiError::ResultParsing(_) => "parse_error",
            ApiError::Processing(_) | ApiError::Internal(_) => "error",
        }
    }

    fn detail(&self) -> Option<String> {
        match self {
            ApiError::Multipart(detail)
            | ApiError::ResultParsing(detail)
            | ApiError::Processing(detail)
            | ApiError::Internal(detail) => Some(detail.clone()),
            _ => None,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            message: self.to_string(),
            error: self.detail(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Processing(format!("{:#}", err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self.detail(), "{}", self);
        } else {
            tracing::info!("{}", self);
        }

        (status, Json(self.body())).into_response()
    }
}
