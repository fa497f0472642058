use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid authentication")]
    InvalidAuthentication,

    #[error("permission denied")]
    PermissionDenied,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("unknown reference: {0}")]
    UnknownReference(String),

    #[error("index corrupt: {0}")]
    IndexCorrupt(String),

    #[error("requested range {start}-{end} not satisfiable for {size} byte file")]
    RangeUnsatisfiable { start: u64, end: u64, size: u64 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct HtsgetError {
    pub htsget: HtsgetErrorBody,
}

#[derive(Debug, Serialize)]
pub struct HtsgetErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl Error {
    pub fn error_type(&self) -> &'static str {
        match self {
            Error::InvalidAuthentication => "InvalidAuthentication",
            Error::PermissionDenied => "PermissionDenied",
            Error::NotFound(_) => "NotFound",
            Error::UnsupportedFormat(_) => "UnsupportedFormat",
            Error::InvalidInput(_) => "InvalidInput",
            Error::UnsupportedMediaType(_) => "UnsupportedMediaType",
            Error::UnknownReference(_) => "UnknownReference",
            Error::IndexCorrupt(_) => "IndexCorrupt",
            Error::RangeUnsatisfiable { .. } => "RangeUnsatisfiable",
            Error::Io(_) | Error::Internal(_) => "InternalError",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidAuthentication => StatusCode::UNAUTHORIZED,
            Error::PermissionDenied => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::UnsupportedFormat(_) => StatusCode::BAD_REQUEST,
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Error::UnknownReference(_) => StatusCode::NOT_FOUND,
            Error::IndexCorrupt(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::RangeUnsatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            Error::Io(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if self.status_code().is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }

        let content_range = match &self {
            Error::RangeUnsatisfiable { size, .. } => {
                HeaderValue::from_str(&format!("bytes */{}", size)).ok()
            }
            _ => None,
        };

        let body = HtsgetError {
            htsget: HtsgetErrorBody {
                error: self.error_type(),
                message: self.to_string(),
            },
        };
        let mut response = (self.status_code(), axum::Json(body)).into_response();
        if let Some(value) = content_range {
            response.headers_mut().insert(header::CONTENT_RANGE, value);
        }
        response
    }
}
