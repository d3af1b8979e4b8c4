//! RPC error types and their HTTP mapping.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use plotline_market::{ErrorKind, MarketError};
use plotline_types::TypesError;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error(transparent)]
    Market(#[from] MarketError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("server error: {0}")]
    Server(String),
}

impl From<TypesError> for RpcError {
    fn from(e: TypesError) -> Self {
        RpcError::InvalidRequest(e.to_string())
    }
}

impl From<JsonRejection> for RpcError {
    fn from(rejection: JsonRejection) -> Self {
        RpcError::InvalidRequest(rejection.body_text())
    }
}

impl From<PathRejection> for RpcError {
    fn from(rejection: PathRejection) -> Self {
        RpcError::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for RpcError {
    fn from(rejection: QueryRejection) -> Self {
        RpcError::InvalidRequest(rejection.body_text())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    kind: &'static str,
}

impl RpcError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RpcError::Market(e) => e.kind(),
            RpcError::InvalidRequest(_) => ErrorKind::Validation,
            RpcError::Server(_) => ErrorKind::Internal,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::State => StatusCode::CONFLICT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error: self.to_string(),
            kind: self.kind().as_str(),
        };
        (status, Json(body)).into_response()
    }
}
