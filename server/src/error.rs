use crate::store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::{gate::GrantError, schema::SchemaError};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("roster layout does not match configuration: {0}")]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Grant(#[from] GrantError),
    #[error("sign in as an admin first")]
    Unauthorized,
    #[error("audit log append failed, {cell} was restored to {value}: {source}")]
    AuditRolledBack {
        cell: String,
        value: u64,
        source: StoreError,
    },
    #[error("audit log append failed and {cell} could not be restored to {value}; the roster now disagrees with the log: {source}")]
    AuditDiverged {
        cell: String,
        value: u64,
        source: StoreError,
    },
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Store(_) => "STORE_UNAVAILABLE",
            AppError::Schema(_) => "SCHEMA_MISMATCH",
            AppError::Grant(GrantError::StudentNotFound(_) | GrantError::ActivityNotFound(_)) => {
                "NOT_FOUND"
            }
            AppError::Grant(GrantError::AmbiguousStudent { .. } | GrantError::AmbiguousActivity { .. }) => {
                "AMBIGUOUS"
            }
            AppError::Grant(_) => "VALIDATION_ERROR",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::AuditRolledBack { .. } => "AUDIT_FAILED",
            AppError::AuditDiverged { .. } => "AUDIT_DIVERGED",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Store(_) | AppError::AuditRolledBack { .. } => StatusCode::BAD_GATEWAY,
            AppError::Schema(_) | AppError::AuditDiverged { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Grant(GrantError::StudentNotFound(_) | GrantError::ActivityNotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            AppError::Grant(GrantError::AmbiguousStudent { .. } | GrantError::AmbiguousActivity { .. }) => {
                StatusCode::CONFLICT
            }
            AppError::Grant(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{}", self);
        }
        let body = ErrorBody {
            error: self.code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
