//! Error types for the Bookshelf catalog

use std::borrow::Cow;
use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Catalog entity kinds, used to qualify lookups that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Entity {
    Author,
    Title,
    Relation,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Author => write!(f, "author"),
            Entity::Title => write!(f, "title"),
            Entity::Relation => write!(f, "relation"),
        }
    }
}

/// Error codes exposed to API callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    BadValue = 1,
    NoSuchData = 2,
    Conflict = 3,
    IdsExhausted = 4,
    StorageUnavailable = 5,
    StorageFailure = 6,
}

/// Main catalog error type
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Validation error on `{field}`: {message}")]
    Validation {
        field: Cow<'static, str>,
        message: String,
    },

    #[error("{entity} {key} not found")]
    NotFound { entity: Entity, key: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Could not allocate a free {entity} id after {attempts} attempts")]
    IdsExhausted { entity: Entity, attempts: u32 },

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl CatalogError {
    pub fn validation(field: impl Into<Cow<'static, str>>, message: impl Into<String>) -> Self {
        CatalogError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(entity: Entity, key: impl fmt::Display) -> Self {
        CatalogError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Write conflicts are the only errors a transaction scope may be replayed for.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CatalogError::Conflict(_))
    }

    fn code(&self) -> ErrorCode {
        match self {
            CatalogError::Validation { .. } => ErrorCode::BadValue,
            CatalogError::NotFound { .. } => ErrorCode::NoSuchData,
            CatalogError::Conflict(_) => ErrorCode::Conflict,
            CatalogError::IdsExhausted { .. } => ErrorCode::IdsExhausted,
            CatalogError::StorageUnavailable(_) => ErrorCode::StorageUnavailable,
            CatalogError::Storage(_) => ErrorCode::StorageFailure,
        }
    }
}

impl From<validator::ValidationErrors> for CatalogError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let (field, message) = errors
            .field_errors()
            .into_iter()
            .next()
            .map(|(field, errs)| {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref())
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "invalid value".to_string());
                let field: Cow<'static, str> = field.into();
                (field, message)
            })
            .unwrap_or((Cow::Borrowed("request"), "invalid request".to_string()));
        CatalogError::Validation { field, message }
    }
}

impl From<sqlx::Error> for CatalogError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) => match db.code().as_deref() {
                // unique_violation, serialization_failure, deadlock_detected
                Some("23505") | Some("40001") | Some("40P01") => {
                    CatalogError::Conflict(db.message().to_string())
                }
                // foreign_key_violation: a referenced row vanished under a concurrent scope
                Some("23503") => CatalogError::Conflict(db.message().to_string()),
                // string_data_right_truncation, numeric_value_out_of_range,
                // not_null_violation, check_violation: the value itself is bad
                Some("22001") | Some("22003") | Some("23502") | Some("23514") => {
                    let field = db
                        .try_downcast_ref::<sqlx::postgres::PgDatabaseError>()
                        .and_then(|pg| pg.column())
                        .map(|column| Cow::Owned(column.to_string()))
                        .unwrap_or(Cow::Borrowed("request"));
                    CatalogError::Validation {
                        field,
                        message: db.message().to_string(),
                    }
                }
                _ => CatalogError::Storage(err.to_string()),
            },
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => CatalogError::StorageUnavailable(err.to_string()),
            _ => CatalogError::Storage(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for CatalogError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        CatalogError::Storage(format!("migration failed: {}", err))
    }
}

impl From<mongodb::error::Error> for CatalogError {
    fn from(err: mongodb::error::Error) -> Self {
        use mongodb::error::{ErrorKind, WriteFailure, TRANSIENT_TRANSACTION_ERROR};

        // DuplicateKey, WriteConflict
        const RETRYABLE_CODES: [i32; 2] = [11000, 112];

        if err.contains_label(TRANSIENT_TRANSACTION_ERROR) {
            return CatalogError::Conflict(err.to_string());
        }

        match err.kind.as_ref() {
            ErrorKind::Write(WriteFailure::WriteError(e)) if RETRYABLE_CODES.contains(&e.code) => {
                CatalogError::Conflict(err.to_string())
            }
            ErrorKind::Command(e) if RETRYABLE_CODES.contains(&e.code) => {
                CatalogError::Conflict(err.to_string())
            }
            ErrorKind::ServerSelection { .. }
            | ErrorKind::Io(_)
            | ErrorKind::ConnectionPoolCleared { .. } => {
                CatalogError::StorageUnavailable(err.to_string())
            }
            _ => CatalogError::Storage(err.to_string()),
        }
    }
}

impl From<mongodb::bson::ser::Error> for CatalogError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        CatalogError::Storage(format!("document encoding failed: {}", err))
    }
}

impl From<mongodb::bson::de::Error> for CatalogError {
    fn from(err: mongodb::bson::de::Error) -> Self {
        CatalogError::Storage(format!("document decoding failed: {}", err))
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, message, field) = match &self {
            CatalogError::Validation { field, message } => {
                (StatusCode::BAD_REQUEST, message.clone(), Some(field.to_string()))
            }
            CatalogError::NotFound { .. } => (StatusCode::NOT_FOUND, self.to_string(), None),
            CatalogError::Conflict(_) | CatalogError::IdsExhausted { .. } => {
                (StatusCode::CONFLICT, self.to_string(), None)
            }
            CatalogError::StorageUnavailable(msg) => {
                tracing::error!("Storage unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Storage unavailable".to_string(),
                    None,
                )
            }
            CatalogError::Storage(msg) => {
                tracing::error!("Storage error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Storage error".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
            field,
        });

        (status, body).into_response()
    }
}

/// Result type alias for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;
