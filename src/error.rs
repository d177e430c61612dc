//! Errors surfaced by the service layer.
//!
//! Every variant is recoverable at the request boundary: the IPC router
//! turns it into an error envelope and the HTTP server into a status code
//! plus JSON body.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Username already exists.")]
    DuplicateUsername,

    #[error("Passwords do not match.")]
    PasswordMismatch,

    /// One message per violated password rule.
    #[error("{}", .0.join(" "))]
    WeakPassword(Vec<String>),

    #[error("missing required field: {0}")]
    MissingRequiredField(&'static str),

    /// A profile column with a uniqueness constraint is already taken.
    #[error("{0} is already registered")]
    DuplicateField(&'static str),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    /// An id supplied by the caller points at nothing (e.g. a faculty id on a
    /// new subject).
    #[error("{entity} not found: {id}")]
    ReferencedEntityNotFound { entity: &'static str, id: String },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Invalid username or password.")]
    InvalidCredentials,

    #[error("login required")]
    Unauthenticated,

    #[error("not permitted for role {0}")]
    Forbidden(String),

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
}

impl ServiceError {
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::DuplicateUsername => "duplicate_username",
            ServiceError::PasswordMismatch => "password_mismatch",
            ServiceError::WeakPassword(_) => "weak_password",
            ServiceError::MissingRequiredField(_) => "missing_field",
            ServiceError::DuplicateField(_) => "duplicate_field",
            ServiceError::InvalidValue { .. } => "bad_params",
            ServiceError::ReferencedEntityNotFound { .. } => "referenced_not_found",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::InvalidCredentials => "invalid_credentials",
            ServiceError::Unauthenticated => "unauthenticated",
            ServiceError::Forbidden(_) => "forbidden",
            ServiceError::Hashing(_) => "hash_failed",
            ServiceError::Db(_) => "db_query_failed",
        }
    }

    /// Extra structured context for the error envelope, when there is any.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            ServiceError::WeakPassword(reasons) => Some(serde_json::json!({ "reasons": reasons })),
            ServiceError::MissingRequiredField(field) | ServiceError::DuplicateField(field) => {
                Some(serde_json::json!({ "field": field }))
            }
            ServiceError::InvalidValue { field, .. } => Some(serde_json::json!({ "field": field })),
            ServiceError::ReferencedEntityNotFound { entity, id } => {
                Some(serde_json::json!({ "entity": entity, "id": id }))
            }
            _ => None,
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
