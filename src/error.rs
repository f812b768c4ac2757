use serde_json::{json, Value};

/// Errors surfaced by the class services. Every variant is recovered at the
/// request boundary and turned into an error response.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("class {0} already exists")]
    DuplicateName(String),

    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("User {username}/{email} already exists")]
    DuplicateIdentity { username: String, email: String },

    #[error("Error creating {username}: {reason}")]
    IdentityCreationFailed { username: String, reason: String },

    #[error("{0}")]
    Validation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("class deletion stopped at {step}: {message}")]
    CascadeFailed {
        step: &'static str,
        completed: Vec<&'static str>,
        message: String,
    },

    #[error("content store error: {0}")]
    Content(String),

    #[error(transparent)]
    Db(#[from] rusqlite::Error),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        ServiceError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::DuplicateName(_) => "duplicate_name",
            ServiceError::NotFound { .. } => "not_found",
            ServiceError::DuplicateIdentity { .. } => "duplicate_identity",
            ServiceError::IdentityCreationFailed { .. } => "identity_creation_failed",
            ServiceError::Validation(_) => "bad_params",
            ServiceError::Unauthorized(_) => "unauthorized",
            ServiceError::CascadeFailed { .. } => "cascade_failed",
            ServiceError::Content(_) => "content_store_failed",
            ServiceError::Db(_) => "db_query_failed",
            ServiceError::Store(_) => "store_failed",
        }
    }

    pub fn details(&self) -> Option<Value> {
        match self {
            ServiceError::NotFound { entity, key } => Some(json!({ "entity": entity, "key": key })),
            ServiceError::DuplicateName(name) => Some(json!({ "name": name })),
            ServiceError::CascadeFailed {
                step, completed, ..
            } => Some(json!({ "step": step, "completedSteps": completed })),
            _ => None,
        }
    }

    /// True when a rusqlite error is a UNIQUE/PRIMARY KEY violation.
    pub fn is_constraint_violation(e: &rusqlite::Error) -> bool {
        matches!(
            e,
            rusqlite::Error::SqliteFailure(f, _)
                if f.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
