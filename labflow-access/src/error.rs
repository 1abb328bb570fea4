use thiserror::Error;

/// Errors raised synchronously to a mutation or fetch caller. Every variant
/// except `Database` names the request field it concerns.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("{field}: {message}")]
    NotAuthorized { field: String, message: String },

    /// Absent, or present but not visible to the acting user.
    #[error("{field}: {message}")]
    NotFound { field: String, message: String },

    #[error("{field}: {message}")]
    PermissionDenied { field: String, message: String },

    #[error("{field}: {message}")]
    InvariantViolation { field: String, message: String },

    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),
}

impl AccessError {
    pub fn not_authorized() -> Self {
        AccessError::NotAuthorized {
            field: "user".into(),
            message: "You are not authorized to perform this action".into(),
        }
    }

    pub fn not_found(field: &str) -> Self {
        AccessError::NotFound {
            field: field.into(),
            message: format!("{} does not exist", capitalize(field)),
        }
    }

    pub fn permission_denied(field: &str, message: impl Into<String>) -> Self {
        AccessError::PermissionDenied {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn invariant(field: &str, message: impl Into<String>) -> Self {
        AccessError::InvariantViolation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn field(&self) -> Option<&str> {
        match self {
            AccessError::NotAuthorized { field, .. }
            | AccessError::NotFound { field, .. }
            | AccessError::PermissionDenied { field, .. }
            | AccessError::InvariantViolation { field, .. } => Some(field),
            AccessError::Database(_) => None,
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
