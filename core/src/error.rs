use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HolderError {
    #[error("Validation failed: {}", describe_fields(.fields))]
    Validation { fields: BTreeMap<String, String> },

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{message}")]
    Conflict { field: &'static str, message: String },

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Role '{role}' may not perform '{action}'")]
    Forbidden { role: String, action: &'static str },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type HolderResult<T> = Result<T, HolderError>;

impl HolderError {
    /// Single-field validation failure.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(field.into(), message.into());
        Self::Validation { fields }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }

    pub fn duplicate_ci(ci: &str) -> Self {
        Self::Conflict {
            field: "ci",
            message: format!("An insurance holder with CI '{ci}' already exists"),
        }
    }

    /// HTTP status class for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } | Self::Conflict { .. } => 400,
            Self::Unauthenticated => 401,
            Self::Forbidden { .. } => 403,
            Self::NotFound { .. } => 404,
            Self::Database(_) | Self::Serialization(_) | Self::Pool(_) | Self::Other(_) => 500,
        }
    }

    /// True for failures whose detail must stay server-side.
    pub fn is_internal(&self) -> bool {
        self.status_code() >= 500
    }

    /// Field-level messages, when the error carries any.
    pub fn field_messages(&self) -> Option<BTreeMap<String, String>> {
        match self {
            Self::Validation { fields } => Some(fields.clone()),
            Self::Conflict { field, message } => {
                let mut fields = BTreeMap::new();
                fields.insert((*field).to_string(), message.clone());
                Some(fields)
            }
            _ => None,
        }
    }
}

fn describe_fields(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{k}: {v}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// True when a rusqlite error is a UNIQUE/constraint violation.
pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
