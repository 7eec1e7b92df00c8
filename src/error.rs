use crate::model::QuestionType;

/// Failures raised by the question bank core.
///
/// Every variant aborts the enclosing transaction; nothing here is retried.
#[derive(Debug, thiserror::Error)]
pub enum BankError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The payload handed to a replicator lacks its type-specific relation.
    #[error("source question {question_id} has no {relation} data")]
    MissingRelation {
        question_id: String,
        relation: &'static str,
    },

    #[error("no replicator registered for question type {0}")]
    UnregisteredType(QuestionType),

    #[error("replicator for question type {0} registered twice")]
    DuplicateReplicator(QuestionType),

    #[error("unknown field {field} on {entity}")]
    UnknownField { entity: &'static str, field: String },

    #[error("malformed question payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("cannot {action} evaluation while {state}")]
    BadTransition { action: String, state: String },

    #[error("{0}")]
    InvalidInput(String),

    #[error("archive failed: {0}")]
    Archive(String),

    #[error(transparent)]
    Sql(#[from] rusqlite::Error),
}

impl BankError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Stable error code reported over IPC.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::MissingRelation { .. } => "invalid_source",
            Self::UnregisteredType(_) | Self::DuplicateReplicator(_) => "unregistered_type",
            Self::UnknownField { .. } => "bad_select",
            Self::MalformedPayload(_) => "bad_payload",
            Self::BadTransition { .. } => "bad_transition",
            Self::InvalidInput(_) => "bad_params",
            Self::Archive(_) => "archive_failed",
            Self::Sql(_) => "db_query_failed",
        }
    }
}

pub type BankResult<T> = Result<T, BankError>;
