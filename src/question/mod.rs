pub mod authoring;
pub mod copy;
pub mod payload;
pub mod replicate;

use crate::model::{QuestionSource, QuestionStatus, QuestionType};
use serde::Serialize;

pub use copy::{copy_question, CopyOptions};
pub use payload::QuestionPayload;
pub use replicate::ReplicatorRegistry;

/// A question row, without its type-specific children.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub status: QuestionStatus,
    pub source: QuestionSource,
    pub title: String,
    pub content: String,
    pub scratchpad: Option<String>,
    pub group_id: String,
    pub created_at: String,
    pub updated_at: String,
}
