//! Typed view of a question loaded with the copy (or export) selection.
//!
//! Identifiers of child rows are read but never written back: replicators
//! always mint fresh ones.

use crate::error::BankResult;
use crate::model::{QuestionSource, QuestionStatus, QuestionType};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPayload {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(default)]
    pub status: QuestionStatus,
    #[serde(default)]
    pub source: QuestionSource,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub scratchpad: Option<String>,
    #[serde(default)]
    pub group_id: String,
    #[serde(default)]
    pub tags: Vec<TagPayload>,
    #[serde(default)]
    pub multiple_choice: Option<MultipleChoicePayload>,
    #[serde(default)]
    pub true_false: Option<TrueFalsePayload>,
    #[serde(default)]
    pub essay: Option<EssayPayload>,
    #[serde(default)]
    pub web: Option<WebPayload>,
    #[serde(default)]
    pub exact_match: Option<ExactMatchPayload>,
    #[serde(default)]
    pub code: Option<CodePayload>,
    #[serde(default)]
    pub database: Option<DatabasePayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TagPayload {
    pub label: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipleChoicePayload {
    #[serde(default = "default_grading_policy")]
    pub grading_policy: String,
    #[serde(default)]
    pub activate_student_comment: bool,
    #[serde(default)]
    pub student_comment_label: Option<String>,
    #[serde(default)]
    pub activate_selection_limit: bool,
    #[serde(default)]
    pub selection_limit: Option<i64>,
    #[serde(default)]
    pub options: Vec<OptionPayload>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionPayload {
    #[serde(default)]
    pub id: Option<String>,
    pub order: i64,
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrueFalsePayload {
    #[serde(default)]
    pub is_true: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EssayPayload {
    #[serde(default)]
    pub solution: Option<String>,
    #[serde(default)]
    pub template: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebPayload {
    #[serde(default)]
    pub template_html: Option<String>,
    #[serde(default)]
    pub template_css: Option<String>,
    #[serde(default)]
    pub template_js: Option<String>,
    #[serde(default)]
    pub solution_html: Option<String>,
    #[serde(default)]
    pub solution_css: Option<String>,
    #[serde(default)]
    pub solution_js: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExactMatchPayload {
    #[serde(default)]
    pub fields: Vec<ExactMatchFieldPayload>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactMatchFieldPayload {
    #[serde(default)]
    pub id: Option<String>,
    pub order: i64,
    pub statement: String,
    #[serde(default)]
    pub match_regex: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodePayload {
    pub language: String,
    pub sandbox_image: String,
    #[serde(default)]
    pub sandbox_before_all: Option<String>,
    #[serde(default)]
    pub template_files: Vec<CodeFilePayload>,
    #[serde(default)]
    pub solution_files: Vec<CodeFilePayload>,
    #[serde(default)]
    pub test_cases: Vec<TestCasePayload>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeFilePayload {
    #[serde(default)]
    pub id: Option<String>,
    pub order: i64,
    pub path: String,
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_permission")]
    pub student_permission: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCasePayload {
    #[serde(default)]
    pub id: Option<String>,
    pub index: i64,
    pub exec: String,
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub expected_output: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabasePayload {
    pub image: String,
    #[serde(default)]
    pub queries: Vec<DatabaseQueryPayload>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseQueryPayload {
    #[serde(default)]
    pub id: Option<String>,
    pub order: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default = "default_permission")]
    pub student_permission: String,
}

fn default_grading_policy() -> String {
    "GRADUAL_CREDIT".to_string()
}

fn default_permission() -> String {
    "UPDATE".to_string()
}

impl QuestionPayload {
    pub fn from_value(value: Value) -> BankResult<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Payload for a brand-new question: `data` holds the type-specific
    /// content, or a starter skeleton when absent.
    pub fn draft(question_type: QuestionType, data: Option<Value>) -> BankResult<Self> {
        let data = data
            .filter(|v| !v.is_null())
            .unwrap_or_else(|| starter_data(question_type));
        let mut value = json!({ "type": question_type.as_str() });
        value[question_type.as_str()] = data;
        Self::from_value(value)
    }

    pub fn tag_labels(&self) -> Vec<String> {
        self.tags.iter().map(|t| t.label.clone()).collect()
    }
}

fn starter_data(question_type: QuestionType) -> Value {
    match question_type {
        QuestionType::MultipleChoice => json!({
            "gradingPolicy": default_grading_policy(),
            "options": [
                { "order": 0, "text": "Option 1", "isCorrect": true },
                { "order": 1, "text": "Option 2", "isCorrect": false }
            ]
        }),
        QuestionType::TrueFalse => json!({ "isTrue": true }),
        QuestionType::Essay | QuestionType::Web => json!({}),
        QuestionType::ExactMatch => json!({ "fields": [] }),
        QuestionType::Code => json!({
            "language": "python",
            "sandboxImage": "python:3.12-slim",
            "templateFiles": [],
            "solutionFiles": [],
            "testCases": []
        }),
        QuestionType::Database => json!({ "image": "postgres:16", "queries": [] }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_type_has_a_usable_draft() {
        for t in QuestionType::ALL {
            let p = QuestionPayload::draft(t, None).expect("draft");
            assert_eq!(p.question_type, t);
            let populated = [
                p.multiple_choice.is_some(),
                p.true_false.is_some(),
                p.essay.is_some(),
                p.web.is_some(),
                p.exact_match.is_some(),
                p.code.is_some(),
                p.database.is_some(),
            ];
            assert_eq!(populated.iter().filter(|b| **b).count(), 1, "{t}");
        }
    }

    #[test]
    fn null_relation_deserializes_as_absent() {
        let p = QuestionPayload::from_value(json!({
            "id": "q1",
            "type": "multipleChoice",
            "title": "T",
            "multipleChoice": null,
            "tags": [{ "label": "a" }]
        }))
        .expect("payload");
        assert!(p.multiple_choice.is_none());
        assert_eq!(p.tag_labels(), vec!["a".to_string()]);
    }

    #[test]
    fn draft_rejects_malformed_data() {
        let e = QuestionPayload::draft(
            QuestionType::ExactMatch,
            Some(json!({ "fields": [{ "statement": "no order" }] })),
        );
        assert!(e.is_err());
    }
}
