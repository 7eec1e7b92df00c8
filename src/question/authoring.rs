use super::payload::QuestionPayload;
use super::replicate::{BaseFields, ReplicatorRegistry};
use super::Question;
use crate::db::now_ts;
use crate::error::{BankError, BankResult};
use crate::model::{QuestionSource, QuestionStatus, QuestionType};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub group_id: String,
    pub question_type: QuestionType,
    pub title: String,
    pub content: String,
    pub scratchpad: Option<String>,
    pub tags: Vec<String>,
    /// Type-specific content in payload shape.
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Default)]
pub struct QuestionUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub scratchpad: Option<Option<String>>,
    pub status: Option<QuestionStatus>,
    pub tags: Option<Vec<String>>,
}

pub fn ensure_group_exists(conn: &Connection, group_id: &str) -> BankResult<()> {
    let exists: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM bank_groups WHERE id = ?",
            [group_id],
            |r| r.get(0),
        )
        .optional()?;
    match exists {
        Some(_) => Ok(()),
        None => Err(BankError::not_found("group", group_id)),
    }
}

/// New bank questions go through the same replicator as copies, seeded from
/// a draft payload.
pub fn create_question(
    tx: &Transaction<'_>,
    registry: &ReplicatorRegistry,
    new: &NewQuestion,
) -> BankResult<Question> {
    ensure_group_exists(tx, &new.group_id)?;
    let draft = QuestionPayload::draft(new.question_type, new.data.clone())?;
    let base = BaseFields {
        group_id: new.group_id.clone(),
        title: new.title.clone(),
        content: new.content.clone(),
        scratchpad: new.scratchpad.clone(),
        source: QuestionSource::Bank,
        status: QuestionStatus::Active,
        tags: new.tags.clone(),
    };
    registry.get(new.question_type)?.replicate(tx, &draft, &base)
}

pub fn update_question(
    tx: &Transaction<'_>,
    question_id: &str,
    update: &QuestionUpdate,
) -> BankResult<()> {
    let current = tx
        .query_row(
            "SELECT title, content, scratchpad, status FROM questions WHERE id = ?",
            [question_id],
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, Option<String>>(2)?,
                    r.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?
        .ok_or_else(|| BankError::not_found("question", question_id))?;

    let title = update.title.clone().unwrap_or(current.0);
    let content = update.content.clone().unwrap_or(current.1);
    let scratchpad = update.scratchpad.clone().unwrap_or(current.2);
    let status = update
        .status
        .map(|s| s.as_str().to_string())
        .unwrap_or(current.3);

    tx.execute(
        "UPDATE questions SET title = ?, content = ?, scratchpad = ?, status = ?, updated_at = ?
         WHERE id = ?",
        params![title, content, scratchpad, status, now_ts(), question_id],
    )?;

    if let Some(tags) = &update.tags {
        tx.execute(
            "DELETE FROM question_tags WHERE question_id = ?",
            [question_id],
        )?;
        let mut stmt =
            tx.prepare("INSERT OR IGNORE INTO question_tags(question_id, label) VALUES(?, ?)")?;
        for label in tags {
            stmt.execute(params![question_id, label])?;
        }
    }
    Ok(())
}

/// Child tables first: the schema has no ON DELETE CASCADE.
const DELETE_ORDER: &[&str] = &[
    "DELETE FROM student_answer_gradings WHERE student_answer_id IN (
       SELECT id FROM student_answers WHERE question_id = ?1)",
    "DELETE FROM student_answer_items WHERE student_answer_id IN (
       SELECT id FROM student_answers WHERE question_id = ?1)",
    "DELETE FROM student_answers WHERE question_id = ?1",
    "DELETE FROM multiple_choice_options WHERE question_id = ?1",
    "DELETE FROM multiple_choice WHERE question_id = ?1",
    "DELETE FROM true_false WHERE question_id = ?1",
    "DELETE FROM essay WHERE question_id = ?1",
    "DELETE FROM web WHERE question_id = ?1",
    "DELETE FROM exact_match_fields WHERE question_id = ?1",
    "DELETE FROM exact_match WHERE question_id = ?1",
    "DELETE FROM code_files WHERE question_id = ?1",
    "DELETE FROM code_test_cases WHERE question_id = ?1",
    "DELETE FROM code WHERE question_id = ?1",
    "DELETE FROM database_queries WHERE question_id = ?1",
    "DELETE FROM database_questions WHERE question_id = ?1",
    "DELETE FROM question_tags WHERE question_id = ?1",
    "DELETE FROM questions WHERE id = ?1",
];

pub fn delete_question(tx: &Transaction<'_>, question_id: &str) -> BankResult<()> {
    let linked: Option<String> = tx
        .query_row(
            "SELECT evaluation_id FROM evaluation_questions WHERE question_id = ? LIMIT 1",
            [question_id],
            |r| r.get(0),
        )
        .optional()?;
    if let Some(evaluation_id) = linked {
        return Err(BankError::invalid(format!(
            "question belongs to evaluation {}",
            evaluation_id
        )));
    }

    let mut removed = 0;
    for sql in DELETE_ORDER {
        removed = tx.execute(sql, [question_id])?;
    }
    if removed == 0 {
        return Err(BankError::not_found("question", question_id));
    }
    Ok(())
}
