use crate::db::now_ts;
use crate::error::{BankError, BankResult};
use crate::evaluation::load_evaluation;
use crate::model::{ArchivalStatus, EvaluationPhase, GradingStatus, QuestionType};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde::Deserialize;
use std::collections::HashSet;
use uuid::Uuid;

const SUBMITTED: &str = "SUBMITTED";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerItem {
    #[serde(default, rename = "ref")]
    pub item_ref: Option<String>,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct Grade {
    pub status: GradingStatus,
    pub points_obtained: f64,
    pub signed_by: Option<String>,
    pub comment: Option<String>,
}

fn require_phase(
    conn: &Connection,
    evaluation_id: &str,
    phase: EvaluationPhase,
    action: &str,
) -> BankResult<()> {
    let evaluation = load_evaluation(conn, evaluation_id)?;
    if evaluation.archival_status != ArchivalStatus::Active {
        return Err(BankError::BadTransition {
            action: action.to_string(),
            state: evaluation.archival_status.as_str().to_string(),
        });
    }
    if evaluation.phase != phase {
        return Err(BankError::BadTransition {
            action: action.to_string(),
            state: evaluation.phase.as_str().to_string(),
        });
    }
    Ok(())
}

/// Points assigned to `question_id` inside the evaluation.
fn linked_points(conn: &Connection, evaluation_id: &str, question_id: &str) -> BankResult<f64> {
    conn.query_row(
        "SELECT points FROM evaluation_questions WHERE evaluation_id = ? AND question_id = ?",
        [evaluation_id, question_id],
        |r| r.get(0),
    )
    .optional()?
    .ok_or_else(|| BankError::not_found("evaluation question", question_id))
}

fn child_ids(conn: &Connection, sql: &str, question_id: &str) -> BankResult<HashSet<String>> {
    let mut stmt = conn.prepare(sql)?;
    let ids = stmt
        .query_map([question_id], |r| r.get::<_, String>(0))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(ids)
}

fn validate_items(conn: &Connection, question_id: &str, items: &[AnswerItem]) -> BankResult<()> {
    let stored: String = conn.query_row(
        "SELECT type FROM questions WHERE id = ?",
        [question_id],
        |r| r.get(0),
    )?;
    let question_type = QuestionType::parse(&stored)
        .ok_or_else(|| BankError::invalid(format!("unknown question type {}", stored)))?;

    match question_type {
        QuestionType::MultipleChoice => {
            let options = child_ids(
                conn,
                "SELECT id FROM multiple_choice_options WHERE question_id = ?",
                question_id,
            )?;
            check_refs(items, &options, "option")?;
            let (active, limit): (bool, Option<i64>) = conn.query_row(
                "SELECT activate_selection_limit, selection_limit FROM multiple_choice
                 WHERE question_id = ?",
                [question_id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )?;
            if let (true, Some(limit)) = (active, limit) {
                if items.len() as i64 > limit {
                    return Err(BankError::invalid(format!(
                        "at most {} options may be selected",
                        limit
                    )));
                }
            }
        }
        QuestionType::ExactMatch => {
            let fields = child_ids(
                conn,
                "SELECT id FROM exact_match_fields WHERE question_id = ?",
                question_id,
            )?;
            check_refs(items, &fields, "field")?;
        }
        QuestionType::TrueFalse => {
            let valid = matches!(items, [only] if only.content == "true" || only.content == "false");
            if !valid {
                return Err(BankError::invalid(
                    "true/false answers take a single item with content true or false",
                ));
            }
        }
        QuestionType::Essay | QuestionType::Web | QuestionType::Code | QuestionType::Database => {}
    }
    Ok(())
}

fn check_refs(items: &[AnswerItem], known: &HashSet<String>, what: &str) -> BankResult<()> {
    let mut seen = HashSet::new();
    for item in items {
        match &item.item_ref {
            Some(r) if !known.contains(r) => {
                return Err(BankError::invalid(format!("unknown {} {}", what, r)))
            }
            Some(r) if !seen.insert(r.as_str()) => {
                return Err(BankError::invalid(format!("{} {} given twice", what, r)))
            }
            Some(_) => {}
            None => return Err(BankError::invalid(format!("answer item needs an {} ref", what))),
        }
    }
    Ok(())
}

/// Stores a student's answer, replacing any earlier submission for the same
/// question. Returns the answer id.
pub fn submit_answer(
    tx: &Transaction<'_>,
    evaluation_id: &str,
    question_id: &str,
    user_email: &str,
    items: &[AnswerItem],
) -> BankResult<String> {
    require_phase(tx, evaluation_id, EvaluationPhase::InProgress, "submit answers to")?;
    linked_points(tx, evaluation_id, question_id)?;
    let user_email = user_email.trim();
    if user_email.is_empty() {
        return Err(BankError::invalid("studentEmail must not be empty"));
    }
    validate_items(tx, question_id, items)?;

    let existing: Option<String> = tx
        .query_row(
            "SELECT id FROM student_answers WHERE question_id = ? AND user_email = ?",
            [question_id, user_email],
            |r| r.get(0),
        )
        .optional()?;
    let ts = now_ts();
    let answer_id = match existing {
        Some(id) => {
            tx.execute(
                "UPDATE student_answers SET status = ?, updated_at = ? WHERE id = ?",
                params![SUBMITTED, ts, id],
            )?;
            tx.execute(
                "DELETE FROM student_answer_items WHERE student_answer_id = ?",
                [&id],
            )?;
            id
        }
        None => {
            let id = Uuid::new_v4().to_string();
            tx.execute(
                "INSERT INTO student_answers(id, question_id, user_email, status, updated_at)
                 VALUES(?, ?, ?, ?, ?)",
                params![id, question_id, user_email, SUBMITTED, ts],
            )?;
            id
        }
    };

    let mut stmt = tx.prepare(
        "INSERT INTO student_answer_items(id, student_answer_id, order_index, item_ref, content)
         VALUES(?, ?, ?, ?, ?)",
    )?;
    for (i, item) in items.iter().enumerate() {
        stmt.execute(params![
            Uuid::new_v4().to_string(),
            answer_id,
            i as i64,
            item.item_ref,
            item.content
        ])?;
    }
    Ok(answer_id)
}

/// Grades a submitted answer. Points are clamped to what the question is
/// worth in the evaluation; the stored value is returned.
pub fn grade_answer(
    tx: &Transaction<'_>,
    evaluation_id: &str,
    question_id: &str,
    user_email: &str,
    grade: &Grade,
) -> BankResult<f64> {
    require_phase(tx, evaluation_id, EvaluationPhase::Grading, "grade")?;
    let max_points = linked_points(tx, evaluation_id, question_id)?;
    if !grade.points_obtained.is_finite() {
        return Err(BankError::invalid("pointsObtained must be a number"));
    }
    let answer_id: String = tx
        .query_row(
            "SELECT id FROM student_answers WHERE question_id = ? AND user_email = ?",
            [question_id, user_email],
            |r| r.get(0),
        )
        .optional()?
        .ok_or_else(|| BankError::not_found("student answer", user_email))?;

    let points = grade.points_obtained.clamp(0.0, max_points);
    tx.execute(
        "INSERT INTO student_answer_gradings(student_answer_id, status, points_obtained, signed_by, comment, updated_at)
         VALUES(?, ?, ?, ?, ?, ?)
         ON CONFLICT(student_answer_id) DO UPDATE SET
           status = excluded.status,
           points_obtained = excluded.points_obtained,
           signed_by = excluded.signed_by,
           comment = excluded.comment,
           updated_at = excluded.updated_at",
        params![
            answer_id,
            grade.status.as_str(),
            points,
            grade.signed_by,
            grade.comment,
            now_ts()
        ],
    )?;
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::evaluation::{apply_archival, ArchivalAction};
    use std::path::Path;

    fn seed(conn: &Connection, phase: &str) {
        conn.execute_batch(&format!(
            "INSERT INTO bank_groups(id, label, created_at) VALUES('g1', 'G', 't');
             INSERT INTO questions(id, group_id, type, status, source, title, content, created_at, updated_at)
               VALUES('mc', 'g1', 'multipleChoice', 'ACTIVE', 'EVAL', 'Pick', '', 't', 't');
             INSERT INTO multiple_choice(question_id, grading_policy, activate_selection_limit, selection_limit)
               VALUES('mc', 'GRADUAL_CREDIT', 1, 1);
             INSERT INTO multiple_choice_options(id, question_id, order_index, text, is_correct)
               VALUES('o1', 'mc', 0, 'A', 1), ('o2', 'mc', 1, 'B', 0);
             INSERT INTO evaluations(id, group_id, label, phase, archival_status, created_at, updated_at)
               VALUES('e1', 'g1', 'Quiz', '{}', 'ACTIVE', 't', 't');
             INSERT INTO evaluation_questions(evaluation_id, question_id, order_index, points)
               VALUES('e1', 'mc', 0, 2.0);",
            phase
        ))
        .expect("seed");
    }

    fn pick(option: &str) -> AnswerItem {
        AnswerItem {
            item_ref: Some(option.to_string()),
            content: String::new(),
        }
    }

    #[test]
    fn resubmission_replaces_items() {
        let conn = db::open_in_memory().expect("db");
        seed(&conn, "IN_PROGRESS");
        let first = db::in_transaction(&conn, |tx| {
            submit_answer(tx, "e1", "mc", "s@example.com", &[pick("o1")])
        })
        .expect("submit");
        let second = db::in_transaction(&conn, |tx| {
            submit_answer(tx, "e1", "mc", "s@example.com", &[pick("o2")])
        })
        .expect("resubmit");
        assert_eq!(first, second);
        let item_ref: String = conn
            .query_row("SELECT item_ref FROM student_answer_items", [], |r| r.get(0))
            .expect("single item");
        assert_eq!(item_ref, "o2");
    }

    #[test]
    fn selection_limit_and_unknown_refs_are_rejected() {
        let conn = db::open_in_memory().expect("db");
        seed(&conn, "IN_PROGRESS");
        let e = db::in_transaction(&conn, |tx| {
            submit_answer(tx, "e1", "mc", "s@example.com", &[pick("o1"), pick("o2")])
        })
        .unwrap_err();
        assert!(matches!(e, BankError::InvalidInput(_)));
        let e = db::in_transaction(&conn, |tx| {
            submit_answer(tx, "e1", "mc", "s@example.com", &[pick("zz")])
        })
        .unwrap_err();
        assert!(matches!(e, BankError::InvalidInput(_)));
    }

    #[test]
    fn submitting_outside_progress_phase_fails() {
        let conn = db::open_in_memory().expect("db");
        seed(&conn, "DRAFT");
        let e = db::in_transaction(&conn, |tx| {
            submit_answer(tx, "e1", "mc", "s@example.com", &[pick("o1")])
        })
        .unwrap_err();
        assert!(matches!(e, BankError::BadTransition { .. }));
    }

    #[test]
    fn repeated_option_is_rejected() {
        let conn = db::open_in_memory().expect("db");
        seed(&conn, "IN_PROGRESS");
        let e = db::in_transaction(&conn, |tx| {
            submit_answer(tx, "e1", "mc", "s@example.com", &[pick("o1"), pick("o1")])
        })
        .unwrap_err();
        assert!(matches!(e, BankError::InvalidInput(_)));
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM student_answer_items", [], |r| r.get(0))
            .expect("count");
        assert_eq!(rows, 0);
    }

    #[test]
    fn purged_evaluation_takes_no_answers() {
        let conn = db::open_in_memory().expect("db");
        seed(&conn, "IN_PROGRESS");
        db::in_transaction(&conn, |tx| {
            apply_archival(
                tx,
                Path::new("unused-archives"),
                "e1",
                ArchivalAction::PurgeWithoutArchival,
            )
        })
        .expect("purge");
        let e = db::in_transaction(&conn, |tx| {
            submit_answer(tx, "e1", "mc", "s@example.com", &[pick("o1")])
        })
        .unwrap_err();
        assert!(matches!(
            e,
            BankError::BadTransition { ref state, .. } if state == "PURGED_WITHOUT_ARCHIVAL"
        ));
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM student_answers", [], |r| r.get(0))
            .expect("count");
        assert_eq!(rows, 0);
    }

    #[test]
    fn excluded_evaluation_cannot_be_graded() {
        let conn = db::open_in_memory().expect("db");
        seed(&conn, "IN_PROGRESS");
        db::in_transaction(&conn, |tx| {
            submit_answer(tx, "e1", "mc", "s@example.com", &[pick("o1")])
        })
        .expect("submit");
        conn.execute(
            "UPDATE evaluations SET phase = 'GRADING', archival_status = 'EXCLUDED'",
            [],
        )
        .expect("exclude");
        let grade = Grade {
            status: GradingStatus::GradedCorrect,
            points_obtained: 1.0,
            signed_by: None,
            comment: None,
        };
        let e = db::in_transaction(&conn, |tx| {
            grade_answer(tx, "e1", "mc", "s@example.com", &grade)
        })
        .unwrap_err();
        assert!(matches!(e, BankError::BadTransition { .. }));
    }

    #[test]
    fn grading_clamps_points() {
        let conn = db::open_in_memory().expect("db");
        seed(&conn, "IN_PROGRESS");
        db::in_transaction(&conn, |tx| {
            submit_answer(tx, "e1", "mc", "s@example.com", &[pick("o1")])
        })
        .expect("submit");
        conn.execute("UPDATE evaluations SET phase = 'GRADING'", [])
            .expect("phase");
        let grade = Grade {
            status: GradingStatus::GradedCorrect,
            points_obtained: 9.0,
            signed_by: Some("prof@example.com".to_string()),
            comment: None,
        };
        let stored = db::in_transaction(&conn, |tx| {
            grade_answer(tx, "e1", "mc", "s@example.com", &grade)
        })
        .expect("grade");
        assert_eq!(stored, 2.0);
        let again = db::in_transaction(&conn, |tx| {
            grade_answer(
                tx,
                "e1",
                "mc",
                "s@example.com",
                &Grade {
                    points_obtained: -1.0,
                    ..grade.clone()
                },
            )
        })
        .expect("regrade");
        assert_eq!(again, 0.0);
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM student_answer_gradings", [], |r| r.get(0))
            .expect("count");
        assert_eq!(rows, 1);
    }
}
