use crate::bundle;
use crate::db::now_ts;
use crate::error::{BankError, BankResult};
use crate::model::{ArchivalStatus, EvaluationPhase, QuestionSource};
use crate::question::authoring::ensure_group_exists;
use crate::question::{copy_question, CopyOptions, Question, ReplicatorRegistry};
use crate::select::{fetch, library, schema};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::Path;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub id: String,
    pub group_id: String,
    pub label: String,
    pub phase: EvaluationPhase,
    pub archival_status: ArchivalStatus,
    pub archive_path: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct EvaluationItem {
    pub question_id: String,
    pub points: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationLink {
    pub question_id: String,
    pub order: i64,
    pub points: f64,
}

const EVALUATION_COLUMNS: &str =
    "id, group_id, label, phase, archival_status, archive_path, created_at, updated_at";

fn evaluation_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Evaluation> {
    let phase: String = r.get(3)?;
    let archival: String = r.get(4)?;
    Ok(Evaluation {
        id: r.get(0)?,
        group_id: r.get(1)?,
        label: r.get(2)?,
        phase: EvaluationPhase::parse(&phase).unwrap_or(EvaluationPhase::Draft),
        archival_status: ArchivalStatus::parse(&archival).unwrap_or(ArchivalStatus::Active),
        archive_path: r.get(5)?,
        created_at: r.get(6)?,
        updated_at: r.get(7)?,
    })
}

pub fn load_evaluation(conn: &Connection, evaluation_id: &str) -> BankResult<Evaluation> {
    conn.query_row(
        &format!("SELECT {} FROM evaluations WHERE id = ?", EVALUATION_COLUMNS),
        [evaluation_id],
        evaluation_from_row,
    )
    .optional()?
    .ok_or_else(|| BankError::not_found("evaluation", evaluation_id))
}

pub fn list_evaluations(conn: &Connection, group_id: &str) -> BankResult<Vec<Evaluation>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM evaluations WHERE group_id = ? ORDER BY created_at, id",
        EVALUATION_COLUMNS
    ))?;
    let rows = stmt
        .query_map([group_id], evaluation_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn evaluation_links(conn: &Connection, evaluation_id: &str) -> BankResult<Vec<EvaluationLink>> {
    let mut stmt = conn.prepare(
        "SELECT question_id, order_index, points FROM evaluation_questions
         WHERE evaluation_id = ? ORDER BY order_index",
    )?;
    let rows = stmt
        .query_map([evaluation_id], |r| {
            Ok(EvaluationLink {
                question_id: r.get(0)?,
                order: r.get(1)?,
                points: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Composes an evaluation from bank questions. Each one is copied with
/// provenance `EVAL`, so later bank edits never reach the evaluation.
pub fn create_evaluation(
    tx: &Transaction<'_>,
    registry: &ReplicatorRegistry,
    group_id: &str,
    label: &str,
    items: &[EvaluationItem],
) -> BankResult<(Evaluation, Vec<Question>)> {
    ensure_group_exists(tx, group_id)?;
    let label = label.trim();
    if label.is_empty() {
        return Err(BankError::invalid("label must not be empty"));
    }

    let id = Uuid::new_v4().to_string();
    let ts = now_ts();
    tx.execute(
        "INSERT INTO evaluations(id, group_id, label, phase, archival_status, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        params![
            id,
            group_id,
            label,
            EvaluationPhase::Draft.as_str(),
            ArchivalStatus::Active.as_str(),
            ts,
            ts
        ],
    )?;

    let opts = CopyOptions {
        source: QuestionSource::Eval,
        prefix: String::new(),
    };
    let mut copies = Vec::with_capacity(items.len());
    for (order, item) in items.iter().enumerate() {
        if !item.points.is_finite() || item.points < 0.0 {
            return Err(BankError::invalid(format!(
                "points for {} must be a non-negative number",
                item.question_id
            )));
        }
        let source_group: Option<String> = tx
            .query_row(
                "SELECT group_id FROM questions WHERE id = ?",
                [&item.question_id],
                |r| r.get(0),
            )
            .optional()?;
        match source_group {
            None => return Err(BankError::not_found("question", item.question_id.clone())),
            Some(g) if g != group_id => {
                return Err(BankError::invalid(format!(
                    "question {} belongs to another group",
                    item.question_id
                )))
            }
            Some(_) => {}
        }
        let copy = copy_question(tx, registry, &item.question_id, &opts)?;
        tx.execute(
            "INSERT INTO evaluation_questions(evaluation_id, question_id, order_index, points)
             VALUES(?, ?, ?, ?)",
            params![id, copy.id, order as i64, item.points],
        )?;
        copies.push(copy);
    }

    tracing::info!(evaluation_id = %id, questions = copies.len(), "evaluation composed");
    Ok((load_evaluation(tx, &id)?, copies))
}

pub fn set_phase(
    tx: &Transaction<'_>,
    evaluation_id: &str,
    phase: EvaluationPhase,
) -> BankResult<Evaluation> {
    let evaluation = load_evaluation(tx, evaluation_id)?;
    if evaluation.archival_status != ArchivalStatus::Active {
        return Err(BankError::BadTransition {
            action: format!("move to {}", phase.as_str()),
            state: evaluation.archival_status.as_str().to_string(),
        });
    }
    if evaluation.phase.next() != Some(phase) {
        return Err(BankError::BadTransition {
            action: format!("move to {}", phase.as_str()),
            state: evaluation.phase.as_str().to_string(),
        });
    }
    tx.execute(
        "UPDATE evaluations SET phase = ?, updated_at = ? WHERE id = ?",
        params![phase.as_str(), now_ts(), evaluation_id],
    )?;
    load_evaluation(tx, evaluation_id)
}

/// Every linked question, loaded with the results selection, or with one
/// student's export selection when `student` is given.
pub fn open_evaluation(
    conn: &Connection,
    evaluation_id: &str,
    student: Option<&str>,
) -> BankResult<Value> {
    let evaluation = load_evaluation(conn, evaluation_id)?;
    let select = match student {
        Some(_) => library::export_selection(student),
        None => library::results_selection(),
    };
    let mut questions = Vec::new();
    for link in evaluation_links(conn, evaluation_id)? {
        let question = fetch::fetch_one(conn, &schema::QUESTION, &link.question_id, &select)?
            .ok_or_else(|| BankError::not_found("question", link.question_id.clone()))?;
        questions.push(json!({
            "order": link.order,
            "points": link.points,
            "question": question,
        }));
    }
    Ok(json!({
        "evaluation": evaluation,
        "questions": questions,
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchivalAction {
    Mark,
    Unmark,
    Exclude,
    Include,
    Archive,
    Purge,
    PurgeWithoutArchival,
}

impl ArchivalAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mark" => Some(Self::Mark),
            "unmark" => Some(Self::Unmark),
            "exclude" => Some(Self::Exclude),
            "include" => Some(Self::Include),
            "archive" => Some(Self::Archive),
            "purge" => Some(Self::Purge),
            "purgeWithoutArchival" => Some(Self::PurgeWithoutArchival),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mark => "mark",
            Self::Unmark => "unmark",
            Self::Exclude => "exclude",
            Self::Include => "include",
            Self::Archive => "archive",
            Self::Purge => "purge",
            Self::PurgeWithoutArchival => "purgeWithoutArchival",
        }
    }
}

pub fn next_archival_status(
    current: ArchivalStatus,
    action: ArchivalAction,
    phase: EvaluationPhase,
) -> BankResult<ArchivalStatus> {
    use ArchivalAction as A;
    use ArchivalStatus as S;

    let next = match (action, current) {
        (A::Mark, S::Active) if phase == EvaluationPhase::Finished => Some(S::MarkedForArchival),
        (A::Unmark, S::MarkedForArchival) => Some(S::Active),
        (A::Exclude, S::Active | S::MarkedForArchival) => Some(S::Excluded),
        (A::Include, S::Excluded) => Some(S::Active),
        (A::Archive, S::MarkedForArchival) => Some(S::Archived),
        (A::Purge, S::Archived) => Some(S::Purged),
        (A::PurgeWithoutArchival, S::Active | S::MarkedForArchival | S::Excluded) => {
            Some(S::PurgedWithoutArchival)
        }
        _ => None,
    };
    next.ok_or_else(|| BankError::BadTransition {
        action: action.as_str().to_string(),
        state: format!("{} ({})", current.as_str(), phase.as_str()),
    })
}

/// Applies an archival action, including its side effects: `archive` writes
/// the results bundle under `archive_dir`, the purges drop student data.
pub fn apply_archival(
    tx: &Transaction<'_>,
    archive_dir: &Path,
    evaluation_id: &str,
    action: ArchivalAction,
) -> BankResult<Evaluation> {
    let evaluation = load_evaluation(tx, evaluation_id)?;
    let next = next_archival_status(evaluation.archival_status, action, evaluation.phase)?;

    let mut archive_path = evaluation.archive_path.clone();
    match action {
        ArchivalAction::Archive => {
            let results = open_evaluation(tx, evaluation_id, None)?;
            let path = bundle::write_evaluation_archive(archive_dir, evaluation_id, &results)
                .map_err(|e| BankError::Archive(format!("{e:#}")))?;
            archive_path = Some(path.to_string_lossy().to_string());
        }
        ArchivalAction::Purge | ArchivalAction::PurgeWithoutArchival => {
            let removed = purge_student_data(tx, evaluation_id)?;
            tracing::info!(evaluation_id, removed, "student answers purged");
        }
        _ => {}
    }

    tx.execute(
        "UPDATE evaluations SET archival_status = ?, archive_path = ?, updated_at = ? WHERE id = ?",
        params![next.as_str(), archive_path, now_ts(), evaluation_id],
    )?;
    load_evaluation(tx, evaluation_id)
}

fn purge_student_data(tx: &Transaction<'_>, evaluation_id: &str) -> BankResult<usize> {
    let in_evaluation = "SELECT sa.id FROM student_answers sa
         JOIN evaluation_questions eq ON eq.question_id = sa.question_id
         WHERE eq.evaluation_id = ?1";
    tx.execute(
        &format!(
            "DELETE FROM student_answer_gradings WHERE student_answer_id IN ({})",
            in_evaluation
        ),
        [evaluation_id],
    )?;
    tx.execute(
        &format!(
            "DELETE FROM student_answer_items WHERE student_answer_id IN ({})",
            in_evaluation
        ),
        [evaluation_id],
    )?;
    let removed = tx.execute(
        "DELETE FROM student_answers WHERE question_id IN (
           SELECT question_id FROM evaluation_questions WHERE evaluation_id = ?1)",
        [evaluation_id],
    )?;
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::question::authoring::{create_question, NewQuestion};
    use crate::model::QuestionType;

    fn setup() -> (Connection, ReplicatorRegistry, String) {
        let conn = db::open_in_memory().expect("db");
        conn.execute(
            "INSERT INTO bank_groups(id, label, created_at) VALUES('g1', 'G', 't')",
            [],
        )
        .expect("group");
        let registry = ReplicatorRegistry::new().expect("registry");
        let q = db::in_transaction(&conn, |tx| {
            create_question(
                tx,
                &registry,
                &NewQuestion {
                    group_id: "g1".to_string(),
                    question_type: QuestionType::Essay,
                    title: "Explain".to_string(),
                    content: "Why?".to_string(),
                    scratchpad: None,
                    tags: vec![],
                    data: None,
                },
            )
        })
        .expect("question");
        (conn, registry, q.id)
    }

    #[test]
    fn transition_table() {
        use ArchivalAction as A;
        use ArchivalStatus as S;
        let fin = EvaluationPhase::Finished;
        assert_eq!(next_archival_status(S::Active, A::Mark, fin).ok(), Some(S::MarkedForArchival));
        assert!(next_archival_status(S::Active, A::Mark, EvaluationPhase::Grading).is_err());
        assert_eq!(next_archival_status(S::MarkedForArchival, A::Unmark, fin).ok(), Some(S::Active));
        assert_eq!(next_archival_status(S::MarkedForArchival, A::Archive, fin).ok(), Some(S::Archived));
        assert!(next_archival_status(S::Active, A::Archive, fin).is_err());
        assert_eq!(next_archival_status(S::Archived, A::Purge, fin).ok(), Some(S::Purged));
        assert!(next_archival_status(S::Excluded, A::Purge, fin).is_err());
        assert_eq!(next_archival_status(S::Excluded, A::Include, fin).ok(), Some(S::Active));
        assert_eq!(
            next_archival_status(S::Excluded, A::PurgeWithoutArchival, fin).ok(),
            Some(S::PurgedWithoutArchival)
        );
        assert!(next_archival_status(S::Purged, A::Include, fin).is_err());
        assert!(next_archival_status(S::PurgedWithoutArchival, A::Mark, fin).is_err());
    }

    #[test]
    fn composing_copies_questions_as_eval() {
        let (conn, registry, qid) = setup();
        let (evaluation, copies) = db::in_transaction(&conn, |tx| {
            create_evaluation(
                tx,
                &registry,
                "g1",
                "Midterm",
                &[EvaluationItem {
                    question_id: qid.clone(),
                    points: 4.0,
                }],
            )
        })
        .expect("evaluation");
        assert_eq!(evaluation.phase, EvaluationPhase::Draft);
        assert_eq!(copies.len(), 1);
        assert_eq!(copies[0].source, QuestionSource::Eval);
        assert_eq!(copies[0].title, "Explain");
        let links = evaluation_links(&conn, &evaluation.id).expect("links");
        assert_eq!(links[0].question_id, copies[0].id);
        assert_eq!(links[0].points, 4.0);
    }

    #[test]
    fn phases_only_move_forward_one_step() {
        let (conn, registry, qid) = setup();
        let (evaluation, _) = db::in_transaction(&conn, |tx| {
            create_evaluation(
                tx,
                &registry,
                "g1",
                "Quiz",
                &[EvaluationItem {
                    question_id: qid.clone(),
                    points: 1.0,
                }],
            )
        })
        .expect("evaluation");
        let e = db::in_transaction(&conn, |tx| {
            set_phase(tx, &evaluation.id, EvaluationPhase::Grading)
        })
        .unwrap_err();
        assert!(matches!(e, BankError::BadTransition { .. }));
        let moved = db::in_transaction(&conn, |tx| {
            set_phase(tx, &evaluation.id, EvaluationPhase::InProgress)
        })
        .expect("advance");
        assert_eq!(moved.phase, EvaluationPhase::InProgress);
    }

    #[test]
    fn failed_composition_rolls_back_everything() {
        let (conn, registry, qid) = setup();
        let e = db::in_transaction(&conn, |tx| {
            create_evaluation(
                tx,
                &registry,
                "g1",
                "Broken",
                &[
                    EvaluationItem {
                        question_id: qid.clone(),
                        points: 1.0,
                    },
                    EvaluationItem {
                        question_id: "missing".to_string(),
                        points: 1.0,
                    },
                ],
            )
        })
        .unwrap_err();
        assert!(matches!(e, BankError::NotFound { .. }));
        let (evals, questions): (i64, i64) = conn
            .query_row(
                "SELECT (SELECT COUNT(*) FROM evaluations), (SELECT COUNT(*) FROM questions)",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .expect("counts");
        assert_eq!(evals, 0);
        assert_eq!(questions, 1);
    }
}
