use crate::answers::{self, AnswerItem, Grade};
use crate::db;
use crate::ipc::error::{bank_err, err};
use crate::ipc::helpers::{db_conn, optional_str, parse_param, required_str, respond};
use crate::ipc::types::{AppState, Request};
use crate::model::GradingStatus;
use serde_json::{json, Value};

fn handle_answers_submit(state: &AppState, req: &Request) -> Result<Value, Value> {
    let conn = db_conn(state, req)?;
    let evaluation_id = required_str(req, "evaluationId")?;
    let question_id = required_str(req, "questionId")?;
    let user_email = required_str(req, "userEmail")?;
    let items: Vec<AnswerItem> = match req.params.get("items") {
        None => Vec::new(),
        Some(v) => serde_json::from_value(v.clone()).map_err(|e| {
            err(
                &req.id,
                "bad_params",
                format!("invalid items: {}", e),
                None,
            )
        })?,
    };
    let answer_id = db::in_transaction(conn, |tx| {
        answers::submit_answer(tx, &evaluation_id, &question_id, &user_email, &items)
    })
    .map_err(|e| bank_err(&req.id, &e))?;
    Ok(json!({ "studentAnswerId": answer_id, "itemCount": items.len() }))
}

fn handle_answers_grade(state: &AppState, req: &Request) -> Result<Value, Value> {
    let conn = db_conn(state, req)?;
    let evaluation_id = required_str(req, "evaluationId")?;
    let question_id = required_str(req, "questionId")?;
    let user_email = required_str(req, "userEmail")?;
    let status = parse_param(req, "status", GradingStatus::parse)?
        .ok_or_else(|| err(&req.id, "bad_params", "missing status", None))?;
    let points_obtained = req
        .params
        .get("pointsObtained")
        .and_then(|v| v.as_f64())
        .ok_or_else(|| err(&req.id, "bad_params", "missing pointsObtained", None))?;
    let grade = Grade {
        status,
        points_obtained,
        signed_by: optional_str(req, "signedBy"),
        comment: optional_str(req, "comment"),
    };
    let stored = db::in_transaction(conn, |tx| {
        answers::grade_answer(tx, &evaluation_id, &question_id, &user_email, &grade)
    })
    .map_err(|e| bank_err(&req.id, &e))?;
    Ok(json!({ "pointsObtained": stored, "status": status }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "answers.submit" => handle_answers_submit(state, req),
        "answers.grade" => handle_answers_grade(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
