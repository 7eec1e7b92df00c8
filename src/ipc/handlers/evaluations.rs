use crate::db;
use crate::evaluation::{self, ArchivalAction, EvaluationItem};
use crate::ipc::error::{bank_err, err};
use crate::ipc::helpers::{db_conn, optional_str, parse_param, required_str, respond};
use crate::ipc::types::{AppState, Request};
use crate::model::EvaluationPhase;
use serde_json::{json, Value};

fn parse_items(req: &Request) -> Result<Vec<EvaluationItem>, Value> {
    let bad = |msg: &str| err(&req.id, "bad_params", msg.to_string(), None);
    let Some(arr) = req.params.get("questions").and_then(|v| v.as_array()) else {
        return Err(bad("missing questions"));
    };
    if arr.is_empty() {
        return Err(bad("questions must not be empty"));
    }
    arr.iter()
        .map(|item| {
            let question_id = item
                .get("questionId")
                .and_then(|v| v.as_str())
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| bad("each question needs a questionId"))?;
            let points = match item.get("points") {
                None => 1.0,
                Some(v) => v
                    .as_f64()
                    .ok_or_else(|| bad("points must be a number"))?,
            };
            Ok(EvaluationItem {
                question_id: question_id.trim().to_string(),
                points,
            })
        })
        .collect()
}

fn handle_evaluations_create(state: &AppState, req: &Request) -> Result<Value, Value> {
    let conn = db_conn(state, req)?;
    let group_id = required_str(req, "groupId")?;
    let label = required_str(req, "label")?;
    let items = parse_items(req)?;
    let (evaluation, copies) = db::in_transaction(conn, |tx| {
        evaluation::create_evaluation(tx, &state.registry, &group_id, &label, &items)
    })
    .map_err(|e| bank_err(&req.id, &e))?;
    Ok(json!({
        "evaluation": evaluation,
        "questionIds": copies.iter().map(|q| q.id.clone()).collect::<Vec<_>>(),
    }))
}

fn handle_evaluations_list(state: &AppState, req: &Request) -> Result<Value, Value> {
    let conn = db_conn(state, req)?;
    let group_id = required_str(req, "groupId")?;
    let evaluations =
        evaluation::list_evaluations(conn, &group_id).map_err(|e| bank_err(&req.id, &e))?;
    Ok(json!({ "evaluations": evaluations }))
}

fn handle_evaluations_open(state: &AppState, req: &Request) -> Result<Value, Value> {
    let conn = db_conn(state, req)?;
    let evaluation_id = required_str(req, "evaluationId")?;
    let student = optional_str(req, "studentEmail").filter(|s| !s.trim().is_empty());
    evaluation::open_evaluation(conn, &evaluation_id, student.as_deref())
        .map_err(|e| bank_err(&req.id, &e))
}

fn handle_evaluations_set_phase(state: &AppState, req: &Request) -> Result<Value, Value> {
    let conn = db_conn(state, req)?;
    let evaluation_id = required_str(req, "evaluationId")?;
    let phase = parse_param(req, "phase", EvaluationPhase::parse)?
        .ok_or_else(|| err(&req.id, "bad_params", "missing phase", None))?;
    let updated = db::in_transaction(conn, |tx| {
        evaluation::set_phase(tx, &evaluation_id, phase)
    })
    .map_err(|e| bank_err(&req.id, &e))?;
    tracing::info!(evaluation_id = %evaluation_id, phase = phase.as_str(), "evaluation phase changed");
    Ok(json!({ "evaluation": updated }))
}

fn handle_evaluations_archival(state: &AppState, req: &Request) -> Result<Value, Value> {
    let conn = db_conn(state, req)?;
    let evaluation_id = required_str(req, "evaluationId")?;
    let action = parse_param(req, "action", ArchivalAction::parse)?
        .ok_or_else(|| err(&req.id, "bad_params", "missing action", None))?;
    let Some(workspace) = state.workspace.as_ref() else {
        return Err(err(&req.id, "no_workspace", "select a workspace first", None));
    };
    let archive_dir = workspace.join("archives");
    let updated = db::in_transaction(conn, |tx| {
        evaluation::apply_archival(tx, &archive_dir, &evaluation_id, action)
    })
    .map_err(|e| bank_err(&req.id, &e))?;
    tracing::info!(
        evaluation_id = %evaluation_id,
        action = action.as_str(),
        status = updated.archival_status.as_str(),
        "archival action applied"
    );
    Ok(json!({ "evaluation": updated }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "evaluations.create" => handle_evaluations_create(state, req),
        "evaluations.list" => handle_evaluations_list(state, req),
        "evaluations.open" => handle_evaluations_open(state, req),
        "evaluations.setPhase" => handle_evaluations_set_phase(state, req),
        "evaluations.archival" => handle_evaluations_archival(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
