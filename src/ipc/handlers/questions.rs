use crate::bundle;
use crate::db;
use crate::error::BankError;
use crate::ipc::error::{bank_err, err};
use crate::ipc::helpers::{
    db_conn, flag, optional_str, parse_param, required_str, respond, string_list,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{QuestionSource, QuestionStatus, QuestionType};
use crate::question::authoring::{self, NewQuestion, QuestionUpdate};
use crate::question::copy::import_payloads;
use crate::question::{copy_question, CopyOptions};
use crate::select::{fetch, library, schema};
use serde_json::{json, Value};
use std::path::PathBuf;

fn handle_questions_create(state: &AppState, req: &Request) -> Result<Value, Value> {
    let conn = db_conn(state, req)?;
    let group_id = required_str(req, "groupId")?;
    let question_type = parse_param(req, "type", QuestionType::parse)?
        .ok_or_else(|| err(&req.id, "bad_params", "missing type", None))?;
    let new = NewQuestion {
        group_id,
        question_type,
        title: optional_str(req, "title").unwrap_or_default(),
        content: optional_str(req, "content").unwrap_or_default(),
        scratchpad: optional_str(req, "scratchpad"),
        tags: string_list(req, "tags")?.unwrap_or_default(),
        data: req.params.get("data").cloned(),
    };
    let question = db::in_transaction(conn, |tx| {
        authoring::create_question(tx, &state.registry, &new)
    })
    .map_err(|e| bank_err(&req.id, &e))?;
    tracing::info!(question_id = %question.id, question_type = %question_type, "question created");
    Ok(json!({ "question": question }))
}

fn handle_questions_update(state: &AppState, req: &Request) -> Result<Value, Value> {
    let conn = db_conn(state, req)?;
    let question_id = required_str(req, "questionId")?;
    let scratchpad = match req.params.get("scratchpad") {
        None => None,
        Some(Value::Null) => Some(None),
        Some(Value::String(s)) => Some(Some(s.clone())),
        Some(_) => {
            return Err(err(
                &req.id,
                "bad_params",
                "scratchpad must be a string or null",
                None,
            ))
        }
    };
    let update = QuestionUpdate {
        title: optional_str(req, "title"),
        content: optional_str(req, "content"),
        scratchpad,
        status: parse_param(req, "status", QuestionStatus::parse)?,
        tags: string_list(req, "tags")?,
    };
    db::in_transaction(conn, |tx| {
        authoring::update_question(tx, &question_id, &update)
    })
    .map_err(|e| bank_err(&req.id, &e))?;
    Ok(json!({ "ok": true, "questionId": question_id }))
}

fn handle_questions_delete(state: &AppState, req: &Request) -> Result<Value, Value> {
    let conn = db_conn(state, req)?;
    let question_id = required_str(req, "questionId")?;
    db::in_transaction(conn, |tx| authoring::delete_question(tx, &question_id))
        .map_err(|e| bank_err(&req.id, &e))?;
    tracing::info!(question_id = %question_id, "question deleted");
    Ok(json!({ "ok": true }))
}

fn handle_questions_list(state: &AppState, req: &Request) -> Result<Value, Value> {
    let conn = db_conn(state, req)?;
    let group_id = required_str(req, "groupId")?;
    let status = parse_param(req, "status", QuestionStatus::parse)?;
    authoring::ensure_group_exists(conn, &group_id).map_err(|e| bank_err(&req.id, &e))?;

    let mut conditions = vec![("groupId", group_id.as_str())];
    if let Some(s) = status {
        conditions.push(("status", s.as_str()));
    }
    let select = library::listing_selection(flag(req, "includeProfessorOnlyInfo"));
    let mut questions = fetch::fetch_where(conn, &schema::QUESTION, &conditions, &select)
        .map_err(|e| bank_err(&req.id, &e))?;
    // Evaluation copies live with their evaluation, not in the bank listing.
    questions.retain(|q| q["source"] != QuestionSource::Eval.as_str());
    Ok(json!({ "questions": questions }))
}

fn handle_questions_get(state: &AppState, req: &Request) -> Result<Value, Value> {
    let conn = db_conn(state, req)?;
    let question_id = required_str(req, "questionId")?;
    let select = library::consultation_selection(
        flag(req, "includeProfessorOnlyInfo"),
        flag(req, "withOfficialAnswers"),
    );
    let question = fetch::fetch_one(conn, &schema::QUESTION, &question_id, &select)
        .map_err(|e| bank_err(&req.id, &e))?;
    match question {
        Some(q) => Ok(json!({ "question": q })),
        None => Err(bank_err(
            &req.id,
            &BankError::not_found("question", question_id),
        )),
    }
}

fn handle_questions_copy(state: &AppState, req: &Request) -> Result<Value, Value> {
    let conn = db_conn(state, req)?;
    let question_id = required_str(req, "questionId")?;
    let source = match parse_param(req, "source", QuestionSource::parse)? {
        None => QuestionSource::Copy,
        // EVAL copies are only made by evaluations.create.
        Some(QuestionSource::Eval) => {
            return Err(err(&req.id, "bad_params", "source must be BANK or COPY", None))
        }
        Some(s) => s,
    };
    let opts = CopyOptions {
        source,
        prefix: optional_str(req, "prefix").unwrap_or_else(|| state.config.copy_prefix.clone()),
    };
    let copy = db::in_transaction(conn, |tx| {
        copy_question(tx, &state.registry, &question_id, &opts)
    })
    .map_err(|e| bank_err(&req.id, &e))?;
    tracing::info!(source_id = %question_id, copy_id = %copy.id, "question copied");
    Ok(json!({ "question": copy }))
}

fn handle_questions_export_bundle(state: &AppState, req: &Request) -> Result<Value, Value> {
    let conn = db_conn(state, req)?;
    let group_id = required_str(req, "groupId")?;
    let out_path = required_str(req, "outPath")?;
    authoring::ensure_group_exists(conn, &group_id).map_err(|e| bank_err(&req.id, &e))?;

    let out = PathBuf::from(&out_path);
    let export = bundle::export_question_bundle(conn, &group_id, &out).map_err(|e| {
        err(
            &req.id,
            "io_failed",
            format!("{e:#}"),
            Some(json!({ "path": out_path })),
        )
    })?;
    Ok(json!({
        "ok": true,
        "path": out_path,
        "bundleFormat": export.bundle_format,
        "questionCount": export.question_count,
        "sha256": export.sha256,
    }))
}

fn handle_questions_import_bundle(state: &AppState, req: &Request) -> Result<Value, Value> {
    let conn = db_conn(state, req)?;
    let group_id = required_str(req, "groupId")?;
    let in_path = required_str(req, "inPath")?;

    let src = PathBuf::from(&in_path);
    if !src.is_file() {
        return Err(err(
            &req.id,
            "not_found",
            "bundle file not found",
            Some(json!({ "path": in_path })),
        ));
    }
    let payloads = bundle::read_question_bundle(&src).map_err(|e| {
        err(
            &req.id,
            "bad_bundle",
            format!("{e:#}"),
            Some(json!({ "path": in_path })),
        )
    })?;

    let created = db::in_transaction(conn, |tx| {
        authoring::ensure_group_exists(tx, &group_id)?;
        import_payloads(tx, &state.registry, &group_id, &payloads)
    })
    .map_err(|e| bank_err(&req.id, &e))?;
    tracing::info!(group_id = %group_id, count = created.len(), "question bundle imported");
    Ok(json!({
        "ok": true,
        "imported": created.len(),
        "questionIds": created.iter().map(|q| q.id.clone()).collect::<Vec<_>>(),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "questions.create" => handle_questions_create(state, req),
        "questions.update" => handle_questions_update(state, req),
        "questions.delete" => handle_questions_delete(state, req),
        "questions.list" => handle_questions_list(state, req),
        "questions.get" => handle_questions_get(state, req),
        "questions.copy" => handle_questions_copy(state, req),
        "questions.exportBundle" => handle_questions_export_bundle(state, req),
        "questions.importBundle" => handle_questions_import_bundle(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
