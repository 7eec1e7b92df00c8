use crate::db::{self, now_ts};
use crate::error::BankError;
use crate::ipc::error::{bank_err, err};
use crate::ipc::helpers::{db_conn, required_str, respond};
use crate::ipc::types::{AppState, Request};
use rusqlite::{params, OptionalExtension};
use serde_json::{json, Value};
use uuid::Uuid;

fn handle_groups_list(state: &AppState, req: &Request) -> Result<Value, Value> {
    let conn = db_conn(state, req)?;
    let mut stmt = conn
        .prepare(
            "SELECT g.id, g.label, g.created_at,
                    (SELECT COUNT(*) FROM questions q WHERE q.group_id = g.id AND q.source = 'BANK')
             FROM bank_groups g ORDER BY g.label",
        )
        .map_err(|e| bank_err(&req.id, &BankError::from(e)))?;
    let groups = stmt
        .query_map([], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "label": r.get::<_, String>(1)?,
                "createdAt": r.get::<_, String>(2)?,
                "questionCount": r.get::<_, i64>(3)?,
            }))
        })
        .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
        .map_err(|e| bank_err(&req.id, &BankError::from(e)))?;
    Ok(json!({ "groups": groups }))
}

fn handle_groups_create(state: &AppState, req: &Request) -> Result<Value, Value> {
    let conn = db_conn(state, req)?;
    let label = required_str(req, "label")?;
    let created = db::in_transaction(conn, |tx| {
        let taken: Option<String> = tx
            .query_row(
                "SELECT id FROM bank_groups WHERE label = ?",
                [&label],
                |r| r.get(0),
            )
            .optional()?;
        if taken.is_some() {
            return Err(BankError::invalid(format!("group label already used: {}", label)));
        }
        let id = Uuid::new_v4().to_string();
        tx.execute(
            "INSERT INTO bank_groups(id, label, created_at) VALUES(?, ?, ?)",
            params![id, label, now_ts()],
        )?;
        Ok(id)
    });
    match created {
        Ok(id) => Ok(json!({ "groupId": id, "label": label })),
        Err(BankError::InvalidInput(msg)) => Err(err(
            &req.id,
            "duplicate_label",
            msg,
            Some(json!({ "label": label })),
        )),
        Err(e) => Err(bank_err(&req.id, &e)),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "groups.list" => Some(respond(req, handle_groups_list(state, req))),
        "groups.create" => Some(respond(req, handle_groups_create(state, req))),
        _ => None,
    }
}
