use super::error::err;
use super::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::Value;

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn optional_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
}

pub fn flag(req: &Request, key: &str) -> bool {
    req.params
        .get(key)
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

/// Parses an enum-valued string param with the type's own `parse`.
pub fn parse_param<T>(
    req: &Request,
    key: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Option<T>, Value> {
    match req.params.get(key).and_then(|v| v.as_str()) {
        None => Ok(None),
        Some(raw) => parse(raw).map(Some).ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                format!("invalid {}: {}", key, raw),
                None,
            )
        }),
    }
}

pub fn string_list(req: &Request, key: &str) -> Result<Option<Vec<String>>, Value> {
    let Some(v) = req.params.get(key) else {
        return Ok(None);
    };
    let Some(arr) = v.as_array() else {
        return Err(err(&req.id, "bad_params", format!("{} must be an array", key), None));
    };
    arr.iter()
        .map(|item| {
            item.as_str()
                .map(|s| s.trim().to_string())
                .ok_or_else(|| {
                    err(
                        &req.id,
                        "bad_params",
                        format!("{} must contain strings", key),
                        None,
                    )
                })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// Wraps a handler result into the response envelope.
pub fn respond(req: &Request, result: Result<Value, Value>) -> Value {
    match result {
        Ok(v) => super::error::ok(&req.id, v),
        Err(e) => e,
    }
}
