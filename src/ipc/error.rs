use crate::error::BankError;
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

pub fn bank_err(id: &str, e: &BankError) -> serde_json::Value {
    let details = match e {
        BankError::NotFound { entity, id } => Some(json!({ "entity": entity, "id": id })),
        BankError::MissingRelation {
            question_id,
            relation,
        } => Some(json!({ "questionId": question_id, "relation": relation })),
        BankError::UnregisteredType(t) | BankError::DuplicateReplicator(t) => {
            Some(json!({ "type": t }))
        }
        BankError::UnknownField { entity, field } => {
            Some(json!({ "entity": entity, "field": field }))
        }
        BankError::BadTransition { action, state } => {
            Some(json!({ "action": action, "state": state }))
        }
        _ => None,
    };
    if let BankError::Sql(inner) = e {
        tracing::warn!(error = %inner, "database error");
    }
    err(id, e.code(), e.to_string(), details)
}
