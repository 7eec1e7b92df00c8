use super::schema::{ColumnKind, Entity, Relation, Scalar};
use super::tree::{Select, SelectTree};
use crate::error::{BankError, BankResult};
use rusqlite::{params_from_iter, types::Value, Connection};
use serde_json::{json, Map, Value as JsonValue};

/// Loads the row of `entity` whose key column equals `id`, shaped by `select`.
pub fn fetch_one(
    conn: &Connection,
    entity: &'static Entity,
    id: &str,
    select: &SelectTree,
) -> BankResult<Option<JsonValue>> {
    let rows = fetch_rows(conn, entity, &[(entity.key, id.to_string())], select)?;
    Ok(rows.into_iter().next())
}

/// Loads every row of `entity` matching all `(field, value)` pairs.
pub fn fetch_where(
    conn: &Connection,
    entity: &'static Entity,
    conditions: &[(&str, &str)],
    select: &SelectTree,
) -> BankResult<Vec<JsonValue>> {
    let mut resolved = Vec::with_capacity(conditions.len());
    for (field, value) in conditions {
        resolved.push((column_for(entity, field)?, (*value).to_string()));
    }
    fetch_rows(conn, entity, &resolved, select)
}

enum Plan {
    Scalar(usize, &'static Scalar),
    Relation(&'static Relation, SelectTree),
}

fn fetch_rows(
    conn: &Connection,
    entity: &'static Entity,
    conditions: &[(&'static str, String)],
    select: &SelectTree,
) -> BankResult<Vec<JsonValue>> {
    let plans = plan(entity, select)?;

    // Column 0 is always the entity key so relations can be followed even
    // when the key itself is not selected.
    let mut columns = vec![entity.key];
    for p in &plans {
        if let Plan::Scalar(_, scalar) = p {
            columns.push(scalar.column);
        }
    }

    let mut sql = format!("SELECT {} FROM {}", columns.join(", "), entity.table);
    if !conditions.is_empty() {
        let clauses = conditions
            .iter()
            .map(|(col, _)| format!("{} = ?", col))
            .collect::<Vec<_>>();
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    if let Some(order) = entity.order_by {
        sql.push_str(" ORDER BY ");
        sql.push_str(order);
    }

    let mut stmt = conn.prepare(&sql)?;
    let raw_rows = stmt
        .query_map(params_from_iter(conditions.iter().map(|(_, v)| v)), |row| {
            let mut values = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                values.push(row.get::<_, Value>(i)?);
            }
            Ok(values)
        })?
        .collect::<Result<Vec<_>, _>>()?;
    drop(stmt);

    let mut out = Vec::with_capacity(raw_rows.len());
    for values in raw_rows {
        let key = match &values[0] {
            Value::Text(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            _ => String::new(),
        };
        let mut obj = Map::new();
        for p in &plans {
            match p {
                Plan::Scalar(idx, scalar) => {
                    obj.insert(scalar.name.to_string(), to_json(&values[*idx], scalar.kind));
                }
                Plan::Relation(rel, sub) => {
                    let related = fetch_relation(conn, rel, &key, sub)?;
                    obj.insert(rel.name.to_string(), related);
                }
            }
        }
        out.push(JsonValue::Object(obj));
    }
    Ok(out)
}

fn fetch_relation(
    conn: &Connection,
    rel: &'static Relation,
    parent_key: &str,
    select: &SelectTree,
) -> BankResult<JsonValue> {
    let mut conditions: Vec<(&'static str, String)> =
        vec![(rel.foreign_key, parent_key.to_string())];
    for (col, value) in rel.fixed {
        conditions.push((*col, (*value).to_string()));
    }
    for (field, value) in &select.filter {
        conditions.push((column_for(rel.entity, field)?, value.clone()));
    }
    let rows = fetch_rows(conn, rel.entity, &conditions, select)?;
    if rel.many {
        Ok(JsonValue::Array(rows))
    } else {
        Ok(rows.into_iter().next().unwrap_or(JsonValue::Null))
    }
}

/// Resolves the selection against the entity, failing on names the schema
/// does not know.
fn plan(entity: &'static Entity, select: &SelectTree) -> BankResult<Vec<Plan>> {
    let mut plans = Vec::new();
    let mut next_column = 1;
    for (name, sel) in &select.fields {
        match sel {
            Select::Field(false) => {
                if entity.scalar(name).is_none() && entity.relation(name).is_none() {
                    return Err(unknown(entity, name));
                }
            }
            Select::Field(true) => {
                if let Some(scalar) = entity.scalar(name) {
                    plans.push(Plan::Scalar(next_column, scalar));
                    next_column += 1;
                } else if let Some(rel) = entity.relation(name) {
                    plans.push(Plan::Relation(rel, all_scalars(rel.entity)));
                } else {
                    return Err(unknown(entity, name));
                }
            }
            Select::Relation(sub) => match entity.relation(name) {
                Some(rel) => plans.push(Plan::Relation(rel, sub.clone())),
                None => return Err(unknown(entity, name)),
            },
        }
    }
    Ok(plans)
}

fn all_scalars(entity: &Entity) -> SelectTree {
    entity
        .scalars
        .iter()
        .fold(SelectTree::new(), |t, s| t.field(s.name))
}

fn column_for(entity: &'static Entity, field: &str) -> BankResult<&'static str> {
    entity
        .scalar(field)
        .map(|s| s.column)
        .ok_or_else(|| unknown(entity, field))
}

fn unknown(entity: &Entity, field: &str) -> BankError {
    BankError::UnknownField {
        entity: entity.name,
        field: field.to_string(),
    }
}

fn to_json(value: &Value, kind: ColumnKind) -> JsonValue {
    match (value, kind) {
        (Value::Null, _) => JsonValue::Null,
        (Value::Integer(i), ColumnKind::Bool) => JsonValue::Bool(*i != 0),
        (Value::Integer(i), ColumnKind::Real) => json!(*i as f64),
        (Value::Integer(i), _) => json!(i),
        (Value::Real(f), _) => json!(f),
        (Value::Text(s), _) => JsonValue::String(s.clone()),
        (Value::Blob(b), _) => JsonValue::String(String::from_utf8_lossy(b).into_owned()),
    }
}
