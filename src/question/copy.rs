use super::payload::QuestionPayload;
use super::replicate::{BaseFields, ReplicatorRegistry};
use super::Question;
use crate::error::{BankError, BankResult};
use crate::model::{QuestionSource, QuestionStatus};
use crate::select::{fetch, library, schema};
use rusqlite::{Connection, Transaction};

#[derive(Debug, Clone)]
pub struct CopyOptions {
    pub source: QuestionSource,
    pub prefix: String,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            source: QuestionSource::Copy,
            prefix: String::new(),
        }
    }
}

/// Loads a question with everything a replicator needs.
pub fn load_copy_payload(conn: &Connection, question_id: &str) -> BankResult<QuestionPayload> {
    let raw = fetch::fetch_one(
        conn,
        &schema::QUESTION,
        question_id,
        &library::copy_selection(),
    )?
    .ok_or_else(|| BankError::not_found("question", question_id))?;
    QuestionPayload::from_value(raw)
}

pub fn base_fields(source: &QuestionPayload, opts: &CopyOptions) -> BaseFields {
    BaseFields {
        group_id: source.group_id.clone(),
        title: format!("{}{}", opts.prefix, source.title),
        content: source.content.clone(),
        scratchpad: source.scratchpad.clone(),
        source: opts.source,
        status: QuestionStatus::Active,
        tags: source.tag_labels(),
    }
}

/// Creates an independent copy of `question_id` inside the caller's
/// transaction. Never commits or rolls back.
pub fn copy_question(
    tx: &Transaction<'_>,
    registry: &ReplicatorRegistry,
    question_id: &str,
    opts: &CopyOptions,
) -> BankResult<Question> {
    let source = load_copy_payload(tx, question_id)?;
    let base = base_fields(&source, opts);
    let replicator = registry.get(source.question_type)?;
    let copy = replicator.replicate(tx, &source, &base)?;
    tracing::debug!(
        source_id = %question_id,
        copy_id = %copy.id,
        question_type = %source.question_type,
        "question copied"
    );
    Ok(copy)
}

/// Recreates previously exported questions inside `group_id`.
pub fn import_payloads(
    tx: &Transaction<'_>,
    registry: &ReplicatorRegistry,
    group_id: &str,
    payloads: &[QuestionPayload],
) -> BankResult<Vec<Question>> {
    let mut created = Vec::with_capacity(payloads.len());
    for payload in payloads {
        let base = BaseFields {
            group_id: group_id.to_string(),
            title: payload.title.clone(),
            content: payload.content.clone(),
            scratchpad: payload.scratchpad.clone(),
            source: QuestionSource::Bank,
            status: payload.status,
            tags: payload.tag_labels(),
        };
        let replicator = registry.get(payload.question_type)?;
        created.push(replicator.replicate(tx, payload, &base)?);
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::select::tree::SelectTree;
    use serde_json::json;

    fn seed_exact_match(conn: &Connection) {
        conn.execute_batch(
            "INSERT INTO bank_groups(id, label, created_at) VALUES('g1', 'G', 't');
             INSERT INTO questions(id, group_id, type, status, source, title, content, scratchpad, created_at, updated_at)
               VALUES('src', 'g1', 'exactMatch', 'ACTIVE', 'BANK', 'Anchors', 'Match them', 'private', 't', 't');
             INSERT INTO question_tags(question_id, label) VALUES('src', 'regex');
             INSERT INTO exact_match(question_id) VALUES('src');
             INSERT INTO exact_match_fields(id, question_id, order_index, statement, match_regex)
               VALUES('f1', 'src', 0, 'S1', '^a$'), ('f2', 'src', 1, 'S2', '^b$');",
        )
        .expect("seed");
    }

    #[test]
    fn exact_match_copy_is_independent() {
        let conn = db::open_in_memory().expect("db");
        seed_exact_match(&conn);
        let registry = ReplicatorRegistry::new().expect("registry");

        let tx = conn.unchecked_transaction().expect("tx");
        let copy = copy_question(
            &tx,
            &registry,
            "src",
            &CopyOptions {
                prefix: "Copy of ".to_string(),
                ..CopyOptions::default()
            },
        )
        .expect("copy");
        tx.commit().expect("commit");

        assert_eq!(copy.title, "Copy of Anchors");
        assert_eq!(copy.source, QuestionSource::Copy);
        assert_eq!(copy.scratchpad.as_deref(), Some("private"));
        assert_ne!(copy.id, "src");

        let loaded = fetch::fetch_one(
            &conn,
            &schema::QUESTION,
            &copy.id,
            &SelectTree::new().field("tags").relation(
                "exactMatch",
                SelectTree::new().relation(
                    "fields",
                    SelectTree::new().fields(&["id", "order", "statement", "matchRegex"]),
                ),
            ),
        )
        .expect("fetch")
        .expect("copy row");
        let fields = loaded["exactMatch"]["fields"].as_array().expect("fields");
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0]["statement"], "S1");
        assert_eq!(fields[1]["matchRegex"], "^b$");
        assert_eq!(fields[1]["order"], 1);
        assert!(fields.iter().all(|f| f["id"] != "f1" && f["id"] != "f2"));
        assert_eq!(loaded["tags"], json!([{ "label": "regex" }]));
    }

    #[test]
    fn copy_of_missing_question_is_not_found() {
        let conn = db::open_in_memory().expect("db");
        let registry = ReplicatorRegistry::new().expect("registry");
        let tx = conn.unchecked_transaction().expect("tx");
        let e = copy_question(&tx, &registry, "nope", &CopyOptions::default()).unwrap_err();
        assert!(matches!(e, BankError::NotFound { entity: "question", .. }));
    }

    #[test]
    fn editing_a_copy_leaves_source_untouched() {
        let conn = db::open_in_memory().expect("db");
        seed_exact_match(&conn);
        let registry = ReplicatorRegistry::new().expect("registry");
        let copy = db::in_transaction(&conn, |tx| {
            copy_question(tx, &registry, "src", &CopyOptions::default())
        })
        .expect("copy");

        conn.execute(
            "UPDATE exact_match_fields SET statement = 'changed' WHERE question_id = ?",
            [&copy.id],
        )
        .expect("update copy");
        let original: String = conn
            .query_row(
                "SELECT statement FROM exact_match_fields WHERE id = 'f1'",
                [],
                |r| r.get(0),
            )
            .expect("source field");
        assert_eq!(original, "S1");
    }

    #[test]
    fn every_type_copies_without_registry_miss() {
        let conn = db::open_in_memory().expect("db");
        conn.execute(
            "INSERT INTO bank_groups(id, label, created_at) VALUES('g1', 'G', 't')",
            [],
        )
        .expect("group");
        let registry = ReplicatorRegistry::new().expect("registry");
        for t in crate::model::QuestionType::ALL {
            let draft = QuestionPayload::draft(t, None).expect("draft");
            let created = db::in_transaction(&conn, |tx| {
                import_payloads(tx, &registry, "g1", std::slice::from_ref(&draft))
            })
            .expect("create");
            let copy = db::in_transaction(&conn, |tx| {
                copy_question(tx, &registry, &created[0].id, &CopyOptions::default())
            })
            .expect("copy");
            assert_eq!(copy.question_type, t);
        }
    }
}
