use crate::question::QuestionPayload;
use crate::select::{fetch, library, schema};
use anyhow::{anyhow, Context};
use rusqlite::Connection;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const QUESTIONS_ENTRY: &str = "questions.json";
const RESULTS_ENTRY: &str = "results.json";
pub const QUESTION_BUNDLE_FORMAT: &str = "evalbank-questions-v1";
pub const EVALUATION_ARCHIVE_FORMAT: &str = "evalbank-evaluation-archive-v1";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub question_count: usize,
    pub sha256: String,
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn write_entries(out_path: &Path, entries: &[(&str, &[u8])]) -> anyhow::Result<()> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, bytes) in entries {
        zip.start_file(*name, opts)
            .with_context(|| format!("failed to start {} entry", name))?;
        zip.write_all(bytes)
            .with_context(|| format!("failed to write {} entry", name))?;
    }
    zip.finish().context("failed to finalize zip bundle")?;
    Ok(())
}

/// Writes every ACTIVE bank question of `group_id`, official answers
/// included, to a zip bundle at `out_path`.
pub fn export_question_bundle(
    conn: &Connection,
    group_id: &str,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    let select = library::export_selection(None);
    let mut questions = fetch::fetch_where(
        conn,
        &schema::QUESTION,
        &[("groupId", group_id), ("status", "ACTIVE")],
        &select,
    )
    .context("failed to load questions for export")?;
    questions.retain(|q| q["source"] != "EVAL");

    let questions_bytes =
        serde_json::to_vec_pretty(&questions).context("failed to serialize questions")?;
    let checksum = sha256_hex(&questions_bytes);
    let manifest = json!({
        "format": QUESTION_BUNDLE_FORMAT,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": crate::db::now_ts(),
        "groupId": group_id,
        "questionCount": questions.len(),
        "sha256": checksum,
    });
    let manifest_bytes =
        serde_json::to_vec_pretty(&manifest).context("failed to serialize manifest")?;

    write_entries(
        out_path,
        &[
            (MANIFEST_ENTRY, manifest_bytes.as_slice()),
            (QUESTIONS_ENTRY, questions_bytes.as_slice()),
        ],
    )?;

    Ok(ExportSummary {
        bundle_format: QUESTION_BUNDLE_FORMAT.to_string(),
        question_count: questions.len(),
        sha256: checksum,
    })
}

fn read_entry(archive: &mut ZipArchive<File>, name: &str) -> anyhow::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    archive
        .by_name(name)
        .with_context(|| format!("bundle missing {}", name))?
        .read_to_end(&mut bytes)
        .with_context(|| format!("failed to read {}", name))?;
    Ok(bytes)
}

/// Reads and verifies a question bundle. Nothing is written to the database.
pub fn read_question_bundle(in_path: &Path) -> anyhow::Result<Vec<QuestionPayload>> {
    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let manifest: Value = serde_json::from_slice(&read_entry(&mut archive, MANIFEST_ENTRY)?)
        .context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != QUESTION_BUNDLE_FORMAT {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }

    let questions_bytes = read_entry(&mut archive, QUESTIONS_ENTRY)?;
    let expected = manifest
        .get("sha256")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let actual = sha256_hex(&questions_bytes);
    if expected != actual {
        return Err(anyhow!(
            "checksum mismatch for {}: manifest {}, content {}",
            QUESTIONS_ENTRY,
            expected,
            actual
        ));
    }

    let raw: Vec<Value> =
        serde_json::from_slice(&questions_bytes).context("questions.json is invalid JSON")?;
    raw.into_iter()
        .map(|v| QuestionPayload::from_value(v).map_err(anyhow::Error::from))
        .collect()
}

/// Snapshot of an evaluation's results, written when it is archived.
pub fn write_evaluation_archive(
    archive_dir: &Path,
    evaluation_id: &str,
    results: &Value,
) -> anyhow::Result<PathBuf> {
    let results_bytes =
        serde_json::to_vec_pretty(results).context("failed to serialize results")?;
    let manifest = json!({
        "format": EVALUATION_ARCHIVE_FORMAT,
        "evaluationId": evaluation_id,
        "archivedAt": crate::db::now_ts(),
        "sha256": sha256_hex(&results_bytes),
    });
    let manifest_bytes =
        serde_json::to_vec_pretty(&manifest).context("failed to serialize manifest")?;

    let out_path = archive_dir.join(format!("evaluation-{}.zip", evaluation_id));
    write_entries(
        &out_path,
        &[
            (MANIFEST_ENTRY, manifest_bytes.as_slice()),
            (RESULTS_ENTRY, results_bytes.as_slice()),
        ],
    )?;
    tracing::info!(path = %out_path.to_string_lossy(), "evaluation archive written");
    Ok(out_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let dir = std::env::temp_dir().join(format!("{}-{}", prefix, nanos));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    fn seed(conn: &Connection) {
        conn.execute_batch(
            "INSERT INTO bank_groups(id, label, created_at) VALUES('g1', 'G', 't');
             INSERT INTO questions(id, group_id, type, status, source, title, content, created_at, updated_at)
               VALUES('tf', 'g1', 'trueFalse', 'ACTIVE', 'BANK', 'Sky', 'Is it blue?', 't', 't'),
                     ('old', 'g1', 'essay', 'ARCHIVED', 'BANK', 'Old', '', 't', 't');
             INSERT INTO true_false(question_id, is_true) VALUES('tf', 1);
             INSERT INTO essay(question_id, solution, template) VALUES('old', '', '');",
        )
        .expect("seed");
    }

    #[test]
    fn export_then_read_keeps_official_answers() {
        let conn = db::open_in_memory().expect("db");
        seed(&conn);
        let dir = temp_dir("evalbank-bundle");
        let path = dir.join("bank.zip");
        let summary = export_question_bundle(&conn, "g1", &path).expect("export");
        assert_eq!(summary.question_count, 1);

        let payloads = read_question_bundle(&path).expect("read");
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].title, "Sky");
        let tf = payloads[0].true_false.as_ref().expect("tf data");
        assert_eq!(tf.is_true, Some(true));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn tampered_questions_fail_checksum() {
        let dir = temp_dir("evalbank-bundle-bad");
        let path = dir.join("bad.zip");
        let manifest = json!({ "format": QUESTION_BUNDLE_FORMAT, "sha256": "00" });
        let manifest_bytes = serde_json::to_vec(&manifest).expect("manifest");
        write_entries(
            &path,
            &[
                (MANIFEST_ENTRY, manifest_bytes.as_slice()),
                (QUESTIONS_ENTRY, b"[]".as_slice()),
            ],
        )
        .expect("write");
        let err = read_question_bundle(&path).unwrap_err();
        assert!(format!("{err:#}").contains("checksum mismatch"));
        let _ = std::fs::remove_dir_all(dir);
    }
}
