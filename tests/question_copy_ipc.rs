use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_evalbankd");
    let mut child = Command::new(exe)
        .env_remove("EVALBANK_WORKSPACE")
        .env_remove("EVALBANK_COPY_PREFIX")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn evalbankd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
            .get("error")
            .cloned()
            .unwrap_or(serde_json::Value::Null)
    );
    value.get("result").cloned().unwrap_or(serde_json::Value::Null)
}

fn error_code(value: &serde_json::Value) -> &str {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

fn setup(prefix: &str) -> (Child, ChildStdin, BufReader<ChildStdout>, PathBuf, String) {
    let workspace = temp_dir(prefix);
    let (child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let group = request_ok(
        &mut stdin,
        &mut reader,
        "grp",
        "groups.create",
        json!({ "label": "Regex 101" }),
    );
    let group_id = group["groupId"].as_str().expect("groupId").to_string();
    (child, stdin, reader, workspace, group_id)
}

#[test]
fn exact_match_copy_gets_prefix_and_fresh_field_ids() {
    let (mut child, mut stdin, mut reader, workspace, group_id) = setup("evalbank-copy-em");

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "questions.create",
        json!({
            "groupId": group_id,
            "type": "exactMatch",
            "title": "Anchors",
            "content": "Write the patterns",
            "scratchpad": "grading notes",
            "tags": ["regex"],
            "data": {
                "fields": [
                    { "order": 0, "statement": "Starts with a", "matchRegex": "^a" },
                    { "order": 1, "statement": "Ends with z", "matchRegex": "z$" }
                ]
            }
        }),
    );
    let source_id = created["question"]["id"].as_str().expect("id").to_string();
    assert_eq!(created["question"]["source"], "BANK");

    let copied = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "questions.copy",
        json!({ "questionId": source_id, "prefix": "Copy of " }),
    );
    let copy = &copied["question"];
    let copy_id = copy["id"].as_str().expect("copy id").to_string();
    assert_ne!(copy_id, source_id);
    assert_eq!(copy["title"], "Copy of Anchors");
    assert_eq!(copy["source"], "COPY");
    assert_eq!(copy["status"], "ACTIVE");
    assert_eq!(copy["scratchpad"], "grading notes");

    let params = |id: &str| {
        json!({
            "questionId": id,
            "includeProfessorOnlyInfo": true,
            "withOfficialAnswers": true
        })
    };
    let source = request_ok(&mut stdin, &mut reader, "3", "questions.get", params(&source_id));
    let copy = request_ok(&mut stdin, &mut reader, "4", "questions.get", params(&copy_id));

    let source_fields = source["question"]["exactMatch"]["fields"]
        .as_array()
        .expect("source fields")
        .clone();
    let copy_fields = copy["question"]["exactMatch"]["fields"]
        .as_array()
        .expect("copy fields")
        .clone();
    assert_eq!(copy_fields.len(), 2);
    for (s, c) in source_fields.iter().zip(copy_fields.iter()) {
        assert_ne!(s["id"], c["id"]);
        assert_eq!(s["statement"], c["statement"]);
        assert_eq!(s["matchRegex"], c["matchRegex"]);
        assert_eq!(s["order"], c["order"]);
    }
    assert_eq!(copy["question"]["tags"], json!([{ "label": "regex" }]));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn editing_a_copy_leaves_the_source_alone() {
    let (mut child, mut stdin, mut reader, workspace, group_id) = setup("evalbank-copy-mc");

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "questions.create",
        json!({ "groupId": group_id, "type": "multipleChoice", "title": "Pick one" }),
    );
    let source_id = created["question"]["id"].as_str().expect("id").to_string();
    let copied = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "questions.copy",
        json!({ "questionId": source_id }),
    );
    let copy_id = copied["question"]["id"].as_str().expect("copy id").to_string();
    assert_eq!(copied["question"]["title"], "Pick one");

    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "questions.update",
        json!({ "questionId": copy_id, "title": "Pick two", "tags": ["edited"] }),
    );
    let source = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "questions.get",
        json!({ "questionId": source_id, "includeProfessorOnlyInfo": true }),
    );
    assert_eq!(source["question"]["title"], "Pick one");
    assert_eq!(source["question"]["tags"], json!([]));

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "questions.list",
        json!({ "groupId": group_id }),
    );
    assert_eq!(listed["questions"].as_array().map(|a| a.len()), Some(2));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn copying_unknown_question_or_as_eval_is_refused() {
    let (mut child, mut stdin, mut reader, workspace, group_id) = setup("evalbank-copy-missing");

    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "questions.copy",
        json!({ "questionId": "does-not-exist" }),
    );
    assert_eq!(resp["ok"], false);
    assert_eq!(error_code(&resp), "not_found");

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "questions.create",
        json!({ "groupId": group_id, "type": "essay", "title": "Explain" }),
    );
    let source_id = created["question"]["id"].as_str().expect("id").to_string();
    let resp = request(
        &mut stdin,
        &mut reader,
        "3",
        "questions.copy",
        json!({ "questionId": source_id, "source": "EVAL" }),
    );
    assert_eq!(resp["ok"], false);
    assert_eq!(error_code(&resp), "bad_params");

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "questions.list",
        json!({ "groupId": group_id }),
    );
    let listed = listed["questions"].as_array().expect("questions");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["id"], source_id.as_str());

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
