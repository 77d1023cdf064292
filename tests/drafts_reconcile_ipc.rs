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
    let exe = env!("CARGO_BIN_EXE_resultsd");
    let mut child = Command::new(exe)
        .env_remove("RESULTSD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn resultsd");
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
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn request_err_code(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> String {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

fn apply(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    edit: serde_json::Value,
) -> serde_json::Value {
    request_ok(stdin, reader, id, "drafts.apply", json!({ "edit": edit }))
}

#[test]
fn draft_edits_flow_through_reconciliation() {
    let workspace = temp_dir("resultsd-drafts-flow");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let opened = request_ok(&mut stdin, &mut reader, "2", "drafts.open", json!({}));
    let draft = &opened["draft"];
    assert_eq!(draft["resultId"], json!(null));
    assert_eq!(draft["dirty"], json!(false));
    assert_eq!(draft["record"]["data"].as_array().map(|a| a.len()), Some(3));
    assert_eq!(draft["record"]["data"][2]["position"], json!("3rd"));
    assert_eq!(draft["removable"], json!([false, false, false]));

    let _ = apply(
        &mut stdin,
        &mut reader,
        "3",
        json!({ "kind": "topLevel", "field": "year", "value": "2024" }),
    );
    let _ = apply(
        &mut stdin,
        &mut reader,
        "4",
        json!({ "kind": "topLevel", "field": "class", "value": "12Science" }),
    );
    let _ = apply(
        &mut stdin,
        &mut reader,
        "5",
        json!({ "kind": "student", "index": 0, "field": "name", "value": "Asha" }),
    );
    let _ = apply(
        &mut stdin,
        &mut reader,
        "6",
        json!({ "kind": "student", "index": 0, "field": "marks", "value": "480" }),
    );
    let out = apply(
        &mut stdin,
        &mut reader,
        "7",
        json!({ "kind": "student", "index": 0, "field": "totalMarks", "value": 600 }),
    );
    let record = &out["draft"]["record"];
    assert_eq!(out["draft"]["dirty"], json!(true));
    assert_eq!(record["year"], json!("2024"));
    assert_eq!(record["class"], json!("12Science"));
    assert_eq!(record["data"][0]["percentage"], json!("80.00%"));
    assert_eq!(
        record["summary"]["firstPosition"],
        json!({ "name": "Asha", "marks": "480", "totalMarks": "600", "percentage": "80.00%" })
    );
    assert_eq!(
        out["draft"]["locks"]["firstPosition"],
        json!({ "nameAndMarks": true, "totalMarks": true, "percentage": true })
    );

    let _ = apply(
        &mut stdin,
        &mut reader,
        "8",
        json!({ "kind": "summary", "field": "totalStudents", "value": "200" }),
    );
    let out = apply(
        &mut stdin,
        &mut reader,
        "9",
        json!({ "kind": "summary", "field": "passed", "value": "0" }),
    );
    assert_eq!(out["draft"]["record"]["summary"]["result"], json!("0.00%"));

    let saved = request_ok(&mut stdin, &mut reader, "10", "drafts.save", json!({}));
    let result_id = saved["resultId"].as_str().expect("resultId").to_string();
    assert_eq!(saved["draft"]["dirty"], json!(false));
    assert_eq!(saved["draft"]["resultId"], json!(result_id));

    // Second save updates instead of inserting.
    let _ = apply(
        &mut stdin,
        &mut reader,
        "11",
        json!({ "kind": "summary", "field": "passed", "value": 150 }),
    );
    let resaved = request_ok(&mut stdin, &mut reader, "12", "drafts.save", json!({}));
    assert_eq!(resaved["resultId"], json!(result_id));
    let listed = request_ok(&mut stdin, &mut reader, "13", "results.list", json!({}));
    assert_eq!(listed["results"].as_array().map(|a| a.len()), Some(1));
    assert_eq!(listed["results"][0]["summary"]["result"], json!("75.00%"));

    // Reopening the stored record starts a clean draft.
    let reopened = request_ok(
        &mut stdin,
        &mut reader,
        "14",
        "drafts.open",
        json!({ "resultId": result_id }),
    );
    assert_eq!(reopened["draft"]["dirty"], json!(false));
    assert_eq!(
        reopened["draft"]["record"]["summary"]["firstPosition"]["name"],
        json!("Asha")
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn draft_row_management_and_guards() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let code = request_err_code(&mut stdin, &mut reader, "1", "drafts.get", json!({}));
    assert_eq!(code, "no_draft");

    let _ = request_ok(&mut stdin, &mut reader, "2", "drafts.open", json!({}));
    let out = apply(&mut stdin, &mut reader, "3", json!({ "kind": "addStudent" }));
    let data = &out["draft"]["record"]["data"];
    assert_eq!(data.as_array().map(|a| a.len()), Some(4));
    assert_eq!(
        data[3],
        json!({ "position": "4th", "name": "", "marks": "", "totalMarks": "", "percentage": "" })
    );
    assert_eq!(out["draft"]["removable"], json!([false, false, false, true]));

    for (i, name) in ["Asha", "Ravi", "Meera", "Kiran"].iter().enumerate() {
        let _ = apply(
            &mut stdin,
            &mut reader,
            &format!("n{i}"),
            json!({ "kind": "student", "index": i, "field": "name", "value": name }),
        );
    }

    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "4",
        "drafts.apply",
        json!({ "edit": { "kind": "removeStudent", "index": 1 } }),
    );
    assert_eq!(code, "bad_params");
    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "5",
        "drafts.apply",
        json!({ "edit": { "kind": "removeStudent", "index": 9 } }),
    );
    assert_eq!(code, "bad_params");
    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "6",
        "drafts.apply",
        json!({ "edit": { "kind": "student", "index": 9, "field": "name", "value": "X" } }),
    );
    assert_eq!(code, "bad_params");
    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "7",
        "drafts.apply",
        json!({ "edit": { "kind": "summary", "field": "result", "value": "100%" } }),
    );
    assert_eq!(code, "bad_params");

    let out = apply(
        &mut stdin,
        &mut reader,
        "8",
        json!({ "kind": "removeStudent", "index": 3 }),
    );
    assert_eq!(
        out["draft"]["record"]["data"].as_array().map(|a| a.len()),
        Some(3)
    );
    assert_eq!(
        out["draft"]["record"]["summary"]["secondPosition"]["name"],
        json!("Ravi")
    );

    // Saving needs a workspace.
    let code = request_err_code(&mut stdin, &mut reader, "9", "drafts.save", json!({}));
    assert_eq!(code, "no_workspace");

    let discarded = request_ok(&mut stdin, &mut reader, "10", "drafts.discard", json!({}));
    assert_eq!(discarded["discarded"], json!(true));
    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "11",
        "drafts.apply",
        json!({ "edit": { "kind": "addStudent" } }),
    );
    assert_eq!(code, "no_draft");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn auto_filled_position_fields_are_locked() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(&mut stdin, &mut reader, "1", "drafts.open", json!({}));

    // With no ranked names the snapshot is free to edit.
    let out = apply(
        &mut stdin,
        &mut reader,
        "2",
        json!({ "kind": "position", "position": "secondPosition", "field": "marks", "value": "45" }),
    );
    let out2 = apply(
        &mut stdin,
        &mut reader,
        "3",
        json!({ "kind": "position", "position": "secondPosition", "field": "totalMarks", "value": "50" }),
    );
    assert_eq!(out["draft"]["record"]["summary"]["secondPosition"]["marks"], json!("45"));
    assert_eq!(
        out2["draft"]["record"]["summary"]["secondPosition"]["percentage"],
        json!("90.00%")
    );

    let _ = apply(
        &mut stdin,
        &mut reader,
        "4",
        json!({ "kind": "student", "index": 0, "field": "name", "value": "Asha" }),
    );
    let out = apply(
        &mut stdin,
        &mut reader,
        "5",
        json!({ "kind": "student", "index": 0, "field": "marks", "value": "480" }),
    );
    let locks = &out["draft"]["locks"]["firstPosition"];
    assert_eq!(locks["nameAndMarks"], json!(true));
    // Source row has no totalMarks yet; the snapshot's blank one still matches.
    assert_eq!(locks["totalMarks"], json!(true));

    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "6",
        "drafts.apply",
        json!({ "edit": { "kind": "position", "position": "firstPosition", "field": "name", "value": "Someone" } }),
    );
    assert_eq!(code, "field_locked");

    // Clearing the ranked name releases the snapshot for manual entry.
    let out = apply(
        &mut stdin,
        &mut reader,
        "7",
        json!({ "kind": "student", "index": 0, "field": "name", "value": "" }),
    );
    assert_eq!(
        out["draft"]["locks"]["firstPosition"],
        json!({ "nameAndMarks": false, "totalMarks": false, "percentage": false })
    );
    let out = apply(
        &mut stdin,
        &mut reader,
        "8",
        json!({ "kind": "position", "position": "firstPosition", "field": "name", "value": "Someone" }),
    );
    assert_eq!(
        out["draft"]["record"]["summary"]["firstPosition"]["name"],
        json!("Someone")
    );
    assert_eq!(out["reconciled"], json!(false));

    drop(stdin);
    let _ = child.wait();
}
