mod common;

use common::{seed_school, Sidecar, TENANT};
use serde_json::json;

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let (mut sc, ws) = Sidecar::with_workspace("schoolbook-router-smoke");
    let bundle = ws.join("smoke.schoolbook.zip");
    seed_school(&mut sc, "premium");

    let term = "Term 1 2024";
    let calls = vec![
        ("health", json!({})),
        ("session.signIn", json!({ "uid": "uid-ada" })),
        ("session.get", json!({})),
        ("store.get", json!({ "path": common::tpath("school") })),
        ("store.subscribe", json!({ "path": common::tpath("school") })),
        ("roles.resolve", json!({ "tenantId": TENANT, "classId": "c7" })),
        ("terms.list", json!({ "tenantId": TENANT, "studentId": "s1" })),
        ("results.save", json!({ "tenantId": TENANT, "studentId": "s1", "term": term, "subjectId": "math", "record": { "finalExam": 70 } })),
        ("results.get", json!({ "tenantId": TENANT, "studentId": "s1", "term": term, "subjectId": "math" })),
        ("reports.aggregate", json!({ "record": { "test1": 50 } })),
        ("reports.card", json!({ "tenantId": TENANT, "studentId": "s1" })),
        ("reports.extras.get", json!({ "tenantId": TENANT, "studentId": "s1", "term": term })),
        ("assignments.listForClass", json!({ "tenantId": TENANT, "classId": "c7" })),
        ("settings.gradeScale.get", json!({})),
        ("billing.features", json!({ "tenantId": TENANT })),
        ("payroll.setStatus", json!({ "tenantId": TENANT, "teacherId": "t-ben", "month": "2024-09", "status": "Paid" })),
        ("finance.summary", json!({ "tenantId": TENANT })),
        ("insights.prepare", json!({ "tenantId": TENANT, "studentId": "s1", "term": term })),
        ("backup.exportWorkspaceBundle", json!({ "outPath": bundle.to_string_lossy() })),
        ("session.signOut", json!({})),
    ];
    for (method, params) in calls {
        sc.ok(method, params);
    }

    let unknown = sc.request("nope.method", json!({}));
    assert_eq!(unknown.pointer("/error/code"), Some(&json!("not_implemented")));

    drop(sc);
    let _ = std::fs::remove_dir_all(ws);
}

#[test]
fn malformed_lines_get_bad_json_and_the_loop_continues() {
    use std::io::{BufRead, BufReader, Write};
    use std::process::{Command, Stdio};

    let mut child = Command::new(env!("CARGO_BIN_EXE_schoolbookd"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn schoolbookd");
    let mut stdin = child.stdin.take().expect("stdin");
    let mut reader = BufReader::new(child.stdout.take().expect("stdout"));

    writeln!(stdin, "{{not json").expect("write");
    writeln!(stdin, "{}", json!({ "id": "h", "method": "health" })).expect("write");
    stdin.flush().expect("flush");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read");
    let bad: serde_json::Value = serde_json::from_str(line.trim()).expect("json");
    assert_eq!(bad.pointer("/error/code"), Some(&json!("bad_json")));

    line.clear();
    reader.read_line(&mut line).expect("read");
    let health: serde_json::Value = serde_json::from_str(line.trim()).expect("json");
    assert_eq!(health["id"], json!("h"));
    assert_eq!(health["ok"], json!(true));

    drop(stdin);
    let _ = child.wait();
}
