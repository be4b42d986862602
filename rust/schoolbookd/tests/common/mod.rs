#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub const TENANT: &str = "tenant-admin-uid";

pub fn temp_dir(prefix: &str) -> PathBuf {
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

/// A running schoolbookd. Event lines read while waiting for a response
/// are kept in `events` in arrival order.
pub struct Sidecar {
    child: Child,
    stdin: Option<ChildStdin>,
    reader: BufReader<ChildStdout>,
    pub events: Vec<serde_json::Value>,
    next_id: u64,
}

impl Sidecar {
    pub fn spawn() -> Self {
        let exe = env!("CARGO_BIN_EXE_schoolbookd");
        let mut child = Command::new(exe)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .env_remove("SCHOOLBOOK_WORKSPACE")
            .spawn()
            .expect("spawn schoolbookd");
        let stdin = child.stdin.take().expect("child stdin");
        let stdout = child.stdout.take().expect("child stdout");
        Self {
            child,
            stdin: Some(stdin),
            reader: BufReader::new(stdout),
            events: Vec::new(),
            next_id: 0,
        }
    }

    /// Spawns and selects a fresh workspace under a temp dir.
    pub fn with_workspace(prefix: &str) -> (Self, PathBuf) {
        let ws = temp_dir(prefix);
        let mut sc = Self::spawn();
        sc.ok("workspace.select", json!({ "path": ws.to_string_lossy() }));
        (sc, ws)
    }

    fn read_value(&mut self) -> serde_json::Value {
        let mut line = String::new();
        self.reader.read_line(&mut line).expect("read line");
        assert!(!line.trim().is_empty(), "sidecar closed stdout");
        serde_json::from_str(line.trim()).expect("parse line json")
    }

    pub fn request(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let payload = json!({ "id": id, "method": method, "params": params });
        let stdin = self.stdin.as_mut().expect("stdin open");
        writeln!(stdin, "{}", payload).expect("write request");
        stdin.flush().expect("flush request");

        loop {
            let value = self.read_value();
            if value.get("event").is_some() {
                self.events.push(value);
                continue;
            }
            assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
            return value;
        }
    }

    pub fn ok(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let resp = self.request(method, params);
        assert_eq!(
            resp.get("ok").and_then(|v| v.as_bool()),
            Some(true),
            "{} failed: {}",
            method,
            resp
        );
        resp.get("result").cloned().unwrap_or(serde_json::Value::Null)
    }

    /// Returns the error code of a request that is expected to fail.
    pub fn err_code(&mut self, method: &str, params: serde_json::Value) -> String {
        let resp = self.request(method, params);
        assert_eq!(
            resp.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            resp
        );
        resp.pointer("/error/code")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    }

    /// Events emitted by everything sent so far. A `health` round trip
    /// flushes the events queued behind the last response.
    pub fn drain_events(&mut self) -> Vec<serde_json::Value> {
        let _ = self.request("health", json!({}));
        std::mem::take(&mut self.events)
    }

    pub fn set(&mut self, path: &str, value: serde_json::Value) {
        self.ok("store.set", json!({ "path": path, "value": value }));
    }

    pub fn get(&mut self, path: &str) -> serde_json::Value {
        self.ok("store.get", json!({ "path": path }))
            .get("value")
            .cloned()
            .unwrap_or(serde_json::Value::Null)
    }
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        drop(self.stdin.take());
        let _ = self.child.wait();
    }
}

pub fn tpath(rest: &str) -> String {
    format!("tenants/{}/{}", TENANT, rest)
}

/// A grade-7 class with two subjects (one assigned), a class teacher, and
/// one student. `plan` is stored on the school document.
pub fn seed_school(sc: &mut Sidecar, plan: &str) {
    sc.set(
        &tpath("school"),
        json!({ "name": "Hillside Academy", "motto": "Learn", "plan": plan }),
    );
    sc.set(
        &tpath("teachers/t-ada"),
        json!({ "name": "Ada Obi", "uid": "uid-ada", "salary": 1200.0 }),
    );
    sc.set(
        &tpath("teachers/t-ben"),
        json!({ "name": "Ben Kato", "uid": "uid-ben", "salary": 900.0 }),
    );
    sc.set(
        &tpath("classes/c7"),
        json!({ "name": "Grade 7 East", "grade": 7, "classTeacherId": "t-ada" }),
    );
    sc.set(&tpath("subjects/math"), json!({ "name": "Mathematics", "grade": 7 }));
    sc.set(&tpath("subjects/eng"), json!({ "name": "English", "grade": 7 }));
    sc.set(&tpath("subjects/bio"), json!({ "name": "Biology", "grade": 8 }));
    sc.set(
        &tpath("students/s1"),
        json!({ "name": "Chidi Eze", "classId": "c7", "uid": "uid-chidi", "parentUid": "uid-parent" }),
    );
    sc.ok(
        "assignments.set",
        json!({ "tenantId": TENANT, "classId": "c7", "subjectId": "math", "teacherId": "t-ben" }),
    );
}
