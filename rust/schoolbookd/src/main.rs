mod backup;
mod billing;
mod calc;
mod config;
mod db;
mod finance;
mod insights;
mod ipc;
mod model;
mod paths;
mod report;
mod roles;
mod store;
mod terms;

use serde_json::json;
use std::io::{self, BufRead, Write};
use tracing::{info, warn};

fn write_line(out: &mut impl Write, value: &serde_json::Value) {
    let text = serde_json::to_string(value).unwrap_or_else(|_| "{\"ok\":false}".to_string());
    let _ = writeln!(out, "{}", text);
}

fn main() {
    let config = config::Config::from_env();
    config::init_tracing(&config);
    info!(version = env!("CARGO_PKG_VERSION"), "schoolbookd starting");

    let mut state = ipc::AppState::default();
    if let Some(ws) = config.workspace.as_deref() {
        let req = ipc::Request {
            id: "startup".to_string(),
            method: "workspace.select".to_string(),
            params: json!({ "path": ws.to_string_lossy() }),
        };
        let resp = ipc::handle_request(&mut state, req);
        if resp.get("ok").and_then(|v| v.as_bool()) != Some(true) {
            warn!(workspace = %ws.display(), response = %resp, "could not open configured workspace");
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // No id to reply to.
                warn!(error = %e, "unparseable request line");
                write_line(
                    &mut stdout,
                    &json!({ "ok": false, "error": { "code": "bad_json", "message": e.to_string() } }),
                );
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        write_line(&mut stdout, &resp);
        for event in state.take_events() {
            write_line(&mut stdout, &event);
        }
        let _ = stdout.flush();
    }
    info!("stdin closed, exiting");
}
