use crate::backup;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::handlers::core::open_workspace;
use crate::ipc::helpers::{get_optional_str, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::store::DocumentStore;
use serde_json::json;
use std::path::PathBuf;

fn target_workspace(state: &AppState, params: &serde_json::Value) -> Result<PathBuf, HandlerErr> {
    get_optional_str(params, "workspacePath")?
        .map(PathBuf::from)
        .or_else(|| state.workspace.clone())
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

fn handle_export(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let out_path = get_required_str(params, "outPath")?;
    let workspace = target_workspace(state, params)?;
    if let Some(store) = state.store.as_ref() {
        let _ = store.connection().execute_batch("PRAGMA wal_checkpoint(FULL)");
    }
    let summary = backup::export_workspace_bundle(&workspace, &PathBuf::from(&out_path))
        .map_err(|e| {
            HandlerErr::new("io_failed", format!("{e:#}")).with_details(json!({ "path": out_path }))
        })?;
    Ok(json!({
        "path": out_path,
        "bundleFormat": summary.bundle_format,
        "entryCount": summary.entry_count,
        "dbSha256": summary.db_sha256,
    }))
}

fn handle_import(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let in_path = PathBuf::from(get_required_str(params, "inPath")?);
    let workspace = target_workspace(state, params)?;
    if !in_path.is_file() {
        return Err(HandlerErr::new("not_found", "bundle file not found")
            .with_details(json!({ "path": in_path.to_string_lossy() })));
    }

    // The current handle must be closed before its file is replaced.
    let carried = state.store.take().map(DocumentStore::into_subscriptions);
    let imported = backup::import_workspace_bundle(&in_path, &workspace);
    open_workspace(state, &workspace, carried)?;
    let summary = imported.map_err(|e| {
        HandlerErr::new("io_failed", format!("{e:#}"))
            .with_details(json!({ "path": in_path.to_string_lossy() }))
    })?;

    Ok(json!({
        "workspacePath": workspace.to_string_lossy(),
        "bundleFormat": summary.bundle_format,
        "exportedAt": summary.exported_at,
        "dbSha256": summary.db_sha256,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "backup.exportWorkspaceBundle" => handle_export(state, &req.params),
        "backup.importWorkspaceBundle" => handle_import(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, res))
}
