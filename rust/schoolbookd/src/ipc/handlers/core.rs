use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::get_required_str;
use crate::ipc::types::{AppState, Request};
use crate::store::{DocumentStore, Subscriptions};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::info;

fn handle_health(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    Ok(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
        "sessionUid": state.session_uid,
        "subscriptions": state.store.as_ref().map(|s| s.subscription_count()).unwrap_or(0),
    }))
}

/// Opens (or creates) the workspace database and makes it current.
/// Subscriptions move to the new store: `carried` when the caller already
/// closed the old one, otherwise those of the store being replaced.
pub fn open_workspace(
    state: &mut AppState,
    path: &Path,
    carried: Option<Subscriptions>,
) -> Result<(), HandlerErr> {
    let mut store = DocumentStore::open(path)
        .map_err(|e| HandlerErr::new("db_open_failed", format!("{e:?}")))?;
    if let Some(subs) = carried.or_else(|| state.store.take().map(DocumentStore::into_subscriptions)) {
        store.adopt_subscriptions(subs);
    }
    state.workspace = Some(path.to_path_buf());
    state.store = Some(store);
    info!(workspace = %path.display(), "workspace opened");
    Ok(())
}

fn handle_workspace_select(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let path = PathBuf::from(get_required_str(params, "path")?);
    open_workspace(state, &path, None)?;
    Ok(json!({ "workspacePath": path.to_string_lossy() }))
}

fn handle_session_sign_in(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let uid = get_required_str(params, "uid")?;
    if state.session_uid.as_deref() != Some(uid.as_str()) {
        state.session_uid = Some(uid);
        state.push_auth_event();
    }
    Ok(json!({ "uid": state.session_uid }))
}

fn handle_session_sign_out(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    if state.session_uid.take().is_some() {
        state.push_auth_event();
    }
    Ok(json!({ "uid": null }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "health" => handle_health(state),
        "workspace.select" => handle_workspace_select(state, &req.params),
        "session.signIn" => handle_session_sign_in(state, &req.params),
        "session.signOut" => handle_session_sign_out(state),
        "session.get" => Ok(json!({ "uid": state.session_uid })),
        _ => return None,
    };
    Some(respond(&req.id, res))
}
