use std::path::PathBuf;

use crate::store::DocumentStore;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub store: Option<DocumentStore>,
    /// Opaque handle from the identity provider, pushed by the host.
    pub session_uid: Option<String>,
    pending_events: Vec<serde_json::Value>,
}

impl AppState {
    pub fn push_auth_event(&mut self) {
        self.pending_events
            .push(json!({ "event": "auth", "uid": self.session_uid }));
    }

    /// Event lines to emit after the current response: auth transitions
    /// first, then subscription snapshots.
    pub fn take_events(&mut self) -> Vec<serde_json::Value> {
        let mut out = std::mem::take(&mut self.pending_events);
        if let Some(store) = self.store.as_mut() {
            out.extend(store.drain_snapshots().into_iter().map(|s| {
                json!({
                    "event": "snapshot",
                    "subscriptionId": s.subscription_id,
                    "path": s.path,
                    "value": s.value,
                })
            }));
        }
        out
    }
}
