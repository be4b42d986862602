use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{get_required_str, get_required_value, store_mut, store_ref};
use crate::ipc::types::{AppState, Request};
use crate::store::{DocPath, WriteOp};
use serde_json::json;

fn path_param(params: &serde_json::Value) -> Result<DocPath, HandlerErr> {
    Ok(DocPath::parse(&get_required_str(params, "path")?)?)
}

fn handle_get(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let path = path_param(params)?;
    let value = store_ref(state)?.get(&path)?;
    Ok(json!({ "path": path.to_string(), "value": value }))
}

fn handle_set(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let path = path_param(params)?;
    let value = get_required_value(params, "value")?.clone();
    store_mut(state)?.set(&path, value)?;
    Ok(json!({ "path": path.to_string() }))
}

fn handle_remove(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let path = path_param(params)?;
    store_mut(state)?.remove(&path)?;
    Ok(json!({ "path": path.to_string() }))
}

fn handle_query(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let path = path_param(params)?;
    let field = get_required_str(params, "orderBy")?;
    let equals = get_required_value(params, "equalTo")?;
    let items: Vec<serde_json::Value> = store_ref(state)?
        .query(&path, &field, equals)?
        .into_iter()
        .map(|(id, value)| json!({ "id": id, "value": value }))
        .collect();
    Ok(json!({ "items": items }))
}

fn handle_update(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let Some(raw_ops) = get_required_value(params, "ops")?.as_array() else {
        return Err(HandlerErr::bad_params("ops must be an array"));
    };
    let mut ops = Vec::with_capacity(raw_ops.len());
    for op in raw_ops {
        let path = path_param(op)?;
        match op.get("value") {
            None | Some(serde_json::Value::Null) => ops.push(WriteOp::Remove(path)),
            Some(v) => ops.push(WriteOp::Set(path, v.clone())),
        }
    }
    let applied = ops.len();
    store_mut(state)?.update(ops)?;
    Ok(json!({ "applied": applied }))
}

fn handle_subscribe(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let path = path_param(params)?;
    let id = store_mut(state)?.subscribe(path);
    Ok(json!({ "subscriptionId": id }))
}

fn handle_unsubscribe(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let id = params
        .get("subscriptionId")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| HandlerErr::bad_params("missing subscriptionId"))?;
    store_mut(state)?.unsubscribe(id)?;
    Ok(json!({ "subscriptionId": id }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "store.get" => handle_get(state, &req.params),
        "store.set" => handle_set(state, &req.params),
        "store.remove" => handle_remove(state, &req.params),
        "store.query" => handle_query(state, &req.params),
        "store.update" => handle_update(state, &req.params),
        "store.subscribe" => handle_subscribe(state, &req.params),
        "store.unsubscribe" => handle_unsubscribe(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, res))
}
