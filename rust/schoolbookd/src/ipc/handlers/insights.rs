use crate::billing::Feature;
use crate::insights::{self, InsightsOutput, SETUP_HINT};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{
    get_lookup_term, get_required_str, get_typed, require_feature, required_term, store_mut,
    store_ref,
};
use crate::ipc::types::{AppState, Request};
use crate::report;
use serde_json::json;
use tracing::warn;

fn handle_prepare(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let tenant_id = get_required_str(params, "tenantId")?;
    let student_id = get_required_str(params, "studentId")?;
    let term = get_lookup_term(params)?;
    let store = store_ref(state)?;
    require_feature(store, &tenant_id, Feature::Ai)?;
    let card = report::assemble_report(store, &tenant_id, &student_id, &term)?;
    Ok(json!({ "input": insights::build_input(&card) }))
}

fn handle_apply(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let tenant_id = get_required_str(params, "tenantId")?;
    let student_id = get_required_str(params, "studentId")?;
    let term = required_term(params)?;
    let output: InsightsOutput = get_typed(params, "output")?;
    if let Some(cause) = output.error.as_deref() {
        warn!(tenant_id = %tenant_id, cause, "text generation failed");
        return Err(HandlerErr::new("ai_unavailable", SETUP_HINT)
            .with_details(json!({ "cause": cause, "remediation": "setup" })));
    }
    let store = store_mut(state)?;
    require_feature(store, &tenant_id, Feature::Ai)?;
    let extras = insights::apply_output(store, &tenant_id, &student_id, &term, output)?;
    Ok(json!({ "extras": extras }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "insights.prepare" => handle_prepare(state, &req.params),
        "insights.apply" => handle_apply(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, res))
}
