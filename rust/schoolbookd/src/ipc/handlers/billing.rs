use crate::billing::{features_for, Plan};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{get_optional_str, get_required_str, store_mut, store_ref, tenant_plan};
use crate::ipc::types::{AppState, Request};
use crate::model::{PaymentTransaction, School};
use crate::paths;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

fn parse_plan(raw: &str) -> Result<Plan, HandlerErr> {
    Plan::parse(raw).ok_or_else(|| {
        HandlerErr::bad_params("plan must be one of: free, basic, premium")
            .with_details(json!({ "plan": raw }))
    })
}

/// `{plan}` is a pure lookup; `{tenantId}` reads the tenant's stored plan.
fn handle_features(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let plan = match get_optional_str(params, "plan")? {
        Some(raw) => parse_plan(&raw)?,
        None => tenant_plan(store_ref(state)?, &get_required_str(params, "tenantId")?)?,
    };
    Ok(json!({ "plan": plan, "features": features_for(plan) }))
}

fn handle_set_plan(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let tenant_id = get_required_str(params, "tenantId")?;
    let plan = parse_plan(&get_required_str(params, "plan")?)?;
    let store = store_mut(state)?;
    let path = paths::school(&tenant_id)?;
    let mut school: School = store
        .get_as(&path)?
        .ok_or_else(|| HandlerErr::new("not_found", "school not found"))?;
    school.plan = Some(plan.as_str().to_string());
    store.set_as(&path, &school)?;
    info!(tenant_id = %tenant_id, plan = plan.as_str(), "plan changed");
    Ok(json!({ "plan": plan, "features": features_for(plan) }))
}

fn handle_record_payment(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let tenant_id = get_required_str(params, "tenantId")?;
    let plan = parse_plan(&get_required_str(params, "plan")?)?;
    let amount = params
        .get("amount")
        .and_then(|v| v.as_f64())
        .filter(|a| a.is_finite() && *a >= 0.0)
        .ok_or_else(|| HandlerErr::new("validation", "amount must be a non-negative number"))?;
    let tx = PaymentTransaction {
        plan: plan.as_str().to_string(),
        amount,
        reference: get_optional_str(params, "reference")?.unwrap_or_default(),
        status: get_optional_str(params, "status")?.unwrap_or_else(|| "initiated".to_string()),
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    let id = Uuid::new_v4().to_string();
    store_mut(state)?.set_as(&paths::record(&tenant_id, paths::PAYMENTS, &id)?, &tx)?;
    Ok(json!({ "paymentId": id, "payment": tx }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "billing.features" => handle_features(state, &req.params),
        "billing.setPlan" => handle_set_plan(state, &req.params),
        "billing.recordPayment" => handle_record_payment(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, res))
}
