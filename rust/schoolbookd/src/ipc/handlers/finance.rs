use crate::billing::Feature;
use crate::finance::{self, LedgerKind};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{get_optional_str, get_required_str, get_typed, require_feature, store_mut, store_ref};
use crate::ipc::types::{AppState, Request};
use crate::model::{LedgerEntry, PayrollStatus};
use serde_json::json;

fn handle_payroll_set_status(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let tenant_id = get_required_str(params, "tenantId")?;
    let teacher_id = get_required_str(params, "teacherId")?;
    let month = get_required_str(params, "month")?;
    let raw_status = get_required_str(params, "status")?;
    let status = PayrollStatus::parse(&raw_status).ok_or_else(|| {
        HandlerErr::bad_params("status must be one of: Paid, Pending, Suspended")
            .with_details(json!({ "status": raw_status }))
    })?;
    let amount = match params.get("amount") {
        None | Some(serde_json::Value::Null) => None,
        Some(v) => Some(
            v.as_f64()
                .ok_or_else(|| HandlerErr::bad_params("amount must be a number"))?,
        ),
    };

    let store = store_mut(state)?;
    require_feature(store, &tenant_id, Feature::Payroll)?;
    let today = chrono::Local::now().date_naive();
    let change = finance::set_payroll_status(store, &tenant_id, &teacher_id, &month, status, amount, today)?;
    Ok(json!(change))
}

fn handle_ledger_add(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let tenant_id = get_required_str(params, "tenantId")?;
    let raw_kind = get_required_str(params, "kind")?;
    let kind = LedgerKind::parse(&raw_kind).ok_or_else(|| {
        HandlerErr::bad_params("kind must be one of: expense, income")
            .with_details(json!({ "kind": raw_kind }))
    })?;
    let entry: LedgerEntry = get_typed(params, "entry")?;

    let store = store_mut(state)?;
    require_feature(store, &tenant_id, Feature::Finance)?;
    let id = finance::add_entry(store, &tenant_id, kind, entry)?;
    Ok(json!({ "id": id }))
}

fn handle_finance_summary(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let tenant_id = get_required_str(params, "tenantId")?;
    let month = get_optional_str(params, "month")?;
    let store = store_ref(state)?;
    require_feature(store, &tenant_id, Feature::Finance)?;
    let summary = finance::summarize(store, &tenant_id, month.as_deref())?;
    Ok(json!(summary))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "payroll.setStatus" => handle_payroll_set_status(state, &req.params),
        "ledger.add" => handle_ledger_add(state, &req.params),
        "finance.summary" => handle_finance_summary(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, res))
}
