use crate::calc::{self, GradeScale, SubjectResult};
use crate::db;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{
    get_lookup_term, get_optional_str, get_required_str, get_typed, grade_scale, lookup_term,
    required_term, store_mut, store_ref, GRADE_SCALE_KEY,
};
use crate::ipc::types::{AppState, Request};
use crate::model::ReportCardExtras;
use crate::paths;
use crate::report;
use crate::terms;
use serde_json::json;
use tracing::info;

fn handle_results_get(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let tenant_id = get_required_str(params, "tenantId")?;
    let student_id = get_required_str(params, "studentId")?;
    let term = get_lookup_term(params)?;
    let subject_id = get_required_str(params, "subjectId")?;
    let record: Option<SubjectResult> = store_ref(state)?.get_as(&paths::subject_result(
        &tenant_id,
        &student_id,
        &term,
        &subject_id,
    )?)?;
    Ok(json!({ "record": record }))
}

fn handle_results_save(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let tenant_id = get_required_str(params, "tenantId")?;
    let student_id = get_required_str(params, "studentId")?;
    let term = required_term(params)?;
    let subject_id = get_required_str(params, "subjectId")?;
    let mut record: SubjectResult = get_typed(params, "record")?;
    let auto_grade = params
        .get("autoGrade")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    calc::validate_result(&record)?;
    let store = store_mut(state)?;
    if auto_grade {
        calc::suggest_grade(&mut record, &grade_scale(store));
    }
    store.set_as(
        &paths::subject_result(&tenant_id, &student_id, &term, &subject_id)?,
        &record,
    )?;
    info!(tenant_id = %tenant_id, student_id = %student_id, term = %term, subject_id = %subject_id, "result saved");
    Ok(json!({
        "term": term,
        "record": record,
        "performance": calc::aggregate(&record),
    }))
}

fn handle_reports_aggregate(params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let record: SubjectResult = get_typed(params, "record")?;
    Ok(json!(calc::aggregate(&record)))
}

fn handle_reports_card(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let tenant_id = get_required_str(params, "tenantId")?;
    let student_id = get_required_str(params, "studentId")?;
    let store = store_ref(state)?;

    let subtree = store.get(&paths::student_results(&tenant_id, &student_id)?)?;
    let terms = terms::list_terms(subtree.as_ref());
    let term = match get_optional_str(params, "term")? {
        Some(t) => lookup_term(&t),
        None => match terms::default_term(&terms) {
            Some(t) => t.to_string(),
            None => return Ok(json!({ "terms": terms, "term": null, "report": null })),
        },
    };

    let card = report::assemble_report(store, &tenant_id, &student_id, &term)?;
    Ok(json!({
        "terms": terms,
        "term": term,
        "report": card,
    }))
}

fn handle_extras_get(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let tenant_id = get_required_str(params, "tenantId")?;
    let student_id = get_required_str(params, "studentId")?;
    let term = get_lookup_term(params)?;
    let extras: ReportCardExtras = store_ref(state)?
        .get_as(&paths::report_extras(&tenant_id, &student_id, &term)?)?
        .unwrap_or_default();
    Ok(json!({ "extras": extras }))
}

fn handle_extras_save(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let tenant_id = get_required_str(params, "tenantId")?;
    let student_id = get_required_str(params, "studentId")?;
    let term = required_term(params)?;
    let extras: ReportCardExtras = get_typed(params, "extras")?;
    store_mut(state)?.set_as(&paths::report_extras(&tenant_id, &student_id, &term)?, &extras)?;
    Ok(json!({ "term": term, "extras": extras }))
}

fn handle_grade_scale_get(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    Ok(json!({ "bands": grade_scale(store_ref(state)?) }))
}

fn handle_grade_scale_set(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let scale: GradeScale = get_typed(params, "bands")?;
    let scale = GradeScale::new(scale.into_bands());
    let store = store_ref(state)?;
    let value = serde_json::to_value(&scale)
        .map_err(|e| HandlerErr::bad_params(e.to_string()))?;
    db::settings_set_json(store.connection(), GRADE_SCALE_KEY, &value)
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    Ok(json!({ "bands": value }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "results.get" => handle_results_get(state, &req.params),
        "results.save" => handle_results_save(state, &req.params),
        "reports.aggregate" => handle_reports_aggregate(&req.params),
        "reports.card" => handle_reports_card(state, &req.params),
        "reports.extras.get" => handle_extras_get(state, &req.params),
        "reports.extras.save" => handle_extras_save(state, &req.params),
        "settings.gradeScale.get" => handle_grade_scale_get(state),
        "settings.gradeScale.set" => handle_grade_scale_set(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, res))
}
