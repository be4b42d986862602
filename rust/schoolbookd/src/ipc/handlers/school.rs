use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{get_optional_str, get_required_str, store_mut, store_ref};
use crate::ipc::types::{AppState, Request};
use crate::model::{Assignment, SchoolClass, Subject, Teacher};
use crate::paths;
use crate::roles;
use crate::store::DocumentStore;
use crate::terms;
use serde_json::json;

fn handle_roles_resolve(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let tenant_id = get_required_str(params, "tenantId")?;
    let uid = match get_optional_str(params, "uid")? {
        Some(uid) => uid,
        None => state
            .session_uid
            .clone()
            .ok_or_else(|| HandlerErr::bad_params("missing uid and no signed-in session"))?,
    };
    let class_id = get_optional_str(params, "classId")?;
    let role = roles::resolve_role_in_store(store_ref(state)?, &tenant_id, &uid, class_id.as_deref())?;
    Ok(serde_json::to_value(role).unwrap_or_else(|_| json!({ "role": "unrelated" })))
}

fn handle_terms_list(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let tenant_id = get_required_str(params, "tenantId")?;
    let student_id = get_required_str(params, "studentId")?;
    let subtree = store_ref(state)?.get(&paths::student_results(&tenant_id, &student_id)?)?;
    let terms = terms::list_terms(subtree.as_ref());
    Ok(json!({
        "defaultTerm": terms::default_term(&terms),
        "terms": terms,
    }))
}

fn require_exists<T: serde::de::DeserializeOwned>(
    store: &DocumentStore,
    tenant_id: &str,
    collection: &str,
    id: &str,
    what: &'static str,
) -> Result<T, HandlerErr> {
    store
        .get_as::<T>(&paths::record(tenant_id, collection, id)?)?
        .ok_or_else(|| {
            HandlerErr::new("not_found", format!("{} not found", what))
                .with_details(json!({ "missing": what, "id": id }))
        })
}

fn handle_assignments_set(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let tenant_id = get_required_str(params, "tenantId")?;
    let class_id = get_required_str(params, "classId")?;
    let subject_id = get_required_str(params, "subjectId")?;
    let teacher_id = get_required_str(params, "teacherId")?;

    let store = store_mut(state)?;
    require_exists::<SchoolClass>(store, &tenant_id, paths::CLASSES, &class_id, "class")?;
    require_exists::<Subject>(store, &tenant_id, paths::SUBJECTS, &subject_id, "subject")?;
    require_exists::<Teacher>(store, &tenant_id, paths::TEACHERS, &teacher_id, "teacher")?;

    let assignment = Assignment {
        class_id: class_id.clone(),
        subject_id: subject_id.clone(),
        teacher_id,
    };
    store.set_as(&paths::assignment(&tenant_id, &class_id, &subject_id)?, &assignment)?;
    Ok(json!({
        "assignmentId": paths::assignment_key(&class_id, &subject_id),
        "assignment": assignment,
    }))
}

fn handle_assignments_list_for_class(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let tenant_id = get_required_str(params, "tenantId")?;
    let class_id = get_required_str(params, "classId")?;
    let items: Vec<serde_json::Value> = store_ref(state)?
        .query_as::<Assignment>(
            &paths::collection(&tenant_id, paths::ASSIGNMENTS)?,
            "classId",
            &json!(class_id),
        )?
        .into_iter()
        .map(|(id, a)| json!({ "id": id, "assignment": a }))
        .collect();
    Ok(json!({ "assignments": items }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "roles.resolve" => handle_roles_resolve(state, &req.params),
        "terms.list" => handle_terms_list(state, &req.params),
        "assignments.set" => handle_assignments_set(state, &req.params),
        "assignments.listForClass" => handle_assignments_list_for_class(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, res))
}
