use crate::billing::{self, Feature, Plan};
use crate::calc::GradeScale;
use crate::db;
use crate::ipc::error::HandlerErr;
use crate::ipc::types::AppState;
use crate::model::School;
use crate::paths;
use crate::store::DocumentStore;
use crate::terms::TermKey;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::warn;

pub const GRADE_SCALE_KEY: &str = "grade_scale";

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_optional_str(params: &serde_json::Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => match v.as_str() {
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) => Ok(Some(s.trim().to_string())),
            None => Err(HandlerErr::bad_params(format!("{} must be a string", key))),
        },
    }
}

pub fn get_required_value<'a>(
    params: &'a serde_json::Value,
    key: &str,
) -> Result<&'a serde_json::Value, HandlerErr> {
    params
        .get(key)
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// Decodes `params[key]` into a typed document.
pub fn get_typed<T: DeserializeOwned>(params: &serde_json::Value, key: &str) -> Result<T, HandlerErr> {
    let raw = get_required_value(params, key)?;
    serde_json::from_value(raw.clone()).map_err(|e| {
        HandlerErr::bad_params(format!("{} has an invalid shape: {}", key, e))
            .with_details(json!({ "field": key }))
    })
}

/// Term key for a write: must be `Term {1..3} {year}`, returned normalised.
pub fn required_term(params: &serde_json::Value) -> Result<String, HandlerErr> {
    let raw = get_required_str(params, "term")?;
    let key = TermKey::parse(&raw).ok_or_else(|| {
        HandlerErr::new("validation", "term must look like 'Term 1 2024'")
            .with_details(json!({ "term": raw }))
    })?;
    if !(1..=3).contains(&key.term) {
        return Err(HandlerErr::new("validation", "term number must be 1, 2 or 3")
            .with_details(json!({ "term": raw })));
    }
    Ok(key.label())
}

/// Term key for a read. Parseable keys are normalised the way writes store
/// them; anything else is looked up as given so legacy keys stay reachable.
pub fn lookup_term(raw: &str) -> String {
    TermKey::parse(raw)
        .map(|k| k.label())
        .unwrap_or_else(|| raw.to_string())
}

pub fn get_lookup_term(params: &serde_json::Value) -> Result<String, HandlerErr> {
    Ok(lookup_term(&get_required_str(params, "term")?))
}

pub fn store_ref(state: &AppState) -> Result<&DocumentStore, HandlerErr> {
    state
        .store
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn store_mut(state: &mut AppState) -> Result<&mut DocumentStore, HandlerErr> {
    state
        .store
        .as_mut()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn tenant_plan(store: &DocumentStore, tenant_id: &str) -> Result<Plan, HandlerErr> {
    let school: Option<School> = store.get_as(&paths::school(tenant_id)?)?;
    Ok(Plan::from_stored(school.as_ref().and_then(|s| s.plan.as_deref())))
}

pub fn require_feature(
    store: &DocumentStore,
    tenant_id: &str,
    feature: Feature,
) -> Result<(), HandlerErr> {
    let plan = tenant_plan(store, tenant_id)?;
    if billing::features_for(plan).allows(feature) {
        return Ok(());
    }
    Err(HandlerErr::new(
        "plan_required",
        format!("the {} plan does not include {}", plan.as_str(), feature.as_str()),
    )
    .with_details(json!({ "feature": feature.as_str(), "plan": plan.as_str() })))
}

/// Workspace override from settings, else the default scale.
pub fn grade_scale(store: &DocumentStore) -> GradeScale {
    match db::settings_get_json(store.connection(), GRADE_SCALE_KEY) {
        Ok(Some(v)) => match serde_json::from_value::<GradeScale>(v) {
            Ok(scale) => GradeScale::new(scale.into_bands()),
            Err(e) => {
                warn!(error = %e, "ignoring malformed grade scale setting");
                GradeScale::default()
            }
        },
        Ok(None) => GradeScale::default(),
        Err(e) => {
            warn!(error = %e, "failed to read grade scale setting");
            GradeScale::default()
        }
    }
}
