use crate::calc::ValidationError;
use crate::finance::FinanceError;
use crate::report::ReportError;
use crate::store::StoreError;
use serde_json::json;
use tracing::error;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

#[derive(Debug)]
pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

pub fn respond(id: &str, res: Result<serde_json::Value, HandlerErr>) -> serde_json::Value {
    match res {
        Ok(v) => ok(id, v),
        Err(e) => e.response(id),
    }
}

impl From<StoreError> for HandlerErr {
    fn from(e: StoreError) -> Self {
        match &e {
            StoreError::BadPath { path, .. } => {
                let path = path.clone();
                HandlerErr::new("bad_path", e.to_string()).with_details(json!({ "path": path }))
            }
            StoreError::UnknownSubscription(_) => HandlerErr::new("not_found", e.to_string()),
            StoreError::Decode { .. } => HandlerErr::new("bad_record", e.to_string()),
            StoreError::Db(_) | StoreError::Corrupt { .. } => {
                error!(error = %e, "store failure");
                HandlerErr::new("db_query_failed", e.to_string())
            }
        }
    }
}

impl From<ValidationError> for HandlerErr {
    fn from(e: ValidationError) -> Self {
        HandlerErr::new("validation", e.to_string())
    }
}

impl From<ReportError> for HandlerErr {
    fn from(e: ReportError) -> Self {
        match e {
            ReportError::NotFound(what) => HandlerErr::new("not_found", format!("{} not found", what))
                .with_details(json!({ "missing": what })),
            ReportError::Store(inner) => inner.into(),
        }
    }
}

impl From<FinanceError> for HandlerErr {
    fn from(e: FinanceError) -> Self {
        match e {
            FinanceError::Validation(v) => v.into(),
            FinanceError::NotFound(what) => HandlerErr::new("not_found", format!("{} not found", what))
                .with_details(json!({ "missing": what })),
            FinanceError::Store(inner) => inner.into(),
        }
    }
}
