//! Input and output documents for the host's text-generation call.
//!
//! The sidecar never calls the service itself. It builds the structured
//! input from an assembled report and stores the structured output back
//! into the report-card extras.

use crate::model::ReportCardExtras;
use crate::paths;
use crate::report::ReportCard;
use crate::store::{DocumentStore, StoreError};
use serde::{Deserialize, Serialize};

pub const SETUP_HINT: &str = "text generation is not enabled for this deployment; finish the service activation step and retry";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectScores {
    pub subject: String,
    pub continuous_assessment: String,
    pub exam_marks: String,
    pub total: String,
    pub grade: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightsInput {
    pub student_name: String,
    pub term: String,
    pub subjects: Vec<SubjectScores>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InsightsOutput {
    pub strengths: Option<String>,
    pub improvements: Option<String>,
    /// Set by the host when the service call failed.
    pub error: Option<String>,
}

pub fn build_input(report: &ReportCard) -> InsightsInput {
    InsightsInput {
        student_name: report.student.name.clone(),
        term: report.term.clone(),
        subjects: report
            .subjects
            .iter()
            .map(|row| SubjectScores {
                subject: row.subject_name.clone(),
                continuous_assessment: row.performance.continuous_assessment.to_string(),
                exam_marks: row.performance.exam_marks.to_string(),
                total: row.performance.total.to_string(),
                grade: row.performance.grade.clone(),
            })
            .collect(),
    }
}

/// Merges the generated text into the stored extras; other fields are kept.
pub fn apply_output(
    store: &mut DocumentStore,
    tenant_id: &str,
    student_id: &str,
    term: &str,
    output: InsightsOutput,
) -> Result<ReportCardExtras, StoreError> {
    let path = paths::report_extras(tenant_id, student_id, term)?;
    let mut extras: ReportCardExtras = store.get_as(&path)?.unwrap_or_default();
    if let Some(s) = output.strengths.filter(|s| !s.trim().is_empty()) {
        extras.strengths = Some(s.trim().to_string());
    }
    if let Some(s) = output.improvements.filter(|s| !s.trim().is_empty()) {
        extras.improvements = Some(s.trim().to_string());
    }
    store.set_as(&path, &extras)?;
    Ok(extras)
}
