//! Report-card assembly: the single join-and-average used by every surface
//! that shows a student's term results.

use crate::calc::{self, Mark, SubjectPerformance, SubjectResult};
use crate::model::{Assignment, ReportCardExtras, School, SchoolClass, Student, Subject};
use crate::paths;
use crate::store::{DocumentStore, StoreError};
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::{debug, warn};

pub const UNASSIGNED: &str = "Unassigned";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRow {
    pub subject_id: String,
    pub subject_name: String,
    pub teacher_name: String,
    #[serde(flatten)]
    pub performance: SubjectPerformance,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportCard {
    pub term: String,
    pub school: School,
    pub student_id: String,
    pub student: Student,
    pub class_id: String,
    pub class: SchoolClass,
    pub class_teacher_name: String,
    pub subjects: Vec<SubjectRow>,
    /// Mean of the subject totals that are available, one decimal place.
    pub overall_average: String,
    pub extras: ReportCardExtras,
}

struct TeacherNames<'a> {
    store: &'a DocumentStore,
    tenant_id: &'a str,
    cache: HashMap<String, Option<String>>,
}

impl<'a> TeacherNames<'a> {
    fn new(store: &'a DocumentStore, tenant_id: &'a str) -> Self {
        Self {
            store,
            tenant_id,
            cache: HashMap::new(),
        }
    }

    fn name_of(&mut self, teacher_id: Option<&str>) -> Result<String, StoreError> {
        let Some(id) = teacher_id.filter(|id| !id.is_empty()) else {
            return Ok(UNASSIGNED.to_string());
        };
        if !self.cache.contains_key(id) {
            let doc = self
                .store
                .get(&paths::record(self.tenant_id, paths::TEACHERS, id)?)?;
            let name = doc.as_ref().and_then(|d| d.get("name")).and_then(|n| n.as_str());
            if doc.is_some() && name.is_none() {
                warn!(tenant_id = self.tenant_id, teacher_id = id, "teacher record has no usable name");
            }
            self.cache.insert(id.to_string(), name.map(str::to_string));
        }
        Ok(self
            .cache
            .get(id)
            .cloned()
            .flatten()
            .unwrap_or_else(|| UNASSIGNED.to_string()))
    }
}

fn subjects_for_class(
    store: &DocumentStore,
    tenant_id: &str,
    class_id: &str,
    class: &SchoolClass,
) -> Result<Vec<(String, Subject)>, StoreError> {
    let Some(grade) = class.grade else {
        warn!(tenant_id, class_id, "class has no grade level; skipping subjects");
        return Ok(Vec::new());
    };
    let mut subjects: Vec<(String, Subject)> = Vec::new();
    for (subject_id, raw) in store.query(
        &paths::collection(tenant_id, paths::SUBJECTS)?,
        "grade",
        &json!(grade),
    )? {
        match serde_json::from_value::<Subject>(raw) {
            Ok(subject) => subjects.push((subject_id, subject)),
            Err(e) => warn!(tenant_id, subject_id = %subject_id, error = %e, "skipping malformed subject"),
        }
    }
    subjects.sort_by(|(ia, a), (ib, b)| a.name.cmp(&b.name).then_with(|| ia.cmp(ib)));
    Ok(subjects)
}

/// Results for one (student, term). Records that do not decode are skipped.
pub fn term_results(
    store: &DocumentStore,
    tenant_id: &str,
    student_id: &str,
    term: &str,
) -> Result<BTreeMap<String, SubjectResult>, StoreError> {
    let mut out = BTreeMap::new();
    for (subject_id, raw) in store.children(&paths::term_results(tenant_id, student_id, term)?)? {
        match serde_json::from_value::<SubjectResult>(raw) {
            Ok(r) => {
                out.insert(subject_id, r);
            }
            Err(e) => warn!(student_id, term, subject_id = %subject_id, error = %e, "skipping malformed result"),
        }
    }
    Ok(out)
}

pub fn overall_average(rows: &[SubjectRow]) -> Mark {
    let totals: Vec<f64> = rows
        .iter()
        .filter_map(|r| r.performance.total.value())
        .collect();
    if totals.is_empty() {
        Mark::NotAvailable
    } else {
        Mark::Value(totals.iter().sum::<f64>() / totals.len() as f64)
    }
}

/// student -> class -> class teacher -> subjects for the class grade ->
/// results -> per-subject aggregate. Missing school, student, or class is
/// fatal; everything after that degrades to placeholders.
pub fn assemble_report(
    store: &DocumentStore,
    tenant_id: &str,
    student_id: &str,
    term: &str,
) -> Result<ReportCard, ReportError> {
    let school: School = store
        .get_as(&paths::school(tenant_id)?)?
        .ok_or(ReportError::NotFound("school"))?;
    let student: Student = store
        .get_as(&paths::record(tenant_id, paths::STUDENTS, student_id)?)?
        .ok_or(ReportError::NotFound("student"))?;
    let class_id = student
        .class_id
        .clone()
        .filter(|id| !id.is_empty())
        .ok_or(ReportError::NotFound("class"))?;
    let class: SchoolClass = store
        .get_as(&paths::record(tenant_id, paths::CLASSES, &class_id)?)?
        .ok_or(ReportError::NotFound("class"))?;

    let mut teachers = TeacherNames::new(store, tenant_id);
    let class_teacher_name = teachers.name_of(class.class_teacher_id.as_deref())?;

    let subjects = subjects_for_class(store, tenant_id, &class_id, &class)?;
    let results = term_results(store, tenant_id, student_id, term)?;

    let mut rows = Vec::with_capacity(subjects.len());
    for (subject_id, subject) in subjects {
        let assignment: Option<Assignment> = match store
            .get_as(&paths::assignment(tenant_id, &class_id, &subject_id)?)
        {
            Ok(a) => a,
            Err(StoreError::Decode { path, source }) => {
                warn!(path = %path, error = %source, "ignoring malformed assignment");
                None
            }
            Err(e) => return Err(e.into()),
        };
        let teacher_name = teachers.name_of(assignment.as_ref().map(|a| a.teacher_id.as_str()))?;
        let performance = calc::aggregate(results.get(&subject_id).unwrap_or(&SubjectResult::default()));
        rows.push(SubjectRow {
            subject_id,
            subject_name: subject.name,
            teacher_name,
            performance,
        });
    }

    let extras: ReportCardExtras = store
        .get_as(&paths::report_extras(tenant_id, student_id, term)?)?
        .unwrap_or_default();

    debug!(tenant_id, student_id, term, subjects = rows.len(), "report assembled");
    Ok(ReportCard {
        term: term.to_string(),
        school,
        student_id: student_id.to_string(),
        student,
        class_id,
        class,
        class_teacher_name,
        overall_average: overall_average(&rows).to_string(),
        subjects: rows,
        extras,
    })
}
