use crate::store::{DocPath, StoreError};

pub const SCHOOL: &str = "school";
pub const TEACHERS: &str = "teachers";
pub const STUDENTS: &str = "students";
pub const CLASSES: &str = "classes";
pub const SUBJECTS: &str = "subjects";
pub const ASSIGNMENTS: &str = "assignments";
pub const RESULTS: &str = "results";
pub const REPORT_CARDS: &str = "reportCards";
pub const PAYROLL: &str = "payroll";
pub const EXPENSES: &str = "expenses";
pub const INCOME: &str = "income";
pub const PAYMENTS: &str = "payments";

pub fn tenant(tenant_id: &str, rest: &[&str]) -> Result<DocPath, StoreError> {
    let mut segments = Vec::with_capacity(rest.len() + 2);
    segments.push("tenants");
    segments.push(tenant_id);
    segments.extend_from_slice(rest);
    DocPath::new(segments)
}

pub fn school(tenant_id: &str) -> Result<DocPath, StoreError> {
    tenant(tenant_id, &[SCHOOL])
}

pub fn collection(tenant_id: &str, name: &str) -> Result<DocPath, StoreError> {
    tenant(tenant_id, &[name])
}

pub fn record(tenant_id: &str, name: &str, id: &str) -> Result<DocPath, StoreError> {
    tenant(tenant_id, &[name, id])
}

/// At most one assignment exists per (class, subject) because this is the only key used.
pub fn assignment_key(class_id: &str, subject_id: &str) -> String {
    format!("{}_{}", class_id, subject_id)
}

pub fn assignment(tenant_id: &str, class_id: &str, subject_id: &str) -> Result<DocPath, StoreError> {
    record(tenant_id, ASSIGNMENTS, &assignment_key(class_id, subject_id))
}

pub fn student_results(tenant_id: &str, student_id: &str) -> Result<DocPath, StoreError> {
    tenant(tenant_id, &[RESULTS, student_id])
}

pub fn term_results(tenant_id: &str, student_id: &str, term: &str) -> Result<DocPath, StoreError> {
    tenant(tenant_id, &[RESULTS, student_id, term])
}

pub fn subject_result(
    tenant_id: &str,
    student_id: &str,
    term: &str,
    subject_id: &str,
) -> Result<DocPath, StoreError> {
    tenant(tenant_id, &[RESULTS, student_id, term, subject_id])
}

pub fn report_extras(tenant_id: &str, student_id: &str, term: &str) -> Result<DocPath, StoreError> {
    tenant(tenant_id, &[REPORT_CARDS, student_id, term])
}

pub fn payroll_key(teacher_id: &str, month: &str) -> String {
    format!("{}_{}", teacher_id, month)
}

pub fn payroll(tenant_id: &str, teacher_id: &str, month: &str) -> Result<DocPath, StoreError> {
    record(tenant_id, PAYROLL, &payroll_key(teacher_id, month))
}
