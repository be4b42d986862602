//! Per-request role derivation. Roles are never persisted.
//!
//! The tenant admin's auth handle is the tenant id itself. Everyone else is
//! found by scanning the tenant's teacher and student records for a
//! matching reference field.

use crate::model::{SchoolClass, Student, Teacher};
use crate::paths;
use crate::store::{DocumentStore, StoreError};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "camelCase")]
pub enum Role {
    Admin,
    #[serde(rename_all = "camelCase")]
    ClassTeacher { teacher_id: String },
    #[serde(rename_all = "camelCase")]
    SubjectTeacher { teacher_id: String },
    #[serde(rename_all = "camelCase")]
    Student { student_id: String },
    #[serde(rename_all = "camelCase")]
    Parent { student_ids: Vec<String> },
    Unrelated,
}

/// Admin check, then teacher scan. `class` is the class under consideration, if any.
pub fn resolve_staff_role(
    tenant_id: &str,
    uid: &str,
    teachers: &[(String, Teacher)],
    class: Option<&SchoolClass>,
) -> Option<Role> {
    if uid == tenant_id {
        return Some(Role::Admin);
    }
    let (teacher_id, _) = teachers
        .iter()
        .find(|(_, t)| t.uid.as_deref() == Some(uid))?;
    let leads_class = class
        .and_then(|c| c.class_teacher_id.as_deref())
        .map(|id| id == teacher_id)
        .unwrap_or(false);
    Some(if leads_class {
        Role::ClassTeacher {
            teacher_id: teacher_id.clone(),
        }
    } else {
        Role::SubjectTeacher {
            teacher_id: teacher_id.clone(),
        }
    })
}

/// Student login first, then parent login (a parent may have several children).
pub fn resolve_family_role(uid: &str, students: &[(String, Student)]) -> Option<Role> {
    if let Some((id, _)) = students
        .iter()
        .find(|(_, s)| s.uid.as_deref() == Some(uid))
    {
        return Some(Role::Student {
            student_id: id.clone(),
        });
    }
    let children: Vec<String> = students
        .iter()
        .filter(|(_, s)| s.parent_uid.as_deref() == Some(uid))
        .map(|(id, _)| id.clone())
        .collect();
    if children.is_empty() {
        None
    } else {
        Some(Role::Parent {
            student_ids: children,
        })
    }
}

pub fn resolve_role(
    tenant_id: &str,
    uid: &str,
    teachers: &[(String, Teacher)],
    students: &[(String, Student)],
    class: Option<&SchoolClass>,
) -> Role {
    resolve_staff_role(tenant_id, uid, teachers, class)
        .or_else(|| resolve_family_role(uid, students))
        .unwrap_or(Role::Unrelated)
}

fn str_field(doc: &Value, field: &str) -> Option<String> {
    doc.get(field).and_then(Value::as_str).map(str::to_string)
}

/// Loads the tenant's teacher and student lists and resolves. Only the
/// reference fields are read, so a record with odd data elsewhere still
/// takes part in the scan.
pub fn resolve_role_in_store(
    store: &DocumentStore,
    tenant_id: &str,
    uid: &str,
    class_id: Option<&str>,
) -> Result<Role, StoreError> {
    if uid == tenant_id {
        return Ok(Role::Admin);
    }
    let class = match class_id {
        Some(id) => store
            .get(&paths::record(tenant_id, paths::CLASSES, id)?)?
            .map(|doc| SchoolClass {
                class_teacher_id: str_field(&doc, "classTeacherId"),
                ..Default::default()
            }),
        None => None,
    };
    let teachers: Vec<(String, Teacher)> = store
        .children(&paths::collection(tenant_id, paths::TEACHERS)?)?
        .into_iter()
        .map(|(id, doc)| {
            let teacher = Teacher {
                uid: str_field(&doc, "uid"),
                ..Default::default()
            };
            (id, teacher)
        })
        .collect();
    let students: Vec<(String, Student)> = store
        .children(&paths::collection(tenant_id, paths::STUDENTS)?)?
        .into_iter()
        .map(|(id, doc)| {
            let student = Student {
                uid: str_field(&doc, "uid"),
                parent_uid: str_field(&doc, "parentUid"),
                ..Default::default()
            };
            (id, student)
        })
        .collect();
    Ok(resolve_role(tenant_id, uid, &teachers, &students, class.as_ref()))
}
