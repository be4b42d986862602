mod common;

use common::{seed_school, Sidecar, TENANT};
use serde_json::json;

fn save_params(term: &str, record: serde_json::Value) -> serde_json::Value {
    json!({
        "tenantId": TENANT,
        "studentId": "s1",
        "term": term,
        "subjectId": "math",
        "record": record,
    })
}

#[test]
fn out_of_range_scores_and_bad_terms_are_rejected() {
    let (mut sc, ws) = Sidecar::with_workspace("schoolbook-results-validation");
    seed_school(&mut sc, "free");

    assert_eq!(
        sc.err_code("results.save", save_params("Term 1 2024", json!({ "test1": 101 }))),
        "validation"
    );
    assert_eq!(
        sc.err_code("results.save", save_params("Term 1 2024", json!({ "midTerm": -1 }))),
        "validation"
    );
    assert_eq!(
        sc.err_code("results.save", save_params("Spring 2024", json!({ "test1": 50 }))),
        "validation"
    );
    assert_eq!(
        sc.err_code("results.save", save_params("Term 4 2024", json!({ "test1": 50 }))),
        "validation"
    );
    assert_eq!(
        sc.err_code("results.save", save_params("Term 1 2024", json!({ "test1": "high" }))),
        "bad_params"
    );

    let got = sc.ok(
        "results.get",
        json!({ "tenantId": TENANT, "studentId": "s1", "term": "Term 1 2024", "subjectId": "math" }),
    );
    assert!(got["record"].is_null(), "rejected writes must not persist");

    drop(sc);
    let _ = std::fs::remove_dir_all(ws);
}

#[test]
fn save_normalizes_term_and_round_trips() {
    let (mut sc, ws) = Sidecar::with_workspace("schoolbook-results-roundtrip");
    seed_school(&mut sc, "free");

    let saved = sc.ok(
        "results.save",
        save_params("term 2 2024", json!({ "test1": 0, "finalExam": 100, "grade": "A", "comment": "Strong" })),
    );
    assert_eq!(saved["term"], json!("Term 2 2024"));
    assert_eq!(saved["performance"]["total"], json!("50.0"));
    assert_eq!(saved["performance"]["grade"], json!("A"));

    let got = sc.ok(
        "results.get",
        json!({ "tenantId": TENANT, "studentId": "s1", "term": "Term 2 2024", "subjectId": "math" }),
    );
    assert_eq!(got["record"]["test1"].as_f64(), Some(0.0));
    assert_eq!(got["record"]["comment"], json!("Strong"));

    // The read side accepts the same spelling the write did.
    let loose = sc.ok(
        "results.get",
        json!({ "tenantId": TENANT, "studentId": "s1", "term": "term 2  2024", "subjectId": "math" }),
    );
    assert_eq!(loose["record"], got["record"]);

    drop(sc);
    let _ = std::fs::remove_dir_all(ws);
}

#[test]
fn aggregate_is_pure_and_uses_na_sentinel() {
    let mut sc = Sidecar::spawn();
    let empty = sc.ok("reports.aggregate", json!({ "record": {} }));
    assert_eq!(empty["continuousAssessment"], json!("N/A"));
    assert_eq!(empty["examMarks"], json!("N/A"));
    assert_eq!(empty["total"], json!("N/A"));
    assert_eq!(empty["grade"], json!("N/A"));

    let half = sc.ok("reports.aggregate", json!({ "record": { "test1": 70.25 } }));
    assert_eq!(half["continuousAssessment"], json!("70.3"));
    assert_eq!(half["examMarks"], json!("N/A"));
}

#[test]
fn custom_grade_scale_drives_auto_grade() {
    let (mut sc, ws) = Sidecar::with_workspace("schoolbook-results-scale");
    seed_school(&mut sc, "free");

    sc.ok(
        "settings.gradeScale.set",
        json!({ "bands": [ { "min": 0, "grade": "Fail" }, { "min": 50, "grade": "Pass" } ] }),
    );
    let scale = sc.ok("settings.gradeScale.get", json!({}));
    assert_eq!(scale["bands"][0]["grade"], json!("Pass"));

    let mut params = save_params("Term 1 2024", json!({ "finalExam": 49.96 }));
    params["autoGrade"] = json!(true);
    let saved = sc.ok("results.save", params);
    assert_eq!(saved["record"]["grade"], json!("Pass"));

    drop(sc);
    let _ = std::fs::remove_dir_all(ws);
}
