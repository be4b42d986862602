mod common;

use common::{seed_school, tpath, Sidecar, TENANT};
use serde_json::json;

fn save(sc: &mut Sidecar, term: &str, subject: &str, record: serde_json::Value) -> serde_json::Value {
    sc.ok(
        "results.save",
        json!({
            "tenantId": TENANT,
            "studentId": "s1",
            "term": term,
            "subjectId": subject,
            "record": record,
            "autoGrade": true,
        }),
    )
}

#[test]
fn card_joins_subjects_teachers_and_averages() {
    let (mut sc, ws) = Sidecar::with_workspace("schoolbook-report-card");
    seed_school(&mut sc, "free");

    let saved = save(
        &mut sc,
        "Term 1 2024",
        "math",
        json!({ "test1": 60, "test2": 70, "midTerm": 80, "finalExam": 90 }),
    );
    assert_eq!(saved["performance"]["continuousAssessment"], json!("70.0"));
    assert_eq!(saved["performance"]["total"], json!("75.0"));
    assert_eq!(saved["record"]["grade"], json!("B"));
    save(&mut sc, "Term 1 2024", "eng", json!({ "finalExam": 50 }));

    let out = sc.ok(
        "reports.card",
        json!({ "tenantId": TENANT, "studentId": "s1", "term": "Term 1 2024" }),
    );
    let report = &out["report"];
    assert_eq!(report["school"]["name"], json!("Hillside Academy"));
    assert_eq!(report["classTeacherName"], json!("Ada Obi"));

    let subjects = report["subjects"].as_array().expect("subjects");
    let names: Vec<&str> = subjects
        .iter()
        .map(|s| s["subjectName"].as_str().unwrap_or(""))
        .collect();
    assert_eq!(names, vec!["English", "Mathematics"]);

    let english = &subjects[0];
    assert_eq!(english["teacherName"], json!("Unassigned"));
    assert_eq!(english["continuousAssessment"], json!("N/A"));
    assert_eq!(english["examMarks"].as_f64(), Some(50.0));
    assert_eq!(english["total"], json!("50.0"));

    let math = &subjects[1];
    assert_eq!(math["teacherName"], json!("Ben Kato"));
    assert_eq!(math["examMarks"].as_f64(), Some(90.0));
    assert_eq!(math["grade"], json!("B"));

    assert_eq!(report["overallAverage"], json!("62.5"));

    drop(sc);
    let _ = std::fs::remove_dir_all(ws);
}

#[test]
fn terms_are_newest_first_and_default_to_latest() {
    let (mut sc, ws) = Sidecar::with_workspace("schoolbook-report-terms");
    seed_school(&mut sc, "free");

    for term in ["Term 1 2024", "Term 3 2023", "Term 2 2024"] {
        save(&mut sc, term, "math", json!({ "finalExam": 55 }));
    }
    // Written directly, bypassing results.save validation.
    sc.set(&tpath("results/s1/Midyear/math"), json!({ "finalExam": 40 }));

    let listed = sc.ok("terms.list", json!({ "tenantId": TENANT, "studentId": "s1" }));
    assert_eq!(
        listed["terms"],
        json!(["Term 2 2024", "Term 1 2024", "Term 3 2023", "Midyear"])
    );
    assert_eq!(listed["defaultTerm"], json!("Term 2 2024"));

    let card = sc.ok("reports.card", json!({ "tenantId": TENANT, "studentId": "s1" }));
    assert_eq!(card["term"], json!("Term 2 2024"));
    assert_eq!(card["report"]["term"], json!("Term 2 2024"));

    drop(sc);
    let _ = std::fs::remove_dir_all(ws);
}

#[test]
fn student_without_results_gets_no_report() {
    let (mut sc, ws) = Sidecar::with_workspace("schoolbook-report-empty");
    seed_school(&mut sc, "free");

    let card = sc.ok("reports.card", json!({ "tenantId": TENANT, "studentId": "s1" }));
    assert_eq!(card["terms"], json!([]));
    assert!(card["report"].is_null());

    drop(sc);
    let _ = std::fs::remove_dir_all(ws);
}

#[test]
fn class_without_grade_degrades_to_no_subjects() {
    let (mut sc, ws) = Sidecar::with_workspace("schoolbook-report-nograde");
    seed_school(&mut sc, "free");
    sc.set(&tpath("classes/c-x"), json!({ "name": "Unsorted" }));
    sc.set(&tpath("students/s2"), json!({ "name": "Dayo", "classId": "c-x" }));

    let card = sc.ok(
        "reports.card",
        json!({ "tenantId": TENANT, "studentId": "s2", "term": "Term 1 2024" }),
    );
    assert_eq!(card["report"]["subjects"], json!([]));
    assert_eq!(card["report"]["overallAverage"], json!("N/A"));
    assert_eq!(card["report"]["classTeacherName"], json!("Unassigned"));

    drop(sc);
    let _ = std::fs::remove_dir_all(ws);
}

#[test]
fn missing_student_or_class_is_not_found() {
    let (mut sc, ws) = Sidecar::with_workspace("schoolbook-report-missing");
    seed_school(&mut sc, "free");
    sc.set(&tpath("students/s3"), json!({ "name": "Orphan", "classId": "gone" }));

    let term = "Term 1 2024";
    assert_eq!(
        sc.err_code(
            "reports.card",
            json!({ "tenantId": TENANT, "studentId": "nobody", "term": term })
        ),
        "not_found"
    );
    let resp = sc.request(
        "reports.card",
        json!({ "tenantId": TENANT, "studentId": "s3", "term": term }),
    );
    assert_eq!(resp.pointer("/error/details/missing"), Some(&json!("class")));

    drop(sc);
    let _ = std::fs::remove_dir_all(ws);
}

#[test]
fn extras_round_trip_into_the_card() {
    let (mut sc, ws) = Sidecar::with_workspace("schoolbook-report-extras");
    seed_school(&mut sc, "free");
    save(&mut sc, "Term 1 2024", "math", json!({ "finalExam": 81 }));

    sc.ok(
        "reports.extras.save",
        json!({
            "tenantId": TENANT,
            "studentId": "s1",
            "term": "Term 1 2024",
            "extras": {
                "attendance": { "daysOpen": 60, "daysPresent": 57, "daysAbsent": 3 },
                "development": { "punctuality": "Good" },
                "principalComment": "Keep it up",
            },
        }),
    );
    let got = sc.ok(
        "reports.extras.get",
        json!({ "tenantId": TENANT, "studentId": "s1", "term": "Term 1 2024" }),
    );
    assert_eq!(got["extras"]["attendance"]["daysPresent"], json!(57));

    let card = sc.ok(
        "reports.card",
        json!({ "tenantId": TENANT, "studentId": "s1", "term": "Term 1 2024" }),
    );
    assert_eq!(card["report"]["extras"]["principalComment"], json!("Keep it up"));
    assert_eq!(card["report"]["extras"]["development"]["punctuality"], json!("Good"));

    // Lower-case spellings reach the same stored keys.
    let loose = sc.ok(
        "reports.extras.get",
        json!({ "tenantId": TENANT, "studentId": "s1", "term": "term 1 2024" }),
    );
    assert_eq!(loose["extras"], got["extras"]);
    let card = sc.ok(
        "reports.card",
        json!({ "tenantId": TENANT, "studentId": "s1", "term": "TERM 1 2024" }),
    );
    assert_eq!(card["term"], json!("Term 1 2024"));
    assert_eq!(card["report"]["subjects"][1]["examMarks"].as_f64(), Some(81.0));
    assert_eq!(card["report"]["extras"]["principalComment"], json!("Keep it up"));

    drop(sc);
    let _ = std::fs::remove_dir_all(ws);
}
