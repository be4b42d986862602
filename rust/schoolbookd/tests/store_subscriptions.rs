mod common;

use common::{tpath, Sidecar};
use serde_json::json;

fn snapshots_for(events: &[serde_json::Value], id: u64) -> Vec<serde_json::Value> {
    events
        .iter()
        .filter(|e| e["event"] == json!("snapshot") && e["subscriptionId"] == json!(id))
        .map(|e| e["value"].clone())
        .collect()
}

#[test]
fn subscribers_see_initial_and_changed_values() {
    let (mut sc, ws) = Sidecar::with_workspace("schoolbook-store-subs");
    sc.set(&tpath("students/s1"), json!({ "name": "Ada" }));

    let sub = sc.ok("store.subscribe", json!({ "path": tpath("students") }));
    let id = sub["subscriptionId"].as_u64().expect("subscriptionId");
    let other = sc.ok("store.subscribe", json!({ "path": tpath("teachers") }))["subscriptionId"]
        .as_u64()
        .expect("subscriptionId");

    let initial = sc.drain_events();
    assert_eq!(snapshots_for(&initial, id), vec![json!({ "s1": { "name": "Ada" } })]);
    assert_eq!(snapshots_for(&initial, other), vec![serde_json::Value::Null]);

    sc.set(&tpath("students/s2"), json!({ "name": "Bola" }));
    let changed = sc.drain_events();
    assert_eq!(
        snapshots_for(&changed, id),
        vec![json!({ "s1": { "name": "Ada" }, "s2": { "name": "Bola" } })]
    );
    assert!(snapshots_for(&changed, other).is_empty());

    // A write above the subscribed path also notifies.
    sc.ok("store.remove", json!({ "path": format!("tenants/{}", common::TENANT) }));
    let removed = sc.drain_events();
    assert_eq!(snapshots_for(&removed, id), vec![serde_json::Value::Null]);

    sc.ok("store.unsubscribe", json!({ "subscriptionId": id }));
    sc.set(&tpath("students/s3"), json!({ "name": "Chi" }));
    assert!(snapshots_for(&sc.drain_events(), id).is_empty());
    assert_eq!(
        sc.err_code("store.unsubscribe", json!({ "subscriptionId": id })),
        "not_found"
    );

    drop(sc);
    let _ = std::fs::remove_dir_all(ws);
}

#[test]
fn batched_update_applies_sets_and_removes_together() {
    let (mut sc, ws) = Sidecar::with_workspace("schoolbook-store-update");
    sc.set(&tpath("expenses/e1"), json!({ "title": "Old", "amount": 5 }));

    let out = sc.ok(
        "store.update",
        json!({
            "ops": [
                { "path": tpath("expenses/e1"), "value": null },
                { "path": tpath("expenses/e2"), "value": { "title": "New", "amount": 7 } },
                { "path": tpath("payroll/t1_2024-09/status"), "value": "Paid" },
            ],
        }),
    );
    assert_eq!(out["applied"], json!(3));
    assert_eq!(
        sc.get(&tpath("expenses")),
        json!({ "e2": { "title": "New", "amount": 7 } })
    );
    assert_eq!(sc.get(&tpath("payroll/t1_2024-09")), json!({ "status": "Paid" }));

    let items = sc.ok(
        "store.query",
        json!({ "path": tpath("expenses"), "orderBy": "title", "equalTo": "New" }),
    )["items"]
        .clone();
    assert_eq!(items, json!([{ "id": "e2", "value": { "title": "New", "amount": 7 } }]));

    assert_eq!(
        sc.err_code("store.get", json!({ "path": "tenants//x" })),
        "bad_path"
    );

    drop(sc);
    let _ = std::fs::remove_dir_all(ws);
}

#[test]
fn store_requires_a_workspace() {
    let mut sc = Sidecar::spawn();
    assert_eq!(
        sc.err_code("store.get", json!({ "path": "tenants/t1" })),
        "no_workspace"
    );
}
