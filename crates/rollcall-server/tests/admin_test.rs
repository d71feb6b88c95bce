//! integration tests for student, class and dashboard administration

mod common;

use axum::http::StatusCode;
use common::{TestApp, monday};
use serde_json::json;

#[tokio::test]
async fn test_student_crud() {
    let t = TestApp::new().await;
    let class_id = t.math_class().await;

    let (status, created) = t
        .post(
            "/api/students",
            json!({"name": "Alice", "email": "alice@example.com", "student_code": "S-1", "class_id": class_id}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(created["message"], "Student created successfully");
    // first auto-assigned slot
    assert_eq!(created["student"]["fingerprint_id"], 1);
    assert_eq!(created["student"]["has_template"], false);
    let id = created["student"]["id"].as_i64().unwrap();

    let (status, by_slot) = t.get("/api/students/by-fingerprint/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_slot["id"], id);

    let (status, updated) = t
        .put(&format!("/api/students/{id}"), json!({"email": null, "name": "Alice B"}))
        .await;
    assert_eq!(status, StatusCode::OK, "{updated}");
    assert_eq!(updated["student"]["name"], "Alice B");
    assert!(updated["student"]["email"].is_null());
    assert_eq!(updated["student"]["student_code"], "S-1");

    let (_, list) = t.get(&format!("/api/students?class_id={class_id}&search=alice")).await;
    assert_eq!(list["students"].as_array().unwrap().len(), 1);

    let (status, _) = t.delete(&format!("/api/students/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = t.get(&format!("/api/students/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Student not found");
}

#[tokio::test]
async fn test_student_conflicts_and_validation() {
    let t = TestApp::new().await;
    t.student("Alice", 7, None).await;
    let bob = t.student("Bob", 8, None).await;

    let (status, body) = t
        .post("/api/students", json!({"name": "Eve", "fingerprint_id": 7}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["reason"], "conflict");

    let (status, _) = t.put(&format!("/api/students/{bob}"), json!({"fingerprint_id": 7})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = t.post("/api/students", json!({"name": "   "})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "invalid_request");

    let (status, _) = t
        .post("/api/students", json!({"name": "Zed", "fingerprint_id": -3}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t.get("/api/students/by-fingerprint/0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t.post("/api/students/999/enroll", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = t
        .post(&format!("/api/students/{bob}/enroll"), json!({"device_id": "GHOST"}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_class_crud_and_schedules() {
    let t = TestApp::new().await;
    let id = t.math_class().await;
    t.student("Alice", 1, Some(id)).await;

    let (status, class) = t.get(&format!("/api/classes/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(class["student_count"], 1);
    assert_eq!(class["schedules"][0]["day_of_week"], "monday");
    assert_eq!(class["schedules"][0]["start_time"], "10:00:00");

    let (status, body) = t
        .post("/api/classes", json!({"name": "Copy", "code": "M101"}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let (status, updated) = t
        .put(&format!("/api/classes/{id}"), json!({"teacher_name": "Dr. Rahman", "is_active": false}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["class"]["teacher_name"], "Dr. Rahman");
    assert_eq!(updated["class"]["code"], "M101");

    let (_, active) = t.get("/api/classes?active=true").await;
    assert_eq!(active["classes"].as_array().unwrap().len(), 0);
    let (_, all) = t.get("/api/classes").await;
    assert_eq!(all["classes"].as_array().unwrap().len(), 1);

    let (status, schedules) = t
        .put(
            &format!("/api/classes/{id}/schedules"),
            json!({"schedules": [
                {"day_of_week": "Wednesday", "start_time": "14:00", "end_time": "15:30"},
                {"day_of_week": "monday", "start_time": "08:00", "end_time": "09:00"}
            ]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{schedules}");
    let days: Vec<&str> = schedules["schedules"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["day_of_week"].as_str().unwrap())
        .collect();
    assert_eq!(days, ["monday", "wednesday"]);

    let (status, body) = t
        .put(
            &format!("/api/classes/{id}/schedules"),
            json!({"schedules": [{"day_of_week": "friday", "start_time": "15:00", "end_time": "14:00"}]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "invalid_request");

    let (_, roster) = t.get(&format!("/api/classes/{id}/students")).await;
    assert_eq!(roster["class"]["name"], "Math");
    assert_eq!(roster["students"][0]["name"], "Alice");

    let (status, _) = t.delete(&format!("/api/classes/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = t.get(&format!("/api/classes/{id}/schedules")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deleting_class_idles_devices() {
    let t = TestApp::new().await;
    let id = t.math_class().await;
    t.post(
        "/api/device/set-mode",
        json!({"device_id": "ESP32-01", "mode": "attendance", "class_id": id}),
    )
    .await;

    t.delete(&format!("/api/classes/{id}")).await;

    let (_, device) = t.get("/api/device/ESP32-01").await;
    assert_eq!(device["mode"], "idle");
    assert!(device["current_class_id"].is_null());
}

#[tokio::test]
async fn test_active_class() {
    let t = TestApp::new().await;
    let id = t.math_class().await;

    let (status, body) = t.get("/api/classes/active").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], false);
    assert!(body["class"].is_null());

    t.set_time(monday(10, 30));
    let (_, body) = t.get("/api/classes/active?device_id=ESP32-01").await;
    assert_eq!(body["active"], true);
    assert_eq!(body["class"]["class_id"], id);
    assert_eq!(body["class"]["class_name"], "Math");
}

#[tokio::test]
async fn test_dashboard_counts() {
    let t = TestApp::new().await;
    t.math_class().await;
    let alice = t.student("Alice", 1, None).await;
    t.student("Bob", 2, None).await;
    t.post(&format!("/api/students/{alice}/delete-fingerprint"), json!({}))
        .await;

    t.set_time(monday(10, 10));
    t.scan_slot(2).await;

    let (status, dash) = t.get("/api/dashboard").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dash["total_students"], 2);
    assert_eq!(dash["total_classes"], 1);
    assert_eq!(dash["active_classes"], 1);
    assert_eq!(dash["total_devices"], 1);
    assert_eq!(dash["pending_commands"], 1);
    assert_eq!(dash["today"], "2025-03-03");
    assert_eq!(dash["today_attendance"], 1);
    assert_eq!(dash["current_class"]["class_name"], "Math");
    assert_eq!(dash["recent_attendance"][0]["student_name"], "Bob");
}
