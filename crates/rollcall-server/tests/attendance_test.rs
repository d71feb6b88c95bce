//! integration tests for scan verification and the attendance endpoints

mod common;

use axum::http::StatusCode;
use chrono::Duration;
use common::{TestApp, monday, template_hex};
use serde_json::json;

/// full enrollment to attendance cycle for one student
#[tokio::test]
async fn test_enroll_then_verify_by_template() {
    let t = TestApp::new().await;
    let class_id = t.math_class().await;
    let alice = t.student("Alice", 7, Some(class_id)).await;

    // admin queues the enrollment
    let (status, body) = t.post(&format!("/api/students/{alice}/enroll"), json!({})).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["command"]["command_type"], "enroll");
    assert_eq!(body["command"]["fingerprint_id"], 7);
    let command_id = body["command"]["id"].as_i64().unwrap();

    let (_, device) = t.get("/api/device/ESP32-01").await;
    assert_eq!(device["mode"], "enrollment");

    // scanner picks it up
    let (status, poll) = t.post("/api/device/poll", json!({"device_id": "ESP32-01"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(poll["has_command"], true);
    assert_eq!(poll["id"], command_id);
    assert_eq!(poll["student_name"], "Alice");

    // and reports the captured template
    let (status, done) = t
        .post(
            &format!("/api/device/command/{command_id}/complete"),
            json!({"status": "completed", "template": template_hex(0x5a)}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{done}");
    assert_eq!(done["command"]["status"], "completed");
    assert_eq!(done["template_updated"], true);
    assert_eq!(done["device_reset"], true);

    let (_, student) = t.get(&format!("/api/students/{alice}")).await;
    assert_eq!(student["has_template"], true);
    assert!(student.get("fingerprint_template").is_none());

    let (_, device) = t.get("/api/device/ESP32-01").await;
    assert_eq!(device["mode"], "idle");

    // entry at 10:02 by template
    t.set_time(monday(10, 2));
    let (status, entry) = t
        .post(
            "/api/attendance/verify",
            json!({"template": template_hex(0x5a), "device_id": "ESP32-01"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{entry}");
    assert_eq!(entry["status"], "entry");
    assert_eq!(entry["student_id"], alice);
    assert_eq!(entry["class_id"], class_id);
    assert_eq!(entry["class_name"], "Math");
    assert_eq!(entry["attendance_status"], "present");
    assert_eq!(entry["confidence"], 100);

    // repeat scan a minute later
    t.advance(Duration::minutes(1));
    let (status, cooldown) = t
        .post("/api/attendance/verify", json!({"template": template_hex(0x5a)}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(cooldown["status"], "cooldown");
    assert_eq!(cooldown["minutes_remaining"], 2);
    assert_eq!(cooldown["seconds_remaining"], 120);

    // exit twelve minutes after entry
    t.set_time(monday(10, 14));
    let (status, exit) = t
        .post("/api/attendance/verify", json!({"template": template_hex(0x5a)}))
        .await;
    assert_eq!(status, StatusCode::OK, "{exit}");
    assert_eq!(exit["status"], "exit");
    assert_eq!(exit["duration_minutes"], 12);
    assert_eq!(exit["attendance_id"], entry["attendance_id"]);

    // session is closed for the day
    t.set_time(monday(10, 30));
    let (status, again) = t
        .post("/api/attendance/verify", json!({"template": template_hex(0x5a)}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(again["status"], "error");
    assert_eq!(again["reason"], "already_recorded");

    let (_, list) = t.get(&format!("/api/attendance?student_id={alice}")).await;
    assert_eq!(list["count"], 1);
    assert_eq!(list["attendances"][0]["student_name"], "Alice");
    assert_eq!(list["attendances"][0]["class_name"], "Math");
}

#[tokio::test]
async fn test_late_and_present_boundaries() {
    let t = TestApp::new().await;
    t.math_class().await;
    t.student("Alice", 1, None).await;
    t.student("Bob", 2, None).await;
    t.student("Cara", 3, None).await;

    t.set_time(monday(10, 4));
    let (_, alice) = t.scan_slot(1).await;
    assert_eq!(alice["attendance_status"], "present");
    assert_eq!(alice["confidence"], 95);

    t.set_time(monday(10, 5));
    let (_, bob) = t.scan_slot(2).await;
    assert_eq!(bob["attendance_status"], "present");

    t.set_time(monday(10, 6));
    let (_, cara) = t.scan_slot(3).await;
    assert_eq!(cara["attendance_status"], "late");
}

#[tokio::test]
async fn test_no_class_running() {
    let t = TestApp::new().await;
    t.math_class().await;
    t.student("Alice", 1, None).await;

    t.set_time(monday(11, 1));
    let (status, body) = t.scan_slot(1).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "no_class_running");

    let (_, list) = t.get("/api/attendance").await;
    assert_eq!(list["count"], 0);
}

#[tokio::test]
async fn test_unidentified_scans_are_not_found() {
    let t = TestApp::new().await;
    t.math_class().await;
    t.student("Alice", 1, None).await;
    t.set_time(monday(10, 0));

    let (status, body) = t.scan_slot(42).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["reason"], "student_not_found");

    let (status, body) = t
        .post("/api/attendance/verify", json!({"template": template_hex(0x11)}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["reason"], "fingerprint_not_recognized");
}

#[tokio::test]
async fn test_verify_rejects_malformed_identity() {
    let t = TestApp::new().await;

    let (status, body) = t.post("/api/attendance/verify", json!({"device_id": "ESP32-01"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "invalid_request");

    let (status, body) = t
        .post("/api/attendance/verify", json!({"template": "abcd", "fingerprint_id": 1}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "invalid_template");

    let (status, body) = t
        .post("/api/attendance/verify", json!({"template": "zz".repeat(512)}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "invalid_template");
}

#[tokio::test]
async fn test_enrollment_mode_blocks_attendance() {
    let t = TestApp::new().await;
    t.math_class().await;
    let alice = t.student("Alice", 1, None).await;

    let (status, _) = t.post(&format!("/api/students/{alice}/enroll"), json!({})).await;
    assert_eq!(status, StatusCode::CREATED);

    t.set_time(monday(10, 0));
    let (status, body) = t.scan_slot(1).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "enrollment_mode");
}

#[tokio::test]
async fn test_device_class_wins_overlap() {
    let t = TestApp::new().await;
    t.math_class().await;
    let (_, physics) = t
        .post(
            "/api/classes",
            json!({
                "name": "Physics",
                "schedules": [{"day_of_week": "monday", "start_time": "10:30", "end_time": "11:30"}]
            }),
        )
        .await;
    let physics_id = physics["class"]["id"].as_i64().unwrap();
    t.student("Alice", 1, None).await;

    let (status, _) = t
        .post(
            "/api/device/set-mode",
            json!({"device_id": "ESP32-01", "mode": "attendance", "class_id": physics_id}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    t.set_time(monday(10, 45));
    let (_, entry) = t.scan_slot(1).await;
    assert_eq!(entry["class_id"], physics_id);
    assert_eq!(entry["attendance_status"], "late");
}

#[tokio::test]
async fn test_manual_mark_and_record_crud() {
    let t = TestApp::new().await;
    let alice = t.student("Alice", 7, None).await;
    t.set_time(monday(8, 0));

    let (status, marked) = t
        .post("/api/attendance/mark", json!({"fingerprint_id": 7, "status": "absent", "notes": "sick"}))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{marked}");
    assert_eq!(marked["attendance"]["status"], "absent");
    assert_eq!(marked["attendance"]["student_id"], alice);
    assert_eq!(marked["attendance"]["device_id"], "ESP32-01");
    let id = marked["attendance"]["id"].as_i64().unwrap();

    let (status, record) = t.get(&format!("/api/attendance/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["notes"], "sick");

    let (status, _) = t.post("/api/attendance/mark", json!({"fingerprint_id": 99})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = t
        .post("/api/attendance/mark", json!({"fingerprint_id": 7, "status": "excused"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "invalid_request");

    let (status, _) = t.delete(&format!("/api/attendance/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = t.get(&format!("/api/attendance/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_stats_and_report() {
    let t = TestApp::new().await;
    let class_id = t.math_class().await;
    for slot in 1..=3 {
        t.student(&format!("Student {slot}"), slot, Some(class_id)).await;
    }

    t.set_time(monday(10, 0));
    t.scan_slot(1).await;
    t.scan_slot(2).await;
    t.set_time(monday(10, 20));
    t.scan_slot(3).await;

    let (status, stats) = t
        .get(&format!("/api/attendance/stats?class_id={class_id}&date=2025-03-03"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total"], 3);
    assert_eq!(stats["present"], 2);
    assert_eq!(stats["late"], 1);
    assert_eq!(stats["attendance_rate"], 66.67);

    // defaults to the current month
    let (status, report) = t.get("/api/attendance/report").await;
    assert_eq!(status, StatusCode::OK, "{report}");
    assert_eq!(report["start_date"], "2025-03-01");
    assert_eq!(report["end_date"], "2025-03-31");
    assert_eq!(report["total"], 3);
    assert_eq!(report["top_students"].as_array().unwrap().len(), 3);

    let (status, body) = t
        .get("/api/attendance/report?start_date=2025-03-10&end_date=2025-03-01")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "invalid_request");

    let (status, body) = t.get("/api/attendance?date=03-03-2025").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "invalid_request");
}
