//! shared helpers for the HTTP integration tests
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rollcall_core::FixedClock;
use rollcall_server::{AppState, ServerConfig, create_app};
use rollcall_storage::Database;
use serde_json::{Value, json};
use tower::ServiceExt;

/// Monday 2025-03-03 at `h:m`
pub fn monday(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 3, 3)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

/// application over an in-memory database and a hand-driven clock
pub struct TestApp {
    pub app: Router,
    pub clock: Arc<FixedClock>,
    pub db: Database,
}

impl TestApp {
    /// app with the default device seeded, clock at Monday 09:00
    pub async fn new() -> Self {
        let db = Database::in_memory()
            .await
            .expect("failed to create in-memory database");
        let clock = Arc::new(FixedClock::new(monday(9, 0)));
        let state = AppState::new(db.clone(), clock.clone(), ServerConfig::default());
        state
            .seed_default_device()
            .await
            .expect("failed to seed default device");

        Self {
            app: create_app(state),
            clock,
            db,
        }
    }

    pub fn set_time(&self, at: NaiveDateTime) {
        self.clock.set(at);
    }

    pub fn advance(&self, delta: Duration) {
        self.clock.advance(delta);
    }

    /// send a request and decode the JSON body
    pub async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("failed to build request");

        self.raw(request).await
    }

    /// send a prepared request and decode the JSON body
    pub async fn raw(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.expect("request failed");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("failed to read body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("response is not JSON")
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send("GET", uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send("POST", uri, Some(body)).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send("PUT", uri, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send("DELETE", uri, None).await
    }

    /// class meeting on Mondays 10:00 to 11:00, returns its id
    pub async fn math_class(&self) -> i64 {
        let (status, body) = self
            .post(
                "/api/classes",
                json!({
                    "name": "Math",
                    "code": "M101",
                    "schedules": [{"day_of_week": "monday", "start_time": "10:00", "end_time": "11:00"}]
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["class"]["id"].as_i64().unwrap()
    }

    /// student on `slot`, returns the student id
    pub async fn student(&self, name: &str, slot: i64, class_id: Option<i64>) -> i64 {
        let (status, body) = self
            .post(
                "/api/students",
                json!({"name": name, "fingerprint_id": slot, "class_id": class_id}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["student"]["id"].as_i64().unwrap()
    }

    /// scan on the default device by slot
    pub async fn scan_slot(&self, slot: i64) -> (StatusCode, Value) {
        self.post(
            "/api/attendance/verify",
            json!({"fingerprint_id": slot, "confidence": 95, "device_id": "ESP32-01"}),
        )
        .await
    }
}

/// 512-byte template filled with `byte`, hex encoded
pub fn template_hex(byte: u8) -> String {
    hex_of(&[byte; 512])
}

pub fn hex_of(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
