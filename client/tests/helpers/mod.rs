//! In-process stand-in for the issuer/verifier, served on a random local port.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    routing::{get, patch, post},
};
use client::{ApiClient, credentials::MemoryTokenStore};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

#[derive(Clone, Default)]
pub struct Issuer {
    pub seen_auth: Arc<Mutex<Vec<Option<String>>>>,
    pub rotations: Arc<AtomicUsize>,
    pub marks: Arc<Mutex<Vec<String>>>,
}

impl Issuer {
    fn record_auth(&self, headers: &HeaderMap) {
        let value = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        self.seen_auth.lock().unwrap().push(value);
    }
}

pub fn session_json(id: &str, active: bool) -> Value {
    json!({
        "id": id,
        "sessionId": format!("SES-{id}"),
        "subject": "Distributed Systems",
        "date": "2025-10-20",
        "startTime": "09:00",
        "endTime": "10:30",
        "venue": "IT 4-1",
        "qrCode": format!("data:image/png;base64,{id}"),
        "teacherName": "Dr Ada",
        "isActive": active,
        "attendanceCount": 3,
        "createdAt": "2025-10-19T08:00:00Z"
    })
}

async fn list_sessions(State(issuer): State<Issuer>, headers: HeaderMap) -> Json<Value> {
    issuer.record_auth(&headers);
    Json(json!({
        "success": true,
        "count": 2,
        "sessions": [session_json("s1", true), session_json("s2", false)]
    }))
}

async fn get_session(Path(id): Path<String>) -> (StatusCode, Json<Value>) {
    if id == "missing" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "message": "Session not found" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({ "success": true, "session": session_json(&id, true) })),
    )
}

async fn create_session(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let mut session = session_json("new", false);
    session["subject"] = body["subject"].clone();
    (
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": "Session created", "session": session })),
    )
}

async fn update_session(Path(id): Path<String>, Json(body): Json<Value>) -> Json<Value> {
    let mut session = session_json(&id, true);
    if let Some(venue) = body.get("venue") {
        session["venue"] = venue.clone();
    }
    Json(json!({ "success": true, "session": session }))
}

async fn delete_session(Path(_id): Path<String>) -> Json<Value> {
    Json(json!({ "success": true, "message": "Session deleted" }))
}

async fn toggle_session(Path(id): Path<String>) -> Json<Value> {
    Json(json!({ "success": true, "session": session_json(&id, false) }))
}

async fn generate(State(issuer): State<Issuer>, Path(id): Path<String>) -> Json<Value> {
    if id == "empty" {
        return Json(json!({ "success": true }));
    }
    let n = issuer.rotations.fetch_add(1, Ordering::SeqCst) + 1;
    Json(json!({ "success": true, "qrCode": format!("code-{id}-{n}") }))
}

async fn mark(State(issuer): State<Issuer>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let data = body["qrData"].as_str().unwrap_or_default().to_owned();
    issuer.marks.lock().unwrap().push(data.clone());
    match data.as_str() {
        "valid" => (
            StatusCode::OK,
            Json(json!({ "success": true, "message": "Attendance marked successfully" })),
        ),
        "dup" => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "message": "Attendance already marked for this session" })),
        ),
        "soft" => (
            StatusCode::OK,
            Json(json!({ "success": false, "message": "Session is not active" })),
        ),
        "boom" => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({}))),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "message": "QR code has expired" })),
        ),
    }
}

async fn check(Path(id): Path<String>) -> Json<Value> {
    Json(json!({ "success": true, "attended": id == "s1" }))
}

async fn my_attendance() -> Json<Value> {
    Json(json!({
        "success": true,
        "count": 1,
        "attendance": [{
            "id": "a1",
            "sessionCode": "SES-s1",
            "subject": "Distributed Systems",
            "date": "2025-10-20",
            "startTime": "09:00",
            "endTime": "10:30",
            "teacherName": "Dr Ada",
            "scannedAt": "2025-10-20T09:05:00Z",
            "status": "present"
        }]
    }))
}

async fn login(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["password"] == "secret" {
        (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Login successful",
                "token": "tok-1",
                "user": { "id": "u1", "name": "Sam", "email": body["email"], "role": "student" }
            })),
        )
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "message": "Invalid credentials" })),
        )
    }
}

async fn me(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    let authorized = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "Bearer tok-1");
    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "message": "Not authorized" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "user": { "id": "u1", "name": "Sam", "email": "sam@uni.test", "role": "student" }
        })),
    )
}

pub fn issuer_router(issuer: Issuer) -> Router {
    let api = Router::new()
        .route("/sessions", get(list_sessions).post(create_session))
        .route(
            "/sessions/{id}",
            get(get_session).put(update_session).delete(delete_session),
        )
        .route("/sessions/{id}/toggle", patch(toggle_session))
        .route("/qr/generate/{id}", get(generate))
        .route("/attendance/mark", post(mark))
        .route("/attendance/check/{id}", get(check))
        .route("/attendance/my-attendance", get(my_attendance))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me));
    Router::new().nest("/api", api).with_state(issuer)
}

/// Spawns the stand-in issuer and returns its `/api` base URL.
pub async fn spawn_issuer() -> (String, Issuer) {
    let issuer = Issuer::default();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = issuer_router(issuer.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/api"), issuer)
}

pub fn client_for(base: &str, token: Option<&str>) -> ApiClient {
    let store = match token {
        Some(t) => MemoryTokenStore::with_token(t),
        None => MemoryTokenStore::new(),
    };
    ApiClient::new(base, reqwest_client(), Arc::new(store)).unwrap()
}

pub fn reqwest_client() -> reqwest::Client {
    util::http::build_client(5).unwrap()
}
