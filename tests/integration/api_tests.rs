//! API integration tests
//!
//! Run against a live server started with
//! `EAMS_BOOTSTRAP__ADMIN_USERNAME=admin EAMS_BOOTSTRAP__ADMIN_PASSWORD=admin-password`.

use reqwest::Client;
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8000/api/v1";
const ADMIN_USERNAME: &str = "admin";
const ADMIN_PASSWORD: &str = "admin-password";

async fn login(client: &Client, username: &str, password: &str) -> String {
    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({
            "username": username,
            "password": password
        }))
        .send()
        .await
        .expect("Failed to send login request");

    let body: Value = response.json().await.expect("Failed to parse login response");
    body["token"].as_str().expect("No token in response").to_string()
}

/// Registers a fresh student and returns its token and user id
async fn register_student(client: &Client) -> (String, i64) {
    let suffix = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let username = format!("student{}", suffix % 1_000_000_000);

    let response = client
        .post(format!("{}/auth/register", BASE_URL))
        .json(&json!({
            "username": username,
            "email": format!("{}@example.edu", username),
            "password": "student-password",
            "first_name": "Test",
            "last_name": "Student"
        }))
        .send()
        .await
        .expect("Failed to send register request");

    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Failed to parse register response");
    assert_eq!(body["user"]["role"], "student");
    let id = body["user"]["id"].as_i64().expect("No user id in response");
    (body["token"].as_str().expect("No token in response").to_string(), id)
}

/// Creates and publishes an activity starting in a week, returns its id
async fn create_published_activity(client: &Client, token: &str, points_reward: i32) -> i64 {
    let start = chrono::Utc::now() + chrono::Duration::days(7);
    let end = start + chrono::Duration::hours(2);

    let response = client
        .post(format!("{}/coordinator/activities", BASE_URL))
        .bearer_auth(token)
        .json(&json!({
            "title": "Check-in workshop",
            "location": "Room 204",
            "start_time": start,
            "end_time": end,
            "points_reward": points_reward
        }))
        .send()
        .await
        .expect("Failed to send create request");
    assert_eq!(response.status(), 201);
    let activity: Value = response.json().await.expect("Failed to parse activity");
    let id = activity["id"].as_i64().expect("No activity id");

    let response = client
        .post(format!("{}/coordinator/activities/{}/publish", BASE_URL, id))
        .bearer_auth(token)
        .send()
        .await
        .expect("Failed to send publish request");
    assert!(response.status().is_success());
    id
}

async fn enroll(client: &Client, token: &str, activity_id: i64) {
    let response = client
        .post(format!("{}/student/activities/{}/enroll", BASE_URL, activity_id))
        .bearer_auth(token)
        .send()
        .await
        .expect("Failed to send enroll request");
    assert_eq!(response.status(), 201);
}

/// Issues a QR code and returns its encoded payload
async fn issue_qr(client: &Client, token: &str, activity_id: i64, body: Value) -> String {
    let response = client
        .post(format!("{}/coordinator/activities/{}/qr-token", BASE_URL, activity_id))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await
        .expect("Failed to send issue request");
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Failed to parse token");
    body["encoded"].as_str().expect("No encoded payload").to_string()
}

async fn scan(client: &Client, token: &str, qr_data: &str) -> reqwest::Response {
    client
        .post(format!("{}/student/attendance/scan", BASE_URL))
        .bearer_auth(token)
        .json(&json!({ "qr_data": qr_data }))
        .send()
        .await
        .expect("Failed to send scan request")
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_login() {
    let client = Client::new();

    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({
            "username": ADMIN_USERNAME,
            "password": ADMIN_PASSWORD
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["token"].is_string());
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["user"]["role"], "admin");
}

#[tokio::test]
#[ignore]
async fn test_login_invalid_credentials() {
    let client = Client::new();

    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({
            "username": ADMIN_USERNAME,
            "password": "wrong-password"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore]
async fn test_unauthenticated_request() {
    let client = Client::new();

    let response = client
        .get(format!("{}/activities", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore]
async fn test_list_activities() {
    let client = Client::new();
    let token = login(&client, ADMIN_USERNAME, ADMIN_PASSWORD).await;

    let response = client
        .get(format!("{}/activities?page=1&per_page=5", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["items"].is_array());
    assert!(body["total"].is_number());
    assert_eq!(body["per_page"], 5);
}

#[tokio::test]
#[ignore]
async fn test_student_cannot_reach_coordinator_routes() {
    let client = Client::new();
    let (token, _) = register_student(&client).await;

    let response = client
        .get(format!("{}/coordinator/stats", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 403);
}

#[tokio::test]
#[ignore]
async fn test_student_dashboard() {
    let client = Client::new();
    let (token, _) = register_student(&client).await;

    let response = client
        .get(format!("{}/student/dashboard", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["activities_joined"], 0);
    assert!(body["upcoming_activities"].is_array());
}

#[tokio::test]
#[ignore]
async fn test_scan_with_malformed_qr_code() {
    let client = Client::new();
    let (token, _) = register_student(&client).await;

    let response = client
        .post(format!("{}/student/attendance/scan", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "qr_data": "not-a-qr-code" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 400);
}

#[tokio::test]
#[ignore]
async fn test_coordinator_activity_lifecycle() {
    let client = Client::new();
    let token = login(&client, ADMIN_USERNAME, ADMIN_PASSWORD).await;

    let start = chrono::Utc::now() + chrono::Duration::days(7);
    let end = start + chrono::Duration::hours(2);

    let response = client
        .post(format!("{}/coordinator/activities", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({
            "title": "Integration test workshop",
            "description": "Created by the integration suite",
            "location": "Room 101",
            "start_time": start,
            "end_time": end,
            "max_participants": 10,
            "points_reward": 5
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 201);
    let activity: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(activity["status"], "draft");
    let id = activity["id"].as_i64().expect("No activity id");

    let response = client
        .post(format!("{}/coordinator/activities/{}/publish", BASE_URL, id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let response = client
        .post(format!("{}/coordinator/activities/{}/qr-token", BASE_URL, id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["encoded"].is_string());
    assert_eq!(body["state"], "valid");

    let response = client
        .delete(format!("{}/coordinator/activities/{}", BASE_URL, id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 204);
}

#[tokio::test]
#[ignore]
async fn test_issue_qr_token_rejects_malformed_body() {
    let client = Client::new();
    let token = login(&client, ADMIN_USERNAME, ADMIN_PASSWORD).await;
    let activity_id = create_published_activity(&client, &token, 5).await;

    let response = client
        .post(format!("{}/coordinator/activities/{}/qr-token", BASE_URL, activity_id))
        .bearer_auth(&token)
        .header("content-type", "application/json")
        .body(r#"{"max_uses": "1"}"#)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 400);

    let response = client
        .get(format!("{}/coordinator/activities/{}/qr-token", BASE_URL, activity_id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 404);
}

#[tokio::test]
#[ignore]
async fn test_qr_check_in_completes_enrollment_once() {
    let client = Client::new();
    let admin = login(&client, ADMIN_USERNAME, ADMIN_PASSWORD).await;
    let (student, _) = register_student(&client).await;
    let activity_id = create_published_activity(&client, &admin, 20).await;
    enroll(&client, &student, activity_id).await;

    let qr = issue_qr(&client, &admin, activity_id, json!({ "max_uses": 5 })).await;

    let response = scan(&client, &student, &qr).await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["points_awarded"], 20);
    assert_eq!(body["attendance"]["verification_method"], "qr_code");

    let response = scan(&client, &student, &qr).await;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error"], "AlreadyCheckedIn");

    let response = client
        .get(format!("{}/student/enrollments", BASE_URL))
        .bearer_auth(&student)
        .send()
        .await
        .expect("Failed to send request");
    let enrollments: Value = response.json().await.expect("Failed to parse response");
    let enrollment = enrollments
        .as_array()
        .and_then(|list| list.iter().find(|e| e["activity_id"] == activity_id))
        .expect("Enrollment missing");
    assert_eq!(enrollment["status"], "completed");
    assert_eq!(enrollment["points_awarded"], 20);
    assert_eq!(enrollment["attended"], true);

    let response = client
        .get(format!("{}/coordinator/activities/{}/qr-token", BASE_URL, activity_id))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to send request");
    let token: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(token["token"]["current_uses"], 1);
    assert_eq!(token["remaining_uses"], 4);
}

#[tokio::test]
#[ignore]
async fn test_single_use_qr_code_is_exhausted() {
    let client = Client::new();
    let admin = login(&client, ADMIN_USERNAME, ADMIN_PASSWORD).await;
    let (first, _) = register_student(&client).await;
    let (second, _) = register_student(&client).await;
    let activity_id = create_published_activity(&client, &admin, 10).await;
    enroll(&client, &first, activity_id).await;
    enroll(&client, &second, activity_id).await;

    let qr = issue_qr(&client, &admin, activity_id, json!({ "max_uses": 1 })).await;

    assert_eq!(scan(&client, &first, &qr).await.status(), 200);

    let response = scan(&client, &second, &qr).await;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error"], "QrCodeExhausted");
}

#[tokio::test]
#[ignore]
async fn test_reissued_qr_code_replaces_old_one() {
    let client = Client::new();
    let admin = login(&client, ADMIN_USERNAME, ADMIN_PASSWORD).await;
    let (student, _) = register_student(&client).await;
    let activity_id = create_published_activity(&client, &admin, 5).await;
    enroll(&client, &student, activity_id).await;

    let old = issue_qr(&client, &admin, activity_id, json!({})).await;
    let new = issue_qr(&client, &admin, activity_id, json!({})).await;
    assert_ne!(old, new);

    let response = scan(&client, &student, &old).await;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error"], "QrCodeInactive");

    assert_eq!(scan(&client, &student, &new).await.status(), 200);
}

#[tokio::test]
#[ignore]
async fn test_manual_attendance_after_scan_is_rejected() {
    let client = Client::new();
    let admin = login(&client, ADMIN_USERNAME, ADMIN_PASSWORD).await;
    let (student, student_id) = register_student(&client).await;
    let activity_id = create_published_activity(&client, &admin, 5).await;
    enroll(&client, &student, activity_id).await;

    let qr = issue_qr(&client, &admin, activity_id, json!({})).await;
    assert_eq!(scan(&client, &student, &qr).await.status(), 200);

    let response = client
        .post(format!("{}/instructor/activities/{}/attendance", BASE_URL, activity_id))
        .bearer_auth(&admin)
        .json(&json!({ "student_id": student_id, "notes": "Arrived late" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error"], "AlreadyCheckedIn");
}

#[tokio::test]
#[ignore]
async fn test_concurrent_scans_record_one_attendance() {
    let client = Client::new();
    let admin = login(&client, ADMIN_USERNAME, ADMIN_PASSWORD).await;
    let (student, _) = register_student(&client).await;
    let activity_id = create_published_activity(&client, &admin, 15).await;
    enroll(&client, &student, activity_id).await;

    let qr = issue_qr(&client, &admin, activity_id, json!({})).await;

    let mut scans = tokio::task::JoinSet::new();
    for _ in 0..20 {
        let (client, student, qr) = (client.clone(), student.clone(), qr.clone());
        scans.spawn(async move { scan(&client, &student, &qr).await.status().as_u16() });
    }

    let mut accepted = 0;
    while let Some(status) = scans.join_next().await {
        match status.expect("Scan task panicked") {
            200 => accepted += 1,
            400 => {}
            other => panic!("Unexpected status {}", other),
        }
    }
    assert_eq!(accepted, 1);

    let response = client
        .get(format!("{}/instructor/activities/{}/attendance", BASE_URL, activity_id))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to send request");
    let sheet: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(sheet["stats"]["attended"], 1);
    assert_eq!(sheet["stats"]["qr_checkins"], 1);
}

#[tokio::test]
#[ignore]
async fn test_concurrent_qr_issues_leave_one_active_code() {
    let client = Client::new();
    let admin = login(&client, ADMIN_USERNAME, ADMIN_PASSWORD).await;
    let activity_id = create_published_activity(&client, &admin, 5).await;

    let mut issues = tokio::task::JoinSet::new();
    for _ in 0..8 {
        let (client, admin) = (client.clone(), admin.clone());
        issues.spawn(async move {
            client
                .post(format!("{}/coordinator/activities/{}/qr-token", BASE_URL, activity_id))
                .bearer_auth(&admin)
                .send()
                .await
                .expect("Failed to send request")
                .status()
                .as_u16()
        });
    }
    while let Some(status) = issues.join_next().await {
        assert_eq!(status.expect("Issue task panicked"), 201);
    }

    let response = client
        .get(format!("{}/coordinator/activities/{}/qr-token", BASE_URL, activity_id))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 200);
}
