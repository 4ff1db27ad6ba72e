//! End-to-end tests for the REST surface
//!
//! Requests go straight through `routes::dispatch` over the in-memory
//! store, so no socket or MongoDB is needed.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use clap::Parser;
use farmnet::db::schemas::{CropInfo, Location};
use farmnet::routes::dispatch;
use farmnet::services::advisor::{Advisor, Answer};
use farmnet::store::Stores;
use farmnet::{AppState, Args, FarmError};
use http_body_util::BodyExt;
use hyper::{Method, Request, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;

/// Dev-mode state over memory stores, with uploads in a temp dir
fn bare_state() -> (AppState, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let upload_dir = temp_dir.path().to_string_lossy().to_string();
    let args =
        Args::try_parse_from(["farmnet", "--dev-mode", "--upload-dir", upload_dir.as_str()])
            .unwrap();
    let state = AppState::new(args, Stores::memory()).unwrap();
    (state, temp_dir)
}

fn test_state() -> (Arc<AppState>, TempDir) {
    let (state, temp_dir) = bare_state();
    (Arc::new(state), temp_dir)
}

/// Dispatch on a spawned task, the way the server does per connection
async fn send(state: &Arc<AppState>, req: Request<Bytes>) -> (StatusCode, Bytes) {
    let response = tokio::spawn(dispatch(Arc::clone(state), req))
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes)
}

async fn call(
    state: &Arc<AppState>,
    method: Method,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    let payload = match body {
        Some(body) => {
            builder = builder.header("Content-Type", "application/json");
            Bytes::from(serde_json::to_vec(&body).unwrap())
        }
        None => Bytes::new(),
    };

    let (status, bytes) = send(state, builder.body(payload).unwrap()).await;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn registration(email: &str) -> Value {
    json!({
        "name": "Asha Patel",
        "email": email,
        "password": "secret-pass",
        "phone": "+91 98765 43210",
        "location": { "country": "India", "state": "Gujarat", "city": "Anand" },
        "farmDetails": { "landSize": 4.5, "landSizeUnit": "acres", "crops": ["rice", "wheat"] },
    })
}

async fn register(state: &Arc<AppState>, email: &str) -> String {
    let (status, body) = call(
        state,
        Method::POST,
        "/api/auth/register",
        None,
        Some(registration(email)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["token"].as_str().unwrap().to_string()
}

fn practice_body(title: &str) -> Value {
    json!({
        "title": title,
        "description": "Plant cover crops between seasons to protect the soil",
        "category": "soil_health",
        "difficulty": "Beginner",
        "cost": "low",
        "tags": ["Soil", "Cover"],
        "applicableCrops": ["rice"],
        "environmentalImpact": 4,
    })
}

#[tokio::test]
async fn test_register_login_and_me() {
    let (state, _temp) = test_state();
    let token = register(&state, "asha@example.com").await;

    let (status, body) = call(
        &state,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "ASHA@example.com", "password": "secret-pass" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Login successful");
    assert!(!body.to_string().contains("secret-pass"));
    assert!(body["farmer"].get("password").is_none());

    let (status, body) = call(
        &state,
        Method::GET,
        "/api/auth/me",
        Some(token.as_str()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["farmer"]["email"], "asha@example.com");
    assert!(body["farmer"].get("password").is_none());
}

#[tokio::test]
async fn test_register_rejects_duplicates_and_bad_fields() {
    let (state, _temp) = test_state();
    register(&state, "dup@example.com").await;

    let (status, body) = call(
        &state,
        Method::POST,
        "/api/auth/register",
        None,
        Some(registration("dup@example.com")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("already"));

    let mut bad = registration("other@example.com");
    bad["password"] = json!("123");
    bad["location"]["city"] = json!("");
    let (status, body) = call(&state, Method::POST, "/api/auth/register", None, Some(bad)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Validation failed");
    let paths: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["path"].as_str().unwrap())
        .collect();
    assert!(paths.contains(&"password"));
    assert!(paths.contains(&"location.city"));
}

#[tokio::test]
async fn test_wrong_password_and_missing_token() {
    let (state, _temp) = test_state();
    register(&state, "asha@example.com").await;

    let (status, _) = call(
        &state,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "asha@example.com", "password": "wrong-pass" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&state, Method::GET, "/api/profile", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(&state, Method::GET, "/api/profile", Some("not-a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_bearer_scheme_alone_is_no_token() {
    let (state, _temp) = test_state();
    let req = Request::builder()
        .method(Method::GET)
        .uri("/api/profile")
        .header("Authorization", "Bearer ")
        .body(Bytes::new())
        .unwrap();

    let (status, bytes) = send(&state, req).await;
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "No token provided, authorization denied");
}

#[tokio::test]
async fn test_text_advisory_is_owner_scoped() {
    let (state, _temp) = test_state();
    let asha = register(&state, "asha@example.com").await;
    let ravi = register(&state, "ravi@example.com").await;

    let (status, body) = call(
        &state,
        Method::POST,
        "/api/advisory/text",
        Some(asha.as_str()),
        Some(json!({ "query": "How do I control pests on my tomato plants?" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["advisory"]["status"], "completed");
    assert!(!body["advisory"]["response"]["text"].as_str().unwrap().is_empty());
    let id = body["advisory"]["id"].as_str().unwrap().to_string();

    let path = format!("/api/advisory/{}", id);
    let (status, _) = call(&state, Method::GET, &path, Some(asha.as_str()), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&state, Method::GET, &path, Some(ravi.as_str()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Advisory not found");

    let (status, body) = call(
        &state,
        Method::GET,
        "/api/advisory/history",
        Some(asha.as_str()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["totalItems"], 1);

    let (status, _) = call(
        &state,
        Method::POST,
        "/api/advisory/text",
        Some(asha.as_str()),
        Some(json!({ "query": "short" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

/// Responder that is always down
struct OfflineAdvisor;

#[async_trait]
impl Advisor for OfflineAdvisor {
    async fn answer_text(
        &self,
        _query: &str,
        _location: &Location,
        _crop_info: Option<&CropInfo>,
    ) -> farmnet::Result<Answer> {
        Err(FarmError::Upstream("advisor offline".into()))
    }

    async fn answer_image(&self, _image: &Path, _query: &str) -> farmnet::Result<Answer> {
        Err(FarmError::Upstream("advisor offline".into()))
    }
}

#[tokio::test]
async fn test_failed_advisory_is_stored_as_failed() {
    let (state, _temp) = bare_state();
    let state = Arc::new(state.with_advisor(Arc::new(OfflineAdvisor)));
    let token = register(&state, "asha@example.com").await;

    let (status, body) = call(
        &state,
        Method::POST,
        "/api/advisory/text",
        Some(token.as_str()),
        Some(json!({ "query": "Why are my wheat leaves turning yellow?" })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["advisory"]["status"], "failed");
    assert!(!body.to_string().contains("advisor offline"));

    let id = body["advisory"]["id"].as_str().unwrap();
    let (status, body) = call(
        &state,
        Method::GET,
        &format!("/api/advisory/{}", id),
        Some(token.as_str()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["advisory"]["status"], "failed");
}

const BOUNDARY: &str = "farmnet-test-boundary";
const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nleaf-pixels";

/// `multipart/form-data` body with one file part and optional text parts
fn multipart_body(file_name: &str, mime: &str, data: &[u8], fields: &[(&str, &str)]) -> Bytes {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
            BOUNDARY, file_name, mime
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    Bytes::from(body)
}

fn image_request(token: &str, body: Bytes) -> Request<Bytes> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/advisory/image")
        .header("Authorization", format!("Bearer {}", token))
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(body)
        .unwrap()
}

#[tokio::test]
async fn test_image_advisory_upload() {
    let (state, temp) = test_state();
    let token = register(&state, "asha@example.com").await;

    let body = multipart_body(
        "leaf.png",
        "image/png",
        PNG_BYTES,
        &[("query", "Brown spots on my rice leaves")],
    );
    let (status, bytes) = send(&state, image_request(&token, body)).await;
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["message"], "Image advisory query processed successfully");
    assert_eq!(body["advisory"]["status"], "completed");
    assert_eq!(body["advisory"]["query"], "Brown spots on my rice leaves");

    let image_url = body["advisory"]["imageUrl"].as_str().unwrap().to_string();
    let file_name = image_url.strip_prefix("/uploads/advisory/").unwrap();
    assert!(file_name.starts_with("image-") && file_name.ends_with(".png"));
    let stored = std::fs::read(temp.path().join("advisory").join(file_name)).unwrap();
    assert_eq!(stored, PNG_BYTES);

    let req = Request::builder()
        .method(Method::GET)
        .uri(image_url.as_str())
        .body(Bytes::new())
        .unwrap();
    let (status, served) = send(&state, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(served.as_ref(), PNG_BYTES);

    let id = body["advisory"]["id"].as_str().unwrap();
    let (status, body) = call(
        &state,
        Method::GET,
        &format!("/api/advisory/{}", id),
        Some(token.as_str()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["advisory"]["type"], "image");
    assert_eq!(body["advisory"]["images"][0]["originalName"], "leaf.png");
}

#[tokio::test]
async fn test_image_advisory_rejects_non_images() {
    let (state, temp) = test_state();
    let token = register(&state, "asha@example.com").await;

    let body = multipart_body("notes.txt", "text/plain", b"not an image", &[]);
    let (status, bytes) = send(&state, image_request(&token, body)).await;
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Only image files are allowed");
    assert!(!temp.path().join("advisory").exists());
}

#[tokio::test]
async fn test_practice_lifecycle() {
    let (state, _temp) = test_state();
    let owner = register(&state, "owner@example.com").await;
    let other = register(&state, "other@example.com").await;

    let (status, body) = call(
        &state,
        Method::POST,
        "/api/practices",
        Some(owner.as_str()),
        Some(practice_body("Cover cropping")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["practice"]["difficulty"], "beginner");
    assert_eq!(body["practice"]["tags"], json!(["soil", "cover"]));
    let id = body["practice"]["id"].as_str().unwrap().to_string();
    let path = format!("/api/practices/{}", id);

    let (status, body) = call(
        &state,
        Method::GET,
        "/api/practices?category=soil_health",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["practices"].as_array().unwrap().len(), 1);

    let (status, body) = call(
        &state,
        Method::GET,
        "/api/practices?category=unknown",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["practices"].as_array().unwrap().is_empty());

    // Only the owner may edit
    let (status, _) = call(
        &state,
        Method::PUT,
        &path,
        Some(other.as_str()),
        Some(json!({ "title": "Hijacked" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(
        &state,
        Method::PUT,
        &path,
        Some(owner.as_str()),
        Some(json!({ "title": "Winter cover cropping" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["practice"]["title"], "Winter cover cropping");

    // Ratings average across farmers; a whole-number float is still an integer
    for (token, rating) in [(&owner, json!(5.0)), (&other, json!(2))] {
        let (status, _) = call(
            &state,
            Method::POST,
            &format!("{}/rate", path),
            Some(token.as_str()),
            Some(json!({ "rating": rating })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
    let (_, body) = call(&state, Method::GET, &path, None, None).await;
    assert_eq!(body["practice"]["adoptionStats"]["totalRatings"], 2);
    assert_eq!(body["practice"]["adoptionStats"]["averageRating"], 3.5);

    let (status, _) = call(
        &state,
        Method::POST,
        &format!("{}/rate", path),
        Some(other.as_str()),
        Some(json!({ "rating": 9 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Soft delete hides it
    let (status, _) = call(&state, Method::DELETE, &path, Some(owner.as_str()), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&state, Method::GET, &path, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_adoption_feeds_gamification() {
    let (state, _temp) = test_state();
    let token = register(&state, "asha@example.com").await;

    let (_, body) = call(
        &state,
        Method::POST,
        "/api/practices",
        Some(token.as_str()),
        Some(practice_body("Drip irrigation")),
    )
    .await;
    let id = body["practice"]["id"].as_str().unwrap().to_string();

    let (status, body) = call(
        &state,
        Method::POST,
        &format!("/api/practices/{}/adopt", id),
        Some(token.as_str()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["practice"]["adoptionStats"]["totalAdoptions"], 1);

    let (status, body) = call(
        &state,
        Method::GET,
        "/api/gamification",
        Some(token.as_str()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["gamification"]["xp"].as_i64().unwrap() > 0);
    assert_eq!(body["gamification"]["stats"]["practicesAdopted"], 1);

    let (status, body) = call(
        &state,
        Method::POST,
        "/api/gamification/action",
        Some(token.as_str()),
        Some(json!({ "action": "teleport" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid action");

    let (status, body) = call(
        &state,
        Method::GET,
        "/api/gamification/leaderboard",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["leaderboard"][0]["rank"], 1);
    assert_eq!(body["leaderboard"][0]["farmer"]["name"], "Asha Patel");
}

#[tokio::test]
async fn test_sms_in_demo_mode_is_logged() {
    let (state, _temp) = test_state();
    let token = register(&state, "asha@example.com").await;

    let (status, body) = call(
        &state,
        Method::POST,
        "/api/communication/sms",
        Some(token.as_str()),
        Some(json!({ "to": "+919876543210", "message": "Rain expected tomorrow" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(body["message"].as_str().unwrap().contains("demo mode"));

    // WhatsApp is opt-in
    let (status, body) = call(
        &state,
        Method::POST,
        "/api/communication/whatsapp",
        Some(token.as_str()),
        Some(json!({ "to": "+919876543210", "message": "Hello" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "WhatsApp notifications are disabled for this account"
    );

    let (status, body) = call(
        &state,
        Method::GET,
        "/api/communication/history",
        Some(token.as_str()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["communications"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_broadcast_fans_out_per_channel() {
    let (state, _temp) = test_state();
    let asha = register(&state, "asha@example.com").await;
    register(&state, "ravi@example.com").await;

    let (status, body) = call(
        &state,
        Method::POST,
        "/api/communication/broadcast",
        Some(asha.as_str()),
        Some(json!({
            "message": "Heavy rain expected this week",
            "channels": ["sms", "whatsapp"],
            "criteria": { "country": "India" },
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["results"]["totalRecipients"], 2);

    // Everyone is opted in to SMS, nobody to WhatsApp
    let channels = &body["results"]["channels"];
    assert_eq!(channels[0], json!({ "channel": "sms", "sent": 2, "failed": 0, "pending": 0 }));
    assert_eq!(
        channels[1],
        json!({ "channel": "whatsapp", "sent": 0, "failed": 2, "pending": 0 })
    );

    let (status, body) = call(
        &state,
        Method::GET,
        "/api/communication/history",
        Some(asha.as_str()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["communications"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_localization_preference() {
    let (state, _temp) = test_state();
    let token = register(&state, "asha@example.com").await;

    let (status, body) = call(
        &state,
        Method::POST,
        "/api/localization/detect",
        None,
        Some(json!({ "country": "India" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["detectedLanguage"], "hi");

    let (status, _) = call(
        &state,
        Method::GET,
        "/api/localization/translations/xx",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &state,
        Method::PUT,
        "/api/localization/preference",
        Some(token.as_str()),
        Some(json!({ "language": "es" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = call(
        &state,
        Method::GET,
        "/api/localization/current",
        Some(token.as_str()),
        None,
    )
    .await;
    assert_eq!(body["currentLanguage"], "es");
}

#[tokio::test]
async fn test_digital_twin_simulation() {
    let (state, _temp) = test_state();
    let token = register(&state, "asha@example.com").await;

    let (status, body) = call(
        &state,
        Method::POST,
        "/api/digital-twin/simulate",
        Some(token.as_str()),
        Some(json!({
            "landSize": 10,
            "landSizeUnit": "acres",
            "cropType": "rice",
            "soilType": "loamy",
            "climateZone": "tropical",
            "waterAvailability": "high",
            "budget": 50000,
            "sustainabilityGoals": ["reduce_water"],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(body["simulation"]["results"]["estimatedYield"].as_f64().unwrap() > 0.0);

    let (status, body) = call(
        &state,
        Method::POST,
        "/api/digital-twin/simulate",
        Some(token.as_str()),
        Some(json!({ "landSize": "lots" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Validation failed");
}

#[tokio::test]
async fn test_health_and_fallbacks() {
    let (state, _temp) = test_state();

    let (status, body) = call(&state, Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
    assert_eq!(body["store"], "memory");
    assert_eq!(body["messaging"], "demo");

    let (status, body) = call(&state, Method::GET, "/api/nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Route not found");

    let (status, _) = call(&state, Method::DELETE, "/api/auth/login", None, None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let (status, _) = call(&state, Method::OPTIONS, "/api/practices", None, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = call(
        &state,
        Method::GET,
        "/uploads/advisory/missing.png",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "File not found");
}
