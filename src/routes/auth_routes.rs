//! Authentication routes (/api/auth)
//!
//! - POST /api/auth/register - create an account, returns a token
//! - POST /api/auth/login    - email/password login, returns a token
//! - GET  /api/auth/me       - current farmer
//! - POST /api/auth/refresh  - fresh token for the current farmer

use bson::DateTime;
use bytes::Bytes;
use hyper::{Method, Request};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::common::{
    created, json_body, ok, render, route_not_found, segments, under, HttpResponse,
};
use super::profile::{apply_farmer_fields, land_units, language_codes, MIN_PASSWORD_LEN};
use super::views::FarmerView;
use crate::auth::{authenticate, hash_password, verify_password};
use crate::db::schemas::{FarmDetails, FarmerDoc, Location, Preferences};
use crate::server::AppState;
use crate::types::{FarmError, Result};
use crate::validation::{lookup, trimmed, Checks};

const PREFIX: &str = "/api/auth";

const EMAIL_TAKEN: &str = "Farmer already exists with this email";
const INVALID_CREDENTIALS: &str = "Invalid credentials";

fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub async fn handle_auth_request(req: &Request<Bytes>, state: &AppState) -> Option<HttpResponse> {
    let path = req.uri().path();
    if !under(path, PREFIX) {
        return None;
    }

    let result = match (req.method(), segments(path, PREFIX).as_slice()) {
        (&Method::POST, ["register"]) => handle_register(req, state).await,
        (&Method::POST, ["login"]) => handle_login(req, state).await,
        (&Method::GET, ["me"]) => handle_me(req, state).await,
        (&Method::POST, ["refresh"]) => handle_refresh(req, state).await,

        (_, ["register"]) | (_, ["login"]) | (_, ["me"]) | (_, ["refresh"]) => {
            Err(FarmError::MethodNotAllowed)
        }
        _ => Err(route_not_found()),
    };

    Some(render(req, result))
}

async fn handle_register(req: &Request<Bytes>, state: &AppState) -> Result<HttpResponse> {
    let body = json_body(req, state.args.max_json_bytes)?;

    Checks::new(&body)
        .length("name", 2, 100, "Name must be between 2 and 100 characters")
        .email("email", "Please provide a valid email")
        .length(
            "password",
            MIN_PASSWORD_LEN,
            usize::MAX,
            "Password must be at least 6 characters",
        )
        .mobile_phone("phone", "Please provide a valid phone number")
        .not_empty("location.country", "Country is required")
        .not_empty("location.state", "State is required")
        .not_empty("location.city", "City is required")
        .range("farmDetails.landSize", 0.0, f64::MAX, "Land size must be a number")
        .optional_one_of(
            "farmDetails.landSizeUnit",
            &land_units(),
            "Invalid land size unit",
        )
        .optional_one_of(
            "preferences.language",
            &language_codes(),
            "Invalid language code",
        )
        .finish()?;

    let email = normalize_email(&trimmed(&body, "email").unwrap_or_default());
    if state.stores.farmers.find_by_email(&email).await?.is_some() {
        return Err(FarmError::BadRequest(EMAIL_TAKEN.into()));
    }

    let password = lookup(&body, "password")
        .and_then(Value::as_str)
        .unwrap_or_default();

    let mut farmer = FarmerDoc::new(
        String::new(),
        email,
        hash_password(password)?,
        String::new(),
        Location::default(),
        FarmDetails::default(),
        Preferences::default(),
    );
    apply_farmer_fields(&mut farmer, &body)?;

    let farmer = match state.stores.farmers.insert(farmer).await {
        Ok(farmer) => farmer,
        // Lost a race with a concurrent registration
        Err(FarmError::Conflict(_)) => return Err(FarmError::BadRequest(EMAIL_TAKEN.into())),
        Err(e) => return Err(e),
    };

    let token = state.jwt.generate_token(&farmer.id_hex())?;
    info!(farmer = %farmer.id_hex(), "Farmer registered");

    created(&json!({
        "message": "Farmer registered successfully",
        "token": token,
        "farmer": FarmerView::summary(&farmer),
    }))
}

async fn handle_login(req: &Request<Bytes>, state: &AppState) -> Result<HttpResponse> {
    let body = json_body(req, state.args.max_json_bytes)?;

    Checks::new(&body)
        .email("email", "Please provide a valid email")
        .not_empty("password", "Password is required")
        .finish()?;

    let email = normalize_email(&trimmed(&body, "email").unwrap_or_default());
    let Some(mut farmer) = state.stores.farmers.find_by_email(&email).await? else {
        debug!("Login for unknown email");
        return Err(FarmError::BadRequest(INVALID_CREDENTIALS.into()));
    };

    if !farmer.is_active {
        return Err(FarmError::BadRequest("Account is deactivated".into()));
    }

    let password = lookup(&body, "password")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if !verify_password(password, &farmer.password_hash)? {
        debug!(farmer = %farmer.id_hex(), "Login with wrong password");
        return Err(FarmError::BadRequest(INVALID_CREDENTIALS.into()));
    }

    farmer.last_login = Some(DateTime::now());
    state.stores.farmers.save(&farmer).await?;

    let token = state.jwt.generate_token(&farmer.id_hex())?;
    info!(farmer = %farmer.id_hex(), "Farmer logged in");

    ok(&json!({
        "message": "Login successful",
        "token": token,
        "farmer": FarmerView::summary(&farmer),
    }))
}

async fn handle_me(req: &Request<Bytes>, state: &AppState) -> Result<HttpResponse> {
    let farmer = authenticate(req, state).await?;
    let view = FarmerView {
        updated_at: None,
        ..FarmerView::full(&farmer)
    };
    ok(&json!({ "farmer": view }))
}

async fn handle_refresh(req: &Request<Bytes>, state: &AppState) -> Result<HttpResponse> {
    let farmer = authenticate(req, state).await?;
    let token = state.jwt.generate_token(&farmer.id_hex())?;
    ok(&json!({
        "message": "Token refreshed successfully",
        "token": token,
    }))
}
