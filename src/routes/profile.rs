//! Profile routes (/api/profile)
//!
//! - GET    /api/profile          - full profile
//! - PUT    /api/profile          - partial update of the editable sections
//! - PUT    /api/profile/password - change password
//! - DELETE /api/profile          - deactivate the account

use bytes::Bytes;
use hyper::{Method, Request};
use serde_json::{json, Value};
use tracing::info;

use super::common::{json_body, ok, render, route_not_found, segments, under, HttpResponse};
use super::views::FarmerView;
use crate::auth::{authenticate, hash_password, verify_password};
use crate::db::schemas::{Coordinates, FarmerDoc, LandUnit, Language};
use crate::server::AppState;
use crate::types::{FarmError, Result};
use crate::validation::{as_bool, as_number, extract, lookup, trimmed, Checks};

const PREFIX: &str = "/api/profile";

pub const MIN_PASSWORD_LEN: usize = 6;

pub fn land_units() -> Vec<&'static str> {
    LandUnit::ALL.iter().map(LandUnit::as_str).collect()
}

pub fn language_codes() -> Vec<&'static str> {
    Language::ALL.iter().map(Language::as_str).collect()
}

/// Copy the editable farmer sections present in `body` onto `farmer`.
///
/// Nested objects merge field by field, so `{"location": {"city": "X"}}`
/// only moves the city. Callers validate first.
pub fn apply_farmer_fields(farmer: &mut FarmerDoc, body: &Value) -> Result<()> {
    if let Some(name) = trimmed(body, "name") {
        farmer.name = name;
    }
    if let Some(phone) = trimmed(body, "phone") {
        farmer.phone = phone;
    }

    let location = &mut farmer.location;
    if let Some(country) = trimmed(body, "location.country") {
        location.country = country;
    }
    if let Some(state) = trimmed(body, "location.state") {
        location.state = state;
    }
    if let Some(city) = trimmed(body, "location.city") {
        location.city = city;
    }
    if let Some(coordinates) = extract::<Coordinates>(body, "location.coordinates")? {
        location.coordinates = Some(coordinates);
    }

    let details = &mut farmer.farm_details;
    if let Some(size) = lookup(body, "farmDetails.landSize").and_then(as_number) {
        details.land_size = size;
    }
    if let Some(unit) = lookup(body, "farmDetails.landSizeUnit")
        .and_then(Value::as_str)
        .and_then(LandUnit::parse)
    {
        details.land_size_unit = unit;
    }
    if let Some(crops) = extract::<Vec<String>>(body, "farmDetails.crops")? {
        details.crops = crops;
    }
    if let Some(years) = lookup(body, "farmDetails.farmingExperience").and_then(as_number) {
        details.farming_experience = years.max(0.0);
    }

    let prefs = &mut farmer.preferences;
    if let Some(language) = lookup(body, "preferences.language")
        .and_then(Value::as_str)
        .and_then(Language::parse)
    {
        prefs.language = language;
    }
    let notifications = &mut prefs.notifications;
    for (key, slot) in [
        ("email", &mut notifications.email),
        ("sms", &mut notifications.sms),
        ("whatsapp", &mut notifications.whatsapp),
    ] {
        if let Some(flag) =
            lookup(body, &format!("preferences.notifications.{}", key)).and_then(as_bool)
        {
            *slot = flag;
        }
    }

    Ok(())
}

pub async fn handle_profile_request(
    req: &Request<Bytes>,
    state: &AppState,
) -> Option<HttpResponse> {
    let path = req.uri().path();
    if !under(path, PREFIX) {
        return None;
    }

    let result = match (req.method(), segments(path, PREFIX).as_slice()) {
        (&Method::GET, []) => get_profile(req, state).await,
        (&Method::PUT, []) => update_profile(req, state).await,
        (&Method::DELETE, []) => deactivate(req, state).await,
        (&Method::PUT, ["password"]) => change_password(req, state).await,
        (_, []) | (_, ["password"]) => Err(FarmError::MethodNotAllowed),
        _ => Err(route_not_found()),
    };

    Some(render(req, result))
}

async fn get_profile(req: &Request<Bytes>, state: &AppState) -> Result<HttpResponse> {
    let farmer = authenticate(req, state).await?;
    ok(&json!({ "farmer": FarmerView::full(&farmer) }))
}

async fn update_profile(req: &Request<Bytes>, state: &AppState) -> Result<HttpResponse> {
    let mut farmer = authenticate(req, state).await?;
    let body = json_body(req, state.args.max_json_bytes)?;

    Checks::new(&body)
        .optional_length("name", 2, 100, "Name must be between 2 and 100 characters")
        .optional_mobile_phone("phone", "Please provide a valid phone number")
        .optional_not_empty("location.country", "Country cannot be empty")
        .optional_not_empty("location.state", "State cannot be empty")
        .optional_not_empty("location.city", "City cannot be empty")
        .optional_range("farmDetails.landSize", 0.0, f64::MAX, "Land size must be a number")
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

    apply_farmer_fields(&mut farmer, &body)?;
    state.stores.farmers.save(&farmer).await?;

    // Read back for the stamped updated_at
    let not_found = || FarmError::NotFound("Farmer not found".into());
    let id = farmer._id.ok_or_else(not_found)?;
    let farmer = state
        .stores
        .farmers
        .find_by_id(&id)
        .await?
        .ok_or_else(not_found)?;

    let view = FarmerView {
        last_login: None,
        created_at: None,
        ..FarmerView::full(&farmer)
    };
    ok(&json!({ "message": "Profile updated successfully", "farmer": view }))
}

async fn change_password(req: &Request<Bytes>, state: &AppState) -> Result<HttpResponse> {
    let mut farmer = authenticate(req, state).await?;
    let body = json_body(req, state.args.max_json_bytes)?;

    Checks::new(&body)
        .not_empty("currentPassword", "Current password is required")
        .length(
            "newPassword",
            MIN_PASSWORD_LEN,
            usize::MAX,
            "New password must be at least 6 characters",
        )
        .finish()?;

    let current = lookup(&body, "currentPassword")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if !verify_password(current, &farmer.password_hash)? {
        return Err(FarmError::BadRequest("Current password is incorrect".into()));
    }

    let new_password = lookup(&body, "newPassword")
        .and_then(Value::as_str)
        .unwrap_or_default();
    farmer.password_hash = hash_password(new_password)?;
    state.stores.farmers.save(&farmer).await?;

    info!(farmer = %farmer.id_hex(), "Password changed");
    ok(&json!({ "message": "Password updated successfully" }))
}

async fn deactivate(req: &Request<Bytes>, state: &AppState) -> Result<HttpResponse> {
    let mut farmer = authenticate(req, state).await?;
    farmer.is_active = false;
    state.stores.farmers.save(&farmer).await?;

    info!(farmer = %farmer.id_hex(), "Account deactivated");
    ok(&json!({ "message": "Account deactivated successfully" }))
}
