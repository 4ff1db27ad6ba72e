//! Language routes (/api/localization)
//!
//! - GET  /api/localization/languages             - supported languages
//! - POST /api/localization/detect                - guess from a location
//! - GET  /api/localization/translations/{lang}   - UI dictionary
//! - PUT  /api/localization/preference            - set caller's language
//! - GET  /api/localization/current               - caller's language

use bytes::Bytes;
use chrono::Utc;
use hyper::{Method, Request};
use serde_json::json;
use tracing::info;

use super::common::{json_body, ok, render, route_not_found, segments, under, HttpResponse};
use super::profile::language_codes;
use crate::auth::authenticate;
use crate::db::schemas::Language;
use crate::server::AppState;
use crate::services::localization::{detect, language_info, translations, LANGUAGES};
use crate::types::{FarmError, Result};
use crate::validation::{trimmed, Checks};

const PREFIX: &str = "/api/localization";
const DETECTION_CONFIDENCE: f64 = 0.8;

pub async fn handle_localization_request(
    req: &Request<Bytes>,
    state: &AppState,
) -> Option<HttpResponse> {
    let path = req.uri().path();
    if !under(path, PREFIX) {
        return None;
    }

    let result = match (req.method(), segments(path, PREFIX).as_slice()) {
        (&Method::GET, ["languages"]) => ok(&json!({ "languages": LANGUAGES })),
        (&Method::POST, ["detect"]) => detect_language(req, state),
        (&Method::GET, ["translations", language]) => dictionary(language),
        (&Method::PUT, ["preference"]) => set_preference(req, state).await,
        (&Method::GET, ["current"]) => current(req, state).await,

        (_, ["languages"])
        | (_, ["detect"])
        | (_, ["translations", _])
        | (_, ["preference"])
        | (_, ["current"]) => Err(FarmError::MethodNotAllowed),
        _ => Err(route_not_found()),
    };

    Some(render(req, result))
}

fn detect_language(req: &Request<Bytes>, state: &AppState) -> Result<HttpResponse> {
    let body = json_body(req, state.args.max_json_bytes)?;
    let country = trimmed(&body, "country");
    let region = trimmed(&body, "state");

    let language = detect(country.as_deref(), region.as_deref());
    ok(&json!({
        "detectedLanguage": language,
        "languageInfo": language_info(language),
        "confidence": DETECTION_CONFIDENCE,
        "detectionMethod": "location_based",
    }))
}

fn dictionary(code: &str) -> Result<HttpResponse> {
    let language =
        Language::parse(code).ok_or_else(|| FarmError::BadRequest("Unsupported language".into()))?;

    ok(&json!({
        "language": language,
        "translations": translations(language),
        "lastUpdated": Utc::now(),
    }))
}

async fn set_preference(req: &Request<Bytes>, state: &AppState) -> Result<HttpResponse> {
    let mut farmer = authenticate(req, state).await?;
    let body = json_body(req, state.args.max_json_bytes)?;

    Checks::new(&body)
        .one_of("language", &language_codes(), "Invalid language code")
        .finish()?;

    let language = trimmed(&body, "language")
        .as_deref()
        .and_then(Language::parse)
        .unwrap_or_default();
    farmer.preferences.language = language;
    state.stores.farmers.save(&farmer).await?;

    info!(farmer = %farmer.id_hex(), language = %language, "Language preference updated");
    ok(&json!({
        "message": "Language preference updated successfully",
        "language": language_info(language),
    }))
}

async fn current(req: &Request<Bytes>, state: &AppState) -> Result<HttpResponse> {
    let farmer = authenticate(req, state).await?;
    let language = farmer.preferences.language;

    ok(&json!({
        "currentLanguage": language,
        "languageInfo": language_info(language),
        "supportedLanguages": LANGUAGES,
    }))
}
