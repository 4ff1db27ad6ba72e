//! HTTP routes for farmnet
//!
//! Each `/api/<group>` prefix has a `handle_*_request` that returns `None`
//! for paths outside its prefix, so `dispatch` can try them in turn.

pub mod advisory;
pub mod auth_routes;
pub mod common;
pub mod communication;
pub mod dashboard;
pub mod digital_twin;
pub mod files;
pub mod gamification;
pub mod health;
pub mod localization;
pub mod practices;
pub mod profile;
pub mod views;

pub use advisory::handle_advisory_request;
pub use auth_routes::handle_auth_request;
pub use common::{error_response, HttpResponse};
pub use communication::handle_communication_request;
pub use dashboard::handle_dashboard_request;
pub use digital_twin::handle_digital_twin_request;
pub use files::{handle_static_request, handle_upload_request};
pub use gamification::handle_gamification_request;
pub use health::build_health_response;
pub use localization::handle_localization_request;
pub use practices::handle_practices_request;
pub use profile::handle_profile_request;

use std::sync::Arc;

use bytes::Bytes;
use hyper::{Method, Request, StatusCode};

use crate::server::AppState;

const API_PREFIX: &str = "/api";

/// Route one buffered request to its handler. The future owns its inputs,
/// so it is `Send + 'static` and can be spawned.
pub async fn dispatch(state: Arc<AppState>, req: Request<Bytes>) -> HttpResponse {
    let state = state.as_ref();
    if req.method() == Method::OPTIONS {
        return common::cors_preflight();
    }

    let path = req.uri().path();
    if path == "/api/health" {
        return match *req.method() {
            Method::GET => {
                common::json_response(StatusCode::OK, &build_health_response(state))
            }
            _ => common::render(&req, Err(crate::types::FarmError::MethodNotAllowed)),
        };
    }

    if common::under(path, API_PREFIX) {
        if let Some(response) = handle_api_groups(&req, state).await {
            return response;
        }
        return common::render(&req, Err(common::route_not_found()));
    }

    if let Some(response) = handle_upload_request(&req, state).await {
        return response;
    }
    if let Some(response) = handle_static_request(&req, state).await {
        return response;
    }

    common::render(&req, Err(common::route_not_found()))
}

async fn handle_api_groups(req: &Request<Bytes>, state: &AppState) -> Option<HttpResponse> {
    if let Some(response) = handle_auth_request(req, state).await {
        return Some(response);
    }
    if let Some(response) = handle_profile_request(req, state).await {
        return Some(response);
    }
    if let Some(response) = handle_advisory_request(req, state).await {
        return Some(response);
    }
    if let Some(response) = handle_practices_request(req, state).await {
        return Some(response);
    }
    if let Some(response) = handle_gamification_request(req, state).await {
        return Some(response);
    }
    if let Some(response) = handle_communication_request(req, state).await {
        return Some(response);
    }
    if let Some(response) = handle_digital_twin_request(req, state).await {
        return Some(response);
    }
    if let Some(response) = handle_localization_request(req, state).await {
        return Some(response);
    }
    handle_dashboard_request(req, state).await
}
