//! Health check endpoint
//!
//! `GET /api/health` reports liveness plus which backends are in use, so a
//! deployment can tell a dev-mode (memory store, demo messaging) instance
//! from a production one.

use serde::Serialize;

use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "OK" when the process answers
    pub status: &'static str,
    pub message: &'static str,
    pub version: &'static str,
    pub timestamp: String,
    /// `development` or `production`
    pub mode: &'static str,
    /// `mongodb` or `memory`
    pub store: &'static str,
    /// `twilio` or `demo`
    pub messaging: &'static str,
}

pub fn build_health_response(state: &AppState) -> HealthResponse {
    HealthResponse {
        status: "OK",
        message: "Sustainable Farming Network API is running",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
        mode: if state.args.dev_mode {
            "development"
        } else {
            "production"
        },
        store: state.stores.backend(),
        messaging: state.messenger.mode(),
    }
}
