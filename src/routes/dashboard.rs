//! Dashboard routes (/api/dashboard)
//!
//! - GET /api/dashboard/stats      - headline counters
//! - GET /api/dashboard/activities - recent advisories and implementations
//! - GET /api/dashboard/weather    - mock conditions

use bytes::Bytes;
use hyper::{Method, Request};

use super::common::{
    ok, positive_param, query_params, render, route_not_found, segments, under, HttpResponse,
    MAX_PAGE_SIZE,
};
use crate::auth::authenticate;
use crate::server::AppState;
use crate::services::dashboard::{self, DEFAULT_ACTIVITY_LIMIT};
use crate::types::{FarmError, Result};

const PREFIX: &str = "/api/dashboard";

pub async fn handle_dashboard_request(
    req: &Request<Bytes>,
    state: &AppState,
) -> Option<HttpResponse> {
    let path = req.uri().path();
    if !under(path, PREFIX) {
        return None;
    }

    let result = match (req.method(), segments(path, PREFIX).as_slice()) {
        (&Method::GET, ["stats"]) => stats(req, state).await,
        (&Method::GET, ["activities"]) => activities(req, state).await,
        (&Method::GET, ["weather"]) => weather(req, state).await,

        (_, ["stats"]) | (_, ["activities"]) | (_, ["weather"]) => {
            Err(FarmError::MethodNotAllowed)
        }
        _ => Err(route_not_found()),
    };

    Some(render(req, result))
}

async fn stats(req: &Request<Bytes>, state: &AppState) -> Result<HttpResponse> {
    let farmer = authenticate(req, state).await?;
    let stats = dashboard::stats(&state.stores, &farmer.stored_id()?).await?;
    ok(&stats)
}

async fn activities(req: &Request<Bytes>, state: &AppState) -> Result<HttpResponse> {
    let farmer = authenticate(req, state).await?;
    let limit = positive_param(
        &query_params(req),
        "limit",
        DEFAULT_ACTIVITY_LIMIT as u64,
    )
    .min(MAX_PAGE_SIZE) as usize;

    let feed = dashboard::activities(&state.stores, &farmer.stored_id()?, limit).await?;
    ok(&feed)
}

async fn weather(req: &Request<Bytes>, state: &AppState) -> Result<HttpResponse> {
    authenticate(req, state).await?;
    ok(&dashboard::mock_weather())
}
