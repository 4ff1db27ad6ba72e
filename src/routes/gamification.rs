//! Progression routes (/api/gamification)
//!
//! - GET  /api/gamification             - caller's XP, level, badges
//! - POST /api/gamification/action      - record an action
//! - GET  /api/gamification/leaderboard - top farmers
//! - GET  /api/gamification/badges      - badge catalog

use bytes::Bytes;
use hyper::{Method, Request};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::common::{
    json_body, ok, param, positive_param, query_params, render, route_not_found, segments, under,
    HttpResponse, MAX_PAGE_SIZE,
};
use crate::auth::authenticate;
use crate::server::AppState;
use crate::services::progression::{self, level_progress, BADGES};
use crate::services::Action;
use crate::store::LeaderboardSort;
use crate::types::{FarmError, Result};

const PREFIX: &str = "/api/gamification";
const DEFAULT_LEADERBOARD_SIZE: u64 = 10;

pub async fn handle_gamification_request(
    req: &Request<Bytes>,
    state: &AppState,
) -> Option<HttpResponse> {
    let path = req.uri().path();
    if !under(path, PREFIX) {
        return None;
    }

    let result = match (req.method(), segments(path, PREFIX).as_slice()) {
        (&Method::GET, []) => progress(req, state).await,
        (&Method::POST, ["action"]) => record(req, state).await,
        (&Method::GET, ["leaderboard"]) => leaderboard(req, state).await,
        (&Method::GET, ["badges"]) => ok(&json!({ "badges": BADGES })),

        (_, []) | (_, ["action"]) | (_, ["leaderboard"]) | (_, ["badges"]) => {
            Err(FarmError::MethodNotAllowed)
        }
        _ => Err(route_not_found()),
    };

    Some(render(req, result))
}

async fn progress(req: &Request<Bytes>, state: &AppState) -> Result<HttpResponse> {
    let farmer = authenticate(req, state).await?;
    let record =
        progression::load_or_create(state.stores.gamification.as_ref(), &farmer.stored_id()?)
            .await?;
    let (xp_needed, xp_progress) = level_progress(record.xp, record.level);

    ok(&json!({
        "gamification": {
            "xp": record.xp,
            "level": record.level,
            "badges": record.badges,
            "achievements": record.achievements,
            "stats": record.stats,
            "xpNeeded": xp_needed,
            "xpProgress": xp_progress,
            "lastActivity": record.last_activity.map(|d| d.to_chrono()),
        },
    }))
}

async fn record(req: &Request<Bytes>, state: &AppState) -> Result<HttpResponse> {
    let farmer = authenticate(req, state).await?;
    let body = json_body(req, state.args.max_json_bytes)?;

    let raw = body
        .get("action")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .ok_or_else(|| FarmError::BadRequest("Action is required".into()))?;
    let action =
        Action::parse(raw).ok_or_else(|| FarmError::BadRequest("Invalid action".into()))?;

    let farmer_id = farmer.stored_id()?;
    // Query badges track the stored advisories, not how often the client calls
    let recount = match action {
        Action::AdvisoryQuery => {
            Some(state.stores.advisories.count_for_farmer(&farmer_id).await? as i64)
        }
        _ => None,
    };

    let result = progression::record_action(
        state.stores.gamification.as_ref(),
        &farmer_id,
        action,
        recount,
    )
    .await?;

    debug!(
        farmer = %farmer_id,
        action = %action,
        leveled_up = result.leveled_up,
        "Action recorded"
    );
    ok(&json!({
        "message": "Action recorded successfully",
        "result": result,
    }))
}

async fn leaderboard(req: &Request<Bytes>, state: &AppState) -> Result<HttpResponse> {
    let params = query_params(req);
    let limit = positive_param(&params, "limit", DEFAULT_LEADERBOARD_SIZE).min(MAX_PAGE_SIZE);
    let sort = LeaderboardSort::parse(param(&params, "sortBy"));

    let records = state
        .stores
        .gamification
        .leaderboard(sort, limit as i64)
        .await?;

    let mut entries = Vec::with_capacity(records.len());
    for record in &records {
        let Some(farmer) = state.stores.farmers.find_by_id(&record.farmer_id).await? else {
            warn!(farmer = %record.farmer_id, "Leaderboard entry without a farmer, skipping");
            continue;
        };
        entries.push(json!({
            "rank": entries.len() + 1,
            "farmer": {
                "name": farmer.name,
                "location": farmer.location,
            },
            "xp": record.xp,
            "level": record.level,
            "badgeCount": record.badges.len(),
            "stats": record.stats,
        }));
    }

    ok(&json!({
        "leaderboard": entries,
        "sortBy": sort.as_str(),
    }))
}
