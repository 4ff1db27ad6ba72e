//! Advisory routes (/api/advisory)
//!
//! - POST /api/advisory/text          - ask a text question
//! - POST /api/advisory/image         - multipart image (+ optional query)
//! - GET  /api/advisory/history       - own advisories, newest first
//! - GET  /api/advisory/{id}          - one own advisory
//! - POST /api/advisory/{id}/feedback - rate an answer
//!
//! Every query is stored as `processing` before the responder runs, then
//! settled as `completed` or `failed`.

use std::path::Path;
use std::time::Instant;

use bytes::Bytes;
use chrono::Utc;
use hyper::{header, Method, Request, StatusCode};
use serde_json::{json, Value};
use tracing::{error, info};

use super::common::{
    json_body, json_response, ok, parse_id, query_params, render, route_not_found, segments,
    under, HttpResponse, Page,
};
use super::views::{advisory_image_url, AdvisoryView};
use crate::auth::authenticate;
use crate::db::schemas::{AdvisoryDoc, AdvisoryKind, AdvisoryStatus, CropInfo, Feedback};
use crate::services::advisor::{failure_response, Answer, IMAGE_FAILURE, TEXT_FAILURE};
use crate::services::uploads::parse_advisory_form;
use crate::server::AppState;
use crate::types::{FarmError, Result};
use crate::validation::{as_bool, as_int, lookup, parse_iso8601, trimmed, Checks};

const PREFIX: &str = "/api/advisory";
const NOT_FOUND: &str = "Advisory not found";
const DEFAULT_PAGE_SIZE: u64 = 10;

pub async fn handle_advisory_request(
    req: &Request<Bytes>,
    state: &AppState,
) -> Option<HttpResponse> {
    let path = req.uri().path();
    if !under(path, PREFIX) {
        return None;
    }

    let result = match (req.method(), segments(path, PREFIX).as_slice()) {
        (&Method::POST, ["text"]) => ask_text(req, state).await,
        (&Method::POST, ["image"]) => ask_image(req, state).await,
        (&Method::GET, ["history"]) => history(req, state).await,
        (&Method::GET, [id]) => get_advisory(req, state, id).await,
        (&Method::POST, [id, "feedback"]) => feedback(req, state, id).await,

        (_, ["text"]) | (_, ["image"]) | (_, ["history"]) | (_, [_]) | (_, [_, "feedback"]) => {
            Err(FarmError::MethodNotAllowed)
        }
        _ => Err(route_not_found()),
    };

    Some(render(req, result))
}

fn crop_info(body: &Value) -> Option<CropInfo> {
    lookup(body, "cropInfo")?;
    Some(CropInfo {
        crop_type: trimmed(body, "cropInfo.cropType").filter(|s| !s.is_empty()),
        growth_stage: trimmed(body, "cropInfo.growthStage").filter(|s| !s.is_empty()),
        planting_date: lookup(body, "cropInfo.plantingDate")
            .and_then(Value::as_str)
            .and_then(parse_iso8601),
    })
}

/// Record the responder's verdict on a stored advisory
fn settle(
    advisory: &mut AdvisoryDoc,
    outcome: &Result<Answer>,
    failure_text: &str,
    started: Instant,
) {
    match outcome {
        Ok(answer) => {
            advisory.response = Some(answer.to_response());
            advisory.category = Some(answer.category);
            advisory.status = AdvisoryStatus::Completed;
            advisory.processing_time = Some(started.elapsed().as_millis() as i64);
        }
        Err(_) => {
            advisory.response = Some(failure_response(failure_text));
            advisory.status = AdvisoryStatus::Failed;
        }
    }
}

fn failed_response(message: &str, advisory: &AdvisoryDoc) -> HttpResponse {
    json_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        &json!({
            "message": message,
            "advisory": {
                "id": advisory._id.map(|id| id.to_hex()),
                "status": advisory.status,
            },
        }),
    )
}

async fn ask_text(req: &Request<Bytes>, state: &AppState) -> Result<HttpResponse> {
    let farmer = authenticate(req, state).await?;
    let body = json_body(req, state.args.max_json_bytes)?;

    Checks::new(&body)
        .length("query", 10, 1000, "Query must be between 10 and 1000 characters")
        .optional_date("cropInfo.plantingDate", "Planting date must be a valid date")
        .finish()?;

    let farmer_id = farmer.stored_id()?;
    let query = trimmed(&body, "query").unwrap_or_default();
    let started = Instant::now();

    let mut advisory = AdvisoryDoc::processing(farmer_id, AdvisoryKind::Text, query);
    advisory.crop_info = crop_info(&body);
    advisory.location = Some(farmer.location.clone());
    let mut advisory = state.stores.advisories.insert(advisory).await?;

    let outcome = state
        .advisor
        .answer_text(
            &advisory.query,
            &farmer.location,
            advisory.crop_info.as_ref(),
        )
        .await;
    settle(&mut advisory, &outcome, TEXT_FAILURE, started);
    state.stores.advisories.save(&advisory).await?;

    if let Err(e) = outcome {
        error!(farmer = %farmer.id_hex(), "Advisory responder failed: {}", e);
        return Ok(failed_response("Error processing advisory query", &advisory));
    }

    info!(
        farmer = %farmer.id_hex(),
        category = ?advisory.category,
        "Answered text advisory"
    );

    ok(&json!({
        "message": "Advisory query processed successfully",
        "advisory": {
            "id": advisory._id.map(|id| id.to_hex()),
            "query": advisory.query,
            "response": advisory.response,
            "status": advisory.status,
            "processingTime": advisory.processing_time,
            "createdAt": advisory.metadata.created(),
        },
    }))
}

async fn ask_image(req: &Request<Bytes>, state: &AppState) -> Result<HttpResponse> {
    let farmer = authenticate(req, state).await?;

    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let form =
        parse_advisory_form(content_type, req.body().clone(), state.args.max_upload_bytes).await?;

    let Some(image) = form.image else {
        return Err(FarmError::BadRequest("No image file provided".into()));
    };

    let query = form.query.map(|q| q.trim().to_string()).unwrap_or_default();
    Checks::new(&json!({ "query": query }))
        .length("query", 0, 500, "Query cannot exceed 500 characters")
        .finish()?;

    let started = Instant::now();
    let stored = state.uploads.save_advisory_image(&image).await?;
    let image_url = advisory_image_url(&stored.filename);

    let mut advisory =
        AdvisoryDoc::processing(farmer.stored_id()?, AdvisoryKind::Image, query);
    advisory.location = Some(farmer.location.clone());
    advisory.images.push(stored);
    let mut advisory = state.stores.advisories.insert(advisory).await?;

    let image_path = advisory
        .images
        .first()
        .map(|i| i.path.clone())
        .unwrap_or_default();
    let outcome = state
        .advisor
        .answer_image(Path::new(&image_path), &advisory.query)
        .await;
    settle(&mut advisory, &outcome, IMAGE_FAILURE, started);
    state.stores.advisories.save(&advisory).await?;

    if let Err(e) = outcome {
        error!(farmer = %farmer.id_hex(), "Image responder failed: {}", e);
        return Ok(failed_response("Error processing image advisory query", &advisory));
    }

    info!(farmer = %farmer.id_hex(), image = %image_url, "Answered image advisory");

    ok(&json!({
        "message": "Image advisory query processed successfully",
        "advisory": {
            "id": advisory._id.map(|id| id.to_hex()),
            "query": advisory.query,
            "response": advisory.response,
            "status": advisory.status,
            "processingTime": advisory.processing_time,
            "imageUrl": image_url,
            "createdAt": advisory.metadata.created(),
        },
    }))
}

async fn history(req: &Request<Bytes>, state: &AppState) -> Result<HttpResponse> {
    let farmer = authenticate(req, state).await?;
    let farmer_id = farmer.stored_id()?;
    let page = Page::from_query(&query_params(req), DEFAULT_PAGE_SIZE);

    let advisories = state
        .stores
        .advisories
        .list_for_farmer(&farmer_id, page.skip(), page.limit_i64())
        .await?;
    let total = state.stores.advisories.count_for_farmer(&farmer_id).await?;

    let views: Vec<AdvisoryView> = advisories.iter().map(AdvisoryView::from).collect();
    ok(&json!({
        "advisories": views,
        "pagination": page.pagination(total),
    }))
}

async fn get_advisory(req: &Request<Bytes>, state: &AppState, id: &str) -> Result<HttpResponse> {
    let farmer = authenticate(req, state).await?;
    let id = parse_id(id, NOT_FOUND)?;

    let advisory = state
        .stores
        .advisories
        .find_for_farmer(&id, &farmer.stored_id()?)
        .await?
        .ok_or_else(|| FarmError::NotFound(NOT_FOUND.into()))?;

    ok(&json!({ "advisory": AdvisoryView::from(&advisory) }))
}

async fn feedback(req: &Request<Bytes>, state: &AppState, id: &str) -> Result<HttpResponse> {
    let farmer = authenticate(req, state).await?;
    let body = json_body(req, state.args.max_json_bytes)?;

    Checks::new(&body)
        .int_range("rating", 1, 5, "Rating must be between 1 and 5")
        .boolean("helpful", "Helpful must be a boolean")
        .optional_length("comments", 0, 500, "Comments cannot exceed 500 characters")
        .finish()?;

    let id = parse_id(id, NOT_FOUND)?;
    let mut advisory = state
        .stores
        .advisories
        .find_for_farmer(&id, &farmer.stored_id()?)
        .await?
        .ok_or_else(|| FarmError::NotFound(NOT_FOUND.into()))?;

    advisory.feedback = Some(Feedback {
        rating: lookup(&body, "rating").and_then(as_int).unwrap_or_default() as i32,
        helpful: lookup(&body, "helpful").and_then(as_bool).unwrap_or_default(),
        comments: trimmed(&body, "comments"),
        submitted_at: Utc::now(),
    });
    state.stores.advisories.save(&advisory).await?;

    ok(&json!({ "message": "Feedback submitted successfully" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crop_info_only_when_sent() {
        assert!(crop_info(&json!({ "query": "q" })).is_none());

        let info = crop_info(&json!({
            "cropInfo": { "cropType": " Tomato ", "growthStage": "", "plantingDate": "2024-03-01" }
        }))
        .unwrap();
        assert_eq!(info.crop_type.as_deref(), Some("Tomato"));
        assert!(info.growth_stage.is_none());
        assert!(info.planting_date.is_some());
    }

    #[test]
    fn test_settle_failure_keeps_fallback_text() {
        let mut advisory =
            AdvisoryDoc::processing(bson::oid::ObjectId::new(), AdvisoryKind::Text, "q".into());
        let outcome: Result<Answer> = Err(FarmError::Upstream("model down".into()));
        settle(&mut advisory, &outcome, TEXT_FAILURE, Instant::now());

        assert_eq!(advisory.status, AdvisoryStatus::Failed);
        let response = advisory.response.unwrap();
        assert_eq!(response.text, TEXT_FAILURE);
        assert_eq!(response.ai_model, "error");
        assert!(advisory.processing_time.is_none());
    }
}
