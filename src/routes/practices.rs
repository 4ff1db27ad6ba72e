//! Practice catalog routes (/api/practices)
//!
//! - GET    /api/practices                    - filtered, paged catalog
//! - GET    /api/practices/featured           - top rated featured entries
//! - GET    /api/practices/categories         - per-category counts
//! - GET    /api/practices/search/suggestions - typeahead over title/tags/crops
//! - GET    /api/practices/my-practices       - the caller's own entries
//! - GET    /api/practices/{id}               - one active practice
//! - POST   /api/practices                    - create (caller owns it)
//! - PUT    /api/practices/{id}               - owner edit
//! - DELETE /api/practices/{id}               - owner soft delete
//! - POST   /api/practices/{id}/adopt         - count an adoption
//! - POST   /api/practices/{id}/rate          - fold in a 1-5 rating
//! - POST   /api/practices/{id}/implement     - owner progress tracking
//!
//! Fixed names (`featured`, `categories`, `my-practices`) are matched before
//! the `{id}` arm.

use std::collections::HashMap;

use bson::oid::ObjectId;
use bytes::Bytes;
use chrono::Utc;
use hyper::{Method, Request};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::common::{
    created, hex_id, json_body, ok, param, parse_id, query_params, render, route_not_found,
    segments, under, HttpResponse, Page,
};
use super::views::PracticeView;
use crate::auth::{authenticate, authenticate_optional};
use crate::db::schemas::{
    CostLevel, Difficulty, EnvironmentalImpact, FarmerDoc, Implementation, PracticeCategory,
    PracticeDoc, PracticeResource, PracticeStep, PracticeVideo, Region,
};
use crate::server::AppState;
use crate::services::progression;
use crate::services::Action;
use crate::store::{PracticeFilter, PracticeSort};
use crate::types::{FarmError, FieldError, Result};
use crate::validation::{as_bool, as_int, extract, lookup, parse_iso8601, trimmed, Checks};

const PREFIX: &str = "/api/practices";
const NOT_FOUND: &str = "Practice not found";
const DEFAULT_PAGE_SIZE: u64 = 12;
const FEATURED_LIMIT: i64 = 6;
const SUGGESTION_LIMIT: i64 = 10;
const MIN_SUGGESTION_QUERY: usize = 2;

const DIFFICULTY_MSG: &str = "Difficulty must be Beginner, Intermediate, or Advanced";
const COST_MSG: &str = "Cost must be Low, Medium, or High";
const IMPACT_MSG: &str = "Environmental impact must be between 0 and 100";
const ECONOMIC_MSG: &str = "Economic benefit must be between 0 and 100";

const IMPACT_FIELDS: [&str; 4] = [
    "carbonReduction",
    "waterConservation",
    "soilHealth",
    "biodiversity",
];

pub async fn handle_practices_request(
    req: &Request<Bytes>,
    state: &AppState,
) -> Option<HttpResponse> {
    let path = req.uri().path();
    if !under(path, PREFIX) {
        return None;
    }

    let result = match (req.method(), segments(path, PREFIX).as_slice()) {
        (&Method::GET, []) => list_practices(req, state).await,
        (&Method::POST, []) => create_practice(req, state).await,
        (&Method::GET, ["featured"]) => featured(state).await,
        (&Method::GET, ["categories"]) => categories(state).await,
        (&Method::GET, ["search", "suggestions"]) => suggestions(req, state).await,
        (&Method::GET, ["my-practices"]) => my_practices(req, state).await,

        (_, ["featured"]) | (_, ["categories"]) | (_, ["my-practices"])
        | (_, ["search", "suggestions"]) => Err(FarmError::MethodNotAllowed),

        (&Method::GET, [id]) => get_practice(req, state, id).await,
        (&Method::PUT, [id]) => update_practice(req, state, id).await,
        (&Method::DELETE, [id]) => delete_practice(req, state, id).await,
        (&Method::POST, [id, "adopt"]) => adopt(req, state, id).await,
        (&Method::POST, [id, "rate"]) => rate(req, state, id).await,
        (&Method::POST, [id, "implement"]) => implement(req, state, id).await,

        (_, []) | (_, [_]) | (_, [_, "adopt"]) | (_, [_, "rate"]) | (_, [_, "implement"]) => {
            Err(FarmError::MethodNotAllowed)
        }
        _ => Err(route_not_found()),
    };

    Some(render(req, result))
}

// =============================================================================
// Body parsing
// =============================================================================

/// Case-insensitive vocabulary lookup
fn choice<T>(body: &Value, path: &str, parse: fn(&str) -> Option<T>) -> Option<T> {
    lookup(body, path)
        .and_then(Value::as_str)
        .and_then(|s| parse(&s.trim().to_lowercase()))
}

fn choice_names<T: Copy>(all: &[T], name: fn(&T) -> &'static str) -> Vec<&'static str> {
    all.iter().map(name).collect()
}

/// `environmentalImpact` is either the four scores or a single integer
/// applied to all of them
fn parse_impact(value: &Value) -> Option<EnvironmentalImpact> {
    if let Some(score) = as_int(value) {
        let score = score as i32;
        return Some(EnvironmentalImpact {
            carbon_reduction: score,
            water_conservation: score,
            soil_health: score,
            biodiversity: score,
        });
    }
    value.is_object().then(|| {
        let score = |key: &str| value.get(key).and_then(as_int).unwrap_or_default() as i32;
        EnvironmentalImpact {
            carbon_reduction: score("carbonReduction"),
            water_conservation: score("waterConservation"),
            soil_health: score("soilHealth"),
            biodiversity: score("biodiversity"),
        }
    })
}

fn check_impact(checks: &mut Checks, body: &Value) {
    match lookup(body, "environmentalImpact") {
        None => {}
        Some(value) if value.is_object() => {
            for field in IMPACT_FIELDS {
                checks.optional_int_range(
                    &format!("environmentalImpact.{}", field),
                    0,
                    100,
                    IMPACT_MSG,
                );
            }
        }
        Some(_) => {
            checks.int_range("environmentalImpact", 0, 100, IMPACT_MSG);
        }
    }
}

/// Rules shared by create (required) and update (optional)
fn check_practice_body(body: &Value, required: bool) -> Result<()> {
    let categories = choice_names(PracticeCategory::ALL, PracticeCategory::as_str);
    let difficulties = choice_names(Difficulty::ALL, Difficulty::as_str);
    let costs = choice_names(CostLevel::ALL, CostLevel::as_str);

    let mut checks = Checks::new(body);
    if required {
        checks
            .length(
                "title",
                1,
                100,
                "Title is required and must be less than 100 characters",
            )
            .length(
                "description",
                1,
                500,
                "Description is required and must be less than 500 characters",
            )
            .one_of_ci("category", &categories, "Category is required")
            .one_of_ci("difficulty", &difficulties, DIFFICULTY_MSG)
            .one_of_ci("cost", &costs, COST_MSG);
    } else {
        checks
            .optional_length("title", 1, 100, "Title must be less than 100 characters")
            .optional_length(
                "description",
                1,
                500,
                "Description must be less than 500 characters",
            )
            .optional_one_of_ci("category", &categories, "Invalid category")
            .optional_one_of_ci("difficulty", &difficulties, DIFFICULTY_MSG)
            .optional_one_of_ci("cost", &costs, COST_MSG);
    }

    check_impact(&mut checks, body);
    checks
        .optional_int_range("economicBenefit", 0, 100, ECONOMIC_MSG)
        .optional_array("benefits", "Benefits must be a list")
        .optional_array("requirements", "Requirements must be a list")
        .optional_array("steps", "Steps must be a list")
        .optional_array("tags", "Tags must be a list")
        .optional_array("applicableCrops", "Applicable crops must be a list")
        .optional_array("applicableRegions", "Applicable regions must be a list")
        .finish()
}

/// Copy the editable catalog sections present in `body` onto `practice`.
///
/// Counters, flags, ownership and implementation progress are never taken
/// from a client body.
fn apply_practice_fields(practice: &mut PracticeDoc, body: &Value) -> Result<()> {
    if let Some(title) = trimmed(body, "title") {
        practice.title = title;
    }
    if let Some(description) = trimmed(body, "description") {
        practice.description = description;
    }
    if let Some(detail) = trimmed(body, "detailedDescription") {
        practice.detailed_description = Some(detail).filter(|d| !d.is_empty());
    }
    if let Some(category) = choice(body, "category", PracticeCategory::parse) {
        practice.category = category;
    }
    if let Some(difficulty) = choice(body, "difficulty", Difficulty::parse) {
        practice.difficulty = difficulty;
    }
    if let Some(cost) = choice(body, "cost", CostLevel::parse) {
        practice.cost = cost;
    }
    if let Some(time) = trimmed(body, "estimatedTime") {
        practice.estimated_time = Some(time).filter(|t| !t.is_empty());
    }

    if let Some(benefits) = extract::<Vec<String>>(body, "benefits")? {
        practice.benefits = benefits;
    }
    if let Some(requirements) = extract::<Vec<String>>(body, "requirements")? {
        practice.requirements = requirements;
    }
    if let Some(steps) = extract::<Vec<PracticeStep>>(body, "steps")? {
        practice.steps = steps;
    }
    if let Some(images) = extract::<Vec<String>>(body, "images")? {
        practice.images = images;
    }
    if let Some(videos) = extract::<Vec<PracticeVideo>>(body, "videos")? {
        practice.videos = videos;
    }
    if let Some(resources) = extract::<Vec<PracticeResource>>(body, "resources")? {
        practice.resources = resources;
    }
    if let Some(tags) = extract::<Vec<String>>(body, "tags")? {
        practice.tags = tags.iter().map(|t| t.trim().to_lowercase()).collect();
    }
    if let Some(crops) = extract::<Vec<String>>(body, "applicableCrops")? {
        practice.applicable_crops = crops;
    }
    if let Some(regions) = extract::<Vec<Region>>(body, "applicableRegions")? {
        practice.applicable_regions = regions;
    }

    if let Some(impact) = lookup(body, "environmentalImpact").and_then(parse_impact) {
        practice.environmental_impact = impact;
    }
    if let Some(benefit) = lookup(body, "economicBenefit").and_then(as_int) {
        practice.economic_benefit = Some(benefit as i32);
    }

    Ok(())
}

/// Catalog filter from the query string. `None` when a vocabulary filter
/// names a value that no practice can have.
fn catalog_filter(params: &HashMap<String, String>) -> Option<PracticeFilter> {
    fn vocab<T>(
        params: &HashMap<String, String>,
        key: &str,
        parse: fn(&str) -> Option<T>,
    ) -> Option<Option<T>> {
        match param(params, key) {
            None => Some(None),
            Some(raw) => parse(&raw.to_lowercase()).map(Some),
        }
    }

    Some(PracticeFilter {
        category: vocab(params, "category", PracticeCategory::parse)?,
        difficulty: vocab(params, "difficulty", Difficulty::parse)?,
        cost: vocab(params, "cost", CostLevel::parse)?,
        crop: param(params, "crop").map(str::to_string),
        country: param(params, "country").map(str::to_string),
        search: param(params, "search").map(str::to_string),
        featured_only: false,
    })
}

// =============================================================================
// Lookups
// =============================================================================

async fn active_practice(state: &AppState, id: &str) -> Result<PracticeDoc> {
    let id = parse_id(id, NOT_FOUND)?;
    state
        .stores
        .practices
        .find_by_id(&id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| FarmError::NotFound(NOT_FOUND.into()))
}

/// Another farmer's practice reads as missing
async fn owned_practice(state: &AppState, farmer: &FarmerDoc, id: &str) -> Result<PracticeDoc> {
    let practice = active_practice(state, id).await?;
    if !practice.is_owned_by(&farmer.stored_id()?) {
        return Err(FarmError::NotFound(NOT_FOUND.into()));
    }
    Ok(practice)
}

async fn reload(state: &AppState, id: Option<ObjectId>) -> Result<PracticeDoc> {
    let not_found = || FarmError::NotFound(NOT_FOUND.into());
    let id = id.ok_or_else(not_found)?;
    state
        .stores
        .practices
        .find_by_id(&id)
        .await?
        .ok_or_else(not_found)
}

// =============================================================================
// Catalog reads
// =============================================================================

async fn list_practices(req: &Request<Bytes>, state: &AppState) -> Result<HttpResponse> {
    let viewer = authenticate_optional(req, state).await?;
    let params = query_params(req);
    let page = Page::from_query(&params, DEFAULT_PAGE_SIZE);
    let sort = PracticeSort::parse(param(&params, "sortBy"));
    let facets = state.stores.practices.facets().await?;

    let (practices, total) = match catalog_filter(&params) {
        Some(filter) => {
            let store = &state.stores.practices;
            let practices = store
                .search(&filter, sort, page.skip(), page.limit_i64())
                .await?;
            (practices, store.count(&filter).await?)
        }
        None => (Vec::new(), 0),
    };

    debug!(
        viewer = ?viewer.as_ref().map(FarmerDoc::id_hex),
        sort = sort.as_str(),
        total,
        "Listed practices"
    );

    let views: Vec<PracticeView> = practices.iter().map(PracticeView::summary).collect();
    ok(&json!({
        "practices": views,
        "pagination": page.pagination(total),
        "filters": facets,
    }))
}

async fn featured(state: &AppState) -> Result<HttpResponse> {
    let practices = state
        .stores
        .practices
        .search(
            &PracticeFilter::featured(),
            PracticeSort::Rating,
            0,
            FEATURED_LIMIT,
        )
        .await?;

    let views: Vec<PracticeView> = practices.iter().map(PracticeView::summary).collect();
    ok(&json!({ "practices": views }))
}

async fn categories(state: &AppState) -> Result<HttpResponse> {
    let categories = state.stores.practices.category_summary().await?;
    ok(&json!({ "categories": categories }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Suggestion<'a> {
    id: String,
    title: &'a str,
    category: PracticeCategory,
    tags: &'a [String],
    applicable_crops: &'a [String],
}

impl<'a> From<&'a PracticeDoc> for Suggestion<'a> {
    fn from(practice: &'a PracticeDoc) -> Self {
        Self {
            id: hex_id(practice._id),
            title: &practice.title,
            category: practice.category,
            tags: &practice.tags,
            applicable_crops: &practice.applicable_crops,
        }
    }
}

async fn suggestions(req: &Request<Bytes>, state: &AppState) -> Result<HttpResponse> {
    let params = query_params(req);
    let query = param(&params, "q").unwrap_or_default();
    if query.chars().count() < MIN_SUGGESTION_QUERY {
        return ok(&json!({ "suggestions": [] }));
    }

    let practices = state
        .stores
        .practices
        .suggest(query, SUGGESTION_LIMIT)
        .await?;
    let suggestions: Vec<Suggestion> = practices.iter().map(Suggestion::from).collect();
    ok(&json!({ "suggestions": suggestions }))
}

async fn my_practices(req: &Request<Bytes>, state: &AppState) -> Result<HttpResponse> {
    let farmer = authenticate(req, state).await?;
    let practices = state
        .stores
        .practices
        .list_by_owner(&farmer.stored_id()?)
        .await?;

    let views: Vec<PracticeView> = practices.iter().map(PracticeView::full).collect();
    ok(&json!({ "practices": views }))
}

async fn get_practice(req: &Request<Bytes>, state: &AppState, id: &str) -> Result<HttpResponse> {
    let viewer = authenticate_optional(req, state).await?;
    let practice = active_practice(state, id).await?;

    debug!(
        practice = %id,
        viewer = ?viewer.as_ref().map(FarmerDoc::id_hex),
        "Read practice"
    );
    ok(&json!({ "practice": PracticeView::full(&practice) }))
}

// =============================================================================
// Owner writes
// =============================================================================

async fn create_practice(req: &Request<Bytes>, state: &AppState) -> Result<HttpResponse> {
    let farmer = authenticate(req, state).await?;
    let body = json_body(req, state.args.max_json_bytes)?;
    check_practice_body(&body, true)?;

    let required = |field: &str| {
        FarmError::Validation(vec![FieldError::body(field, format!("{} is required", field))])
    };
    let category = choice(&body, "category", PracticeCategory::parse)
        .ok_or_else(|| required("category"))?;
    let difficulty =
        choice(&body, "difficulty", Difficulty::parse).ok_or_else(|| required("difficulty"))?;
    let cost = choice(&body, "cost", CostLevel::parse).ok_or_else(|| required("cost"))?;

    let mut practice = PracticeDoc::new(String::new(), String::new(), category, difficulty, cost);
    apply_practice_fields(&mut practice, &body)?;
    practice.created_by = Some(farmer.stored_id()?);

    let practice = state.stores.practices.insert(practice).await?;
    info!(
        farmer = %farmer.id_hex(),
        practice = %hex_id(practice._id),
        category = %practice.category,
        "Practice created"
    );

    created(&json!({
        "message": "Practice created successfully",
        "practice": PracticeView::full(&practice),
    }))
}

async fn update_practice(req: &Request<Bytes>, state: &AppState, id: &str) -> Result<HttpResponse> {
    let farmer = authenticate(req, state).await?;
    let body = json_body(req, state.args.max_json_bytes)?;
    check_practice_body(&body, false)?;

    let mut practice = owned_practice(state, &farmer, id).await?;
    apply_practice_fields(&mut practice, &body)?;
    state.stores.practices.save(&practice).await?;

    let practice = reload(state, practice._id).await?;
    ok(&json!({
        "message": "Practice updated successfully",
        "practice": PracticeView::full(&practice),
    }))
}

async fn delete_practice(req: &Request<Bytes>, state: &AppState, id: &str) -> Result<HttpResponse> {
    let farmer = authenticate(req, state).await?;
    let practice = owned_practice(state, &farmer, id).await?;

    let practice_id = practice._id.ok_or_else(|| FarmError::NotFound(NOT_FOUND.into()))?;
    if !state.stores.practices.delete(&practice_id).await? {
        return Err(FarmError::NotFound(NOT_FOUND.into()));
    }

    info!(farmer = %farmer.id_hex(), practice = %practice_id, "Practice deleted");
    ok(&json!({ "message": "Practice deleted successfully" }))
}

async fn implement(req: &Request<Bytes>, state: &AppState, id: &str) -> Result<HttpResponse> {
    let farmer = authenticate(req, state).await?;
    let body = json_body(req, state.args.max_json_bytes)?;

    Checks::new(&body)
        .boolean("isImplemented", "isImplemented must be a boolean")
        .optional_int_range("progress", 0, 100, "Progress must be between 0 and 100")
        .optional_length("notes", 0, 1000, "Notes cannot exceed 1000 characters")
        .optional_date("implementationDate", "Implementation date must be a valid date")
        .finish()?;

    let mut practice = owned_practice(state, &farmer, id).await?;

    let is_implemented = lookup(&body, "isImplemented")
        .and_then(as_bool)
        .unwrap_or_default();
    let implementation_date = is_implemented.then(|| {
        lookup(&body, "implementationDate")
            .and_then(Value::as_str)
            .and_then(parse_iso8601)
            .unwrap_or_else(Utc::now)
    });

    practice.implementation = Some(Implementation {
        is_implemented,
        implementation_date,
        progress: lookup(&body, "progress").and_then(as_int).unwrap_or(0) as i32,
        notes: trimmed(&body, "notes").unwrap_or_default(),
    });
    state.stores.practices.save(&practice).await?;

    let practice = reload(state, practice._id).await?;
    ok(&json!({
        "message": "Practice implementation updated successfully",
        "practice": PracticeView::full(&practice),
    }))
}

// =============================================================================
// Community events
// =============================================================================

async fn adopt(req: &Request<Bytes>, state: &AppState, id: &str) -> Result<HttpResponse> {
    let farmer = authenticate(req, state).await?;
    let practice_id = parse_id(id, NOT_FOUND)?;

    let practice = state
        .stores
        .practices
        .record_adoption(&practice_id)
        .await?
        .ok_or_else(|| FarmError::NotFound(NOT_FOUND.into()))?;

    let farmer_id = farmer.stored_id()?;
    match progression::record_action(
        state.stores.gamification.as_ref(),
        &farmer_id,
        Action::PracticeAdopted,
        None,
    )
    .await
    {
        Ok(outcome) if !outcome.badges_earned.is_empty() => {
            info!(
                farmer = %farmer_id,
                badges = outcome.badges_earned.len(),
                "Adoption earned badges"
            );
        }
        Ok(_) => {}
        Err(e) => warn!(farmer = %farmer_id, "Failed to record adoption progress: {}", e),
    }

    info!(farmer = %farmer_id, practice = %practice_id, "Practice adopted");
    ok(&json!({
        "message": "Practice adopted successfully",
        "practice": {
            "id": practice_id.to_hex(),
            "title": practice.title,
            "adoptionStats": practice.adoption_stats,
        },
    }))
}

async fn rate(req: &Request<Bytes>, state: &AppState, id: &str) -> Result<HttpResponse> {
    authenticate(req, state).await?;
    let body = json_body(req, state.args.max_json_bytes)?;

    Checks::new(&body)
        .int_range("rating", 1, 5, "Rating must be between 1 and 5")
        .optional_length("review", 0, 500, "Review cannot exceed 500 characters")
        .finish()?;

    let mut practice = active_practice(state, id).await?;
    let rating = lookup(&body, "rating").and_then(as_int).unwrap_or_default() as i32;
    practice.adoption_stats.record_rating(rating);
    state.stores.practices.save(&practice).await?;

    ok(&json!({
        "message": "Rating submitted successfully",
        "rating": {
            "rating": rating,
            "review": trimmed(&body, "review"),
            "averageRating": practice.adoption_stats.average_rating,
            "totalRatings": practice.adoption_stats.total_ratings,
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> PracticeDoc {
        PracticeDoc::new(
            "Mulching".into(),
            "Cover the soil".into(),
            PracticeCategory::SoilHealth,
            Difficulty::Beginner,
            CostLevel::Low,
        )
    }

    #[test]
    fn test_vocabulary_is_case_insensitive() {
        let body = json!({ "difficulty": "Advanced", "cost": " HIGH " });
        assert_eq!(
            choice(&body, "difficulty", Difficulty::parse),
            Some(Difficulty::Advanced)
        );
        assert_eq!(choice(&body, "cost", CostLevel::parse), Some(CostLevel::High));
        assert_eq!(choice(&body, "category", PracticeCategory::parse), None);
    }

    #[test]
    fn test_impact_shorthand_and_object() {
        let all = parse_impact(&json!(40)).unwrap();
        assert_eq!(all.mean(), 40.0);

        let partial = parse_impact(&json!({ "soilHealth": 80 })).unwrap();
        assert_eq!(partial.soil_health, 80);
        assert_eq!(partial.biodiversity, 0);

        assert!(parse_impact(&json!(["x"])).is_none());
    }

    #[test]
    fn test_create_rules_report_every_field() {
        let err = check_practice_body(
            &json!({ "difficulty": "expert", "environmentalImpact": 140 }),
            true,
        )
        .unwrap_err();
        match err {
            FarmError::Validation(errors) => {
                let paths: Vec<_> = errors.iter().map(|e| e.path.as_str()).collect();
                assert_eq!(
                    paths,
                    vec![
                        "title",
                        "description",
                        "category",
                        "difficulty",
                        "cost",
                        "environmentalImpact"
                    ]
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(check_practice_body(&json!({ "title": "Better title" }), false).is_ok());
    }

    #[test]
    fn test_client_cannot_touch_counters_or_ownership() {
        let mut practice = base();
        let body = json!({
            "title": " Straw mulching ",
            "tags": ["Water", " SOIL "],
            "adoptionStats": { "totalAdoptions": 999 },
            "isFeatured": true,
            "createdBy": "someone",
        });
        apply_practice_fields(&mut practice, &body).unwrap();

        assert_eq!(practice.title, "Straw mulching");
        assert_eq!(practice.tags, vec!["water", "soil"]);
        assert_eq!(practice.adoption_stats.total_adoptions, 0);
        assert!(!practice.is_featured);
        assert!(practice.created_by.is_none());
    }

    #[test]
    fn test_unknown_filter_value_matches_nothing() {
        let mut params = HashMap::new();
        params.insert("category".to_string(), "Soil_Health".to_string());
        let filter = catalog_filter(&params).unwrap();
        assert_eq!(filter.category, Some(PracticeCategory::SoilHealth));

        params.insert("cost".to_string(), "free".to_string());
        assert!(catalog_filter(&params).is_none());
    }
}
