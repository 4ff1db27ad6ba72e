//! Farm simulation routes (/api/digital-twin)
//!
//! - POST /api/digital-twin/simulate  - project a farm's outcomes
//! - GET  /api/digital-twin/templates - preset farm descriptions
//! - GET  /api/digital-twin/crops     - crop reference profiles

use bytes::Bytes;
use chrono::Utc;
use hyper::{Method, Request};
use serde_json::{json, Value};
use tracing::info;

use super::common::{json_body, ok, render, route_not_found, segments, under, HttpResponse};
use super::profile::land_units;
use crate::auth::authenticate;
use crate::db::schemas::LandUnit;
use crate::server::AppState;
use crate::services::digital_twin::{
    simulate, templates, ClimateZone, SimulationInput, SoilType, WaterAvailability, CROPS,
};
use crate::types::{FarmError, Result};
use crate::validation::{as_number, extract, lookup, trimmed, Checks};

const PREFIX: &str = "/api/digital-twin";

pub async fn handle_digital_twin_request(
    req: &Request<Bytes>,
    state: &AppState,
) -> Option<HttpResponse> {
    let path = req.uri().path();
    if !under(path, PREFIX) {
        return None;
    }

    let result = match (req.method(), segments(path, PREFIX).as_slice()) {
        (&Method::POST, ["simulate"]) => run_simulation(req, state).await,
        (&Method::GET, ["templates"]) => ok(&json!({ "templates": templates() })),
        (&Method::GET, ["crops"]) => ok(&json!({ "crops": CROPS })),

        (_, ["simulate"]) | (_, ["templates"]) | (_, ["crops"]) => {
            Err(FarmError::MethodNotAllowed)
        }
        _ => Err(route_not_found()),
    };

    Some(render(req, result))
}

fn names<T>(all: &[T], name: fn(&T) -> &'static str) -> Vec<&'static str> {
    all.iter().map(name).collect()
}

/// Validate and type a simulation request body
fn simulation_input(body: &Value) -> Result<SimulationInput> {
    let mut checks = Checks::new(body);
    checks
        .number("landSize", "Land size must be a number")
        .one_of("landSizeUnit", &land_units(), "Invalid land size unit")
        .not_empty("cropType", "Crop type is required")
        .one_of(
            "soilType",
            &names(SoilType::ALL, SoilType::as_str),
            "Invalid soil type",
        )
        .one_of(
            "climateZone",
            &names(ClimateZone::ALL, ClimateZone::as_str),
            "Invalid climate zone",
        )
        .one_of(
            "waterAvailability",
            &names(WaterAvailability::ALL, WaterAvailability::as_str),
            "Invalid water availability",
        )
        .number("budget", "Budget must be a number");
    if !lookup(body, "sustainabilityGoals").is_some_and(Value::is_array) {
        checks.fail(
            "sustainabilityGoals",
            "Sustainability goals must be an array",
        );
    }
    checks.finish()?;

    let text = |path: &str| {
        lookup(body, path)
            .and_then(Value::as_str)
            .unwrap_or_default()
    };
    let invalid = |path: &str| FarmError::BadRequest(format!("Invalid {}", path));

    Ok(SimulationInput {
        land_size: lookup(body, "landSize")
            .and_then(as_number)
            .ok_or_else(|| invalid("landSize"))?,
        land_size_unit: LandUnit::parse(text("landSizeUnit"))
            .ok_or_else(|| invalid("landSizeUnit"))?,
        crop_type: trimmed(body, "cropType").unwrap_or_default(),
        soil_type: SoilType::parse(text("soilType")).ok_or_else(|| invalid("soilType"))?,
        climate_zone: ClimateZone::parse(text("climateZone"))
            .ok_or_else(|| invalid("climateZone"))?,
        water_availability: WaterAvailability::parse(text("waterAvailability"))
            .ok_or_else(|| invalid("waterAvailability"))?,
        budget: lookup(body, "budget")
            .and_then(as_number)
            .ok_or_else(|| invalid("budget"))?,
        sustainability_goals: extract::<Vec<String>>(body, "sustainabilityGoals")?
            .unwrap_or_default(),
    })
}

async fn run_simulation(req: &Request<Bytes>, state: &AppState) -> Result<HttpResponse> {
    let farmer = authenticate(req, state).await?;
    let body = json_body(req, state.args.max_json_bytes)?;
    let input = simulation_input(&body)?;

    let simulation = simulate(input, Utc::now());
    info!(
        farmer = %farmer.id_hex(),
        simulation = %simulation.simulation_id,
        crop = %simulation.inputs.crop_type,
        "Simulation completed"
    );

    ok(&json!({
        "message": "Simulation completed successfully",
        "simulation": simulation,
    }))
}
