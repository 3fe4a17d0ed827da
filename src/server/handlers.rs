use super::dto::*;
use super::error::Problem;
use super::AppState;
use crate::adapters::solar::estimate_flat_roof;
use crate::catalog::pricing::PriceBook;
use crate::config::toml_config::validate_price_overrides;
use crate::core::comparison::{cheapest, compare_systems};
use crate::core::detail_takeoff::{calculate_detail_takeoff, measurements_from_analysis};
use crate::core::sanity::check_measurements;
use crate::core::spec_extract::{analyze_text, split_pages, SpecAnalysis};
use crate::core::takeoff::calculate_takeoff;
use crate::domain::estimate::{DetailEstimate, TakeoffEstimate};
use crate::domain::model::RoofSystemType;
use crate::utils::validation::{validate_measurement, validate_non_empty_string, Validate};
use axum::http::StatusCode;
use axum::Json;
use std::collections::BTreeMap;
use std::sync::Arc;

/// 每個請求以共用價目表為底，再套用請求內的覆寫
fn price_book(state: &AppState, overrides: &BTreeMap<String, f64>) -> Result<PriceBook, Problem> {
    validate_price_overrides("price_overrides", overrides)?;
    let mut book = state.price_book.clone();
    book.apply_overrides(overrides);
    Ok(book)
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn list_systems() -> Json<Vec<SystemInfo>> {
    Json(RoofSystemType::ALL.into_iter().map(SystemInfo::from).collect())
}

pub async fn estimate(
    state: Arc<AppState>,
    Json(req): Json<EstimateRequest>,
) -> Result<Json<TakeoffEstimate>, Problem> {
    let mut measurements = req.measurements;
    measurements.validate()?;
    if let Some(system) = req.system {
        measurements = measurements.with_system(system);
    }
    let measurements = measurements.normalize();

    let book = price_book(&state, &req.price_overrides)?;
    let mut estimate = calculate_takeoff(&measurements, &book);
    estimate.warnings = check_measurements(&measurements);

    tracing::info!(
        "📊 Estimated {} sqft {}: ${:.2}",
        measurements.total_roof_area_sqft,
        measurements.roof_system_type,
        estimate.bid_summary.total_estimate
    );
    Ok(Json(estimate))
}

pub async fn estimate_detail(
    state: Arc<AppState>,
    Json(req): Json<DetailEstimateRequest>,
) -> Result<Json<DetailEstimate>, Problem> {
    let measurements = measurements_from_analysis(
        &req.analysis,
        req.total_roof_area_sqft,
        req.perimeter_lf,
        req.parapet_length_lf,
        req.parapet_height_ft,
    );
    measurements.validate()?;

    let book = price_book(&state, &req.price_overrides)?;
    let estimate = calculate_detail_takeoff(&measurements, &req.analysis, &book);
    tracing::info!(
        "📊 Detail estimate with {} details ({} unpriced layers)",
        estimate.details.len(),
        estimate.unpriced_layer_count()
    );
    Ok(Json(estimate))
}

pub async fn compare(
    state: Arc<AppState>,
    Json(req): Json<CompareRequest>,
) -> Result<Json<CompareResponse>, Problem> {
    req.measurements.validate()?;
    let measurements = req.measurements.normalize();

    let systems = if req.systems.is_empty() {
        RoofSystemType::ALL.to_vec()
    } else {
        req.systems
    };

    let book = price_book(&state, &req.price_overrides)?;
    let comparisons = compare_systems(&measurements, &systems, &book);
    let cheapest = cheapest(&comparisons).map(|c| c.roof_system_type);
    Ok(Json(CompareResponse {
        comparisons,
        cheapest,
    }))
}

pub async fn analyze_spec(Json(req): Json<SpecAnalyzeRequest>) -> Result<Json<SpecAnalysis>, Problem> {
    validate_non_empty_string("text", &req.text)?;
    let pages = split_pages(&req.text);
    let analysis = analyze_text(&pages)?;
    tracing::info!(
        "🔍 Spec analysis: {} pages, {} products",
        pages.len(),
        analysis.summary.total_unique_products
    );
    Ok(Json(analysis))
}

pub async fn footprint(
    state: Arc<AppState>,
    Json(req): Json<FootprintRequest>,
) -> Result<Json<FootprintResponse>, Problem> {
    let Some(solar) = state.solar.as_ref() else {
        return Err(Problem::new(StatusCode::SERVICE_UNAVAILABLE, "Service not configured")
            .with_detail("GOOGLE_SOLAR_API_KEY is not set")
            .with_instance("/footprint"));
    };
    validate_non_empty_string("address", &req.address)?;
    validate_measurement("parapet_height_ft", req.parapet_height_ft)?;

    let insights = solar
        .get_building_insights(&req.address)
        .await
        .map_err(|e| Problem::from(e).with_instance("/footprint"))?;
    let estimate = estimate_flat_roof(
        &insights,
        req.system,
        req.parapet_height_ft,
        req.hvac_units,
        &state.price_book,
    );

    Ok(Json(FootprintResponse {
        address: req.address,
        system: req.system,
        estimate,
    }))
}
