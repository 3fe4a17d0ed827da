#![cfg(feature = "server")]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use httpmock::prelude::*;
use roof_takeoff::config::services::SolarConfig;
use roof_takeoff::server::{router, AppState};
use roof_takeoff::PriceBook;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn call(app: axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(match body {
            Some(body) => Body::from(body.to_string()),
            None => Body::empty(),
        })
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn app() -> axum::Router {
    router(AppState::new(PriceBook::builtin()))
}

#[tokio::test]
async fn test_health_and_systems() {
    let (status, body) = call(app(), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = call(app(), "GET", "/systems", None).await;
    assert_eq!(status, StatusCode::OK);
    let systems = body.as_array().unwrap();
    assert_eq!(systems.len(), 5);
    assert_eq!(systems[0]["key"], "SBS");
}

#[tokio::test]
async fn test_estimate_with_override() {
    let request = json!({
        "measurements": {
            "total_roof_area_sqft": 10000.0,
            "perimeter_lf": 400.0,
            "roof_drain_count": 4
        },
        "system": "TPO_Fully_Adhered",
        "price_overrides": {"Roof_Drain": 250.0}
    });
    let (status, body) = call(app(), "POST", "/estimate", Some(request)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["project_measurements"]["roof_system_type"],
        "TPO_Fully_Adhered"
    );

    let drain = body["unit_items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|item| item["pricing_key"] == "Roof_Drain")
        .unwrap();
    assert_eq!(drain["unit_price"], 250.0);
    assert_eq!(drain["line_cost"], 1000.0);
}

#[tokio::test]
async fn test_invalid_measurement_is_problem() {
    let request = json!({"measurements": {"total_roof_area_sqft": -5.0, "perimeter_lf": 100.0}});
    let (status, body) = call(app(), "POST", "/estimate", Some(request)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
    assert_eq!(body["type"], "https://httpstatuses.io/400");
    assert!(body["detail"].as_str().unwrap().contains("total_roof_area_sqft"));
}

#[tokio::test]
async fn test_compare_rejects_negative_area() {
    let request = json!({
        "measurements": {"total_roof_area_sqft": -8000.0, "perimeter_lf": 360.0},
        "systems": ["SBS", "TPO_Fully_Adhered"]
    });
    let (status, body) = call(app(), "POST", "/estimate/compare", Some(request)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("total_roof_area_sqft"));
}

#[tokio::test]
async fn test_compare_defaults_to_all_systems() {
    let request = json!({"measurements": {"total_roof_area_sqft": 8000.0, "perimeter_lf": 360.0}});
    let (status, body) = call(app(), "POST", "/estimate/compare", Some(request)).await;
    assert_eq!(status, StatusCode::OK);

    let comparisons = body["comparisons"].as_array().unwrap();
    assert_eq!(comparisons.len(), 5);
    let cheapest = comparisons
        .iter()
        .min_by(|a, b| {
            a["total_estimate"]
                .as_f64()
                .unwrap()
                .total_cmp(&b["total_estimate"].as_f64().unwrap())
        })
        .unwrap();
    assert_eq!(body["cheapest"], cheapest["roof_system_type"]);
}

#[tokio::test]
async fn test_detail_estimate() {
    let request = json!({
        "analysis": {
            "plan_analysis": [{"source_page": 1, "counts": {"roof_drains": 3}}],
            "detail_analysis": [{
                "source_page": 2,
                "details": [{
                    "detail_name": "Drain",
                    "detail_type": "drain",
                    "measurement_type": "each",
                    "layers": [{"material": "Drain body", "pricing_key": "Roof_Drain"}]
                }]
            }]
        },
        "total_roof_area_sqft": 9000.0,
        "perimeter_lf": 380.0
    });
    let (status, body) = call(app(), "POST", "/estimate/detail", Some(request)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["project_measurements"]["parapet_length_lf"], 380.0);
    assert_eq!(body["details"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_spec_analyze() {
    let text = "ABC School Roof Replacement Project\nProject No. 2024-118\n\x0cSection 07 52 00\nTwo-ply SBS membrane, 3 mm thick\n";
    let (status, body) = call(app(), "POST", "/spec/analyze", Some(json!({"text": text}))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["summary"]["total_unique_products"].as_u64().unwrap() >= 1);

    let (status, body) = call(app(), "POST", "/spec/analyze", Some(json!({"text": "  "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn test_footprint_requires_solar_config() {
    let request = json!({"address": "1 Main St"});
    let (status, body) = call(app(), "POST", "/footprint", Some(request)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["instance"], "/footprint");
}

#[tokio::test]
async fn test_footprint_not_found_maps_to_404() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/search");
        then.status(200).json_body(json!([]));
    });

    let config = SolarConfig::new("key")
        .with_base_url(&server.base_url())
        .with_retry_delay_ms(1);
    let app = router(AppState::new(PriceBook::builtin()).with_solar(config));

    let (status, body) = call(app, "POST", "/footprint", Some(json!({"address": "nowhere"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["title"], "Address not found");
    assert_eq!(body["instance"], "/footprint");
}
