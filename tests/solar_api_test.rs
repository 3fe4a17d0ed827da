use httpmock::prelude::*;
use roof_takeoff::adapters::solar::{estimate_flat_roof, MembraneFamily, SolarClient};
use roof_takeoff::config::services::SolarConfig;
use roof_takeoff::{EstimatorError, PriceBook};

fn client(server: &MockServer, attempts: usize) -> SolarClient {
    let mut config = SolarConfig::new("solar-key")
        .with_base_url(&server.base_url())
        .with_retry_delay_ms(1);
    config.geocode_attempts = attempts;
    SolarClient::new(config)
}

fn insights_body() -> serde_json::Value {
    serde_json::json!({
        "imageryQuality": "HIGH",
        "solarPotential": {
            "wholeRoofStats": {"areaMeters2": 1020.0, "groundAreaMeters2": 1000.0},
            "roofSegmentStats": [{
                "pitchDegrees": 1.5,
                "azimuthDegrees": 180.0,
                "stats": {"areaMeters2": 1020.0, "groundAreaMeters2": 1000.0},
                "planeHeightAtCenterMeters": 6.0,
                "center": {"latitude": 43.65, "longitude": -79.38},
                "boundingBox": {
                    "sw": {"latitude": 43.6497, "longitude": -79.3805},
                    "ne": {"latitude": 43.6503, "longitude": -79.3795}
                }
            }]
        }
    })
}

#[tokio::test]
async fn test_building_insights_from_address() {
    let server = MockServer::start();

    let geocode_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/search")
            .query_param("q", "100 Queen St W, Toronto")
            .query_param("format", "json")
            .header_exists("user-agent");
        then.status(200)
            .json_body(serde_json::json!([{"lat": "43.65", "lon": "-79.38"}]));
    });

    let solar_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/v1/buildingInsights:findClosest")
            .query_param("requiredQuality", "HIGH")
            .query_param("key", "solar-key");
        then.status(200).json_body(insights_body());
    });

    let insights = client(&server, 3)
        .get_building_insights("100 Queen St W, Toronto")
        .await
        .unwrap();

    geocode_mock.assert();
    solar_mock.assert();
    assert_eq!(insights.imagery_quality, "HIGH");
    assert_eq!(insights.roof_segments.len(), 1);
    assert_eq!(insights.ground_area_m2, 1000.0);

    let estimate = estimate_flat_roof(&insights, MembraneFamily::Epdm, 2.0, None, &PriceBook::builtin());
    // 1000 m² = 10,763.9 sqft，每 2,500 sqft 一台
    assert_eq!(estimate.metrics.est_hvac_units, 5);
    assert_eq!(estimate.roof_segments[0].compass_direction, "S");
    assert!(estimate.costs.total_estimate > estimate.costs.membrane);
}

#[tokio::test]
async fn test_geocode_falls_back_to_arcgis() {
    let server = MockServer::start();

    let nominatim_mock = server.mock(|when, then| {
        when.method(GET).path("/search");
        then.status(503).body("overloaded");
    });
    let arcgis_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/arcgis/findAddressCandidates")
            .query_param("SingleLine", "1 Main St")
            .query_param("maxLocations", "1");
        then.status(200).json_body(serde_json::json!({
            "candidates": [{"location": {"x": -79.4, "y": 43.7}}]
        }));
    });

    let (lat, lng) = client(&server, 2).geocode("1 Main St").await.unwrap();

    nominatim_mock.assert_hits(2);
    arcgis_mock.assert();
    assert_eq!((lat, lng), (43.7, -79.4));
}

#[tokio::test]
async fn test_geocode_no_result_is_not_found() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/search");
        then.status(200).json_body(serde_json::json!([]));
    });

    let err = client(&server, 3).geocode("nowhere").await.unwrap_err();
    match err {
        EstimatorError::NotFoundError { detail, .. } => {
            assert_eq!(detail, "Could not find coordinates for address: nowhere")
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_find_closest_error_statuses() {
    let server = MockServer::start();
    let solar = client(&server, 1);

    let mut missing = server.mock(|when, then| {
        when.method(GET).path("/v1/buildingInsights:findClosest");
        then.status(404).body("{}");
    });
    let err = solar.find_closest(10.0, 20.0).await.unwrap_err();
    assert!(matches!(err, EstimatorError::NotFoundError { .. }));
    assert!(err.to_string().contains("No building found near (10.000000, 20.000000)"));
    missing.delete();

    let mut denied = server.mock(|when, then| {
        when.method(GET).path("/v1/buildingInsights:findClosest");
        then.status(403).body("forbidden");
    });
    let err = solar.find_closest(10.0, 20.0).await.unwrap_err();
    assert!(matches!(
        err,
        EstimatorError::ExternalServiceError { status: Some(403), .. }
    ));
    assert!(!err.is_retryable());
    denied.delete();

    server.mock(|when, then| {
        when.method(GET).path("/v1/buildingInsights:findClosest");
        then.status(500).body("x".repeat(500));
    });
    match solar.find_closest(10.0, 20.0).await.unwrap_err() {
        EstimatorError::ExternalServiceError { status, message, .. } => {
            assert_eq!(status, Some(500));
            assert_eq!(message.len(), 200);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
