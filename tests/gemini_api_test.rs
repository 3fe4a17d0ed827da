use httpmock::prelude::*;
use roof_takeoff::adapters::gemini::{load_page_images, GeminiClient, PageImage};
use roof_takeoff::config::services::GeminiConfig;
use roof_takeoff::domain::analysis::MatchStatus;
use roof_takeoff::{EstimatorError, PriceBook};
use tempfile::TempDir;

const GENERATE_PATH: &str = "/models/test-model:generateContent";

fn client(server: &MockServer) -> GeminiClient {
    let mut config = GeminiConfig::new("gemini-key")
        .with_endpoint(server.base_url())
        .with_model("test-model")
        .with_retry_delay_ms(1);
    config.max_attempts = 2;
    GeminiClient::new(config)
}

fn reply(text: &str) -> serde_json::Value {
    serde_json::json!({
        "candidates": [{"content": {"parts": [{"text": text}]}}]
    })
}

fn page(page: u32) -> PageImage {
    PageImage {
        page,
        png: vec![0x89, b'P', b'N', b'G', page as u8],
    }
}

#[tokio::test]
async fn test_analyze_drawing_links_units_to_details() {
    let server = MockServer::start();

    let plan_mock = server.mock(|when, then| {
        when.method(POST)
            .path(GENERATE_PATH)
            .header("x-goog-api-key", "gemini-key")
            .body_contains("analyzing a roof plan view drawing")
            .body_contains("quantity-takeoff specialist");
        then.status(200).json_body(reply(
            r#"```json
{"drawing_ref": "R1.0", "counts": {"roof_drains": 4, "scuppers": 1},
 "unit_labels": [{"label": "HS", "detail_ref": "Detail 3/R3.1", "total_count": 2}]}
```"#,
        ));
    });

    let detail_mock = server.mock(|when, then| {
        when.method(POST)
            .path(GENERATE_PATH)
            .body_contains("analyzing architectural detail/section drawings");
        then.status(200).json_body(reply(
            r#"{"details": [{"detail_name": "Hatch curb", "detail_ref_id": "3/R3.1",
               "detail_type": "curb", "measurement_type": "count",
               "layers": [{"material": "TPO flashing", "pricing_key": "TPO_Pipe_Boot"}]}]}"#,
        ));
    });

    let analysis = client(&server)
        .analyze_drawing("roof.pdf", &[page(2)], &[page(5)], &[], &PriceBook::builtin())
        .await;

    plan_mock.assert();
    detail_mock.assert();
    assert_eq!(analysis.model_used, "test-model");
    assert_eq!(analysis.plan_analysis[0].source_page, 2);
    assert_eq!(analysis.plan_analysis[0].counts["roof_drains"], 4.0);
    assert_eq!(analysis.detail_analysis[0].details.len(), 1);
    assert!(analysis.spec_analysis.is_empty());

    let unit = &analysis.unit_detail_map[0];
    assert_eq!(unit.label, "HS");
    assert_eq!(unit.match_status, MatchStatus::Matched);
    assert_eq!(unit.total_count, 2.0);
    assert_eq!(unit.layers[0].pricing_key, "TPO_Pipe_Boot");
}

#[tokio::test]
async fn test_non_json_reply_is_marked_parse_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path(GENERATE_PATH);
        then.status(200).json_body(reply("I could not read this drawing."));
    });

    let results = client(&server)
        .analyze_pages(&[page(3), page(1)], "prompt")
        .await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["source_page"], 1);
    assert_eq!(results[1]["source_page"], 3);
    assert_eq!(results[0]["parse_error"], true);
    assert_eq!(results[0]["raw_response"], "I could not read this drawing.");
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path(GENERATE_PATH);
        then.status(503).body("model overloaded");
    });

    let err = client(&server).generate(b"png", "prompt").await.unwrap_err();
    mock.assert_hits(2);
    assert!(matches!(
        err,
        EstimatorError::ExternalServiceError { status: Some(503), .. }
    ));

    let result = client(&server).analyze_page(&page(7), "prompt").await;
    assert_eq!(result["source_page"], 7);
    assert!(result["error"].as_str().unwrap().contains("503"));
}

#[tokio::test]
async fn test_client_errors_fail_immediately() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path(GENERATE_PATH);
        then.status(400).body("API key not valid");
    });

    let err = client(&server).generate(b"png", "prompt").await.unwrap_err();
    mock.assert_hits(1);
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_list_models() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/models")
            .query_param("pageSize", "100")
            .header("x-goog-api-key", "gemini-key");
        then.status(200).json_body(serde_json::json!({
            "models": [
                {"name": "models/test-model", "displayName": "Test", "supportedGenerationMethods": ["generateContent"]},
                {"name": "models/embed", "supportedGenerationMethods": ["embedContent"]}
            ]
        }));
    });

    let models = client(&server).list_models().await.unwrap();
    mock.assert();
    assert_eq!(models.len(), 2);
    assert_eq!(models[0].display_name.as_deref(), Some("Test"));
    assert_eq!(models[1].supported_generation_methods, vec!["embedContent"]);
}

#[tokio::test]
async fn test_load_page_images() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("page-2.png"), b"two").unwrap();

    let images = load_page_images(dir.path(), &[2]).await.unwrap();
    assert_eq!(images[0].page, 2);
    assert_eq!(images[0].png, b"two");

    let err = load_page_images(dir.path(), &[2, 9]).await.unwrap_err();
    assert!(matches!(err, EstimatorError::NotFoundError { .. }));
}
