#![cfg(feature = "cli")]

use roof_takeoff::config::toml_config::EstimatorConfig;
use roof_takeoff::domain::estimate::TakeoffEstimate;
use roof_takeoff::utils::validation::Validate;
use roof_takeoff::{CliConfig, EstimateEngine, EstimatePipeline, LocalStorage, RoofSystemType};
use std::io::Read;
use tempfile::TempDir;

const MEASUREMENTS: &str = r#"
total_roof_area_sqft = 12000.0
perimeter_lf = 460.0
parapet_height_ft = 3.0
roof_drain_count = 6
mechanical_unit_count = 3
plumbing_vent_count = 4
roof_system_type = "SBS"
"#;

fn cli_config(output_path: &str) -> CliConfig {
    CliConfig {
        project_name: "Warehouse Reroof".to_string(),
        measurements: "inputs/warehouse.toml".to_string(),
        analysis: None,
        price_list: Some("inputs/prices.csv".to_string()),
        prices: vec![("Roof_Drain".to_string(), 200.0)],
        system: None,
        compare: vec![RoofSystemType::Sbs, RoofSystemType::TpoFullyAdhered],
        output_path: output_path.to_string(),
        formats: vec!["json".to_string(), "csv".to_string(), "txt".to_string()],
        no_compression: false,
        bundle_filename: "estimate_bundle.zip".to_string(),
        monitor: false,
        verbose: false,
    }
}

fn write_inputs(dir: &TempDir) {
    let inputs = dir.path().join("inputs");
    std::fs::create_dir_all(&inputs).unwrap();
    std::fs::write(inputs.join("warehouse.toml"), MEASUREMENTS).unwrap();
    std::fs::write(
        inputs.join("prices.csv"),
        "key,canonical_name,category,avg_price,unit\nPrimer,Asphaltic Primer,Primer,99.5,pail\n",
    )
    .unwrap();
}

fn read_entry(archive: &mut zip::ZipArchive<std::io::Cursor<Vec<u8>>>, name: &str) -> String {
    let mut file = archive.by_name(name).unwrap();
    let mut content = String::new();
    file.read_to_string(&mut content).unwrap();
    content
}

#[tokio::test]
async fn test_end_to_end_estimate_bundle() {
    let temp_dir = TempDir::new().unwrap();
    write_inputs(&temp_dir);

    let config = cli_config("out");
    config.validate().unwrap();

    let storage = LocalStorage::new(temp_dir.path());
    let engine = EstimateEngine::new_with_monitoring(EstimatePipeline::new(storage, config), false);
    let output_path = engine.run().await.unwrap();
    assert_eq!(output_path, "out/estimate_bundle.zip");

    let zip_data = std::fs::read(temp_dir.path().join(&output_path)).unwrap();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_data)).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "comparison.csv",
            "estimate.json",
            "estimate.txt",
            "line_items.csv",
            "material_summary.csv"
        ]
    );

    let estimate: TakeoffEstimate =
        serde_json::from_str(&read_entry(&mut archive, "estimate.json")).unwrap();
    assert_eq!(estimate.project_measurements.total_roof_area_sqft, 12000.0);
    assert!(estimate.bid_summary.total_estimate > 0.0);

    // 匯入價目表的單價出現在明細中
    let line_items = read_entry(&mut archive, "line_items.csv");
    assert!(line_items.starts_with("section,name,pricing_key,quantity,unit,unit_price,line_cost,bid_group"));
    assert!(line_items.contains("Primer"));
    assert!(line_items.contains("99.5"));
    assert!(line_items.contains("Roof_Drain"));

    let comparison = read_entry(&mut archive, "comparison.csv");
    assert_eq!(comparison.lines().count(), 3);
    assert!(comparison.contains("TPO_Fully_Adhered"));

    let report = read_entry(&mut archive, "estimate.txt");
    assert!(report.starts_with("PROJECT: Warehouse Reroof"));
    assert!(report.contains("GENERATED: "));
}

#[tokio::test]
async fn test_loose_files_without_compression() {
    let temp_dir = TempDir::new().unwrap();
    write_inputs(&temp_dir);

    let mut config = cli_config("loose");
    config.no_compression = true;
    config.formats = vec!["txt".to_string()];
    config.system = Some(RoofSystemType::EpdmBallasted);

    let storage = LocalStorage::new(temp_dir.path());
    let output_path = EstimateEngine::new(EstimatePipeline::new(storage, config))
        .run()
        .await
        .unwrap();

    assert_eq!(output_path, "loose");
    let report = std::fs::read_to_string(temp_dir.path().join("loose/estimate.txt")).unwrap();
    assert!(report.contains("EPDM 60 mil Ballasted"));
    assert!(!temp_dir.path().join("loose/estimate.json").exists());
}

#[tokio::test]
async fn test_toml_project_with_detail_analysis() {
    let temp_dir = TempDir::new().unwrap();
    write_inputs(&temp_dir);
    std::fs::write(
        temp_dir.path().join("inputs/analysis.json"),
        serde_json::json!({
            "drawing_pdf": "warehouse.pdf",
            "plan_analysis": [{"source_page": 1, "counts": {"roof_drains": 6}}],
            "detail_analysis": [{
                "source_page": 4,
                "details": [{
                    "detail_name": "Roof drain",
                    "detail_type": "drain",
                    "measurement_type": "each",
                    "layers": [{"material": "Drain clamp ring", "pricing_key": "Roof_Drain"}]
                }]
            }]
        })
        .to_string(),
    )
    .unwrap();

    let config = EstimatorConfig::from_toml_str(
        r#"
[project]
name = "Warehouse detail"

[input]
measurements = "inputs/warehouse.toml"
analysis = "inputs/analysis.json"
system = "TPO_Mechanically_Attached"

[output]
path = "detail"
formats = ["json", "txt"]

[output.compression]
enabled = false
"#,
    )
    .unwrap();
    config.validate().unwrap();

    let storage = LocalStorage::new(temp_dir.path());
    EstimateEngine::new(EstimatePipeline::new(storage, config))
        .run()
        .await
        .unwrap();

    let detail: serde_json::Value = serde_json::from_slice(
        &std::fs::read(temp_dir.path().join("detail/detail_estimate.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(detail["details"].as_array().unwrap().len(), 1);
    assert!(temp_dir.path().join("detail/detail_estimate.txt").exists());

    let estimate: TakeoffEstimate = serde_json::from_slice(
        &std::fs::read(temp_dir.path().join("detail/estimate.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(
        estimate.project_measurements.roof_system_type,
        RoofSystemType::TpoMechanicallyAttached
    );
}

#[tokio::test]
async fn test_missing_measurements_is_not_found() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = cli_config("out");
    config.price_list = None;

    let storage = LocalStorage::new(temp_dir.path());
    let err = EstimateEngine::new(EstimatePipeline::new(storage, config))
        .run()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        roof_takeoff::EstimatorError::NotFoundError { .. }
    ));
    assert_eq!(err.severity().exit_code(), 2);
}
