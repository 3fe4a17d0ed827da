use crate::catalog::pricing::PriceBook;
use crate::config::cli::extension_of;
use crate::core::comparison::compare_systems;
use crate::core::detail_takeoff::{calculate_detail_takeoff, measurements_from_analysis};
use crate::core::report::{
    comparison_csv, detail_report, estimate_report, line_items_csv, material_summary_csv,
};
use crate::core::sanity::check_measurements;
use crate::core::takeoff::calculate_takeoff;
use crate::core::{ConfigProvider, EstimateInput, EstimateOutput, Pipeline, Storage};
use crate::domain::analysis::DrawingAnalysis;
use crate::domain::model::RoofMeasurements;
use crate::utils::error::{EstimatorError, Result};
use crate::utils::validation::Validate;
use std::io::Write;
use zip::write::{FileOptions, ZipWriter};

/// 輸出檔名與內容
pub type Artifact = (String, Vec<u8>);

/// 依副檔名解析量測檔（.toml 或 .json）
pub fn parse_measurements(path: &str, data: &[u8]) -> Result<RoofMeasurements> {
    let text = std::str::from_utf8(data).map_err(|e| EstimatorError::ProcessingError {
        message: format!("{} is not valid UTF-8: {}", path, e),
    })?;

    match extension_of(path).as_deref() {
        Some("toml") => Ok(toml::from_str(text)?),
        Some("json") => Ok(serde_json::from_str(text)?),
        _ => Err(EstimatorError::InvalidConfigValueError {
            field: "measurements".to_string(),
            value: path.to_string(),
            reason: "Measurement file must be .toml or .json".to_string(),
        }),
    }
}

pub fn join_path(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

/// 估算結果 → 各格式輸出檔
pub fn render_artifacts(output: &EstimateOutput, formats: &[String]) -> Result<Vec<Artifact>> {
    let wants = |format: &str| formats.iter().any(|f| f == format);
    let mut artifacts = Vec::new();

    if wants("json") {
        artifacts.push((
            "estimate.json".to_string(),
            serde_json::to_vec_pretty(&output.estimate)?,
        ));
        if let Some(detail) = &output.detail {
            artifacts.push((
                "detail_estimate.json".to_string(),
                serde_json::to_vec_pretty(detail)?,
            ));
        }
    }

    if wants("csv") {
        artifacts.push(("line_items.csv".to_string(), line_items_csv(&output.estimate)?));
        artifacts.push((
            "material_summary.csv".to_string(),
            material_summary_csv(&output.estimate)?,
        ));
        if !output.comparison.is_empty() {
            let rows = output
                .comparison
                .iter()
                .map(|c| (output.project_name.as_str(), c));
            artifacts.push(("comparison.csv".to_string(), comparison_csv(rows)?));
        }
    }

    if wants("txt") {
        let mut report = format!(
            "PROJECT: {}\nGENERATED: {}\n",
            output.project_name,
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        );
        report.push_str(&estimate_report(&output.estimate));
        artifacts.push(("estimate.txt".to_string(), report.into_bytes()));
        if let Some(detail) = &output.detail {
            artifacts.push((
                "detail_estimate.txt".to_string(),
                detail_report(detail).into_bytes(),
            ));
        }
    }

    Ok(artifacts)
}

pub fn zip_artifacts(artifacts: &[Artifact]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));

    for (name, data) in artifacts {
        zip.start_file::<_, ()>(name.as_str(), FileOptions::default())?;
        zip.write_all(data)?;
    }

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

/// 單一專案：讀入量測 → 計算 → 寫出報表
pub struct EstimatePipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
}

impl<S: Storage, C: ConfigProvider> EstimatePipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self { storage, config }
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    async fn load_price_book(&self) -> Result<PriceBook> {
        let mut book = PriceBook::builtin();

        if let Some(path) = self.config.price_list_path() {
            let data = self.storage.read_file(path).await?;
            let imported = book.load_csv(data.as_slice())?;
            tracing::info!("📊 Imported {} prices from {}", imported, path);
        }

        let overrides = self.config.price_overrides();
        if !overrides.is_empty() {
            tracing::debug!("Applying {} price overrides", overrides.len());
            book.apply_overrides(&overrides);
        }
        Ok(book)
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for EstimatePipeline<S, C> {
    async fn extract(&self) -> Result<EstimateInput> {
        let path = self.config.measurements_path();
        tracing::debug!("Reading measurements from: {}", path);
        let data = self.storage.read_file(path).await?;
        let mut measurements = parse_measurements(path, &data)?;
        // 原始值先驗證，再套用預設值
        measurements.validate()?;

        if let Some(system) = self.config.system_override() {
            measurements = measurements.with_system(system);
        }
        let measurements = measurements.normalize();

        let analysis = match self.config.analysis_path() {
            Some(path) => {
                tracing::debug!("Reading drawing analysis from: {}", path);
                let data = self.storage.read_file(path).await?;
                Some(serde_json::from_slice::<DrawingAnalysis>(&data)?)
            }
            None => None,
        };

        Ok(EstimateInput {
            project_name: self.config.project_name().to_string(),
            measurements,
            analysis,
            price_book: self.load_price_book().await?,
        })
    }

    async fn transform(&self, input: EstimateInput) -> Result<EstimateOutput> {
        let m = &input.measurements;
        m.validate()?;

        let warnings = check_measurements(m);
        for warning in &warnings {
            tracing::warn!("⚠️ {}", warning);
        }

        let mut estimate = calculate_takeoff(m, &input.price_book);
        estimate.warnings = warnings;

        let detail = input.analysis.as_ref().map(|analysis| {
            let detail_m = measurements_from_analysis(
                analysis,
                m.total_roof_area_sqft,
                m.perimeter_lf,
                Some(m.parapet_length_lf),
                m.parapet_height_ft,
            );
            calculate_detail_takeoff(&detail_m, analysis, &input.price_book)
        });

        let comparison = compare_systems(m, self.config.compare_systems(), &input.price_book);

        Ok(EstimateOutput {
            project_name: input.project_name,
            estimate,
            detail,
            comparison,
        })
    }

    async fn load(&self, output: EstimateOutput) -> Result<String> {
        let artifacts = render_artifacts(&output, self.config.output_formats())?;
        let output_dir = self.config.output_path();

        if !self.config.compression_enabled() {
            for (name, data) in &artifacts {
                self.storage.write_file(&join_path(output_dir, name), data).await?;
            }
            tracing::debug!("Wrote {} files without compression", artifacts.len());
            return Ok(output_dir.to_string());
        }

        tracing::debug!("Creating ZIP file with {} files", artifacts.len());
        let zip_data = zip_artifacts(&artifacts)?;

        let bundle_path = join_path(output_dir, self.config.bundle_filename());
        tracing::debug!("Writing ZIP file ({} bytes) to storage", zip_data.len());
        self.storage.write_file(&bundle_path, &zip_data).await?;

        Ok(bundle_path)
    }
}
