use crate::config::batch_config::BatchConfig;
use crate::core::comparison::compare_systems;
use crate::core::pipeline::{join_path, EstimatePipeline};
use crate::core::report::comparison_csv;
use crate::core::{Pipeline, Storage};
use crate::domain::estimate::SystemComparison;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;
use std::time::{Duration, Instant};

/// 單一專案的批次執行結果
#[derive(Debug, Clone)]
pub struct ProjectResult {
    pub project_id: String,
    pub project_name: String,
    pub output_path: String,
    pub total_estimate: f64,
    pub per_sqft: f64,
    pub warnings: usize,
    pub comparison: Vec<SystemComparison>,
    pub duration: Duration,
}

#[derive(Debug, Clone)]
pub struct BatchReport {
    pub results: Vec<ProjectResult>,
    pub comparison_path: Option<String>,
}

impl BatchReport {
    pub fn grand_total(&self) -> f64 {
        self.results.iter().map(|r| r.total_estimate).sum()
    }
}

/// 依執行順序逐一估算批次中的專案
pub struct BatchPipeline<S: Storage + Clone> {
    storage: S,
    config: BatchConfig,
    monitor: SystemMonitor,
}

impl<S: Storage + Clone> BatchPipeline<S> {
    pub fn new(storage: S, config: BatchConfig) -> Self {
        Self {
            storage,
            config,
            monitor: SystemMonitor::new(false),
        }
    }

    pub fn with_monitoring(mut self, enabled: bool) -> Self {
        self.monitor = SystemMonitor::new(enabled);
        self
    }

    pub async fn execute_all(&self) -> Result<BatchReport> {
        let projects = self.config.get_enabled_projects();
        tracing::info!(
            "🚀 Starting batch '{}' with {} projects",
            self.config.batch.name,
            projects.len()
        );
        self.monitor.log_stats("batch start");

        let mut results = Vec::with_capacity(projects.len());
        for project in projects {
            let start_time = Instant::now();
            let run_config = self.config.run_config(project);
            tracing::info!("📥 Estimating project: {}", run_config.id);

            let pipeline = EstimatePipeline::new(self.storage.clone(), run_config.clone());
            let input = pipeline.extract().await?;
            let measurements = input.measurements.clone();
            let book = input.price_book.clone();
            let output = pipeline.transform(input).await?;

            // 未指定比較系統時以專案本身的系統列入比較表
            let comparison = if output.comparison.is_empty() {
                compare_systems(&measurements, &[measurements.roof_system_type], &book)
            } else {
                output.comparison.clone()
            };

            let result = ProjectResult {
                project_id: run_config.id.clone(),
                project_name: output.project_name.clone(),
                output_path: String::new(),
                total_estimate: output.estimate.bid_summary.total_estimate,
                per_sqft: output.estimate.bid_summary.per_sqft,
                warnings: output.estimate.warnings.len(),
                comparison,
                duration: Duration::ZERO,
            };

            let output_path = pipeline.load(output).await?;
            let duration = start_time.elapsed();
            tracing::info!(
                "✅ Project estimated: {} (${:.2}, duration: {:?})",
                result.project_id,
                result.total_estimate,
                duration
            );
            self.monitor.log_stats(&result.project_id);

            results.push(ProjectResult {
                output_path,
                duration,
                ..result
            });
        }

        let comparison_path = self.write_comparison(&results).await?;

        tracing::info!(
            "📊 Batch completed: {} projects, grand total ${:.2}",
            results.len(),
            results.iter().map(|r| r.total_estimate).sum::<f64>()
        );
        self.monitor.log_final_stats();

        Ok(BatchReport {
            results,
            comparison_path,
        })
    }

    async fn write_comparison(&self, results: &[ProjectResult]) -> Result<Option<String>> {
        if results.is_empty() {
            return Ok(None);
        }

        let rows = results.iter().flat_map(|result| {
            result
                .comparison
                .iter()
                .map(move |c| (result.project_name.as_str(), c))
        });
        let data = comparison_csv(rows)?;

        let path = join_path(&self.config.batch.output_path, "comparison.csv");
        self.storage.write_file(&path, &data).await?;
        tracing::info!("📁 Comparison saved to: {}", path);
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::cli::LocalStorage;
    use tempfile::TempDir;

    const BATCH: &str = r#"
[batch]
name = "Tender"
execution_order = ["b", "a"]
output_path = "out"

[[projects]]
id = "a"
name = "Library"
measurements = "a.toml"
compare_systems = ["SBS", "TPO_Mechanically_Attached"]

[[projects]]
id = "b"
measurements = "b.json"

[[projects]]
id = "c"
enabled = false
measurements = "missing.toml"
"#;

    #[tokio::test]
    async fn test_batch_runs_enabled_projects_in_order() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());
        storage
            .write_file("a.toml", b"total_roof_area_sqft = 8000.0\nperimeter_lf = 360.0\n")
            .await
            .unwrap();
        storage
            .write_file(
                "b.json",
                br#"{"total_roof_area_sqft": 2500, "perimeter_lf": 200, "roof_system_type": "EPDM_Ballasted"}"#,
            )
            .await
            .unwrap();

        let config = BatchConfig::from_toml_str(BATCH).unwrap();
        let batch = BatchPipeline::new(storage.clone(), config);
        let report = batch.execute_all().await.unwrap();

        let ids: Vec<_> = report.results.iter().map(|r| r.project_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(report.results[0].output_path, "out/b/estimate_bundle.zip");
        assert_eq!(report.results[1].comparison.len(), 2);
        assert!(report.grand_total() > 0.0);

        let csv = storage.read_file("out/comparison.csv").await.unwrap();
        let csv = String::from_utf8(csv).unwrap();
        // 表頭 + b 一列 + a 兩列
        assert_eq!(csv.lines().count(), 4);
        assert!(csv.contains("EPDM_Ballasted"));
        assert!(dir.path().join("out/a/estimate_bundle.zip").exists());
    }
}
