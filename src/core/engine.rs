use crate::domain::ports::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

/// 依序執行 extract → transform → load
pub struct EstimateEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EstimateEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&self) -> Result<String> {
        tracing::info!("🚀 Starting estimate process");
        self.monitor.log_stats("start");

        tracing::info!("📥 Extracting measurements...");
        let input = self.pipeline.extract().await?;
        tracing::info!(
            "📥 Loaded project '{}' ({} sqft, {})",
            input.project_name,
            input.measurements.total_roof_area_sqft,
            input.measurements.roof_system_type
        );
        self.monitor.log_stats("extract");

        tracing::info!("🔧 Calculating takeoff...");
        let output = self.pipeline.transform(input).await?;
        tracing::info!(
            "🔧 Estimate total: ${:.2} ({} line items, {} warnings)",
            output.estimate.bid_summary.total_estimate,
            output.estimate.line_items().count(),
            output.estimate.warnings.len()
        );
        if let Some(detail) = &output.detail {
            tracing::info!(
                "🔧 Detail takeoff: {} details, {} layers need manual pricing",
                detail.details.len(),
                detail.unpriced_layer_count()
            );
        }
        self.monitor.log_stats("transform");

        tracing::info!("💾 Writing outputs...");
        let output_path = self.pipeline.load(output).await?;
        tracing::info!("📁 Output saved to: {}", output_path);
        self.monitor.log_stats("load");

        self.monitor.log_final_stats();
        Ok(output_path)
    }
}
