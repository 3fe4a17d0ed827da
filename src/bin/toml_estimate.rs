use clap::Parser;
use roof_takeoff::config::toml_config::EstimatorConfig;
use roof_takeoff::core::ConfigProvider;
use roof_takeoff::utils::{logger, validation::Validate};
use roof_takeoff::{EstimateEngine, EstimatePipeline, LocalStorage};

#[derive(Parser)]
#[command(name = "toml-estimate")]
#[command(about = "Roofing estimate driven by a TOML project file")]
struct Args {
    /// Path to TOML project file
    #[arg(short, long, default_value = "estimate.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Show what would be estimated without writing output
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let config = match EstimatorConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    logger::init_cli_logger(args.verbose || config.debug_logging());
    tracing::info!("🚀 Starting TOML-based estimate");
    tracing::info!("📁 Configuration loaded from: {}", args.config);

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!("✅ Configuration loaded and validated successfully");
    display_config_summary(&config);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No output will be written");
        println!("✅ Dry run complete.");
        return Ok(());
    }

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let pipeline = EstimatePipeline::new(LocalStorage::new("."), config);
    let engine = EstimateEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(output_path) => {
            tracing::info!("✅ Estimate completed successfully!");
            println!("✅ Estimate completed successfully!");
            println!("📁 Output saved to: {}", output_path);
        }
        Err(e) => {
            tracing::error!(
                "❌ Estimate failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            let exit_code = e.severity().exit_code();
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

fn display_config_summary(config: &EstimatorConfig) {
    println!("📋 Configuration Summary:");
    println!("  Project: {}", config.project_name());
    if let Some(description) = &config.project.description {
        println!("  Description: {}", description);
    }
    println!("  Measurements: {}", config.measurements_path());
    if let Some(analysis) = config.analysis_path() {
        println!("  Drawing analysis: {}", analysis);
    }
    if let Some(system) = config.system_override() {
        println!("  System: {}", system);
    }
    if let Some(price_list) = config.price_list_path() {
        println!("  Price list: {}", price_list);
    }
    let overrides = config.price_overrides();
    if !overrides.is_empty() {
        println!("  Price overrides: {}", overrides.len());
    }
    if !config.compare_systems().is_empty() {
        let systems: Vec<String> = config.compare_systems().iter().map(|s| s.to_string()).collect();
        println!("  Compare: {}", systems.join(", "));
    }
    println!("  Output: {}", config.output_path());
    println!("  Formats: {}", config.output_formats().join(", "));
    if config.compression_enabled() {
        println!("  Compression: {} (ZIP)", config.bundle_filename());
    }
    println!();
}
