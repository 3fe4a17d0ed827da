use clap::Parser;
use roof_takeoff::config::batch_config::BatchConfig;
use roof_takeoff::core::report::money;
use roof_takeoff::utils::{logger, validation::Validate};
use roof_takeoff::{BatchPipeline, LocalStorage};

#[derive(Parser)]
#[command(name = "batch-estimate")]
#[command(about = "Estimate several roofing projects from one batch file")]
struct Args {
    /// Path to batch configuration file
    #[arg(short, long, default_value = "batch.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Show the execution plan without running it
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    logger::init_cli_logger(args.verbose);

    tracing::info!("🚀 Starting batch estimate");
    tracing::info!("📁 Loading batch configuration from: {}", args.config);

    let config = match BatchConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load batch file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());
        std::process::exit(1);
    }

    println!("📋 Batch: {}", config.batch.name);
    for (i, project) in config.get_enabled_projects().iter().enumerate() {
        println!(
            "  {}. {} ({})",
            i + 1,
            project.id,
            project.name.as_deref().unwrap_or("unnamed")
        );
    }
    println!();

    if args.dry_run {
        println!("✅ Dry run complete.");
        return Ok(());
    }

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    let batch = BatchPipeline::new(LocalStorage::new("."), config).with_monitoring(monitor_enabled);

    match batch.execute_all().await {
        Ok(report) => {
            println!("📊 Batch results:");
            for result in &report.results {
                println!(
                    "  {:<20} ${:>14}  ${:>8}/sqft  {} warnings  ({:?})",
                    result.project_id,
                    money(result.total_estimate),
                    money(result.per_sqft),
                    result.warnings,
                    result.duration
                );
                println!("    📁 {}", result.output_path);
            }
            println!("  Grand total: ${}", money(report.grand_total()));
            if let Some(path) = &report.comparison_path {
                println!("📁 Comparison saved to: {}", path);
            }
        }
        Err(e) => {
            tracing::error!(
                "❌ Batch failed: {} (Category: {:?}, Severity: {:?})",
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
