use clap::Parser;
use roof_takeoff::adapters::gemini::{load_page_images, GeminiClient};
use roof_takeoff::catalog::pricing::PriceBook;
use roof_takeoff::config::services::GeminiConfig;
use roof_takeoff::core::drawing::parse_page_list;
use roof_takeoff::core::report::analysis_summary;
use roof_takeoff::core::Storage;
use roof_takeoff::domain::analysis::ReferenceMeasurement;
use roof_takeoff::utils::error::Result;
use roof_takeoff::utils::{logger, validation::Validate};
use roof_takeoff::LocalStorage;

#[derive(Parser)]
#[command(name = "drawing-analyze")]
#[command(about = "Analyse rendered roof drawing pages with a Gemini vision model")]
struct Args {
    /// Directory holding page-<n>.png renders
    #[arg(long, default_value = "pages")]
    pages_dir: String,

    /// Drawing set name recorded in the output
    #[arg(long, default_value = "drawings.pdf")]
    drawing_pdf: String,

    /// Roof plan pages, e.g. "2,3" or "2-4"
    #[arg(long)]
    plan_pages: Option<String>,

    /// Detail pages
    #[arg(long)]
    detail_pages: Option<String>,

    /// Specification pages
    #[arg(long)]
    spec_pages: Option<String>,

    /// Supplier price list CSV used for the pricing key prompt
    #[arg(long)]
    price_list: Option<String>,

    #[arg(short, long, default_value = "drawing_analysis.json")]
    output: String,

    /// Estimate area, perimeter and parapet height instead of counts
    #[arg(long)]
    measure: bool,

    /// Known dimension for scale calibration, e.g. "north wall"
    #[arg(long, requires = "reference_value")]
    reference_description: Option<String>,

    #[arg(long)]
    reference_value: Option<f64>,

    #[arg(long, default_value = "ft")]
    reference_unit: String,

    /// Override GEMINI_MODEL
    #[arg(long)]
    model: Option<String>,

    /// List the models available to the API key and exit
    #[arg(long)]
    list_models: bool,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    if let Err(e) = run(&args).await {
        tracing::error!(
            "❌ Drawing analysis failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());
        std::process::exit(e.severity().exit_code());
    }
}

fn pages(value: &Option<String>) -> Result<Vec<u32>> {
    match value {
        Some(list) => parse_page_list(list),
        None => Ok(Vec::new()),
    }
}

async fn run(args: &Args) -> Result<()> {
    let mut config = GeminiConfig::from_env()?;
    if let Some(model) = &args.model {
        config = config.with_model(model.clone());
    }
    config.validate()?;
    let client = GeminiClient::new(config);

    if args.list_models {
        let models = client.list_models().await?;
        println!("📋 {} models available:", models.len());
        for model in models {
            println!(
                "  {:<45} {}",
                model.name,
                model.supported_generation_methods.join(", ")
            );
        }
        return Ok(());
    }

    let storage = LocalStorage::new(".");
    if args.plan_pages.is_none() && args.detail_pages.is_none() {
        let renders = storage.list_files(&args.pages_dir, "png").await?;
        println!("📁 {} page renders in {}:", renders.len(), args.pages_dir);
        for path in renders {
            println!("  {}", path.display());
        }
        println!("💡 Select pages with --plan-pages and --detail-pages");
        return Ok(());
    }

    let plan_pages = load_page_images(&args.pages_dir, &pages(&args.plan_pages)?).await?;
    let detail_pages = load_page_images(&args.pages_dir, &pages(&args.detail_pages)?).await?;
    tracing::info!(
        "🚀 Analysing {} plan and {} detail pages with {}",
        plan_pages.len(),
        detail_pages.len(),
        client.model()
    );

    if args.measure {
        let reference = match (&args.reference_description, args.reference_value) {
            (Some(description), Some(value)) => Some(ReferenceMeasurement {
                description: description.clone(),
                value,
                unit: args.reference_unit.clone(),
            }),
            _ => None,
        };
        let (measurements, parapet) = tokio::join!(
            client.analyze_measurements(&plan_pages, reference.as_ref()),
            client.analyze_parapet_height(&detail_pages),
        );

        let result = serde_json::json!({
            "measurements": measurements,
            "parapet": parapet,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
        storage
            .write_file(&args.output, &serde_json::to_vec_pretty(&result)?)
            .await?;
        tracing::info!("📁 Measurements saved to: {}", args.output);
        return Ok(());
    }

    let spec_pages = load_page_images(&args.pages_dir, &pages(&args.spec_pages)?).await?;
    let mut book = PriceBook::builtin();
    if let Some(path) = &args.price_list {
        let data = storage.read_file(path).await?;
        let imported = book.load_csv(data.as_slice())?;
        tracing::info!("📊 Imported {} prices from {}", imported, path);
    }

    let analysis = client
        .analyze_drawing(&args.drawing_pdf, &plan_pages, &detail_pages, &spec_pages, &book)
        .await;
    println!("{}", analysis_summary(&analysis));

    storage
        .write_file(&args.output, &serde_json::to_vec_pretty(&analysis)?)
        .await?;
    tracing::info!("📁 Analysis saved to: {}", args.output);
    println!("📁 Analysis saved to: {}", args.output);
    Ok(())
}
