use clap::Parser;
use roof_takeoff::core::drawing::{filter_spec_pages, suggest_page_ranges};
use roof_takeoff::core::report::spec_report;
use roof_takeoff::core::spec_extract::{split_pages, SpecExtractor};
use roof_takeoff::core::Storage;
use roof_takeoff::utils::error::Result;
use roof_takeoff::utils::logger;
use roof_takeoff::LocalStorage;

#[derive(Parser)]
#[command(name = "spec-extract")]
#[command(about = "Extract roofing products from specification text (pdftotext output)")]
struct Args {
    /// Plain text with pages separated by form feeds
    input: String,

    /// Write the extraction as JSON
    #[arg(short, long)]
    output: Option<String>,

    /// Only analyse Division 00, 01 and 07 pages
    #[arg(long)]
    division_07_only: bool,

    /// Print suggested plan and detail page ranges instead
    #[arg(long)]
    suggest_pages: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    if let Err(e) = run(&args).await {
        tracing::error!(
            "❌ Extraction failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());
        std::process::exit(e.severity().exit_code());
    }
}

async fn run(args: &Args) -> Result<()> {
    let storage = LocalStorage::new(".");
    tracing::info!("📥 Reading specification text from: {}", args.input);
    let data = storage.read_file(&args.input).await?;
    let text = String::from_utf8_lossy(&data);
    let mut pages = split_pages(&text);

    if args.suggest_pages {
        let suggestion = suggest_page_ranges(&pages);
        println!("Plan pages:   {}", suggestion.plan_pages);
        println!("Detail pages: {}", suggestion.detail_pages);
        return Ok(());
    }

    if args.division_07_only {
        let keep = filter_spec_pages(&pages)?;
        pages.retain(|(page, _)| keep.contains(page));
        tracing::info!("🔍 {} specification pages kept", pages.len());
    }

    let analysis = SpecExtractor::new()?.analyze_text(&pages)?;
    println!("{}", spec_report(&analysis));

    if let Some(output) = &args.output {
        let json = serde_json::to_vec_pretty(&analysis)?;
        storage.write_file(output, &json).await?;
        tracing::info!("📁 Extraction saved to: {}", output);
    }
    Ok(())
}
