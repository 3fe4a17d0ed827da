use clap::Parser;
use roof_takeoff::adapters::solar::{estimate_flat_roof, MembraneFamily, SolarClient};
use roof_takeoff::catalog::pricing::PriceBook;
use roof_takeoff::config::services::SolarConfig;
use roof_takeoff::core::report::money;
use roof_takeoff::utils::error::Result;
use roof_takeoff::utils::{logger, validation::Validate};

#[derive(Parser)]
#[command(name = "footprint-estimate")]
#[command(about = "Budget flat-roof estimate from the Google Solar building footprint")]
struct Args {
    /// Street address of the building
    address: String,

    /// Membrane family: TPO or EPDM
    #[arg(long, default_value = "TPO")]
    system: MembraneFamily,

    #[arg(long, default_value_t = 2.0)]
    parapet_height: f64,

    /// Known number of HVAC units (otherwise one per 2,500 sqft)
    #[arg(long)]
    hvac_units: Option<u32>,

    /// Print JSON instead of the summary
    #[arg(long)]
    json: bool,

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
            "❌ Footprint estimate failed: {} (Category: {:?}, Severity: {:?})",
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
    let config = SolarConfig::from_env()?;
    config.validate()?;
    let client = SolarClient::new(config);

    let insights = client.get_building_insights(&args.address).await?;
    let estimate = estimate_flat_roof(
        &insights,
        args.system,
        args.parapet_height,
        args.hvac_units,
        &PriceBook::builtin(),
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&estimate)?);
        return Ok(());
    }

    let metrics = &estimate.metrics;
    let costs = &estimate.costs;
    println!("🏢 {}", args.address);
    println!("  Footprint:      {} sqft", money(metrics.footprint_area_sqft));
    println!("  Roof surface:   {} sqft", money(metrics.roof_surface_area_sqft));
    println!("  Perimeter:      {} lf", money(metrics.perimeter_linear_ft));
    println!("  HVAC units:     {}", metrics.est_hvac_units);
    println!("  Imagery:        {}", metrics.imagery_quality);
    println!();
    for segment in &estimate.roof_segments {
        println!(
            "  Segment {:>2}: {:>5.1}° pitch facing {:<2} {:>10} sqft",
            segment.segment_number,
            segment.pitch_degrees,
            segment.compass_direction,
            money(segment.surface_area_sqft)
        );
    }
    println!();
    println!("  {} membrane:   ${}", args.system, money(costs.membrane));
    println!("  Insulation:     ${}", money(costs.insulation));
    println!("  Flashing:       ${}", money(costs.flashing));
    println!("  HVAC curbs:     ${}", money(costs.hvac_curbs));
    println!("  TOTAL ESTIMATE: ${}", money(costs.total_estimate));
    Ok(())
}
