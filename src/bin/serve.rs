use clap::Parser;
use roof_takeoff::catalog::pricing::PriceBook;
use roof_takeoff::config::services::SolarConfig;
use roof_takeoff::server::{router, AppState};
use roof_takeoff::utils::logger;
use roof_takeoff::utils::validation::Validate;

#[derive(Parser)]
#[command(name = "serve")]
#[command(about = "Roofing estimate HTTP API")]
struct Args {
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: String,

    /// Supplier price list CSV applied on top of the built-in prices
    #[arg(long)]
    price_list: Option<String>,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    logger::init_json_logger(args.verbose);

    let mut book = PriceBook::builtin();
    if let Some(path) = &args.price_list {
        let file = std::fs::File::open(path)?;
        let imported = book.load_csv(file)?;
        tracing::info!("📊 Imported {} prices from {}", imported, path);
    }

    let mut state = AppState::new(book);
    match SolarConfig::from_env() {
        Ok(config) => {
            config.validate()?;
            state = state.with_solar(config);
            tracing::info!("🔧 Google Solar footprint estimates enabled");
        }
        Err(e) => tracing::warn!("⚠️ Footprint estimates disabled: {}", e),
    }

    let listener = tokio::net::TcpListener::bind(&args.bind).await?;
    tracing::info!("🚀 Listening on {}", args.bind);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
