use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::Client as S3Client;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use roof_takeoff::config::lambda::{EstimateEvent, LambdaConfig, S3Storage};
use roof_takeoff::utils::{logger, validation::Validate};
use roof_takeoff::{EstimateEngine, EstimatePipeline};
use serde::Serialize;

#[derive(Serialize)]
pub struct Response {
    pub message: String,
    pub project_name: String,
    pub output_path: String,
}

async fn function_handler(event: LambdaEvent<EstimateEvent>) -> Result<Response, Error> {
    tracing::info!("🚀 Starting estimate Lambda function");

    let lambda_config = LambdaConfig::from_event(event.payload)?;
    lambda_config.validate()?;

    let aws_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .region(Region::new(lambda_config.s3_region.clone()))
        .force_path_style(true)
        .build();
    let s3_client = S3Client::from_conf(s3_config);

    let project_name = lambda_config.project_name.clone();
    let storage = S3Storage::new(s3_client, lambda_config.s3_bucket.clone());
    let pipeline = EstimatePipeline::new(storage, lambda_config);

    let output_path = EstimateEngine::new(pipeline).run().await.map_err(|e| {
        tracing::error!("❌ Estimate failed: {} ({})", e, e.recovery_suggestion());
        e
    })?;

    tracing::info!("✅ Estimate Lambda completed: {}", output_path);
    Ok(Response {
        message: "Estimate completed successfully".to_string(),
        project_name,
        output_path,
    })
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    logger::init_lambda_logger();
    run(service_fn(function_handler)).await
}
