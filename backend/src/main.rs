use price_update_backend::{config::Config, pipeline::Pipeline};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("🚀 Starting price update re-encoder...");

    let config = Config::from_env()?;
    tracing::info!(
        "🔗 Hermes: {} ({} feeds, entry point {:?})",
        config.hermes_url,
        config.feed_ids.len(),
        config.entry_point
    );

    let pipeline = Pipeline::from_config(&config)?;
    let report = pipeline
        .run(&config.feed_ids, config.selected_indices.as_deref())
        .await?;

    for record in &report.selected {
        tracing::info!(
            "📈 {} {}: {} (publish_time {})",
            record.symbol.as_deref().unwrap_or("?"),
            record.record.feed_id,
            record
                .human_price
                .map(|price| price.to_string())
                .unwrap_or_else(|| "n/a".to_string()),
            record.record.publish_time
        );
    }

    tracing::info!(
        "✅ Calldata ready: {} bytes, recommended gas limit {}",
        report.summary.calldata_size,
        report.summary.recommended_gas_limit
    );

    Ok(())
}
