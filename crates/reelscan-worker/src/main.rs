//! Frame-directory analysis binary.

use tracing::{error, info};

use reelscan_media::AnalysisCache;
use reelscan_models::AnalysisConfiguration;
use reelscan_worker::{analyze_directory, logging, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    logging::init_tracing();

    let config = WorkerConfig::from_env().with_args(std::env::args().skip(1))?;
    info!("Worker config: {:?}", config);

    let metrics = if config.metrics_enabled {
        Some(logging::install_metrics()?)
    } else {
        None
    };

    let analysis = AnalysisConfiguration::from_env()?;
    let cache = AnalysisCache::new();

    let result = match analyze_directory(&config, analysis, &cache).await {
        Ok(result) => result,
        Err(e) => {
            error!("Analysis failed: {}", e);
            return Err(e.into());
        }
    };

    println!("{}", serde_json::to_string_pretty(result.as_ref())?);

    if let Some(handle) = metrics {
        info!(snapshot = %handle.render(), "Metrics snapshot");
    }

    Ok(())
}
