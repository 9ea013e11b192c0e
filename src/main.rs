use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use repometrics::{measure, MetricsConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .context("Usage: repometrics <config.json>")?;

    let config = MetricsConfig::load(&config_path)
        .with_context(|| format!("Could not load configuration from {}", config_path.display()))?;

    let results = measure(&config)
        .await
        .with_context(|| format!("Measurement of {} failed", config.repository_path.display()))?;

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
