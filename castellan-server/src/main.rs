//! The deployable Castellan identity-provider binary: config loading,
//! tracing init, flow-graph/executor/store bootstrap, and the Axum HTTP
//! server.

mod bootstrap;
mod collaborators;
mod config;

use std::net::SocketAddr;

use config::CastellanConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = std::env::var("CASTELLAN_CONFIG").unwrap_or_else(|_| "castellan.toml".to_string());
    let config = CastellanConfig::load(std::path::Path::new(&config_path))?;

    tracing::info!(config_path, "loaded configuration");

    let runtime = bootstrap::bootstrap(&config).await?;
    let state: castellan_axum::CastellanState<_, _, _> = runtime.services.into();

    let app = castellan_axum::router().with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.http.host, config.http.port).parse()?;
    tracing::info!(%addr, "starting castellan-server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
