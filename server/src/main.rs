use leaderboard_server::{config::Config, routes::router, state::AppState, store};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let store = store::connect(&config.backend).await?;
    let state = AppState::from_config(store, &config);

    // Refuse to start against a roster whose columns don't match the configuration
    state.service.verify_schema().await?;

    let static_dir = config.static_dir.is_dir().then_some(config.static_dir.as_path());
    if static_dir.is_none() {
        warn!("{} not found, serving the API only", config.static_dir.display());
    }
    let app = router(state, static_dir);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("Server running on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
