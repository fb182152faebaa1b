mod configuration;
mod error;
mod routes;
mod state;

use std::path::Path;

use relay::resolver::AgentRegistry;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::configuration::Settings;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let settings = Settings::new()?;

    let registry = match &settings.agents_file {
        Some(path) => AgentRegistry::from_yaml_file(Path::new(path))?,
        None => AgentRegistry::with_defaults(),
    };

    let state = AppState::new(
        registry,
        settings.limits.rate_ceiling,
        settings.storage.base_url.clone(),
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::configure(state).layer(cors);

    let listener = tokio::net::TcpListener::bind(settings.server.socket_addr()).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
