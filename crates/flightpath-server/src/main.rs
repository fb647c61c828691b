//! Flightpath Server - route planning and live rerouting backend

use anyhow::{Context, Result};
use flightpath_core::Catalog;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use flightpath_server::config::Config;
use flightpath_server::state::AppState;
use flightpath_server::{api, loops};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env();

    let filter = EnvFilter::from_default_env().add_directive("flightpath_server=debug".parse()?);
    if config.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("Starting Flightpath Server...");

    let catalog = load_catalog(&config)?;
    let port = config.server_port;
    let state = Arc::new(AppState::new(config, catalog));

    tokio::spawn(loops::cache_prune_loop::run_cache_prune_loop(state.clone()));

    let app = api::routes()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn load_catalog(config: &Config) -> Result<Catalog> {
    let Some(path) = config.catalog_path.as_deref() else {
        return Ok(Catalog::builtin());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading catalog {}", path))?;
    let catalog = Catalog::from_json(&json).with_context(|| format!("parsing catalog {}", path))?;
    tracing::info!(
        "Loaded {} airports and {} aircraft from {}",
        catalog.airports().len(),
        catalog.aircraft_profiles().len(),
        path
    );
    Ok(catalog)
}
