use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use lariat::analytics::GeoResolver;
use lariat::api::create_api_router;
use lariat::auth::AuthService;
use lariat::config::{AuthMode, Config, DatabaseBackend};
use lariat::redirect::create_redirect_router;
use lariat::storage::{PostgresStorage, SqliteStorage, Storage};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    // Initialize storage
    let storage: Arc<dyn Storage> = match config.database.backend {
        DatabaseBackend::Sqlite => {
            info!("Using SQLite storage: {}", config.database.url);
            Arc::new(
                SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
            )
        }
        DatabaseBackend::Postgres => {
            info!("Using PostgreSQL storage: {}", config.database.url);
            Arc::new(
                PostgresStorage::new(&config.database.url, config.database.max_connections).await?,
            )
        }
    };

    // Initialize database
    info!("Initializing database...");
    storage.init().await?;
    info!("Database initialized successfully");

    // Initialize auth service
    let auth_service = Arc::new(AuthService::new(
        config.auth.mode,
        config.auth.api_keys.clone(),
    ));

    match config.auth.mode {
        AuthMode::None => {
            info!("Authentication is disabled - identities come from the X-User-Id header");
        }
        AuthMode::ApiKey => {
            info!(
                "API key authentication enabled ({} keys configured)",
                config.auth.api_keys.len()
            );
        }
    }

    // Initialize the geolocation resolver
    let geo = Arc::new(GeoResolver::new(config.geoip_db_path.as_deref())?);
    match config.geoip_db_path.as_deref() {
        Some(path) => info!("GeoIP database loaded from {}", path),
        None => info!("No GeoIP database configured - click locations resolve to Unknown"),
    }

    // Create routers
    let api_router = create_api_router(
        Arc::clone(&storage),
        auth_service,
        config.public_base_url.clone(),
    )
    .layer(CorsLayer::permissive())
    .layer(TraceLayer::new_for_http());

    let redirect_router = create_redirect_router(Arc::clone(&storage), geo)
        .layer(TraceLayer::new_for_http());

    // Start API server
    let api_addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr).await?;
    info!("API server listening on http://{}", api_addr);

    // Start redirect server
    let redirect_addr = format!(
        "{}:{}",
        config.redirect_server.host, config.redirect_server.port
    );
    let redirect_listener = tokio::net::TcpListener::bind(&redirect_addr).await?;
    info!("Redirect server listening on http://{}", redirect_addr);

    // Run both servers concurrently
    tokio::try_join!(
        axum::serve(api_listener, api_router),
        axum::serve(
            redirect_listener,
            redirect_router.into_make_service_with_connect_info::<SocketAddr>(),
        ),
    )?;

    Ok(())
}
