use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    Router,
};
use dotenv::dotenv;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use homesite::cache::Cache;
use homesite::config::Config;
use homesite::database::{ConnectionManager, NativeConnector, OrmConnector};
use homesite::{routes, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::init();

    // Connections are opened lazily on first use and reused afterwards;
    // startup only needs the configuration to be valid.
    let db = ConnectionManager::new(
        NativeConnector::new(&config.mongodb_uri),
        OrmConnector::new(&config.mongodb_uri, &config.mongodb_database),
        Duration::from_secs(config.db_connect_timeout_seconds),
    );

    let cache = Arc::new(Cache::new(
        config.cache_max_size,
        Duration::from_secs(config.cache_default_ttl_seconds),
    ));
    let sweeper =
        Arc::clone(&cache).spawn_sweeper(Duration::from_secs(config.cache_cleanup_interval_seconds));

    let cors = CorsLayer::new()
        .allow_origin(config.client_origin.parse::<HeaderValue>()?)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_credentials(true)
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE]);

    let app_state = AppState {
        env: Arc::new(config.clone()),
        db: db.clone(),
        cache,
    };

    let app = Router::new()
        .merge(routes::admin_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state);

    println!("🚀 Server started successfully on port {}", config.port);
    println!(
        "📊 Health check: http://localhost:{}/api/healthchecker",
        config.port
    );
    println!("🗄️  MongoDB database: {}", config.mongodb_database);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // Runs on signal-driven and on normal exit alike; close_all itself is
    // idempotent, so a second signal arriving late is harmless.
    sweeper.abort();
    db.close_all().await;

    result?;
    Ok(())
}

/// Resolves on SIGINT (Ctrl+C) or SIGTERM. Registered once for the life of
/// the process.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("🛑 Shutdown signal received");
}
