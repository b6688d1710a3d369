use identity_service::{
    build_router,
    config::IdentityConfig,
    db,
    services::{
        AuthService, Database, MemoryRevocationStore, RedisRevocationStore, RevocationStore,
        TokenService,
    },
    AppState,
};
use platform_core::error::AppError;
use platform_core::middleware::rate_limit::SlidingWindowLimiter;
use platform_core::observability::logging::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = IdentityConfig::from_env()?;

    // Internal error detail never leaves the process in production
    platform_core::error::set_expose_error_details(!config.is_prod());

    init_tracing(&config.service_name, &config.log_level);
    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting identity service"
    );

    let pool = db::create_pool(&config.database)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("PostgreSQL connection failed: {}", e)))?;
    db::run_migrations(&pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
    let database = Database::new(pool);

    let revocation = select_revocation_store(&config).await;
    let tokens = TokenService::new(&config.jwt);
    let auth_service = AuthService::new(database.clone(), tokens.clone(), revocation.clone());

    let rate_limiter = SlidingWindowLimiter::new(
        config.rate_limit.requests_per_minute,
        config.rate_limit.window_seconds,
    );
    tracing::info!(
        budget = config.rate_limit.requests_per_minute,
        window_seconds = config.rate_limit.window_seconds,
        "Rate limiter initialized"
    );

    let addr = SocketAddr::new(
        config.common.host.parse().map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("listen host is not an IP address: {}", e))
        })?,
        config.common.port,
    );
    let app = build_router(AppState {
        config,
        db: database,
        tokens,
        auth_service,
        revocation,
        rate_limiter,
    })
    .await?;

    tracing::info!(address = %addr, "Listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // ConnectInfo gives the rate limiter a peer address to key on
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

/// Shared cache when configured and reachable, process-local otherwise.
/// Startup never fails on a down cache; the service degrades instead.
async fn select_revocation_store(config: &IdentityConfig) -> Arc<dyn RevocationStore> {
    let Some(url) = &config.redis.url else {
        tracing::info!("REDIS_URL not set; using process-local revocation store");
        return Arc::new(MemoryRevocationStore::new());
    };

    match RedisRevocationStore::connect(url).await {
        Ok(store) => {
            tracing::info!("Connected to shared revocation cache");
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Shared revocation cache unreachable; using process-local store"
            );
            Arc::new(MemoryRevocationStore::new())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, starting graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
