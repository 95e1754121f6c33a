use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use dotenvy::dotenv;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use rental_bookings::cache::{CacheConfig, RedisClient};
use rental_bookings::config::database::DatabaseConfig;
use rental_bookings::config::environment::EnvironmentConfig;
use rental_bookings::database::DatabaseConnection;
use rental_bookings::repositories::{PgBookingStore, PgCatalog};
use rental_bookings::routes::create_router;
use rental_bookings::services::payment_gateway::RazorpayClient;
use rental_bookings::services::pending_reaper::PendingReaper;
use rental_bookings::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let config = EnvironmentConfig::from_env()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🚗 Rental booking engine ({})", config.environment);
    info!("================================================");

    let db_config = DatabaseConfig::from_env()?;
    let db = match DatabaseConnection::new(&db_config).await {
        Ok(db) => db,
        Err(e) => {
            error!("❌ Error connecting to the database: {}", e);
            return Err(e);
        }
    };
    db.run_migrations().await?;
    let pool = db.pool().clone();

    let store = Arc::new(PgBookingStore::new(pool.clone()));
    let catalog = Arc::new(PgCatalog::new(pool));
    let gateway = Arc::new(RazorpayClient::new(&config.gateway)?);

    let mut state = AppState::new(config.clone(), store.clone(), catalog, gateway);

    if let Some(redis_url) = &config.redis_url {
        let cache_config = CacheConfig {
            redis_url: redis_url.clone(),
            default_ttl: config.idempotency_ttl,
        };
        match RedisClient::new(cache_config).await {
            Ok(client) => state = state.with_idempotency(Arc::new(client)),
            Err(e) => warn!("⚠️ Redis unavailable, idempotency keys disabled: {}", e),
        }
    } else {
        info!("ℹ️ REDIS_URL not set, idempotency keys disabled");
    }

    if let Some(ttl) = config.booking.pending_ttl {
        PendingReaper::new(store, ttl, config.booking.reaper_interval).spawn();
    }

    let app = create_router(state);

    let addr: SocketAddr = config.server_url().parse()?;
    info!("🌐 Server listening on http://{}", addr);
    info!("   GET  /health");
    info!("   GET  /api/bookings | POST /api/bookings");
    info!("   GET  /api/bookings/:id");
    info!("   GET  /api/bookings/availability | POST /api/bookings/availability/search");
    info!("   PUT  /api/bookings/:id/status | payment-status | cancel");
    info!("   POST /api/bookings/payment/order | verify | fail");
    info!("   GET  /api/agencies/earnings");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            error!("❌ Server error: {}", e);
            e
        })?;

    info!("👋 Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("❌ Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("❌ Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("🛑 Ctrl+C received, shutting down..."),
        _ = terminate => info!("🛑 Termination signal received, shutting down..."),
    }
}
