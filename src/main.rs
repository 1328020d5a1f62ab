//! coin_ledger - internal coin ledger HTTP API
//!
//! Employees log in, send each other coins and spend them on merch.

use std::net::SocketAddr;
use std::sync::Arc;

use coin_ledger::api::{build_router, AppState};
use coin_ledger::cache::{Cache, MemoryCache, RedisCache};
use coin_ledger::config::{Config, Storage};
use coin_ledger::db;
use coin_ledger::handlers::{PurchaseHandler, TransferHandler};
use coin_ledger::identity::{AuthService, TokenIssuer};
use coin_ledger::projection::SummaryService;
use coin_ledger::store::{CredentialStore, InMemoryLedgerStore, LedgerStore, PgLedgerStore};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging
fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "coin_ledger=debug,tower_http=debug".into());

    if json {
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
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    init_tracing(config.is_production());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!(storage = ?config.storage, "Starting coin_ledger server");

    // Ledger storage
    let (ledger, credentials, pool) = match config.storage {
        Storage::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required for postgres storage"))?;

            tracing::info!("Connecting to database...");
            let pool = db::connect(database_url, config.database_max_connections).await?;

            // Verify database schema
            if !db::check_schema(&pool).await? {
                tracing::error!("Database schema is not complete. Please run migrations.");
                return Err(anyhow::anyhow!("Database schema incomplete"));
            }
            tracing::info!("Database connected successfully");

            let store = Arc::new(PgLedgerStore::new(pool.clone()));
            let ledger: Arc<dyn LedgerStore> = store.clone();
            let credentials: Arc<dyn CredentialStore> = store;
            (ledger, credentials, Some(pool))
        }
        Storage::Memory => {
            tracing::warn!("Using in-memory ledger; all data is lost on exit");
            let store = Arc::new(InMemoryLedgerStore::new());
            store.seed_catalog().await?;
            let ledger: Arc<dyn LedgerStore> = store.clone();
            let credentials: Arc<dyn CredentialStore> = store;
            (ledger, credentials, None)
        }
    };

    // Summary cache
    let cache: Arc<dyn Cache> = match &config.redis_url {
        Some(url) => Arc::new(RedisCache::connect(url).await?),
        None => {
            tracing::info!("REDIS_URL not set, caching summaries in process");
            Arc::new(MemoryCache::new())
        }
    };

    let tokens = TokenIssuer::new(&config.jwt_secret, config.token_ttl);
    let shutdown = CancellationToken::new();

    let state = AppState {
        transfers: Arc::new(TransferHandler::new(ledger.clone(), cache.clone())),
        purchases: Arc::new(PurchaseHandler::new(ledger.clone(), cache.clone())),
        summaries: Arc::new(SummaryService::new(ledger, cache).with_ttl(config.cache_ttl)),
        auth: Arc::new(
            AuthService::new(credentials, tokens).with_initial_balance(config.initial_balance),
        ),
        shutdown: shutdown.clone(),
    };

    // Build router and start server
    let app = build_router(state);

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let grace = config.shutdown_grace;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;

            // Requests still running after the grace period are cancelled;
            // their units of work roll back.
            let token = shutdown.clone();
            tokio::spawn(async move {
                tokio::time::sleep(grace).await;
                tracing::warn!("Grace period over, cancelling in-flight operations");
                token.cancel();
            });
        })
        .await?;

    // Cleanup
    tracing::info!("Server shutting down...");
    if let Some(pool) = pool {
        pool.close().await;
        tracing::info!("Database connections closed. Goodbye!");
    }

    Ok(())
}

/// Shutdown signal handler for graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}
