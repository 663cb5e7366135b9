use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crou_api::background;
use crou_api::bootstrap::{self, BootstrapConfig};
use crou_api::config::{LogFormat, ServerConfig};
use crou_api::engine::housing_batch::{self, BatchTasks};
use crou_api::notifications::NotificationRouter;
use crou_api::router::build_app_router;
use crou_api::state::AppState;
use crou_events::{EventBus, EventPersistence};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Buffer between event persistence and the notification router.
const NOTIFICATION_QUEUE_CAPACITY: usize = 256;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    init_tracing(config.log_format);
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let pool = crou_db::create_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    crou_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    crou_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- First run ---
    match BootstrapConfig::from_env() {
        Some(bootstrap_config) => {
            bootstrap::ensure_root(&pool, &bootstrap_config)
                .await
                .expect("First-run bootstrap failed");
        }
        None => {
            let has_tenants = crou_db::repositories::TenantRepo::any_exists(&pool)
                .await
                .expect("Failed to inspect tenants");
            if !has_tenants {
                tracing::warn!("No tenants exist and ADMIN_EMAIL/ADMIN_PASSWORD are unset; nobody can log in");
            }
        }
    }

    // --- Interrupted housing batches ---
    let recovered = housing_batch::recover_interrupted(&pool)
        .await
        .expect("Failed to recover interrupted housing batches");
    if recovered > 0 {
        tracing::warn!(recovered, "Reset housing campaigns left in processing");
    }

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());

    let (persisted_tx, persisted_rx) = tokio::sync::mpsc::channel(NOTIFICATION_QUEUE_CAPACITY);
    let persistence_handle = tokio::spawn(EventPersistence::run(
        pool.clone(),
        event_bus.subscribe(),
        Some(persisted_tx),
    ));
    let router_handle = tokio::spawn(NotificationRouter::new(pool.clone()).run(persisted_rx));
    tracing::info!("Event services started (persistence, notification router)");

    // --- Background jobs ---
    let cancel = CancellationToken::new();
    let session_cleanup_handle =
        tokio::spawn(background::session_cleanup::run(pool.clone(), cancel.clone()));
    let ticket_expiry_handle =
        tokio::spawn(background::ticket_expiry::run(pool.clone(), cancel.clone()));

    // --- App state ---
    let batch_tasks = BatchTasks::new();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        event_bus: Arc::clone(&event_bus),
        batch_tasks: batch_tasks.clone(),
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    let grace = Duration::from_secs(config.shutdown_timeout_secs);

    if batch_tasks.shutdown(grace).await {
        tracing::info!("Housing batches stopped");
    } else {
        tracing::warn!("Housing batches still running at shutdown; they will be reset on next start");
    }

    cancel.cancel();
    let _ = tokio::time::timeout(grace, session_cleanup_handle).await;
    let _ = tokio::time::timeout(grace, ticket_expiry_handle).await;
    tracing::info!("Background jobs stopped");

    // Dropping the last bus handle closes the channel; persistence then
    // drops its sender, which stops the notification router.
    drop(event_bus);
    let _ = tokio::time::timeout(grace, persistence_handle).await;
    let _ = tokio::time::timeout(grace, router_handle).await;
    tracing::info!("Event services shut down");

    tracing::info!("Graceful shutdown complete");
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "crou_api=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Wait for SIGINT or SIGTERM to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
