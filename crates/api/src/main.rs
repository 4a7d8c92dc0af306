use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use roster_api::config::{LogFormat, ServerConfig};
use roster_api::router::{build_app_router, build_management_router};
use roster_api::state::AppState;
use roster_db::{MemoryUserStore, PgUserStore, UserStore};
use roster_directory::UserDirectory;
use roster_events::{EmailConfig, EmailDelivery, EventBus, UserNotifier};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long shutdown waits for the notifier to drain after the bus closes.
const NOTIFIER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Configuration ---
    let config = ServerConfig::from_env().expect("Invalid server configuration");

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "roster_api=debug,roster_directory=debug,roster_events=debug,tower_http=debug".into()
    });
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    tracing::info!(
        host = %config.host,
        port = config.port,
        management_port = config.management_port,
        "Loaded server configuration"
    );

    // --- Store ---
    let store: Arc<dyn UserStore> = match &config.database_url {
        Some(database_url) => {
            let pool = roster_db::create_pool(database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            roster_db::health_check(&pool)
                .await
                .expect("Database health check failed");
            tracing::info!("Database health check passed");

            roster_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            Arc::new(PgUserStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory user store");
            Arc::new(MemoryUserStore::new())
        }
    };

    // --- Event bus ---
    let bus_config = config.bus_config();
    let event_bus = Arc::new(EventBus::new(bus_config));
    tracing::info!(
        capacity = bus_config.capacity,
        overflow = ?bus_config.overflow,
        "Event bus created"
    );

    // --- Notifier ---
    let email = match EmailConfig::from_env() {
        Some(email_config) => match EmailDelivery::new(email_config) {
            Ok(delivery) => Some(delivery),
            Err(e) => {
                tracing::error!(error = %e, "SMTP transport unavailable, mail will only be logged");
                None
            }
        },
        None => {
            tracing::info!("SMTP not configured, mail will only be logged");
            None
        }
    };
    let notifier = UserNotifier::new(email).spawn(&event_bus).await;
    tracing::info!(loops = notifier.len(), "User notifier started");

    // --- App state ---
    let directory = Arc::new(UserDirectory::new(
        store,
        Arc::clone(&event_bus),
        config.directory_config(),
    ));
    let state = AppState { directory };

    let app = build_app_router(state.clone(), &config);
    let management = build_management_router(state);

    // --- Start servers ---
    let host = config.host.parse().expect("Invalid HOST address");
    let addr = SocketAddr::new(host, config.port);
    let management_addr = SocketAddr::new(host, config.management_port);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind API address");
    let management_listener = tokio::net::TcpListener::bind(management_addr)
        .await
        .expect("Failed to bind management address");
    tracing::info!(%addr, %management_addr, "Starting servers");

    // One signal fans out to both servers.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let management_shutdown = wait_for(shutdown_rx.clone());
    let management_handle = tokio::spawn(async move {
        axum::serve(management_listener, management)
            .with_graceful_shutdown(management_shutdown)
            .await
    });
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for(shutdown_rx))
        .await
        .expect("Server error");

    match management_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "Management server error"),
        Err(e) => tracing::error!(error = %e, "Management server task failed"),
    }

    // --- Post-shutdown cleanup ---
    tracing::info!("Servers stopped accepting connections, cleaning up");

    // Closing the bus ends every notifier receive loop.
    event_bus.close().await;
    match tokio::time::timeout(NOTIFIER_DRAIN_TIMEOUT, notifier.join()).await {
        Ok(handled) => tracing::info!(handled, "User notifier stopped"),
        Err(_) => tracing::warn!("User notifier did not stop in time"),
    }
    tracing::info!(
        dropped_events = event_bus.dropped_events(),
        "Graceful shutdown complete"
    );
}

async fn wait_for(mut shutdown: watch::Receiver<bool>) {
    // A dropped sender also means shut down.
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
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
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
