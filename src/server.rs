//! Reusable server runtime.
//!
//! [`ServerHandle`] owns the full lifecycle: metrics recorder, storage,
//! state recovery, the lifecycle monitor, the REST/WebSocket API and
//! graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use sea_orm::DatabaseConnection;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::application::{ChangeNotifier, LifecycleMonitor, ReservationService};
use crate::config::{AppConfig, StorageBackend};
use crate::domain::{PersistenceAdapter, SpotCatalog};
use crate::infrastructure::{init_database, DatabaseConfig, DatabaseStorage, InMemoryStorage};
use crate::interfaces::http::modules::metrics::install_prometheus_recorder;
use crate::interfaces::http::{create_api_router, AppState};
use crate::shared::shutdown::{listen_for_shutdown_signals, ShutdownSignal};

pub type ServerError = Box<dyn std::error::Error + Send + Sync>;

// ── Options ────────────────────────────────────────────────────────

/// Options for starting the service.
#[derive(Default)]
pub struct ServerOptions {
    pub config: AppConfig,
    /// Spot source consulted at startup. Defaults to `config.catalog`.
    pub catalog: Option<Arc<dyn SpotCatalog>>,
}

// ── ServerHandle ───────────────────────────────────────────────────

/// Handle to a running service.
///
/// ```rust,no_run
/// use parkhub::server::{ServerHandle, ServerOptions};
///
/// #[tokio::main]
/// async fn main() -> Result<(), parkhub::server::ServerError> {
///     let handle = ServerHandle::start(ServerOptions::default()).await?;
///     handle.install_signal_handler();
///     handle.shutdown_signal().wait().await;
///     handle.wait().await;
///     Ok(())
/// }
/// ```
pub struct ServerHandle {
    pub service: Arc<ReservationService>,
    pub config: AppConfig,
    /// Address the API is actually bound to (port 0 resolves here)
    pub local_addr: SocketAddr,

    db: Option<DatabaseConnection>,
    shutdown: ShutdownSignal,
    api_task: JoinHandle<()>,
    lifecycle_task: JoinHandle<()>,
}

impl ServerHandle {
    /// 1. Install the Prometheus recorder
    /// 2. Open storage (SQLite with migrations, or in-memory)
    /// 3. Sync the catalog and reconcile spot state
    /// 4. Start the lifecycle monitor
    /// 5. Serve the REST API, Swagger UI and notification WebSocket
    pub async fn start(opts: ServerOptions) -> Result<Self, ServerError> {
        let config = opts.config;
        config.validate()?;

        info!("Starting ParkHub reservation service...");

        let prometheus = install_prometheus_recorder();

        // ── Storage ────────────────────────────────────────────
        let (storage, db): (Arc<dyn PersistenceAdapter>, Option<DatabaseConnection>) =
            match config.database.backend {
                StorageBackend::Memory => {
                    warn!("Using in-memory storage; reservations are lost on restart");
                    (Arc::new(InMemoryStorage::new()), None)
                }
                StorageBackend::Sqlite => {
                    let db = init_database(&DatabaseConfig {
                        url: config.database.url.clone(),
                    })
                    .await?;
                    (Arc::new(DatabaseStorage::new(db.clone())), Some(db))
                }
            };

        // ── Services ───────────────────────────────────────────
        let notifier = Arc::new(ChangeNotifier::with_capacity(
            config.notifications.queue_capacity,
        ));
        let service = Arc::new(
            ReservationService::new(storage, config.pricing.clone(), notifier.clone())
                .with_settings(config.reservations.settings()),
        );

        let report = match &opts.catalog {
            Some(catalog) => service.recover(catalog.as_ref()).await?,
            None => service.recover(&config.catalog).await?,
        };
        info!(
            spots = report.spots.len(),
            live_reservations = report.live_reservations.len(),
            "Inventory ready"
        );

        // ── Background tasks ───────────────────────────────────
        let shutdown = ShutdownSignal::new();
        let lifecycle_task = LifecycleMonitor::new(service.clone())
            .with_config(config.reservations.lifecycle())
            .start(shutdown.clone());

        // ── REST API ───────────────────────────────────────────
        let router = create_api_router(
            AppState::new(service.clone(), shutdown.clone()),
            prometheus,
        );

        let listener = tokio::net::TcpListener::bind(config.server.address()).await?;
        let local_addr = listener.local_addr()?;
        info!("REST API listening on http://{}", local_addr);
        info!("Swagger UI available at http://{}/docs/", local_addr);

        let api_shutdown = shutdown.clone();
        let api_server = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            api_shutdown.wait().await;
            notifier.close_all();
            info!("REST API server received shutdown signal");
        });

        let api_task = tokio::spawn(async move {
            if let Err(e) = api_server.await {
                error!("REST API server error: {}", e);
            }
        });

        Ok(Self {
            service,
            config,
            local_addr,
            db,
            shutdown,
            api_task,
            lifecycle_task,
        })
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Trigger shutdown on SIGTERM / SIGINT.
    pub fn install_signal_handler(&self) {
        tokio::spawn(listen_for_shutdown_signals(self.shutdown.clone()));
    }

    /// Non-blocking; call [`wait`](Self::wait) to join.
    pub fn trigger_shutdown(&self) {
        self.shutdown.trigger();
    }

    /// Wait for the server to stop after shutdown has been triggered.
    /// In-flight requests get `server.shutdown_timeout` seconds.
    pub async fn wait(self) {
        let grace = Duration::from_secs(self.config.server.shutdown_timeout);

        match tokio::time::timeout(grace, self.api_task).await {
            Ok(Ok(())) => info!("REST API server stopped"),
            Ok(Err(e)) => error!("REST API server task panicked: {}", e),
            Err(_) => warn!(
                timeout_secs = grace.as_secs(),
                "REST API did not drain in time"
            ),
        }
        if let Err(e) = self.lifecycle_task.await {
            error!("Lifecycle monitor task panicked: {}", e);
        }

        if let Some(db) = self.db {
            if let Err(e) = db.close().await {
                warn!("Error closing database connection: {}", e);
            } else {
                info!("Database connection closed");
            }
        }

        info!("ParkHub shutdown complete");
    }

    pub async fn shutdown(self) {
        info!("Shutting down ParkHub...");
        self.trigger_shutdown();
        self.wait().await;
    }

    pub fn is_running(&self) -> bool {
        !self.api_task.is_finished()
    }
}

/// Set up the global subscriber. `RUST_LOG` wins over `logging.level`.
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    let result = if config.logging.is_json() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
    };
    if let Err(e) = result {
        eprintln!("tracing already initialised: {}", e);
    }
}
