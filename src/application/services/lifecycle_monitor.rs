//! Lifecycle Monitor Service
//!
//! Periodically advances reservations along the clock: upcoming → active
//! when the window starts, active → completed when it ends (releasing the
//! spot).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::reservation::ReservationService;
use crate::shared::shutdown::ShutdownSignal;

/// Configuration for lifecycle sweeping
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// How often to sweep live reservations (in seconds)
    pub check_interval_secs: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 30,
        }
    }
}

/// Runs in the background and drives time-based reservation transitions.
pub struct LifecycleMonitor {
    service: Arc<ReservationService>,
    config: LifecycleConfig,
    running: Arc<RwLock<bool>>,
}

impl LifecycleMonitor {
    pub fn new(service: Arc<ReservationService>) -> Self {
        Self {
            service,
            config: LifecycleConfig::default(),
            running: Arc::new(RwLock::new(false)),
        }
    }

    pub fn with_config(mut self, config: LifecycleConfig) -> Self {
        self.config = config;
        self
    }

    /// Start the background task
    pub fn start(&self, shutdown: ShutdownSignal) -> JoinHandle<()> {
        let service = self.service.clone();
        let config = self.config.clone();
        let running = self.running.clone();

        tokio::spawn(async move {
            *running.write().await = true;
            info!(
                check_interval = config.check_interval_secs,
                "Lifecycle monitor started"
            );

            let mut interval =
                tokio::time::interval(Duration::from_secs(config.check_interval_secs.max(1)));

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = service.advance_lifecycle().await {
                            warn!(error = %e, "Lifecycle sweep error");
                        }
                    }
                    _ = shutdown.wait() => {
                        info!("Lifecycle monitor shutting down");
                        break;
                    }
                }
            }

            *running.write().await = false;
            info!("Lifecycle monitor stopped");
        })
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}
