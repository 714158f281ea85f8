//! Console context: every component wired once and shared by reference.
//!
//! Owns the three refresh loops of the dashboard:
//! - `alerts` (default every 10s)
//! - `live_feed` (default every 3s, can be paused)
//! - `connectivity` (default every 30s, `/health` probe)

use crate::alerts::AlertController;
use crate::config::ConsoleConfig;
use crate::error::{ConsoleError, Result};
use crate::feeds::{ConnectivityMonitor, LiveFeed};
use crate::gateway::Gateway;
use crate::scheduler::Scheduler;
use crate::session::{KeyValueStore, SessionStore};
use std::sync::Arc;
use tracing::info;

pub const ALERTS_LOOP: &str = "alerts";
pub const LIVE_FEED_LOOP: &str = "live_feed";
pub const CONNECTIVITY_LOOP: &str = "connectivity";

pub struct Console {
    pub config: ConsoleConfig,
    pub session: Arc<SessionStore>,
    pub gateway: Arc<Gateway>,
    pub alerts: Arc<AlertController>,
    pub live: Arc<LiveFeed>,
    pub connectivity: Arc<ConnectivityMonitor>,
    pub scheduler: Scheduler,
}

impl Console {
    /// Open the configured session store and build every component.
    pub fn from_config(config: ConsoleConfig) -> Result<Self> {
        let storage = config.session.open_store()?;
        Self::with_storage(config, storage)
    }

    pub fn with_storage(config: ConsoleConfig, storage: Box<dyn KeyValueStore>) -> Result<Self> {
        let session = Arc::new(SessionStore::load(storage));
        let gateway = Arc::new(Gateway::new(&config.api, session.clone())?);

        Ok(Self {
            alerts: Arc::new(AlertController::new(gateway.clone())),
            live: Arc::new(LiveFeed::new(gateway.clone())),
            connectivity: Arc::new(ConnectivityMonitor::new(gateway.clone())),
            scheduler: Scheduler::new(),
            session,
            gateway,
            config,
        })
    }

    /// Start the alert, live feed and connectivity loops.
    pub fn start_polling(&self) {
        let polling = &self.config.polling;

        let alerts = self.alerts.clone();
        let limit = polling.alerts_limit;
        self.scheduler.start(ALERTS_LOOP, polling.alerts_period(), move || {
            let alerts = alerts.clone();
            async move { alerts.list(limit).await.map(|_| ()) }
        });

        let live = self.live.clone();
        let limit = polling.live_feed_limit;
        self.scheduler.start(LIVE_FEED_LOOP, polling.live_feed_period(), move || {
            let live = live.clone();
            async move { live.refresh(limit).await.map(|_| ()) }
        });

        let connectivity = self.connectivity.clone();
        self.scheduler.start(CONNECTIVITY_LOOP, polling.connectivity_period(), move || {
            let connectivity = connectivity.clone();
            async move {
                connectivity.check().await;
                Ok::<(), ConsoleError>(())
            }
        });

        info!("🔄 Polling {} against {}", self.scheduler.names().join(", "), self.gateway.base_url());
    }

    pub fn pause_live(&self) -> bool {
        let paused = self.scheduler.pause(LIVE_FEED_LOOP);
        if paused {
            self.live.set_paused(true);
        }
        paused
    }

    pub fn resume_live(&self) -> bool {
        let resumed = self.scheduler.resume(LIVE_FEED_LOOP);
        if resumed {
            self.live.set_paused(false);
        }
        resumed
    }

    /// Cancel all loops and wait for them. Nothing is updated afterwards.
    pub async fn teardown(&self) {
        self.scheduler.shutdown().await;
        info!("🛑 Polling stopped");
    }
}
