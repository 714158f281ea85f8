//! Read-only feeds polled alongside the alert list: live predictions
//! and backend connectivity.

use crate::error::Result;
use crate::gateway::{Gateway, RequestOptions};
use crate::models::LiveOrder;
use crate::normalize;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Recent predictions from `/logs`, newest first as the backend returns them.
pub struct LiveFeed {
    gateway: Arc<Gateway>,
    orders: RwLock<Arc<Vec<LiveOrder>>>,
    last_refresh: RwLock<Option<DateTime<Utc>>>,
    paused: AtomicBool,
}

impl LiveFeed {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self {
            gateway,
            orders: RwLock::new(Arc::new(Vec::new())),
            last_refresh: RwLock::new(None),
            paused: AtomicBool::new(false),
        }
    }

    pub fn orders(&self) -> Arc<Vec<LiveOrder>> {
        self.orders.read().clone()
    }

    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        *self.last_refresh.read()
    }

    /// Fetch and normalize the latest rows, replacing the snapshot.
    pub async fn refresh(&self, limit: u32) -> Result<Arc<Vec<LiveOrder>>> {
        let raw = self
            .gateway
            .get_loose("/logs", &[("limit", limit.to_string())], &RequestOptions::authenticated())
            .await?;

        let next = Arc::new(normalize::live_orders(&raw));
        *self.orders.write() = next.clone();
        *self.last_refresh.write() = Some(Utc::now());
        debug!("Live feed refreshed ({} orders)", next.len());
        Ok(next)
    }

    /// Mirrors the scheduler loop state so the view can show the toggle.
    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    /// Orders flagged as likely to miss their SLA.
    pub fn at_risk(&self) -> Vec<LiveOrder> {
        self.orders().iter().filter(|o| o.will_miss_sla).cloned().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Unknown,
    Online,
    Offline,
}

impl Connectivity {
    pub fn label(self) -> &'static str {
        match self {
            Connectivity::Unknown => "checking",
            Connectivity::Online => "online",
            Connectivity::Offline => "backend offline",
        }
    }
}

/// Tracks `/health` reachability. A failed probe only flips the flag;
/// it never touches the session or the other snapshots.
pub struct ConnectivityMonitor {
    gateway: Arc<Gateway>,
    status: RwLock<Connectivity>,
}

impl ConnectivityMonitor {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway, status: RwLock::new(Connectivity::Unknown) }
    }

    pub fn status(&self) -> Connectivity {
        *self.status.read()
    }

    pub async fn check(&self) -> Connectivity {
        let next = match self.gateway.probe("/health", &RequestOptions::public()).await {
            Ok(()) => Connectivity::Online,
            Err(e) => {
                debug!("Health probe failed: {}", e);
                Connectivity::Offline
            }
        };

        let previous = std::mem::replace(&mut *self.status.write(), next);
        if previous != next {
            match next {
                Connectivity::Online => info!("Backend reachable at {}", self.gateway.base_url()),
                _ => warn!("Backend offline at {}", self.gateway.base_url()),
            }
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use crate::session::{MemoryStore, SessionStore};

    fn gateway(url: &str) -> Arc<Gateway> {
        let session = Arc::new(SessionStore::load(Box::new(MemoryStore::new())));
        let config = ApiConfig { base_url: url.to_string(), ..ApiConfig::default() };
        Arc::new(Gateway::new(&config, session).unwrap())
    }

    #[test]
    fn test_connectivity_starts_unknown() {
        let monitor = ConnectivityMonitor::new(gateway("http://127.0.0.1:9"));
        assert_eq!(monitor.status(), Connectivity::Unknown);
        assert_eq!(Connectivity::Offline.label(), "backend offline");
    }

    #[test]
    fn test_live_feed_pause_flag() {
        let feed = LiveFeed::new(gateway("http://127.0.0.1:9"));
        assert!(!feed.is_paused());
        feed.set_paused(true);
        assert!(feed.is_paused());
        assert!(feed.orders().is_empty());
        assert!(feed.last_refresh().is_none());
    }
}
