//! Alert lifecycle controller
//!
//! Keeps the console's view of the backend-owned alert state machine:
//! - `list` replaces the whole snapshot (no incremental merge)
//! - `acknowledge` / `resolve` request a transition, never apply one locally
//! - `record_action` / `list_actions` manage the per-alert audit trail
//!
//! State machine: open -> acknowledged -> resolved, or open -> resolved.
//! Resolved is terminal.

use crate::error::{ConsoleError, Result};
use crate::gateway::{Gateway, RequestOptions};
use crate::models::{ActionType, Alert, AlertAction, AlertId, AlertStatus};
use crate::normalize;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Complete copy of the last successful `/alerts` fetch.
#[derive(Debug, Clone, Default)]
pub struct AlertSnapshot {
    pub alerts: Vec<Alert>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl AlertSnapshot {
    pub fn get(&self, id: AlertId) -> Option<&Alert> {
        self.alerts.iter().find(|a| a.id == id)
    }

    pub fn status_of(&self, id: AlertId) -> Option<AlertStatus> {
        self.get(id).map(|a| a.status)
    }

    pub fn count_by_status(&self, status: AlertStatus) -> usize {
        self.alerts.iter().filter(|a| a.status == status).count()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }
}

#[derive(Debug, Serialize)]
struct ResolveBody<'a> {
    actual_sla_missed: bool,
    resolution_notes: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ActionBody<'a> {
    action_type: &'a str,
    payload: Option<&'a serde_json::Value>,
}

/// Snapshot plus the number of the fetch that produced it.
struct Committed {
    seq: u64,
    snapshot: Arc<AlertSnapshot>,
}

pub struct AlertController {
    gateway: Arc<Gateway>,
    fetch_seq: AtomicU64,
    committed: RwLock<Committed>,
    actions: Mutex<HashMap<AlertId, Arc<Vec<AlertAction>>>>,
}

impl AlertController {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self {
            gateway,
            fetch_seq: AtomicU64::new(0),
            committed: RwLock::new(Committed { seq: 0, snapshot: Arc::new(AlertSnapshot::default()) }),
            actions: Mutex::new(HashMap::new()),
        }
    }

    /// Current snapshot. Readers always get a complete list, old or new.
    pub fn snapshot(&self) -> Arc<AlertSnapshot> {
        self.committed.read().snapshot.clone()
    }

    /// Fetch the `limit` most recent alerts and replace the snapshot.
    ///
    /// A fetch that completes after a later-started one has already been
    /// committed is discarded, and the newer snapshot is returned instead.
    pub async fn list(&self, limit: u32) -> Result<Arc<AlertSnapshot>> {
        self.fetch(limit, None).await
    }

    /// Same as [`list`](Self::list) with a server-side status filter.
    pub async fn list_with_status(&self, limit: u32, status: AlertStatus) -> Result<Arc<AlertSnapshot>> {
        self.fetch(limit, Some(status)).await
    }

    async fn fetch(&self, limit: u32, status: Option<AlertStatus>) -> Result<Arc<AlertSnapshot>> {
        let seq = self.fetch_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let mut query = vec![("limit", limit.to_string())];
        if let Some(status) = status {
            query.push(("status", status.to_string()));
        }

        let alerts: Vec<Alert> = self
            .gateway
            .get_json("/alerts", &query, &RequestOptions::authenticated())
            .await?;

        for alert in alerts.iter().filter(|a| !a.is_consistent()) {
            warn!(
                "Alert {} is {} but resolved_at is {:?}",
                alert.id, alert.status, alert.resolved_at
            );
        }

        let next = Arc::new(AlertSnapshot { alerts, fetched_at: Some(Utc::now()) });
        let mut committed = self.committed.write();
        if seq < committed.seq {
            debug!("Discarding alert fetch #{} (#{} already committed)", seq, committed.seq);
            return Ok(committed.snapshot.clone());
        }
        *committed = Committed { seq, snapshot: next.clone() };
        debug!("Alert snapshot replaced ({} alerts)", next.alerts.len());
        Ok(next)
    }

    /// Reject locally when the snapshot already shows a state that cannot
    /// move to `requested`. Unknown alerts go to the backend, which decides.
    fn guard(&self, id: AlertId, requested: AlertStatus) -> Result<()> {
        match self.snapshot().status_of(id) {
            Some(current) if !current.can_transition_to(requested) => Err(ConsoleError::TransitionRejected {
                alert_id: id,
                operation: Self::operation(requested),
                current: Some(current),
            }),
            _ => Ok(()),
        }
    }

    fn operation(requested: AlertStatus) -> String {
        format!("transition to {requested}")
    }

    /// The backend answers 404 ("not found or not open") or 409 when the
    /// row did not match the expected state.
    fn classify(id: AlertId, requested: AlertStatus, err: ConsoleError) -> ConsoleError {
        match err.status() {
            Some(404) | Some(409) => ConsoleError::TransitionRejected {
                alert_id: id,
                operation: Self::operation(requested),
                current: None,
            },
            _ => err,
        }
    }

    /// Request open -> acknowledged. Re-`list` to observe the result.
    pub async fn acknowledge(&self, id: AlertId) -> Result<()> {
        self.guard(id, AlertStatus::Acknowledged)?;

        let path = format!("/alerts/{id}/ack");
        self.gateway
            .post_command::<()>(&path, None, &RequestOptions::authenticated())
            .await
            .map_err(|e| Self::classify(id, AlertStatus::Acknowledged, e))?;

        info!("Alert {} acknowledged", id);
        Ok(())
    }

    /// Request open|acknowledged -> resolved with the observed outcome.
    pub async fn resolve(&self, id: AlertId, actual_sla_missed: bool, notes: Option<&str>) -> Result<()> {
        self.guard(id, AlertStatus::Resolved)?;

        let path = format!("/alerts/{id}/resolve");
        let body = ResolveBody {
            actual_sla_missed,
            resolution_notes: notes.map(str::trim).filter(|n| !n.is_empty()),
        };
        self.gateway
            .post_command(&path, Some(&body), &RequestOptions::authenticated())
            .await
            .map_err(|e| Self::classify(id, AlertStatus::Resolved, e))?;

        info!("Alert {} resolved (sla missed: {})", id, actual_sla_missed);
        Ok(())
    }

    /// Append a mitigation to the alert's audit trail. Status is unchanged.
    /// Refresh with [`list_actions`](Self::list_actions) if it is on screen.
    pub async fn record_action(
        &self,
        id: AlertId,
        action_type: ActionType,
        payload: Option<serde_json::Value>,
    ) -> Result<()> {
        if let Some(current) = self.snapshot().status_of(id) {
            if current.is_terminal() {
                return Err(ConsoleError::TransitionRejected {
                    alert_id: id,
                    operation: format!("action {action_type}"),
                    current: Some(current),
                });
            }
        }

        let path = format!("/alerts/{id}/actions");
        let body = ActionBody { action_type: action_type.as_str(), payload: payload.as_ref() };
        self.gateway
            .post_command(&path, Some(&body), &RequestOptions::authenticated())
            .await
            .map_err(|e| match e.status() {
                // 404 stays a plain failure: the alert does not exist
                Some(409) => ConsoleError::TransitionRejected {
                    alert_id: id,
                    operation: format!("action {action_type}"),
                    current: None,
                },
                _ => e,
            })?;

        info!("Recorded {} for alert {}", action_type, id);
        Ok(())
    }

    /// Fetch the full audit trail for one alert and cache it.
    pub async fn list_actions(&self, id: AlertId) -> Result<Arc<Vec<AlertAction>>> {
        let path = format!("/alerts/{id}/actions");
        let raw = self
            .gateway
            .get_loose(&path, &[], &RequestOptions::authenticated())
            .await?;

        let actions = Arc::new(normalize::alert_actions(id, &raw));
        self.actions.lock().insert(id, actions.clone());
        Ok(actions)
    }

    /// Last fetched audit trail, if any. Never refreshed implicitly.
    pub fn cached_actions(&self, id: AlertId) -> Option<Arc<Vec<AlertAction>>> {
        self.actions.lock().get(&id).cloned()
    }

    pub fn forget_actions(&self, id: AlertId) {
        self.actions.lock().remove(&id);
    }
}
