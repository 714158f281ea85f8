//! Canonical shapes held by the console.
//!
//! Alerts and predictions are decoded directly from the backend (strict
//! serde types). Telemetry shapes (live orders, trends, daily stats) are
//! built by [`crate::normalize`] from loosely-typed JSON and never fail.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

pub type AlertId = i64;

// ===== Session =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Operator,
    Viewer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Admin => "admin",
            Role::Operator => "operator",
            Role::Viewer => "viewer",
        };
        f.write_str(s)
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "operator" => Ok(Role::Operator),
            "viewer" => Ok(Role::Viewer),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Authenticated identity. Persisted as `{token, role, email}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default, rename = "email")]
    pub identity: Option<String>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }
}

// ===== Alerts =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Open,
    Acknowledged,
    Resolved,
}

impl AlertStatus {
    /// Transitions the backend accepts. `Resolved` is terminal.
    pub fn can_transition_to(self, next: AlertStatus) -> bool {
        matches!(
            (self, next),
            (AlertStatus::Open, AlertStatus::Acknowledged)
                | (AlertStatus::Open, AlertStatus::Resolved)
                | (AlertStatus::Acknowledged, AlertStatus::Resolved)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == AlertStatus::Resolved
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AlertStatus::Open => "open",
            AlertStatus::Acknowledged => "acknowledged",
            AlertStatus::Resolved => "resolved",
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub order_id: String,
    pub miss_sla_proba: f64,
    #[serde(default)]
    pub threshold: f64,
    pub triggered_at: String,
    pub status: AlertStatus,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub acknowledged_at: Option<String>,
    #[serde(default)]
    pub resolved_at: Option<String>,
    #[serde(default)]
    pub resolution_notes: Option<String>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub actual_sla_missed: Option<u8>,
}

impl Alert {
    /// `resolved_at` is set exactly when the alert is resolved.
    pub fn is_consistent(&self) -> bool {
        self.resolved_at.is_some() == (self.status == AlertStatus::Resolved)
    }

    /// Severity shown to operators; unknown or absent reads as medium.
    pub fn severity_label(&self) -> &'static str {
        match self.severity {
            Some(Severity::High) => "high",
            Some(Severity::Low) => "low",
            _ => "medium",
        }
    }

    pub fn triggered_at_utc(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.triggered_at)
    }

    pub fn sla_verdict(&self) -> Option<&'static str> {
        match self.actual_sla_missed {
            Some(1) => Some("SLA Missed"),
            Some(_) => Some("SLA Met"),
            None => None,
        }
    }
}

/// Accepts `0`, `1`, `true`, `false` or `null`.
fn lenient_flag<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Bool(b)) => Some(u8::from(b)),
        Some(serde_json::Value::Number(n)) => n.as_u64().map(|v| u8::from(v != 0)),
        _ => None,
    })
}

/// Parses RFC 3339 or SQLite `YYYY-MM-DD HH:MM:SS` (taken as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

// ===== Alert actions =====

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionType {
    Reroute,
    Escalate,
    CarrierRecommend,
    DelayBroadcast,
    /// Action recorded by a newer backend or an automation we don't know.
    Other(String),
}

impl ActionType {
    pub const KNOWN: [ActionType; 4] = [
        ActionType::Reroute,
        ActionType::Escalate,
        ActionType::CarrierRecommend,
        ActionType::DelayBroadcast,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            ActionType::Reroute => "REROUTE",
            ActionType::Escalate => "ESCALATE",
            ActionType::CarrierRecommend => "CARRIER_RECOMMEND",
            ActionType::DelayBroadcast => "DELAY_BROADCAST",
            ActionType::Other(raw) => raw,
        }
    }
}

impl From<String> for ActionType {
    fn from(raw: String) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "REROUTE" => ActionType::Reroute,
            "ESCALATE" => ActionType::Escalate,
            "CARRIER_RECOMMEND" => ActionType::CarrierRecommend,
            "DELAY_BROADCAST" => ActionType::DelayBroadcast,
            _ => ActionType::Other(raw),
        }
    }
}

impl From<ActionType> for String {
    fn from(action: ActionType) -> Self {
        action.as_str().to_string()
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of an alert's append-only audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertAction {
    pub alert_id: AlertId,
    pub action_type: ActionType,
    pub created_at: String,
    pub payload: Option<serde_json::Value>,
}

// ===== Live feed =====

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveOrder {
    pub order_id: String,
    pub risk_score: f64,
    pub will_miss_sla: bool,
    pub carrier: String,
    pub timestamp: String,
    pub destination: String,
    pub distance: Option<f64>,
    pub items: Option<f64>,
    pub hub_load: Option<f64>,
    pub traffic: Option<f64>,
    pub weather: Option<String>,
    pub priority: Option<String>,
}

impl LiveOrder {
    pub fn risk_band(&self) -> RiskBand {
        RiskBand::from_score(self.risk_score)
    }
}

/// Badge shown next to a risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskBand {
    Low,
    Warning,
    Critical,
}

impl RiskBand {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            RiskBand::Critical
        } else if score >= 0.5 {
            RiskBand::Warning
        } else {
            RiskBand::Low
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RiskBand::Low => "Low Risk",
            RiskBand::Warning => "Warning",
            RiskBand::Critical => "Critical",
        }
    }
}

// ===== Stats & trends =====

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyPoint {
    pub time: String,
    pub risk: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskBucket {
    pub name: String,
    pub value: f64,
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CarrierPerformance {
    pub name: String,
    pub on_time: f64,
    pub delayed: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Trends {
    pub hourly: Vec<HourlyPoint>,
    pub risk_distribution: Vec<RiskBucket>,
    pub carrier_performance: Vec<CarrierPerformance>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DailyStats {
    pub total_predictions: f64,
    pub high_risk: f64,
    pub medium_risk: f64,
    pub low_risk: f64,
    /// Either a 0-1 fraction or an already-scaled percentage depending on
    /// the backend version. See [`DailyStats::accuracy_percent`].
    pub accuracy: f64,
    pub risk_percent: Option<f64>,
    pub date: Option<String>,
}

impl DailyStats {
    /// Values <= 1 are fractions and get scaled; larger values are
    /// already percentages.
    pub fn accuracy_percent(&self) -> f64 {
        if self.accuracy <= 1.0 {
            self.accuracy * 100.0
        } else {
            self.accuracy
        }
    }

    pub fn accuracy_display(&self) -> String {
        format!("{:.1}%", self.accuracy_percent())
    }
}

// ===== Settings & predictions =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertSettings {
    pub threshold: f64,
    pub enabled: bool,
    pub emails: Vec<String>,
}

/// Operator-entered order fields. Anything left empty gets the defaults
/// the prediction form has always used.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderDraft {
    pub order_id: String,
    pub distance_km: Option<f64>,
    pub items_count: Option<u32>,
    pub hub_load: Option<f64>,
    pub traffic_index: Option<f64>,
    pub weather_code: Option<String>,
    pub priority: Option<String>,
    pub carrier: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictRequest {
    pub order_id: String,
    pub created_at: DateTime<Utc>,
    pub promised_at: DateTime<Utc>,
    pub distance_km: f64,
    pub items_count: u32,
    pub hub_load: f64,
    pub traffic_index: f64,
    pub weather_code: String,
    pub priority: String,
    pub carrier: String,
}

impl PredictRequest {
    pub fn from_draft(draft: OrderDraft, now: DateTime<Utc>) -> Self {
        Self {
            order_id: draft.order_id,
            created_at: now,
            promised_at: now + chrono::Duration::hours(1),
            distance_km: draft.distance_km.unwrap_or(5.0),
            items_count: draft.items_count.unwrap_or(1),
            hub_load: draft.hub_load.unwrap_or(0.5),
            traffic_index: draft.traffic_index.unwrap_or(0.5),
            weather_code: draft.weather_code.unwrap_or_else(|| "CLEAR".to_string()),
            priority: draft.priority.unwrap_or_else(|| "NORMAL".to_string()),
            carrier: draft.carrier.unwrap_or_else(|| "BIKE".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Prediction {
    pub order_id: String,
    pub miss_sla_proba: f64,
    pub will_miss_sla: bool,
}
