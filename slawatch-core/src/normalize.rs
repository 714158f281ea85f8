//! Schema normalizer
//!
//! Backend deployments disagree on field names (`time` vs `hour` vs
//! `label`, `risk` vs `high_risk`...). Each canonical field below has an
//! ordered list of accepted source names; the first one present wins and a
//! documented default covers the rest.
//!
//! Everything here is pure and total: any JSON in, a canonical value out.

use crate::models::{
    ActionType, AlertAction, AlertId, CarrierPerformance, DailyStats, HourlyPoint, LiveOrder,
    RiskBucket, Trends,
};
use serde_json::{Map, Value};

/// Field-priority tables, one block per output shape.
pub mod table {
    // hourly point
    pub const HOURLY_TIME: &[&str] = &["time", "hour", "label"];
    pub const HOURLY_RISK: &[&str] = &["risk", "high_risk", "value"];
    pub const HOURLY_TIME_DEFAULT: &str = "00:00";

    // risk distribution bucket
    pub const BUCKET_NAME: &[&str] = &["name", "label"];
    pub const BUCKET_VALUE: &[&str] = &["value", "count"];
    pub const BUCKET_COLOR: &[&str] = &["color"];

    // carrier performance
    pub const CARRIER_NAME: &[&str] = &["name"];
    pub const CARRIER_ON_TIME: &[&str] = &["onTime", "on_time", "on_time_pct"];
    pub const CARRIER_DELAYED: &[&str] = &["delayed", "delayed_pct"];

    // daily stats
    pub const STATS_TOTAL: &[&str] = &["total_predictions", "total"];
    pub const STATS_HIGH: &[&str] = &["high_risk"];
    pub const STATS_MEDIUM: &[&str] = &["medium_risk"];
    pub const STATS_LOW: &[&str] = &["low_risk"];
    pub const STATS_ACCURACY: &[&str] = &["accuracy"];
    pub const STATS_RISK_PERCENT: &[&str] = &["risk_percent"];
    pub const STATS_DATE: &[&str] = &["date"];

    // live feed (prediction log rows)
    pub const ORDER_ID: &[&str] = &["order_id"];
    pub const ORDER_RISK: &[&str] = &["miss_sla_proba", "risk_score"];
    pub const ORDER_WILL_MISS: &[&str] = &["will_miss_sla"];
    pub const ORDER_CARRIER: &[&str] = &["carrier"];
    pub const ORDER_TIMESTAMP: &[&str] = &["timestamp", "created_at"];
    pub const ORDER_DESTINATION: &[&str] = &["destination"];
    pub const ORDER_DISTANCE: &[&str] = &["distance", "distance_km"];
    pub const ORDER_ITEMS: &[&str] = &["items", "items_count"];
    pub const ORDER_HUB_LOAD: &[&str] = &["hub_load"];
    pub const ORDER_TRAFFIC: &[&str] = &["traffic", "traffic_index"];
    pub const ORDER_WEATHER: &[&str] = &["weather", "weather_code"];
    pub const ORDER_PRIORITY: &[&str] = &["priority"];

    // alert action audit rows
    pub const ACTION_TYPE: &[&str] = &["action_type"];
    pub const ACTION_CREATED_AT: &[&str] = &["created_at"];
    pub const ACTION_PAYLOAD: &[&str] = &["payload"];

    pub const UNKNOWN: &str = "Unknown";
}

/// First candidate that is present and not `null`.
fn first_present<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().filter_map(|k| obj.get(*k)).find(|v| !v.is_null())
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First candidate that reads as a number.
fn first_number(obj: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().filter_map(|k| obj.get(*k)).find_map(as_number)
}

/// First candidate that reads as text.
fn first_text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().filter_map(|k| obj.get(*k)).find_map(as_text)
}

fn has_any(obj: &Map<String, Value>, tables: &[&[&str]]) -> bool {
    tables.iter().any(|keys| first_present(obj, keys).is_some())
}

fn rows(value: Option<&Value>) -> &[Value] {
    match value {
        Some(Value::Array(items)) => items.as_slice(),
        _ => &[],
    }
}

// ===== Trends =====

/// `None` when the point has to be dropped: not an object, none of the
/// known fields, or a resolved time that is empty.
pub fn hourly_point(raw: &Value) -> Option<HourlyPoint> {
    let obj = raw.as_object()?;
    if !has_any(obj, &[table::HOURLY_TIME, table::HOURLY_RISK]) {
        return None;
    }

    let time = first_text(obj, table::HOURLY_TIME)
        .unwrap_or_else(|| table::HOURLY_TIME_DEFAULT.to_string());
    if time.trim().is_empty() {
        return None;
    }
    let risk = first_number(obj, table::HOURLY_RISK).unwrap_or(0.0);
    Some(HourlyPoint { time, risk })
}

pub fn hourly(raw: Option<&Value>) -> Vec<HourlyPoint> {
    rows(raw).iter().filter_map(hourly_point).collect()
}

pub fn risk_bucket(raw: &Value) -> RiskBucket {
    let empty = Map::new();
    let obj = raw.as_object().unwrap_or(&empty);
    RiskBucket {
        name: first_text(obj, table::BUCKET_NAME).unwrap_or_else(|| table::UNKNOWN.to_string()),
        value: first_number(obj, table::BUCKET_VALUE).unwrap_or(0.0),
        color: first_text(obj, table::BUCKET_COLOR),
    }
}

pub fn risk_distribution(raw: Option<&Value>) -> Vec<RiskBucket> {
    rows(raw).iter().map(risk_bucket).collect()
}

pub fn carrier(raw: &Value) -> CarrierPerformance {
    let empty = Map::new();
    let obj = raw.as_object().unwrap_or(&empty);
    let on_time = first_number(obj, table::CARRIER_ON_TIME);
    let delayed = first_number(obj, table::CARRIER_DELAYED)
        .or_else(|| on_time.map(|pct| (100.0 - pct).max(0.0)))
        .unwrap_or(0.0);

    CarrierPerformance {
        name: first_text(obj, table::CARRIER_NAME).unwrap_or_else(|| table::UNKNOWN.to_string()),
        on_time: on_time.unwrap_or(0.0),
        delayed,
    }
}

pub fn carrier_performance(raw: Option<&Value>) -> Vec<CarrierPerformance> {
    rows(raw).iter().map(carrier).collect()
}

/// `/stats/trends` body.
pub fn trends(raw: &Value) -> Trends {
    Trends {
        hourly: hourly(raw.get("hourly")),
        risk_distribution: risk_distribution(raw.get("risk_distribution")),
        carrier_performance: carrier_performance(raw.get("carrier_performance")),
    }
}

// ===== Daily stats =====

/// `/stats/today` body. Accuracy is passed through untouched; see
/// [`DailyStats::accuracy_percent`] for how it is read.
pub fn daily_stats(raw: &Value) -> DailyStats {
    let empty = Map::new();
    let obj = raw.as_object().unwrap_or(&empty);
    DailyStats {
        total_predictions: first_number(obj, table::STATS_TOTAL).unwrap_or(0.0),
        high_risk: first_number(obj, table::STATS_HIGH).unwrap_or(0.0),
        medium_risk: first_number(obj, table::STATS_MEDIUM).unwrap_or(0.0),
        low_risk: first_number(obj, table::STATS_LOW).unwrap_or(0.0),
        accuracy: first_number(obj, table::STATS_ACCURACY).unwrap_or(0.0),
        risk_percent: first_number(obj, table::STATS_RISK_PERCENT),
        date: first_text(obj, table::STATS_DATE),
    }
}

// ===== Live feed =====

fn as_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        _ => None,
    }
}

/// One `/logs` row. Rows without an order id are dropped.
pub fn live_order(raw: &Value) -> Option<LiveOrder> {
    let obj = raw.as_object()?;
    let order_id = first_text(obj, table::ORDER_ID).filter(|id| !id.is_empty())?;

    Some(LiveOrder {
        order_id,
        risk_score: first_number(obj, table::ORDER_RISK).unwrap_or(0.0),
        will_miss_sla: first_present(obj, table::ORDER_WILL_MISS)
            .and_then(as_flag)
            .unwrap_or(false),
        carrier: first_text(obj, table::ORDER_CARRIER)
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| table::UNKNOWN.to_string()),
        timestamp: first_text(obj, table::ORDER_TIMESTAMP).unwrap_or_default(),
        destination: first_text(obj, table::ORDER_DESTINATION)
            .unwrap_or_else(|| table::UNKNOWN.to_string()),
        distance: first_number(obj, table::ORDER_DISTANCE),
        items: first_number(obj, table::ORDER_ITEMS),
        hub_load: first_number(obj, table::ORDER_HUB_LOAD),
        traffic: first_number(obj, table::ORDER_TRAFFIC),
        weather: first_text(obj, table::ORDER_WEATHER),
        priority: first_text(obj, table::ORDER_PRIORITY),
    })
}

pub fn live_orders(raw: &Value) -> Vec<LiveOrder> {
    rows(Some(raw)).iter().filter_map(live_order).collect()
}

// ===== Alert actions =====

/// Payloads are stored JSON-encoded; decode them when possible and keep
/// the raw string otherwise.
fn action_payload(value: Option<&Value>) -> Option<Value> {
    match value? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.clone()))),
        other => Some(other.clone()),
    }
}

/// `/alerts/{id}/actions` rows. Rows without an action type are dropped.
pub fn alert_actions(alert_id: AlertId, raw: &Value) -> Vec<AlertAction> {
    rows(Some(raw))
        .iter()
        .filter_map(|row| {
            let obj = row.as_object()?;
            let action_type = first_text(obj, table::ACTION_TYPE).filter(|t| !t.is_empty())?;
            Some(AlertAction {
                alert_id,
                action_type: ActionType::from(action_type),
                created_at: first_text(obj, table::ACTION_CREATED_AT).unwrap_or_default(),
                payload: action_payload(first_present(obj, table::ACTION_PAYLOAD)),
            })
        })
        .collect()
}
