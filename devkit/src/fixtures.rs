/*!
Payload builders for the loosely-typed telemetry endpoints

Each builder reproduces one of the shapes the backend has served over
time, so tests can feed the normalizer realistic bodies.
*/

use serde_json::{json, Value};

/// `/logs` row as written by the prediction endpoint.
pub fn log_row(order_id: &str, proba: f64, carrier: &str) -> Value {
    json!({
        "order_id": order_id,
        "miss_sla_proba": proba,
        "will_miss_sla": if proba >= 0.5 { 1 } else { 0 },
        "carrier": carrier,
        "created_at": chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        "distance_km": 6.5,
        "items_count": 2,
        "hub_load": 0.4,
        "traffic_index": 0.7,
        "weather_code": "RAIN",
        "priority": "NORMAL",
    })
}

/// Newer `/stats/trends` shape with camelCase carrier fields.
pub fn trends_camel_case() -> Value {
    json!({
        "hourly": [
            {"time": "09:00", "risk": 3},
            {"time": "10:00", "risk": 5}
        ],
        "risk_distribution": [
            {"name": "High", "value": 4, "color": "#ef4444"},
            {"name": "Low", "value": 12}
        ],
        "carrier_performance": [
            {"name": "Bike", "onTime": 90, "delayed": 10}
        ]
    })
}

/// Older `/stats/trends` shape: `hour`/`high_risk`, `label`/`count`,
/// percentage carrier fields with no delayed column.
pub fn trends_legacy() -> Value {
    json!({
        "hourly": [
            {"hour": "14:00", "high_risk": 7},
            {}
        ],
        "risk_distribution": [
            {"label": "Medium", "count": "6"}
        ],
        "carrier_performance": [
            {"name": "Van", "on_time_pct": 72.5}
        ]
    })
}

pub fn daily_stats(accuracy: f64) -> Value {
    json!({
        "date": "2024-05-01",
        "total": 40,
        "high_risk": 5,
        "medium_risk": 10,
        "low_risk": 25,
        "accuracy": accuracy,
    })
}
