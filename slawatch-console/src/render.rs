//! Plain-text views of the snapshots.

use chrono::Utc;
use slawatch_core::models::{Alert, AlertAction, AlertSettings, DailyStats, LiveOrder, Prediction, RiskBand, Trends};
use slawatch_core::AlertSnapshot;
use std::fmt::Write;

fn age(alert: &Alert) -> String {
    match alert.triggered_at_utc() {
        Some(at) => {
            let mins = (Utc::now() - at).num_minutes().max(0);
            if mins < 60 {
                format!("{mins}m ago")
            } else {
                format!("{}h ago", mins / 60)
            }
        }
        None => alert.triggered_at.clone(),
    }
}

pub fn alerts(snapshot: &AlertSnapshot) -> String {
    if snapshot.is_empty() {
        return "No alerts.".to_string();
    }
    let mut out = String::new();
    let _ = writeln!(out, "{:>5}  {:<14} {:>6}  {:<8} {:<13} {}", "ID", "ORDER", "RISK", "SEV", "STATUS", "TRIGGERED");
    for alert in &snapshot.alerts {
        let _ = write!(
            out,
            "{:>5}  {:<14} {:>5.0}%  {:<8} {:<13} {}",
            alert.id,
            alert.order_id,
            alert.miss_sla_proba * 100.0,
            alert.severity_label(),
            alert.status.as_str(),
            age(alert)
        );
        if let Some(verdict) = alert.sla_verdict() {
            let _ = write!(out, "  [{verdict}]");
        }
        out.push('\n');
    }
    out
}

pub fn actions(trail: &[AlertAction]) -> String {
    if trail.is_empty() {
        return "No actions recorded.".to_string();
    }
    trail
        .iter()
        .map(|a| match &a.payload {
            Some(payload) => format!("{}  {:<18} {}", a.created_at, a.action_type, payload),
            None => format!("{}  {}", a.created_at, a.action_type),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn live(orders: &[LiveOrder]) -> String {
    if orders.is_empty() {
        return "No recent predictions.".to_string();
    }
    orders
        .iter()
        .map(|o| {
            format!(
                "{:<14} {:>5.1}%  {:<9} {:<10} {}",
                o.order_id,
                o.risk_score * 100.0,
                o.risk_band().label(),
                o.carrier,
                o.timestamp
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn stats(stats: &DailyStats) -> String {
    format!(
        "{}: {} predictions | high {} | medium {} | low {} | accuracy {}",
        stats.date.as_deref().unwrap_or("today"),
        stats.total_predictions,
        stats.high_risk,
        stats.medium_risk,
        stats.low_risk,
        stats.accuracy_display()
    )
}

pub fn trends(trends: &Trends) -> String {
    let mut out = String::from("Hourly high-risk:\n");
    for point in &trends.hourly {
        let _ = writeln!(out, "  {:<6} {}", point.time, point.risk);
    }
    out.push_str("Risk distribution:\n");
    for bucket in &trends.risk_distribution {
        let _ = writeln!(out, "  {:<10} {}", bucket.name, bucket.value);
    }
    out.push_str("Carriers (on time / delayed %):\n");
    for carrier in &trends.carrier_performance {
        let _ = writeln!(out, "  {:<10} {:.1} / {:.1}", carrier.name, carrier.on_time, carrier.delayed);
    }
    out
}

pub fn prediction(prediction: &Prediction) -> String {
    format!(
        "{}: {:.1}% risk ({}){}",
        prediction.order_id,
        prediction.miss_sla_proba * 100.0,
        RiskBand::from_score(prediction.miss_sla_proba).label(),
        if prediction.will_miss_sla { ", SLA likely missed" } else { "" }
    )
}

pub fn settings(settings: &AlertSettings) -> String {
    let emails = if settings.emails.is_empty() { "none".to_string() } else { settings.emails.join(", ") };
    format!(
        "Alerts {} | threshold {:.0}% | recipients: {}",
        if settings.enabled { "enabled" } else { "disabled" },
        settings.threshold * 100.0,
        emails
    )
}
