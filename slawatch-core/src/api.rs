//! One-shot backend calls that are not polled: login, prediction,
//! dashboard stats, alert settings.

use crate::error::{ConsoleError, Result};
use crate::gateway::{Gateway, RequestOptions};
use crate::models::{AlertSettings, DailyStats, OrderDraft, PredictRequest, Prediction, Role, Session, Trends};
use crate::normalize;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
    role: String,
    #[serde(default)]
    email: Option<String>,
}

/// Exchange credentials for a token and store the session.
pub async fn login(gateway: &Gateway, email: &str, password: &str) -> Result<Session> {
    let endpoint = "/auth/login";
    let response: LoginResponse = gateway
        .post_json(endpoint, &LoginBody { email, password }, &RequestOptions::public())
        .await?;

    let role: Role = response.role.parse().map_err(|reason| ConsoleError::MalformedResponse {
        endpoint: endpoint.to_string(),
        reason,
    })?;
    if response.access_token.trim().is_empty() {
        return Err(ConsoleError::MalformedResponse {
            endpoint: endpoint.to_string(),
            reason: "empty access_token".to_string(),
        });
    }

    let identity = response.email.unwrap_or_else(|| email.to_string());
    gateway.session().login(&response.access_token, role, &identity)?;
    Ok(gateway.session().snapshot())
}

pub fn logout(gateway: &Gateway) -> Result<()> {
    gateway.session().logout()?;
    Ok(())
}

/// Score one order. Empty draft fields take the form defaults.
pub async fn predict(gateway: &Gateway, draft: OrderDraft) -> Result<Prediction> {
    let request = PredictRequest::from_draft(draft, Utc::now());
    let prediction: Prediction = gateway
        .post_json("/predict", &request, &RequestOptions::authenticated())
        .await?;
    info!(
        "Prediction for {}: {:.2} (miss: {})",
        prediction.order_id, prediction.miss_sla_proba, prediction.will_miss_sla
    );
    Ok(prediction)
}

pub async fn daily_stats(gateway: &Gateway) -> Result<DailyStats> {
    let raw = gateway.get_loose("/stats/today", &[], &RequestOptions::authenticated()).await?;
    Ok(normalize::daily_stats(&raw))
}

pub async fn trends(gateway: &Gateway) -> Result<Trends> {
    let raw = gateway.get_loose("/stats/trends", &[], &RequestOptions::authenticated()).await?;
    Ok(normalize::trends(&raw))
}

/// Operational counters, shown as-is.
pub async fn ops_stats(gateway: &Gateway) -> Result<serde_json::Value> {
    gateway.get_loose("/stats/ops", &[], &RequestOptions::authenticated()).await
}

pub async fn get_settings(gateway: &Gateway) -> Result<AlertSettings> {
    gateway.get_json("/settings", &[], &RequestOptions::authenticated()).await
}

/// Admin only on the backend; other roles get `RequestFailed(403)`.
pub async fn update_settings(gateway: &Gateway, settings: &AlertSettings) -> Result<AlertSettings> {
    if !(0.0..=1.0).contains(&settings.threshold) {
        warn!("Threshold {} outside 0-1, backend will decide", settings.threshold);
    }
    let saved: AlertSettings = gateway
        .post_json("/settings", settings, &RequestOptions::authenticated())
        .await?;
    info!("Alert settings updated (threshold {:.2}, enabled {})", saved.threshold, saved.enabled);
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_response_without_email() {
        let response: LoginResponse =
            serde_json::from_str(r#"{"access_token":"t","role":"viewer"}"#).unwrap();
        assert!(response.email.is_none());
        assert_eq!(response.role.parse::<Role>().unwrap(), Role::Viewer);
    }

    #[test]
    fn test_login_body_shape() {
        let body = LoginBody { email: "ops@example.com", password: "pw" };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"email": "ops@example.com", "password": "pw"})
        );
    }
}
