/*!
Mock SLA backend for development without the prediction service

Serves the same routes as production on 127.0.0.1 with a random port:
auth, health, predictions log, stats, settings, alerts and alert actions.
Alert transitions follow the production guards (`ack` only from open,
`resolve` only from open/acknowledged, 404 otherwise). Recording an action
on a resolved alert answers 409.

Every request is recorded (method, path, query, headers) for assertions.
*/

use axum::{
    extract::{Path, Query, Request, State},
    http::{header::AUTHORIZATION, header::CONTENT_TYPE, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{NaiveDateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

const SQLITE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

type Shared = Arc<Mutex<BackendState>>;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    /// Every header, names lowercased.
    pub headers: HashMap<String, String>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize)]
struct MockAlert {
    id: i64,
    order_id: String,
    miss_sla_proba: f64,
    threshold: f64,
    triggered_at: String,
    status: String,
    severity: String,
    acknowledged_at: Option<String>,
    resolved_at: Option<String>,
    resolution_notes: Option<String>,
    actual_sla_missed: Option<u8>,
}

#[derive(Debug, Clone)]
struct StoredAction {
    alert_id: i64,
    action_type: String,
    payload: Option<String>,
    created_at: String,
}

#[derive(Clone)]
struct CallerRole(String);

struct BackendState {
    healthy: bool,
    users: HashMap<String, (String, String)>,
    tokens: HashMap<String, String>,
    alerts: Vec<MockAlert>,
    actions: Vec<StoredAction>,
    logs: Vec<Value>,
    settings: Value,
    raw_bodies: HashMap<String, String>,
    failures: HashMap<String, VecDeque<u16>>,
    holds: HashMap<String, VecDeque<Duration>>,
    requests: Vec<RecordedRequest>,
    next_alert_id: i64,
    next_token: u64,
}

impl BackendState {
    fn new() -> Self {
        Self {
            healthy: true,
            users: HashMap::new(),
            tokens: HashMap::new(),
            alerts: Vec::new(),
            actions: Vec::new(),
            logs: Vec::new(),
            settings: json!({"threshold": 0.8, "enabled": false, "emails": []}),
            raw_bodies: HashMap::new(),
            failures: HashMap::new(),
            holds: HashMap::new(),
            requests: Vec::new(),
            next_alert_id: 1,
            next_token: 1,
        }
    }

    fn issue_token(&mut self, role: &str) -> String {
        let token = format!("mock-token-{}", self.next_token);
        self.next_token += 1;
        self.tokens.insert(token.clone(), role.to_string());
        token
    }

    fn insert_alert(&mut self, order_id: &str, proba: f64) -> i64 {
        let id = self.next_alert_id;
        let threshold = self.threshold();
        self.next_alert_id += 1;
        self.alerts.push(MockAlert {
            id,
            order_id: order_id.to_string(),
            miss_sla_proba: proba,
            threshold,
            triggered_at: now(),
            status: "open".to_string(),
            severity: severity_for(proba).to_string(),
            acknowledged_at: None,
            resolved_at: None,
            resolution_notes: None,
            actual_sla_missed: None,
        });
        id
    }

    fn alert_mut(&mut self, id: i64) -> Option<&mut MockAlert> {
        self.alerts.iter_mut().find(|a| a.id == id)
    }

    fn threshold(&self) -> f64 {
        self.settings.get("threshold").and_then(Value::as_f64).unwrap_or(0.8)
    }
}

fn now() -> String {
    Utc::now().format(SQLITE_FORMAT).to_string()
}

fn severity_for(proba: f64) -> &'static str {
    if proba >= 0.8 {
        "high"
    } else if proba > 0.5 {
        "medium"
    } else {
        "low"
    }
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

/// Running mock backend. The server stops when this is dropped.
pub struct MockBackend {
    base_url: String,
    state: Shared,
    server: JoinHandle<()>,
}

impl MockBackend {
    pub async fn spawn() -> anyhow::Result<Self> {
        let state: Shared = Arc::new(Mutex::new(BackendState::new()));
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = build_router(state.clone());

        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                log::error!("❌ [MOCK] backend stopped: {}", e);
            }
        });

        log::info!("🧪 [MOCK] backend listening on {}", addr);
        Ok(Self { base_url: format!("http://{addr}"), state, server })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ----- auth -----

    pub fn add_user(&self, email: &str, password: &str, role: &str) {
        self.state
            .lock()
            .users
            .insert(email.to_string(), (password.to_string(), role.to_string()));
    }

    /// Token accepted as `Bearer <token>` without going through login.
    pub fn issue_token(&self, role: &str) -> String {
        self.state.lock().issue_token(role)
    }

    // ----- alerts -----

    /// New open alert; returns its id. Higher ids are more recent.
    pub fn seed_alert(&self, order_id: &str, proba: f64) -> i64 {
        self.state.lock().insert_alert(order_id, proba)
    }

    /// Alert row as served by `GET /alerts`.
    pub fn alert(&self, id: i64) -> Option<Value> {
        let state = self.state.lock();
        let alert = state.alerts.iter().find(|a| a.id == id)?;
        serde_json::to_value(alert).ok()
    }

    pub fn alert_status(&self, id: i64) -> Option<String> {
        self.state.lock().alerts.iter().find(|a| a.id == id).map(|a| a.status.clone())
    }

    /// Resolve as if another operator did it from a different console.
    pub fn resolve_elsewhere(&self, id: i64, actual_sla_missed: bool) -> bool {
        let mut state = self.state.lock();
        match state.alert_mut(id) {
            Some(alert) if alert.status != "resolved" => {
                alert.status = "resolved".to_string();
                alert.resolved_at = Some(now());
                alert.actual_sla_missed = Some(u8::from(actual_sla_missed));
                true
            }
            _ => false,
        }
    }

    pub fn action_count(&self, alert_id: i64) -> usize {
        self.state.lock().actions.iter().filter(|a| a.alert_id == alert_id).count()
    }

    // ----- telemetry -----

    pub fn push_log(&self, row: Value) {
        self.state.lock().logs.push(row);
    }

    /// Serve `body` verbatim for GET `path` instead of the computed answer.
    pub fn set_raw_body(&self, path: &str, body: &str) {
        self.state.lock().raw_bodies.insert(path.to_string(), body.to_string());
    }

    pub fn settings(&self) -> Value {
        self.state.lock().settings.clone()
    }

    // ----- fault injection -----

    pub fn set_healthy(&self, healthy: bool) {
        self.state.lock().healthy = healthy;
    }

    /// Answer the next request to `path` with `status`, before auth.
    pub fn fail_next(&self, path: &str, status: u16) {
        self.state
            .lock()
            .failures
            .entry(path.to_string())
            .or_default()
            .push_back(status);
    }

    /// Build the next authenticated response to `path` right away but
    /// hold it back for `delay`, so it reflects state from before the hold.
    pub fn hold_next(&self, path: &str, delay: Duration) {
        self.state
            .lock()
            .holds
            .entry(path.to_string())
            .or_default()
            .push_back(delay);
    }

    // ----- recording -----

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.state.lock().requests.iter().filter(|r| r.path == path).cloned().collect()
    }

    pub fn clear_requests(&self) {
        self.state.lock().requests.clear();
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

fn build_router(state: Shared) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/login", post(login))
        .route("/logs", get(logs))
        .route("/predict", post(predict))
        .route("/stats/today", get(stats_today))
        .route("/stats/trends", get(stats_trends))
        .route("/stats/ops", get(stats_ops))
        .route("/settings", get(get_settings).post(update_settings))
        .route("/alerts", get(list_alerts))
        .route("/alerts/{id}/ack", post(ack_alert))
        .route("/alerts/{id}/resolve", post(resolve_alert))
        .route("/alerts/{id}/actions", get(list_actions).post(create_action))
        .layer(middleware::from_fn_with_state(state.clone(), gatekeeper))
        .with_state(state)
}

/// Records the request, applies injected failures, then checks the bearer
/// token on everything except health and login.
async fn gatekeeper(State(state): State<Shared>, mut req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let authorization = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let (forced, hold) = {
        let mut s = state.lock();
        s.requests.push(RecordedRequest {
            method: req.method().to_string(),
            path: path.clone(),
            query: req.uri().query().map(str::to_string),
            authorization: authorization.clone(),
            headers: req
                .headers()
                .iter()
                .filter_map(|(name, value)| Some((name.as_str().to_string(), value.to_str().ok()?.to_string())))
                .collect(),
        });
        let forced = s.failures.get_mut(&path).and_then(VecDeque::pop_front);
        let hold = s.holds.get_mut(&path).and_then(VecDeque::pop_front);
        (forced, hold)
    };
    if let Some(status) = forced {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return detail(status, "injected failure");
    }

    if path == "/health" || path == "/auth/login" {
        return next.run(req).await;
    }

    let role = authorization
        .as_deref()
        .and_then(|h| h.strip_prefix("Bearer "))
        .and_then(|token| state.lock().tokens.get(token).cloned());
    match role {
        Some(role) => {
            req.extensions_mut().insert(CallerRole(role));
            let response = next.run(req).await;
            if let Some(delay) = hold {
                tokio::time::sleep(delay).await;
            }
            response
        }
        None => detail(StatusCode::UNAUTHORIZED, "Not authenticated"),
    }
}

fn raw_or(state: &Shared, path: &str, compute: impl FnOnce(&BackendState) -> Value) -> Response {
    let s = state.lock();
    match s.raw_bodies.get(path) {
        Some(raw) => ([(CONTENT_TYPE, "application/json")], raw.clone()).into_response(),
        None => Json(compute(&*s)).into_response(),
    }
}

async fn health(State(state): State<Shared>) -> Response {
    if state.lock().healthy {
        Json(json!({"status": "ok"})).into_response()
    } else {
        detail(StatusCode::SERVICE_UNAVAILABLE, "maintenance")
    }
}

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

async fn login(State(state): State<Shared>, Json(body): Json<LoginBody>) -> Response {
    let mut s = state.lock();
    let role = match s.users.get(&body.email) {
        Some((password, role)) if *password == body.password => role.clone(),
        _ => return detail(StatusCode::UNAUTHORIZED, "Invalid credentials"),
    };
    let token = s.issue_token(&role);
    Json(json!({"access_token": token, "role": role, "email": body.email})).into_response()
}

#[derive(Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
    status: Option<String>,
}

async fn logs(State(state): State<Shared>, Query(q): Query<LimitQuery>) -> Response {
    let limit = q.limit.unwrap_or(20);
    raw_or(&state, "/logs", |s| {
        Value::Array(s.logs.iter().rev().take(limit).cloned().collect())
    })
}

async fn predict(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let num = |key: &str, default: f64| body.get(key).and_then(Value::as_f64).unwrap_or(default);
    let order_id = body.get("order_id").and_then(Value::as_str).unwrap_or_default().to_string();
    if order_id.is_empty() {
        return detail(StatusCode::UNPROCESSABLE_ENTITY, "order_id required");
    }

    let proba = (0.5 * num("traffic_index", 0.5) + 0.5 * num("hub_load", 0.5)).clamp(0.0, 1.0);
    let will_miss = proba >= 0.5;

    let mut s = state.lock();
    s.logs.push(json!({
        "order_id": order_id,
        "miss_sla_proba": proba,
        "will_miss_sla": will_miss,
        "carrier": body.get("carrier").cloned().unwrap_or(Value::Null),
        "created_at": now(),
        "distance_km": body.get("distance_km").cloned().unwrap_or(Value::Null),
        "items_count": body.get("items_count").cloned().unwrap_or(Value::Null),
        "hub_load": body.get("hub_load").cloned().unwrap_or(Value::Null),
        "traffic_index": body.get("traffic_index").cloned().unwrap_or(Value::Null),
        "weather_code": body.get("weather_code").cloned().unwrap_or(Value::Null),
        "priority": body.get("priority").cloned().unwrap_or(Value::Null),
    }));

    let duplicate = s.alerts.iter().any(|a| a.order_id == order_id && a.status != "resolved");
    if proba >= s.threshold() && !duplicate {
        s.insert_alert(&order_id, proba);
    }

    Json(json!({"order_id": order_id, "miss_sla_proba": proba, "will_miss_sla": will_miss})).into_response()
}

/// `will_miss_sla` is a bool from `/predict` but an integer in older rows.
fn missed(row: &Value) -> bool {
    match row.get("will_miss_sla") {
        Some(Value::Bool(b)) => *b,
        Some(v) => v.as_i64().is_some_and(|n| n != 0),
        None => false,
    }
}

fn proba_of(row: &Value) -> f64 {
    row.get("miss_sla_proba").and_then(Value::as_f64).unwrap_or(0.0)
}

async fn stats_today(State(state): State<Shared>) -> Response {
    raw_or(&state, "/stats/today", |s| {
        let high = s.logs.iter().filter(|r| proba_of(r) >= 0.8).count();
        let medium = s.logs.iter().filter(|r| (0.5..0.8).contains(&proba_of(r))).count();
        let total = s.logs.len();
        json!({
            "date": Utc::now().format("%Y-%m-%d").to_string(),
            "total_predictions": total,
            "high_risk": high,
            "medium_risk": medium,
            "low_risk": total - high - medium,
            "accuracy": 0.91,
        })
    })
}

async fn stats_trends(State(state): State<Shared>) -> Response {
    raw_or(&state, "/stats/trends", |s| {
        let mut by_hour: Vec<(String, usize)> = Vec::new();
        let mut by_carrier: Vec<(String, usize, usize)> = Vec::new();
        for row in &s.logs {
            let hour = row
                .get("created_at")
                .and_then(Value::as_str)
                .and_then(|ts| ts.get(11..13))
                .map(|h| format!("{h}:00"))
                .unwrap_or_else(|| "00:00".to_string());
            let high = usize::from(proba_of(row) >= 0.8);
            match by_hour.iter_mut().find(|(h, _)| *h == hour) {
                Some(entry) => entry.1 += high,
                None => by_hour.push((hour, high)),
            }

            let carrier = row.get("carrier").and_then(Value::as_str).unwrap_or("UNKNOWN").to_string();
            let on_time = usize::from(!missed(row));
            match by_carrier.iter_mut().find(|(c, _, _)| *c == carrier) {
                Some(entry) => {
                    entry.1 += on_time;
                    entry.2 += 1;
                }
                None => by_carrier.push((carrier, on_time, 1)),
            }
        }

        let high = s.logs.iter().filter(|r| proba_of(r) >= 0.8).count();
        let medium = s.logs.iter().filter(|r| (0.5..0.8).contains(&proba_of(r))).count();
        json!({
            "hourly": by_hour.iter().map(|(h, n)| json!({"hour": h, "high_risk": n})).collect::<Vec<_>>(),
            "risk_distribution": [
                {"name": "High", "value": high, "color": "#ef4444"},
                {"name": "Medium", "value": medium, "color": "#f59e0b"},
                {"name": "Low", "value": s.logs.len() - high - medium, "color": "#10b981"},
            ],
            "carrier_performance": by_carrier
                .iter()
                .map(|(c, ok, n)| json!({"name": c, "on_time_pct": (*ok as f64 / *n as f64 * 100.0).round()}))
                .collect::<Vec<_>>(),
        })
    })
}

fn parse_sqlite(ts: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(ts, SQLITE_FORMAT).ok()
}

async fn stats_ops(State(state): State<Shared>) -> Response {
    raw_or(&state, "/stats/ops", |s| {
        let total = s.alerts.len();
        let resolved: Vec<&MockAlert> = s.alerts.iter().filter(|a| a.status == "resolved").collect();
        let durations: Vec<i64> = resolved
            .iter()
            .filter_map(|a| {
                let start = parse_sqlite(&a.triggered_at)?;
                let end = parse_sqlite(a.resolved_at.as_deref()?)?;
                Some((end - start).num_seconds())
            })
            .collect();
        let mean = if durations.is_empty() { 0 } else { durations.iter().sum::<i64>() / durations.len() as i64 };
        let false_positives = resolved.iter().filter(|a| a.actual_sla_missed == Some(0)).count();
        let pct = |n: usize, d: usize| if d == 0 { 0.0 } else { (n as f64 / d as f64 * 10000.0).round() / 100.0 };

        json!({
            "total_alerts": total,
            "resolved": resolved.len(),
            "resolution_rate": pct(resolved.len(), total),
            "mean_response_time_sec": mean,
            "false_positive_rate": pct(false_positives, resolved.len()),
        })
    })
}

async fn get_settings(State(state): State<Shared>) -> Json<Value> {
    Json(state.lock().settings.clone())
}

#[derive(Serialize, Deserialize)]
struct SettingsBody {
    threshold: f64,
    enabled: bool,
    emails: Vec<String>,
}

async fn update_settings(
    State(state): State<Shared>,
    Extension(CallerRole(role)): Extension<CallerRole>,
    Json(body): Json<SettingsBody>,
) -> Response {
    if role != "admin" {
        return detail(StatusCode::FORBIDDEN, "Insufficient role");
    }
    let value = json!(body);
    state.lock().settings = value.clone();
    Json(value).into_response()
}

async fn list_alerts(State(state): State<Shared>, Query(q): Query<LimitQuery>) -> Json<Vec<MockAlert>> {
    let s = state.lock();
    let limit = q.limit.unwrap_or(50).min(200);
    Json(
        s.alerts
            .iter()
            .rev()
            .filter(|a| q.status.as_deref().map_or(true, |st| a.status == st))
            .take(limit)
            .cloned()
            .collect(),
    )
}

async fn ack_alert(State(state): State<Shared>, Path(id): Path<i64>) -> Response {
    let mut s = state.lock();
    match s.alert_mut(id) {
        Some(alert) if alert.status == "open" => {
            alert.status = "acknowledged".to_string();
            alert.acknowledged_at = Some(now());
            Json(json!({"ok": true})).into_response()
        }
        _ => detail(StatusCode::NOT_FOUND, "Alert not found or not open"),
    }
}

#[derive(Deserialize)]
struct ResolveBody {
    actual_sla_missed: bool,
    resolution_notes: Option<String>,
}

async fn resolve_alert(State(state): State<Shared>, Path(id): Path<i64>, Json(body): Json<ResolveBody>) -> Response {
    let mut s = state.lock();
    match s.alert_mut(id) {
        Some(alert) if alert.status == "open" || alert.status == "acknowledged" => {
            alert.status = "resolved".to_string();
            alert.resolved_at = Some(now());
            alert.resolution_notes = body.resolution_notes;
            alert.actual_sla_missed = Some(u8::from(body.actual_sla_missed));
            Json(json!({"ok": true})).into_response()
        }
        _ => detail(StatusCode::NOT_FOUND, "Alert not found or already resolved"),
    }
}

async fn list_actions(State(state): State<Shared>, Path(id): Path<i64>) -> Json<Vec<Value>> {
    let s = state.lock();
    Json(
        s.actions
            .iter()
            .rev()
            .filter(|a| a.alert_id == id)
            .map(|a| json!({"action_type": a.action_type, "payload": a.payload, "created_at": a.created_at}))
            .collect(),
    )
}

#[derive(Deserialize)]
struct ActionBody {
    action_type: String,
    payload: Option<Value>,
}

async fn create_action(State(state): State<Shared>, Path(id): Path<i64>, Json(body): Json<ActionBody>) -> Response {
    let mut s = state.lock();
    let status = match s.alert_mut(id) {
        Some(alert) => alert.status.clone(),
        None => return detail(StatusCode::NOT_FOUND, "Alert not found"),
    };
    if status == "resolved" {
        return detail(StatusCode::CONFLICT, "Alert already resolved");
    }

    // stored JSON-encoded, like the production TEXT column
    let payload = body.payload.filter(|p| !p.is_null()).map(|p| p.to_string());
    s.actions.push(StoredAction { alert_id: id, action_type: body.action_type, payload, created_at: now() });
    Json(json!({"ok": true})).into_response()
}
