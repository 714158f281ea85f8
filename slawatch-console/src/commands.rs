//! Operator commands typed on stdin while `watch` is running.

use slawatch_core::models::{ActionType, AlertId, AlertSettings, AlertStatus, OrderDraft, Role};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Alerts(Option<AlertStatus>),
    Ack(AlertId),
    Resolve { id: AlertId, missed: bool, notes: Option<String> },
    Action { id: AlertId, action_type: ActionType, payload: Option<serde_json::Value> },
    Actions(AlertId),
    Predict(OrderDraft),
    Settings(SettingsChange),
    Live,
    Pause,
    Resume,
    Stats,
    Trends,
    Ops,
    Status,
    Help,
    Quit,
}

/// Fields to change on the alert settings. All `None` means "show".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsChange {
    pub threshold: Option<f64>,
    pub enabled: Option<bool>,
    pub emails: Option<Vec<String>>,
}

impl SettingsChange {
    pub fn is_empty(&self) -> bool {
        self.threshold.is_none() && self.enabled.is_none() && self.emails.is_none()
    }

    pub fn apply(self, current: AlertSettings) -> AlertSettings {
        AlertSettings {
            threshold: self.threshold.unwrap_or(current.threshold),
            enabled: self.enabled.unwrap_or(current.enabled),
            emails: self.emails.unwrap_or(current.emails),
        }
    }
}

const EDITORS: &[Role] = &[Role::Admin, Role::Operator];
const ADMINS: &[Role] = &[Role::Admin];

impl Command {
    /// Roles allowed to run this command, `None` when any session may.
    pub fn required_roles(&self) -> Option<&'static [Role]> {
        match self {
            Command::Ack(_) | Command::Resolve { .. } | Command::Action { .. } => Some(EDITORS),
            Command::Settings(change) if !change.is_empty() => Some(ADMINS),
            _ => None,
        }
    }
}

pub const HELP: &str = "\
alerts [open|acknowledged|resolved]   refresh and show alerts
ack <id>                              acknowledge an open alert
resolve <id> <missed|met> [notes...]  resolve with the observed outcome
action <id> <TYPE> [json payload]     record REROUTE, ESCALATE, CARRIER_RECOMMEND, DELAY_BROADCAST
actions <id>                          show the action trail
predict <order_id> [key=value...]     score an order (distance, items, hub_load, traffic,
                                      weather, priority, carrier)
settings [threshold=0.8] [enabled=on] [emails=a@x,b@y]
                                      show or change alert settings (admin)
live | pause | resume                 live predictions feed
stats | trends | ops                  dashboard figures
status                                session and backend state
quit";

fn parse_id(raw: Option<&str>) -> Result<AlertId, String> {
    let raw = raw.ok_or("missing alert id")?;
    raw.trim_start_matches('#').parse().map_err(|_| format!("invalid alert id: {raw}"))
}

fn key_values<'a>(words: impl Iterator<Item = &'a str>) -> Result<Vec<(String, &'a str)>, String> {
    words
        .map(|word| {
            word.split_once('=')
                .map(|(k, v)| (k.to_ascii_lowercase(), v))
                .ok_or_else(|| format!("expected key=value, got {word}"))
        })
        .collect()
}

fn number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, String> {
    raw.parse().map_err(|_| format!("invalid {key}: {raw}"))
}

fn parse_predict<'a>(mut words: impl Iterator<Item = &'a str>) -> Result<OrderDraft, String> {
    let order_id = words.next().ok_or("missing order id")?;
    let mut draft = OrderDraft { order_id: order_id.to_string(), ..OrderDraft::default() };
    for (key, value) in key_values(words)? {
        match key.as_str() {
            "distance" | "distance_km" => draft.distance_km = Some(number(&key, value)?),
            "items" | "items_count" => draft.items_count = Some(number(&key, value)?),
            "hub_load" | "hub" => draft.hub_load = Some(number(&key, value)?),
            "traffic" | "traffic_index" => draft.traffic_index = Some(number(&key, value)?),
            "weather" | "weather_code" => draft.weather_code = Some(value.to_ascii_uppercase()),
            "priority" => draft.priority = Some(value.to_ascii_uppercase()),
            "carrier" => draft.carrier = Some(value.to_ascii_uppercase()),
            other => return Err(format!("unknown order field: {other}")),
        }
    }
    Ok(draft)
}

fn parse_settings<'a>(words: impl Iterator<Item = &'a str>) -> Result<SettingsChange, String> {
    let mut change = SettingsChange::default();
    for (key, value) in key_values(words)? {
        match key.as_str() {
            "threshold" => change.threshold = Some(number(&key, value)?),
            "enabled" => {
                change.enabled = Some(match value.to_ascii_lowercase().as_str() {
                    "on" | "true" | "yes" => true,
                    "off" | "false" | "no" => false,
                    _ => return Err(format!("invalid enabled: {value}")),
                })
            }
            "emails" => {
                change.emails = Some(
                    value.split(',').map(str::trim).filter(|e| !e.is_empty()).map(str::to_string).collect(),
                )
            }
            other => return Err(format!("unknown setting: {other}")),
        }
    }
    Ok(change)
}

pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (head, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    let mut words = rest.split_whitespace();

    let command = match head.to_ascii_lowercase().as_str() {
        "alerts" | "ls" => match words.next() {
            None => Command::Alerts(None),
            Some("open") => Command::Alerts(Some(AlertStatus::Open)),
            Some("acknowledged") | Some("ack") => Command::Alerts(Some(AlertStatus::Acknowledged)),
            Some("resolved") => Command::Alerts(Some(AlertStatus::Resolved)),
            Some(other) => return Err(format!("unknown status filter: {other}")),
        },
        "ack" => Command::Ack(parse_id(words.next())?),
        "resolve" => {
            let id = parse_id(words.next())?;
            let missed = match words.next() {
                Some("missed") | Some("yes") => true,
                Some("met") | Some("no") => false,
                _ => return Err("resolve needs an outcome: missed or met".to_string()),
            };
            let notes: Vec<&str> = words.collect();
            let notes = (!notes.is_empty()).then(|| notes.join(" "));
            Command::Resolve { id, missed, notes }
        }
        "action" => {
            let id = parse_id(words.next())?;
            let action_type = words
                .next()
                .map(|t| ActionType::from(t.to_string()))
                .ok_or("missing action type")?;
            let payload_text = words.collect::<Vec<_>>().join(" ");
            let payload = if payload_text.is_empty() {
                None
            } else {
                Some(serde_json::from_str(&payload_text).map_err(|e| format!("payload is not JSON: {e}"))?)
            };
            Command::Action { id, action_type, payload }
        }
        "actions" => Command::Actions(parse_id(words.next())?),
        "predict" => Command::Predict(parse_predict(words)?),
        "settings" => Command::Settings(parse_settings(words)?),
        "live" => Command::Live,
        "pause" => Command::Pause,
        "resume" => Command::Resume,
        "stats" => Command::Stats,
        "trends" => Command::Trends,
        "ops" => Command::Ops,
        "status" | "whoami" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(format!("unknown command: {other} (try help)")),
    };
    Ok(Some(command))
}
