//! Runs one parsed operator command against the console and returns the text to print.

use crate::commands::Command;
use crate::render;
use slawatch_core::{api, Console, ConsoleError};

/// Why a command was refused before reaching the backend.
pub fn refusal(console: &Console, command: &Command) -> Option<&'static str> {
    let roles = command.required_roles()?;
    if console.session.has_role(roles) {
        return None;
    }
    Some(match command {
        Command::Settings(_) => "Only admins can change alert settings.",
        _ => "Your role cannot change alerts.",
    })
}

pub async fn execute(console: &Console, command: Command) -> Result<String, ConsoleError> {
    let limit = console.config.polling.alerts_limit;
    let text = match command {
        Command::Alerts(filter) => {
            let snapshot = match filter {
                None => console.alerts.list(limit).await?,
                Some(status) => console.alerts.list_with_status(limit, status).await?,
            };
            render::alerts(&snapshot)
        }
        Command::Ack(id) => {
            console.alerts.acknowledge(id).await?;
            console.alerts.list(limit).await?;
            format!("Alert {id} acknowledged.")
        }
        Command::Resolve { id, missed, notes } => {
            console.alerts.resolve(id, missed, notes.as_deref()).await?;
            console.alerts.list(limit).await?;
            format!("Alert {id} resolved.")
        }
        Command::Action { id, action_type, payload } => {
            console.alerts.record_action(id, action_type.clone(), payload).await?;
            let trail = console.alerts.list_actions(id).await?;
            format!("{action_type} recorded.\n{}", render::actions(&trail))
        }
        Command::Actions(id) => {
            let trail = console.alerts.list_actions(id).await?;
            render::actions(&trail)
        }
        Command::Predict(draft) => {
            let prediction = api::predict(&console.gateway, draft).await?;
            // a high score may have raised an alert
            console.alerts.list(limit).await?;
            render::prediction(&prediction)
        }
        Command::Settings(change) if change.is_empty() => render::settings(&api::get_settings(&console.gateway).await?),
        Command::Settings(change) => {
            let current = api::get_settings(&console.gateway).await?;
            let saved = api::update_settings(&console.gateway, &change.apply(current)).await?;
            format!("Settings saved. {}", render::settings(&saved))
        }
        Command::Live => {
            let paused = if console.live.is_paused() { " (paused)" } else { "" };
            format!("Live feed{paused}:\n{}", render::live(&console.live.orders()))
        }
        Command::Pause => {
            let msg = if console.pause_live() { "Live feed paused." } else { "Live feed already paused." };
            msg.to_string()
        }
        Command::Resume => {
            let msg = if console.resume_live() { "Live feed resumed." } else { "Live feed is not paused." };
            msg.to_string()
        }
        Command::Stats => render::stats(&api::daily_stats(&console.gateway).await?),
        Command::Trends => render::trends(&api::trends(&console.gateway).await?),
        Command::Ops => serde_json::to_string_pretty(&api::ops_stats(&console.gateway).await?).unwrap_or_default(),
        Command::Status => format!(
            "{} | backend {}",
            describe_session(console),
            console.connectivity.status().label()
        ),
        Command::Help => crate::commands::HELP.to_string(),
        Command::Quit => String::new(),
    };
    Ok(text)
}

pub fn describe_session(console: &Console) -> String {
    let session = console.session.snapshot();
    match (&session.identity, session.role) {
        (Some(identity), Some(role)) => format!("{identity} ({role}) @ {}", console.gateway.base_url()),
        _ => format!("not logged in @ {}", console.gateway.base_url()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::parse;
    use slawatch_core::config::ApiConfig;
    use slawatch_core::models::{AlertStatus, Role};
    use slawatch_core::{ConsoleConfig, MemoryStore};
    use slawatch_devkit::MockBackend;

    async fn console_as(role: &str) -> (MockBackend, Console) {
        slawatch_devkit::init_logging();
        let backend = MockBackend::spawn().await.unwrap();
        let config = ConsoleConfig {
            api: ApiConfig { base_url: backend.base_url().to_string(), ..ApiConfig::default() },
            ..ConsoleConfig::default()
        };
        let console = Console::with_storage(config, Box::new(MemoryStore::new())).unwrap();
        let token = backend.issue_token(role);
        let role: Role = serde_json::from_value(serde_json::json!(role)).unwrap();
        console.session.login(&token, role, "someone@example.com").unwrap();
        (backend, console)
    }

    async fn run_line(console: &Console, line: &str) -> Result<String, ConsoleError> {
        execute(console, parse(line).unwrap().unwrap()).await
    }

    #[tokio::test]
    async fn test_alerts_and_actions_render() {
        let (backend, console) = console_as("operator").await;
        let id = backend.seed_alert("ORD-7", 0.92);

        let listing = run_line(&console, "alerts").await.unwrap();
        assert!(listing.contains("ORD-7"));
        let open = run_line(&console, "alerts open").await.unwrap();
        assert!(open.contains("ORD-7"));

        assert_eq!(run_line(&console, &format!("actions {id}")).await.unwrap(), "No actions recorded.");
        let recorded = run_line(&console, &format!("action {id} escalate")).await.unwrap();
        assert!(recorded.starts_with("ESCALATE recorded."));

        run_line(&console, &format!("ack {id}")).await.unwrap();
        assert_eq!(console.alerts.snapshot().status_of(id), Some(AlertStatus::Acknowledged));
    }

    #[tokio::test]
    async fn test_predict_refreshes_alerts() {
        let (backend, console) = console_as("viewer").await;
        let command = parse("predict ORD-99 hub_load=1 traffic=1").unwrap().unwrap();
        assert_eq!(refusal(&console, &command), None);

        let text = execute(&console, command).await.unwrap();
        assert!(text.starts_with("ORD-99: 100.0% risk"));
        assert!(text.ends_with("SLA likely missed"));
        assert_eq!(backend.requests_to("/predict").len(), 1);
        assert!(console.alerts.snapshot().alerts.iter().any(|a| a.order_id == "ORD-99"));
    }

    #[tokio::test]
    async fn test_settings_update_is_admin_only() {
        let (backend, console) = console_as("operator").await;
        assert!(run_line(&console, "settings").await.unwrap().contains("threshold 80%"));

        let update = parse("settings threshold=0.6 enabled=on").unwrap().unwrap();
        assert_eq!(refusal(&console, &update), Some("Only admins can change alert settings."));
        // the backend enforces the same rule
        let err = execute(&console, update).await.unwrap_err();
        assert_eq!(err.status(), Some(403));
        assert_eq!(backend.settings()["threshold"], 0.8);
    }

    #[tokio::test]
    async fn test_settings_update_keeps_other_fields() {
        let (backend, console) = console_as("admin").await;
        let update = parse("settings threshold=0.6 emails=ops@example.com").unwrap().unwrap();
        assert_eq!(refusal(&console, &update), None);

        let text = execute(&console, update).await.unwrap();
        assert!(text.starts_with("Settings saved."));
        let saved = backend.settings();
        assert_eq!(saved["threshold"], 0.6);
        assert_eq!(saved["enabled"], false);
        assert_eq!(saved["emails"], serde_json::json!(["ops@example.com"]));
    }

    #[tokio::test]
    async fn test_viewer_cannot_ack() {
        let (_backend, console) = console_as("viewer").await;
        let ack = parse("ack 1").unwrap().unwrap();
        assert_eq!(refusal(&console, &ack), Some("Your role cannot change alerts."));
        assert_eq!(refusal(&console, &parse("alerts").unwrap().unwrap()), None);
    }
}
