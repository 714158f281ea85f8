//! Slawatch console - headless operator view of the SLA risk backend
//!
//! Subcommands:
//! - `login <email> [password]` (password falls back to `SLAWATCH_PASSWORD`)
//! - `logout`, `whoami`
//! - `watch` (default): polls alerts, live feed and backend health, and
//!   reads operator commands from stdin until `quit` or Ctrl-C

mod commands;
mod dispatch;
mod render;

use anyhow::{bail, Context, Result};
use commands::Command;
use slawatch_core::{api, Console, ConsoleConfig};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("slawatch_core=info,slawatch=info")),
        )
        .init();

    let config = ConsoleConfig::load().await;
    let console = Console::from_config(config).context("Failed to initialise console")?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("login") => login(&console, &args[1..]).await,
        Some("logout") => {
            api::logout(&console.gateway).context("Failed to clear session")?;
            println!("Logged out.");
            Ok(())
        }
        Some("whoami") => {
            println!("{}", dispatch::describe_session(&console));
            Ok(())
        }
        Some("watch") | None => watch(&console).await,
        Some(other) => bail!("unknown command: {other} (expected login, logout, whoami, watch)"),
    }
}

async fn login(console: &Console, args: &[String]) -> Result<()> {
    let email = args.first().context("usage: slawatch login <email> [password]")?;
    let password = match args.get(1) {
        Some(p) => p.clone(),
        None => std::env::var("SLAWATCH_PASSWORD").context("no password given and SLAWATCH_PASSWORD not set")?,
    };

    let session = api::login(&console.gateway, email, &password)
        .await
        .context("Login failed")?;
    println!(
        "Logged in as {} ({})",
        session.identity.as_deref().unwrap_or(email),
        session.role.map(|r| r.to_string()).unwrap_or_default()
    );
    Ok(())
}

async fn watch(console: &Console) -> Result<()> {
    if !console.session.is_authenticated() {
        warn!("No session; run `slawatch login <email>` first. Polls will be rejected.");
    }

    info!("🚀 Slawatch console starting ({})", dispatch::describe_session(console));
    console.start_polling();
    println!("Type `help` for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        error!("stdin read failed: {}", e);
                        break;
                    }
                };
                match commands::parse(&line) {
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(command)) => run(console, command).await,
                    Ok(None) => {}
                    Err(msg) => println!("{msg}"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received");
                break;
            }
        }
    }

    console.teardown().await;
    Ok(())
}

async fn run(console: &Console, command: Command) {
    if let Some(reason) = dispatch::refusal(console, &command) {
        println!("{reason}");
        return;
    }

    match dispatch::execute(console, command).await {
        Ok(text) => println!("{text}"),
        Err(e) if e.is_transition_rejected() => println!("Refused: {e}. Refresh with `alerts`."),
        Err(e) => {
            warn!("Command failed: {}", e);
            println!("Error: {e}");
        }
    }
}
