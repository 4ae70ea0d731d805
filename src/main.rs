//! # chat
//!
//! Broadcast chat binary. Runs the server, a client, or both in one process.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use chat_client::{ChatClient, ClientConfig, ClientEvent};
use chat_core::{ChatMessage, ConnectionId};
use chat_server::{ChatServer, ServerConfig};
use chat_settings::ChatSettings;
use clap::{ArgGroup, Parser};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Broadcast chat server and client.
#[derive(Parser, Debug)]
#[command(name = "chat", about = "Broadcast chat server and client")]
#[command(group(ArgGroup::new("mode").required(true).multiple(true).args(["server", "client"])))]
struct Cli {
    /// Run the server.
    #[arg(long)]
    server: bool,

    /// Run a client (requires --nick).
    #[arg(long, requires = "nick")]
    client: bool,

    /// Nick the client shouts as.
    #[arg(long, requires = "client")]
    nick: Option<String>,

    /// Host to bind / connect to (default: localhost).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind / connect to (default: 3000).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (default: ~/.chat/settings.json).
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    /// Settings file, then `CHAT_*` env, then command-line flags.
    fn settings(&self) -> Result<ChatSettings> {
        let mut settings = match &self.config {
            Some(path) => chat_settings::load_settings_from_path(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?,
            None => chat_settings::load_settings().context("Failed to load settings")?,
        };
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        Ok(settings)
    }
}

/// One line of output for a received broadcast.
fn render(payload: &Value) -> String {
    match serde_json::from_value::<ChatMessage>(payload.clone()) {
        Ok(msg) => format!("<{}> {}", msg.nick, msg.text),
        Err(_) => payload.to_string(),
    }
}

async fn print_events(mut events: mpsc::Receiver<ClientEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            ClientEvent::Message(payload) => println!("{}", render(&payload)),
            ClientEvent::Connected { id, previous } => {
                info!(id = %id, prev_id = previous.as_ref().map(ConnectionId::as_str), "client connected");
            }
            ClientEvent::Disconnected { reason } => info!(%reason, "client disconnected"),
            ClientEvent::Error(error) => warn!(%error, "client error"),
            ClientEvent::ReconnectAttempt(attempt) => info!(attempt, "reconnect attempt"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.settings()?;
    chat_logging::init_subscriber(settings.logging.level, settings.logging.format);

    let server = if cli.server {
        let server = ChatServer::new(ServerConfig::from(&settings.server));
        let addr = server
            .listen()
            .await
            .with_context(|| format!("Failed to bind {}", server.config().bind_addr()))?;
        info!("chat server listening on ws://{addr}/ws");
        Some(server)
    } else {
        None
    };

    let client = match (cli.client, cli.nick) {
        (true, Some(nick)) => {
            let (client, events) = ChatClient::connect(ClientConfig::from_settings(&settings, nick));
            let printer = tokio::spawn(print_events(events));
            Some((client, printer))
        }
        _ => None,
    };

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    info!("shutting down");

    if let Some((client, printer)) = client {
        client.close().await;
        let _ = printer.await;
    }
    if let Some(server) = server {
        let _ = server.stop(None).await;
    }

    info!("shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn server_only() {
        let cli = Cli::try_parse_from(["chat", "--server"]).unwrap();
        assert!(cli.server);
        assert!(!cli.client);
        assert!(cli.nick.is_none());
    }

    #[test]
    fn client_needs_nick() {
        assert!(Cli::try_parse_from(["chat", "--client"]).is_err());
        assert!(Cli::try_parse_from(["chat", "--nick", "n"]).is_err());
        let cli = Cli::try_parse_from(["chat", "--client", "--nick", "n"]).unwrap();
        assert_eq!(cli.nick.as_deref(), Some("n"));
    }

    #[test]
    fn some_mode_is_required() {
        assert!(Cli::try_parse_from(["chat"]).is_err());
        assert!(Cli::try_parse_from(["chat", "--port", "4000"]).is_err());
    }

    #[test]
    fn server_and_client_together() {
        let cli =
            Cli::try_parse_from(["chat", "--server", "--client", "--nick", "n", "--port", "4000"])
                .unwrap();
        assert!(cli.server && cli.client);
        assert_eq!(cli.port, Some(4000));
    }

    #[test]
    fn flags_override_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let cli = Cli::try_parse_from([
            "chat",
            "--server",
            "--host",
            "127.0.0.1",
            "--port",
            "4567",
            "--config",
            path.to_str().unwrap(),
        ])
        .unwrap();
        let settings = cli.settings().unwrap();
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 4567);
    }

    #[test]
    fn render_chat_line() {
        assert_eq!(render(&json!({"nick": "nick1", "text": "hi"})), "<nick1> hi");
    }

    #[test]
    fn render_other_payloads_as_json() {
        assert_eq!(render(&json!([1, 2])), "[1,2]");
        assert_eq!(render(&json!("plain")), "\"plain\"");
    }
}
