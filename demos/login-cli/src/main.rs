//! Minimal command-line login client.
//!
//! Runs the full session flow end to end: validate credentials, perform
//! the login handshake, persist the resulting settings, then hold a
//! transport connection open against the returned grid address until
//! interrupted.
//!
//! ```text
//! login-cli direct "Jane Doe" secret example.org:9000
//! login-cli auth jane secret auth.example.org:10001 world.example.org:9000
//! login-cli url world.example.org:9000 http://id.example.org/jane
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use gridlink::{LoginEvent, LoginOrchestrator, TomlSettings};
use gridlink_login::HttpRpcClient;
use gridlink_transport::{
    ConnectionManager, SocketConnector, TransportConfig,
};

const SETTINGS_FILE: &str = "gridlink-settings.toml";
const TICK_INTERVAL: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    let rpc = Arc::new(HttpRpcClient::new());
    let settings = Arc::new(TomlSettings::open(SETTINGS_FILE)?);
    let (mut orchestrator, mut events) =
        LoginOrchestrator::new(rpc, settings);

    match args.iter().map(String::as_str).collect::<Vec<_>>()[..] {
        ["direct", username, password, server] => {
            let mut fields = HashMap::new();
            fields.insert("Username".to_string(), username.to_string());
            fields.insert("Password".to_string(), password.to_string());
            fields.insert("WorldAddress".to_string(), server.to_string());
            orchestrator.process_direct_login(&fields)?;
        }
        ["auth", username, password, auth_server, world_server] => {
            let mut fields = HashMap::new();
            fields.insert("Username".to_string(), username.to_string());
            fields.insert("Password".to_string(), password.to_string());
            fields.insert(
                "AuthenticationAddress".to_string(),
                auth_server.to_string(),
            );
            fields
                .insert("WorldAddress".to_string(), world_server.to_string());
            orchestrator.process_authenticated_login(&fields)?;
        }
        ["url", entry_point, identity_url] => {
            orchestrator.process_url_login(entry_point, identity_url)?;
        }
        _ => {
            eprintln!("usage:");
            eprintln!("  login-cli direct <\"first last\"> <password> <server>");
            eprintln!(
                "  login-cli auth <account> <password> <auth-server> <world-server>"
            );
            eprintln!("  login-cli url <entry-point> <identity-url>");
            std::process::exit(2);
        }
    }

    // Wait for the handshake's terminal event.
    let grid_url = loop {
        match events.recv().await {
            Some(LoginEvent::Started) => {
                tracing::info!("login attempt started");
            }
            Some(LoginEvent::Succeeded { grid_url, params }) => {
                tracing::info!(
                    session_id = %params.session_id,
                    agent_id = %params.agent_id,
                    circuit_code = params.circuit_code,
                    %grid_url,
                    "login succeeded"
                );
                break grid_url;
            }
            Some(LoginEvent::Failed { message }) => {
                eprintln!("login failed: {message}");
                std::process::exit(1);
            }
            None => {
                eprintln!("login orchestrator went away");
                std::process::exit(1);
            }
        }
    };

    // Hand the grid address to the transport layer and tick until ^C.
    // Candidate endpoints carry their own ports; only the host matters.
    let host = grid_url
        .split(':')
        .next()
        .unwrap_or(grid_url.as_str())
        .to_string();
    let mut manager =
        ConnectionManager::new(SocketConnector, TransportConfig::default());
    let mut inbound = manager.subscribe();
    manager.connect(&host);

    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                manager.update();
                while let Ok(message) = inbound.try_recv() {
                    tracing::info!(
                        id = message.id,
                        len = message.payload.len(),
                        "inbound message"
                    );
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, disconnecting");
                manager.disconnect();
                break;
            }
        }
    }
    Ok(())
}
