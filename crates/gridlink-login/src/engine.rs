//! The handshake worker: one or two RPC rounds on a background task.
//!
//! [`spawn_login`] runs the exchange off the cooperative tick path so a
//! slow or unreachable server can never stall the foreground. Progress
//! and results flow exclusively through the [`SessionHandle`]; the task
//! itself returns nothing.
//!
//! Round sequencing:
//!
//! ```text
//! spawn ──→ WaitingForReply
//!             │
//!             ├─ credentials need auth? ──→ "authenticate" round
//!             │       ok: AuthReplyReceived     err: Failed (stop)
//!             ▼
//!          "login" round against the world endpoint
//!             ok: ReplyReceived                 err: Failed
//! ```

use std::sync::Arc;

use tokio::task::JoinHandle;
use url::Url;

use crate::{
    Credentials, DeviceFingerprint, LoginPhase, RpcClient, RpcReply,
    RpcRequest, SessionHandle,
};

const AUTH_METHOD: &str = "authenticate";
const LOGIN_METHOD: &str = "login";

const CLIENT_VERSION: &str = concat!("Gridlink ", env!("CARGO_PKG_VERSION"));
const CLIENT_CHANNEL: &str = "gridlink";

/// Starting position requested from the simulator: last location or home.
const START_LOCATION: &str = "last";

/// The fixed manifest of inventory/UI option flags requested on every
/// login call.
const OPTION_FLAGS: &[&str] = &[
    "inventory-root",
    "inventory-skeleton",
    "inventory-lib-root",
    "inventory-lib-owner",
    "inventory-skel-lib",
    "initial-outfit",
    "gestures",
    "event_categories",
    "event_notifications",
    "classified_categories",
    "buddy-list",
    "ui-config",
    "tutorial_setting",
    "login-flags",
    "global-textures",
];

/// Everything one handshake attempt needs.
#[derive(Debug, Clone)]
pub struct LoginRequest {
    /// Identity material; selects the round flow.
    pub credentials: Credentials,
    /// Validated world/simulator entry point.
    pub world_url: Url,
}

/// Starts the handshake on a background task.
///
/// `handle` must be a fresh record not owned by any in-flight worker;
/// the spawned task holds exclusive write access until it reaches a
/// terminal phase. The caller keeps the [`JoinHandle`] to join or abort
/// the worker before starting a replacement attempt.
pub fn spawn_login<R: RpcClient>(
    client: Arc<R>,
    request: LoginRequest,
    handle: SessionHandle,
) -> JoinHandle<()> {
    handle.mark_started();
    tokio::spawn(run_handshake(client, request, handle))
}

async fn run_handshake<R: RpcClient>(
    client: Arc<R>,
    request: LoginRequest,
    handle: SessionHandle,
) {
    handle.set_phase(LoginPhase::WaitingForReply);

    let fingerprint = DeviceFingerprint::local(
        request.credentials.password().unwrap_or(""),
    );

    if request.credentials.requires_authentication() {
        match authenticate_round(client.as_ref(), &request, &fingerprint)
            .await
        {
            Ok(auth) => {
                handle.update_params(|p| {
                    p.session_hash = auth.session_hash;
                    p.grid_url = auth.grid_url;
                    p.avatar_storage_url = auth.avatar_storage_url;
                });
                handle.set_phase(LoginPhase::AuthReplyReceived);
            }
            Err(message) => {
                tracing::warn!(error = %message, "authentication round failed");
                handle.fail(message);
                return;
            }
        }
    }

    let session_hash = handle.params().session_hash;
    match login_round(client.as_ref(), &request, &fingerprint, &session_hash)
        .await
    {
        Ok(login) => {
            handle.update_params(|p| {
                p.session_id = login.session_id;
                p.agent_id = login.agent_id;
                p.circuit_code = login.circuit_code;
                if !login.grid_url.is_empty() {
                    p.grid_url = login.grid_url;
                }
            });
            handle.set_phase(LoginPhase::ReplyReceived);
            tracing::info!(
                grid_url = %handle.params().grid_url,
                "login handshake complete"
            );
        }
        Err(message) => {
            tracing::warn!(error = %message, "login round failed");
            handle.fail(message);
        }
    }
}

struct AuthOutcome {
    session_hash: String,
    grid_url: String,
    avatar_storage_url: String,
}

struct LoginOutcome {
    session_id: String,
    agent_id: String,
    circuit_code: u32,
    grid_url: String,
}

/// Round 1: authenticate against the separate authentication service.
async fn authenticate_round<R: RpcClient>(
    client: &R,
    request: &LoginRequest,
    fingerprint: &DeviceFingerprint,
) -> Result<AuthOutcome, String> {
    let Credentials::Authenticated {
        account, auth_url, ..
    } = &request.credentials
    else {
        // requires_authentication() gates this call.
        return Err("credentials carry no authentication service".to_string());
    };

    let mut call = RpcRequest::new(AUTH_METHOD);
    call.add_param(
        "account",
        format!("{}@{}", account, authority(auth_url)),
    );
    call.add_param("passwd", fingerprint.password_hash.as_str());
    call.add_param("loginuri", request.world_url.as_str());
    add_common_params(&mut call, fingerprint);

    let reply = client
        .call(auth_url.as_str(), call)
        .await
        .map_err(|e| e.to_string())?;

    let session_hash = reply
        .string("session_hash")
        .map_err(|e| reply_error(&reply, e))?;
    let grid_url = reply
        .string("grid_url")
        .map_err(|e| reply_error(&reply, e))?;
    let avatar_storage_url =
        reply.opt_string("avatar_storage_url").unwrap_or_default();

    Ok(AuthOutcome {
        session_hash,
        grid_url,
        avatar_storage_url,
    })
}

/// Round 2 (or the only round): login against the world endpoint.
async fn login_round<R: RpcClient>(
    client: &R,
    request: &LoginRequest,
    fingerprint: &DeviceFingerprint,
    session_hash: &str,
) -> Result<LoginOutcome, String> {
    let mut call = RpcRequest::new(LOGIN_METHOD);

    match &request.credentials {
        Credentials::Direct {
            first_name,
            last_name,
            ..
        } => {
            call.add_param("first", first_name.as_str());
            call.add_param("last", last_name.as_str());
            call.add_param("passwd", fingerprint.password_hash.as_str());
        }
        Credentials::Authenticated {
            account, auth_url, ..
        } => {
            let auth_address = authority(auth_url);
            call.add_param("sessionhash", session_hash);
            call.add_param("account", format!("{account}@{auth_address}"));
            call.add_param("passwd", fingerprint.password_hash.as_str());
            call.add_param("AuthenticationAddress", auth_address);
            call.add_param("loginuri", request.world_url.as_str());
        }
        Credentials::WebUrl { identity_url } => {
            call.add_param("account", identity_url.as_str());
        }
    }
    add_common_params(&mut call, fingerprint);

    let reply = client
        .call(request.world_url.as_str(), call)
        .await
        .map_err(|e| e.to_string())?;

    let session_id = reply.opt_string("session_id").unwrap_or_default();
    let agent_id = reply.opt_string("agent_id").unwrap_or_default();
    let circuit_code = reply
        .opt_int("circuit_code")
        .and_then(|code| u32::try_from(code).ok())
        .unwrap_or(0);

    // Host plus port, the port appended only when the reply carried a
    // positive one.
    let mut grid_url = reply.opt_string("sim_ip").unwrap_or_default();
    if !grid_url.is_empty() {
        if let Some(port) = reply.opt_int("sim_port").filter(|p| *p > 0) {
            grid_url = format!("{grid_url}:{port}");
        }
    }

    if session_id.is_empty() || agent_id.is_empty() || circuit_code == 0 {
        return Err(reply.opt_string("message").unwrap_or_else(|| {
            "login reply missing required session fields".to_string()
        }));
    }

    Ok(LoginOutcome {
        session_id,
        agent_id,
        circuit_code,
        grid_url,
    })
}

/// Members common to both rounds: client identification, the device
/// fingerprint, and the options manifest.
fn add_common_params(call: &mut RpcRequest, fingerprint: &DeviceFingerprint) {
    call.add_param("start", START_LOCATION);
    call.add_param("version", CLIENT_VERSION);
    call.add_param("channel", CLIENT_CHANNEL);
    call.add_param("platform", std::env::consts::OS);
    call.add_param("mac", fingerprint.mac_hash.as_str());
    call.add_param("id0", fingerprint.id0_hash.as_str());
    call.add_param("last_exec_event", 0i64);
    for flag in OPTION_FLAGS {
        call.add_option(*flag);
    }
}

/// `host:port` form of a URL, for account strings and the
/// AuthenticationAddress member.
fn authority(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

/// Prefers the server-supplied message over the field-level error.
fn reply_error(reply: &RpcReply, err: crate::RpcError) -> String {
    reply
        .opt_string("message")
        .unwrap_or_else(|| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authority_includes_port_when_present() {
        let url = Url::parse("http://auth.example.org:10001/").unwrap();
        assert_eq!(authority(&url), "auth.example.org:10001");
    }

    #[test]
    fn test_authority_omits_missing_port() {
        // Default scheme port is elided by the parser.
        let url = Url::parse("http://auth.example.org/").unwrap();
        assert_eq!(authority(&url), "auth.example.org");
    }

    #[test]
    fn test_options_manifest_is_complete() {
        let mut call = RpcRequest::new(LOGIN_METHOD);
        add_common_params(&mut call, &DeviceFingerprint::new("p", "m", "i"));
        assert_eq!(call.options().len(), 15);
        assert!(call.options().contains(&"buddy-list".to_string()));
        assert!(call.param("mac").is_some());
        assert!(call.param("id0").is_some());
    }
}
