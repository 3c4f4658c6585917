//! The login orchestrator: variant entry points, URL sanitation, worker
//! ownership, and success-side persistence.
//!
//! One orchestrator owns at most one login attempt at a time. Each
//! `process_*_login` entry point discards the previous attempt — the
//! worker and its monitor are aborted before a fresh session record and
//! worker are created, so two workers can never write one record.
//!
//! The foreground can poll [`LoginOrchestrator::session`] at any time;
//! terminal outcomes are additionally published as [`LoginEvent`]s on a
//! typed channel so downstream consumers (whoever opens the transport
//! connection to the returned grid URL) need not poll.

use std::collections::HashMap;
use std::sync::Arc;

use gridlink_login::{
    Credentials, LoginPhase, LoginRequest, RpcClient, SessionHandle,
    SessionParams, spawn_login,
};
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use url::Url;

use crate::error::LoginError;
use crate::settings::SettingsStore;

/// Settings section all login-derived keys live under.
const LOGIN_SECTION: &str = "Login";

/// Credential input from the UI/CLI layer: field name to string value.
///
/// Recognized keys: `Username`, `Password`, `WorldAddress`,
/// `AuthenticationAddress`.
pub type CredentialFields = HashMap<String, String>;

/// Login lifecycle notifications for downstream consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginEvent {
    /// An attempt was validated and its worker started.
    Started,
    /// The handshake reached `ReplyReceived`; connect to `grid_url`.
    Succeeded {
        /// Resolved simulator address from the login reply.
        grid_url: String,
        /// Full session parameters.
        params: SessionParams,
    },
    /// The handshake reached `Failed`. Terminal; will not self-resolve.
    Failed {
        /// Server-supplied or best-available error text.
        message: String,
    },
}

/// Sequences the handshake engine per credential variant and persists
/// the outcome.
pub struct LoginOrchestrator<R: RpcClient, S: SettingsStore> {
    rpc: Arc<R>,
    settings: Arc<S>,
    events: mpsc::UnboundedSender<LoginEvent>,

    /// The current attempt's record. Replaced wholesale per attempt.
    session: SessionHandle,
    /// Abort control for the in-flight worker, if any.
    worker: Option<AbortHandle>,
    /// The task watching the worker for its terminal phase.
    monitor: Option<JoinHandle<()>>,
}

impl<R: RpcClient, S: SettingsStore> LoginOrchestrator<R, S> {
    /// Creates an orchestrator and the receiving end of its event
    /// channel.
    pub fn new(
        rpc: Arc<R>,
        settings: Arc<S>,
    ) -> (Self, mpsc::UnboundedReceiver<LoginEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self {
                rpc,
                settings,
                events,
                session: SessionHandle::new(),
                worker: None,
                monitor: None,
            },
            rx,
        )
    }

    /// The current attempt's session record, for foreground polling.
    ///
    /// Reports [`LoginPhase::Idle`] until an attempt has been started.
    pub fn session(&self) -> SessionHandle {
        self.session.clone()
    }

    /// Direct world-server login: single round, first/last name identity.
    ///
    /// # Errors
    /// Validation failures only — a malformed username, a missing field,
    /// or an invalid world address. Nothing is started on error.
    pub fn process_direct_login(
        &mut self,
        fields: &CredentialFields,
    ) -> Result<(), LoginError> {
        let username = require_field(fields, "Username")?;
        let mut names = username.split_whitespace();
        let (Some(first), Some(last), None) =
            (names.next(), names.next(), names.next())
        else {
            tracing::info!(
                username,
                "username not in \"first last\" form, login not started"
            );
            return Err(LoginError::MalformedUsername(username.to_string()));
        };
        let password = require_field(fields, "Password")?;
        let world_url =
            validate_server_url(require_field(fields, "WorldAddress")?)?;

        let persist = vec![
            ("server", authority(&world_url)),
            ("username", username.to_string()),
        ];
        self.start_attempt(
            Credentials::Direct {
                first_name: first.to_string(),
                last_name: last.to_string(),
                password: password.to_string(),
            },
            world_url,
            persist,
        );
        Ok(())
    }

    /// Authenticated login: authentication round against a separate
    /// service, then the login round carrying the session hash forward.
    ///
    /// # Errors
    /// Validation failures only; nothing is started on error.
    pub fn process_authenticated_login(
        &mut self,
        fields: &CredentialFields,
    ) -> Result<(), LoginError> {
        let username = require_field(fields, "Username")?;
        let password = require_field(fields, "Password")?;
        let auth_url = validate_server_url(require_field(
            fields,
            "AuthenticationAddress",
        )?)?;
        let world_url =
            validate_server_url(require_field(fields, "WorldAddress")?)?;

        let persist = vec![
            ("rex_server", authority(&world_url)),
            ("auth_server", authority(&auth_url)),
            ("auth_name", username.to_string()),
        ];
        self.start_attempt(
            Credentials::Authenticated {
                account: username.to_string(),
                password: password.to_string(),
                auth_url,
            },
            world_url,
            persist,
        );
        Ok(())
    }

    /// URL-based login: entry point and identity arrive pre-resolved
    /// (e.g. from a web callback); a single login round, no password.
    ///
    /// # Errors
    /// Validation failures only; nothing is started on error.
    pub fn process_url_login(
        &mut self,
        entry_point: &str,
        identity_url: &str,
    ) -> Result<(), LoginError> {
        let world_url = validate_server_url(entry_point)?;
        self.start_attempt(
            Credentials::WebUrl {
                identity_url: identity_url.to_string(),
            },
            world_url,
            Vec::new(),
        );
        Ok(())
    }

    /// Aborts any in-flight attempt and records it as cancelled.
    pub fn cancel_login(&mut self) {
        self.discard_previous_attempt();
        self.session.mark_cancelled();
    }

    fn start_attempt(
        &mut self,
        credentials: Credentials,
        world_url: Url,
        persist: Vec<(&'static str, String)>,
    ) {
        // At most one attempt in flight: stop the previous worker before
        // its replacement exists, so no two workers share a record.
        self.discard_previous_attempt();

        let handle = SessionHandle::new();
        self.session = handle.clone();
        let _ = self.events.send(LoginEvent::Started);

        let worker = spawn_login(
            Arc::clone(&self.rpc),
            LoginRequest {
                credentials,
                world_url,
            },
            handle.clone(),
        );
        self.worker = Some(worker.abort_handle());

        let settings = Arc::clone(&self.settings);
        let events = self.events.clone();
        self.monitor = Some(tokio::spawn(async move {
            // The record is the worker's sole output channel; join, then
            // read the terminal phase from it.
            if worker.await.is_err() {
                return; // aborted, superseded by a newer attempt
            }
            match handle.phase() {
                LoginPhase::ReplyReceived => {
                    for (key, value) in &persist {
                        if let Err(e) =
                            settings.set(LOGIN_SECTION, key, value)
                        {
                            tracing::warn!(key, error = %e, "failed to persist login setting");
                        }
                    }
                    let params = handle.params();
                    let _ = events.send(LoginEvent::Succeeded {
                        grid_url: params.grid_url.clone(),
                        params,
                    });
                }
                LoginPhase::Failed => {
                    // Failures leave existing settings untouched.
                    let _ = events.send(LoginEvent::Failed {
                        message: handle.error_message(),
                    });
                }
                phase => {
                    tracing::warn!(?phase, "login worker exited non-terminally");
                }
            }
        }));
    }

    fn discard_previous_attempt(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
        if let Some(monitor) = self.monitor.take() {
            monitor.abort();
        }
    }
}

impl<R: RpcClient, S: SettingsStore> Drop for LoginOrchestrator<R, S> {
    fn drop(&mut self) {
        self.discard_previous_attempt();
    }
}

fn require_field<'a>(
    fields: &'a CredentialFields,
    name: &'static str,
) -> Result<&'a str, LoginError> {
    fields
        .get(name)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
        .ok_or(LoginError::MissingField(name))
}

/// Validates a server address, defaulting the scheme to `http://` when
/// none was given.
fn validate_server_url(address: &str) -> Result<Url, LoginError> {
    let candidate = if address.contains("://") {
        address.to_string()
    } else {
        tracing::info!(address, "scheme missing from address, assuming http");
        format!("http://{address}")
    };

    let url = Url::parse(&candidate)
        .map_err(|e| {
            tracing::info!(address, error = %e, "invalid server url");
            LoginError::InvalidUrl(address.to_string())
        })?;
    if url.host_str().is_none() {
        tracing::info!(address, "server url has no host");
        return Err(LoginError::InvalidUrl(address.to_string()));
    }
    Ok(url)
}

/// `host:port` form used for persisted server values.
fn authority(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_prefixes_missing_scheme() {
        let url = validate_server_url("example.org:9000").unwrap();
        assert_eq!(url.scheme(), "http");
        assert_eq!(url.host_str(), Some("example.org"));
        assert_eq!(url.port(), Some(9000));
    }

    #[test]
    fn test_validate_keeps_existing_scheme() {
        let url = validate_server_url("https://example.org/").unwrap();
        assert_eq!(url.scheme(), "https");
    }

    #[test]
    fn test_validate_rejects_garbage() {
        assert!(matches!(
            validate_server_url("http://"),
            Err(LoginError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_authority_for_persisted_values() {
        let url = validate_server_url("example.org:9000").unwrap();
        assert_eq!(authority(&url), "example.org:9000");
    }
}
