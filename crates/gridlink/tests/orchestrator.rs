//! Integration tests for the login orchestrator: credential validation,
//! event emission, settings persistence, and attempt replacement.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use gridlink::{
    CredentialFields, LoginError, LoginEvent, LoginOrchestrator,
    MemorySettings, SettingsStore,
};
use gridlink_login::{
    LoginPhase, RpcClient, RpcError, RpcReply, RpcRequest, RpcValue,
};

// =========================================================================
// RPC doubles
// =========================================================================

/// Pops canned replies, records every call.
#[derive(Default)]
struct ScriptedRpc {
    replies: Mutex<VecDeque<Result<RpcReply, RpcError>>>,
    calls: Mutex<Vec<(String, RpcRequest)>>,
}

impl ScriptedRpc {
    fn push_reply(&self, fields: &[(&str, RpcValue)]) {
        let map: HashMap<String, RpcValue> = fields
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(RpcReply::from_fields(map)));
    }

    fn calls(&self) -> Vec<(String, RpcRequest)> {
        self.calls.lock().unwrap().clone()
    }
}

impl RpcClient for ScriptedRpc {
    async fn call(
        &self,
        endpoint: &str,
        request: RpcRequest,
    ) -> Result<RpcReply, RpcError> {
        self.calls
            .lock()
            .unwrap()
            .push((endpoint.to_string(), request));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(RpcError::InvalidEndpoint("no scripted reply".into()))
            })
    }
}

/// Never answers; the worker stays parked in its RPC round.
struct HangingRpc;

impl RpcClient for HangingRpc {
    async fn call(
        &self,
        _endpoint: &str,
        _request: RpcRequest,
    ) -> Result<RpcReply, RpcError> {
        std::future::pending().await
    }
}

fn s(value: &str) -> RpcValue {
    RpcValue::from(value)
}

fn i(value: i64) -> RpcValue {
    RpcValue::from(value)
}

fn good_login_reply() -> Vec<(&'static str, RpcValue)> {
    vec![
        ("session_id", s("S1")),
        ("agent_id", s("A1")),
        ("circuit_code", i(7)),
        ("sim_ip", s("10.0.0.5")),
        ("sim_port", i(9010)),
    ]
}

fn direct_fields() -> CredentialFields {
    let mut fields = CredentialFields::new();
    fields.insert("Username".into(), "Jane Doe".into());
    fields.insert("Password".into(), "secret".into());
    fields.insert("WorldAddress".into(), "example.org:9000".into());
    fields
}

fn authenticated_fields() -> CredentialFields {
    let mut fields = CredentialFields::new();
    fields.insert("Username".into(), "jane".into());
    fields.insert("Password".into(), "secret".into());
    fields.insert("WorldAddress".into(), "world.example.org:9000".into());
    fields.insert(
        "AuthenticationAddress".into(),
        "auth.example.org:10001".into(),
    );
    fields
}

// =========================================================================
// Direct login
// =========================================================================

#[tokio::test]
async fn direct_login_emits_started_then_succeeded() {
    let rpc = Arc::new(ScriptedRpc::default());
    rpc.push_reply(&good_login_reply());
    let settings = Arc::new(MemorySettings::default());
    let (mut orchestrator, mut events) =
        LoginOrchestrator::new(rpc.clone(), settings);

    orchestrator.process_direct_login(&direct_fields()).unwrap();

    assert_eq!(events.recv().await, Some(LoginEvent::Started));
    match events.recv().await {
        Some(LoginEvent::Succeeded { grid_url, params }) => {
            assert_eq!(grid_url, "10.0.0.5:9010");
            assert_eq!(params.session_id, "S1");
            assert_eq!(params.circuit_code, 7);
        }
        other => panic!("expected Succeeded, got {other:?}"),
    }

    // The address was scheme-defaulted before reaching the wire.
    let calls = rpc.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "http://example.org:9000/");
}

#[tokio::test]
async fn successful_direct_login_persists_server_and_username() {
    let rpc = Arc::new(ScriptedRpc::default());
    rpc.push_reply(&good_login_reply());
    let settings = Arc::new(MemorySettings::default());
    let (mut orchestrator, mut events) =
        LoginOrchestrator::new(rpc, settings.clone());

    orchestrator.process_direct_login(&direct_fields()).unwrap();
    assert_eq!(events.recv().await, Some(LoginEvent::Started));
    assert!(matches!(
        events.recv().await,
        Some(LoginEvent::Succeeded { .. })
    ));

    assert_eq!(
        settings.get("Login", "server").as_deref(),
        Some("example.org:9000")
    );
    assert_eq!(
        settings.get("Login", "username").as_deref(),
        Some("Jane Doe")
    );
}

#[tokio::test]
async fn failed_login_emits_failed_and_persists_nothing() {
    let rpc = Arc::new(ScriptedRpc::default());
    rpc.push_reply(&[("message", s("account suspended"))]);
    let settings = Arc::new(MemorySettings::default());
    let (mut orchestrator, mut events) =
        LoginOrchestrator::new(rpc, settings.clone());

    orchestrator.process_direct_login(&direct_fields()).unwrap();
    assert_eq!(events.recv().await, Some(LoginEvent::Started));
    assert_eq!(
        events.recv().await,
        Some(LoginEvent::Failed {
            message: "account suspended".into()
        })
    );

    assert_eq!(settings.get("Login", "server"), None);
    assert_eq!(settings.get("Login", "username"), None);
}

// =========================================================================
// Validation
// =========================================================================

#[tokio::test]
async fn single_word_username_is_rejected_before_any_call() {
    let rpc = Arc::new(ScriptedRpc::default());
    let (mut orchestrator, mut events) =
        LoginOrchestrator::new(rpc.clone(), Arc::new(MemorySettings::default()));

    let mut fields = direct_fields();
    fields.insert("Username".into(), "Jane".into());

    assert!(matches!(
        orchestrator.process_direct_login(&fields),
        Err(LoginError::MalformedUsername(_))
    ));
    assert!(rpc.calls().is_empty());
    assert!(events.try_recv().is_err());
    assert_eq!(orchestrator.session().phase(), LoginPhase::Idle);
}

#[tokio::test]
async fn three_word_username_is_rejected() {
    let rpc = Arc::new(ScriptedRpc::default());
    let (mut orchestrator, _events) =
        LoginOrchestrator::new(rpc, Arc::new(MemorySettings::default()));

    let mut fields = direct_fields();
    fields.insert("Username".into(), "Jane van Doe".into());
    assert!(matches!(
        orchestrator.process_direct_login(&fields),
        Err(LoginError::MalformedUsername(_))
    ));
}

#[tokio::test]
async fn missing_password_is_rejected() {
    let rpc = Arc::new(ScriptedRpc::default());
    let (mut orchestrator, _events) =
        LoginOrchestrator::new(rpc, Arc::new(MemorySettings::default()));

    let mut fields = direct_fields();
    fields.remove("Password");
    assert!(matches!(
        orchestrator.process_direct_login(&fields),
        Err(LoginError::MissingField("Password"))
    ));
}

#[tokio::test]
async fn unparseable_world_address_is_rejected() {
    let rpc = Arc::new(ScriptedRpc::default());
    let (mut orchestrator, _events) =
        LoginOrchestrator::new(rpc, Arc::new(MemorySettings::default()));

    let mut fields = direct_fields();
    fields.insert("WorldAddress".into(), "http://".into());
    assert!(matches!(
        orchestrator.process_direct_login(&fields),
        Err(LoginError::InvalidUrl(_))
    ));
}

// =========================================================================
// Authenticated login
// =========================================================================

#[tokio::test]
async fn authenticated_login_persists_all_three_keys() {
    let rpc = Arc::new(ScriptedRpc::default());
    rpc.push_reply(&[
        ("session_hash", s("HASH-1")),
        ("grid_url", s("world.example.org:9000")),
    ]);
    rpc.push_reply(&[
        ("session_id", s("S2")),
        ("agent_id", s("A2")),
        ("circuit_code", i(11)),
    ]);
    let settings = Arc::new(MemorySettings::default());
    let (mut orchestrator, mut events) =
        LoginOrchestrator::new(rpc.clone(), settings.clone());

    orchestrator
        .process_authenticated_login(&authenticated_fields())
        .unwrap();
    assert_eq!(events.recv().await, Some(LoginEvent::Started));
    assert!(matches!(
        events.recv().await,
        Some(LoginEvent::Succeeded { .. })
    ));

    assert_eq!(
        settings.get("Login", "rex_server").as_deref(),
        Some("world.example.org:9000")
    );
    assert_eq!(
        settings.get("Login", "auth_server").as_deref(),
        Some("auth.example.org:10001")
    );
    assert_eq!(settings.get("Login", "auth_name").as_deref(), Some("jane"));

    assert_eq!(rpc.calls().len(), 2);
    assert_eq!(rpc.calls()[0].1.method(), "authenticate");
}

// =========================================================================
// URL login
// =========================================================================

#[tokio::test]
async fn url_login_succeeds_without_touching_settings() {
    let rpc = Arc::new(ScriptedRpc::default());
    rpc.push_reply(&good_login_reply());
    let settings = Arc::new(MemorySettings::default());
    let (mut orchestrator, mut events) =
        LoginOrchestrator::new(rpc.clone(), settings.clone());

    orchestrator
        .process_url_login(
            "world.example.org:9000",
            "http://id.example.org/jane",
        )
        .unwrap();
    assert_eq!(events.recv().await, Some(LoginEvent::Started));
    assert!(matches!(
        events.recv().await,
        Some(LoginEvent::Succeeded { .. })
    ));

    assert_eq!(settings.get("Login", "server"), None);
    assert_eq!(settings.get("Login", "rex_server"), None);

    let calls = rpc.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].1.param("account"),
        Some(&s("http://id.example.org/jane"))
    );
}

// =========================================================================
// Attempt lifecycle
// =========================================================================

#[tokio::test]
async fn new_attempt_replaces_a_stuck_one() {
    // First attempt parks forever in its RPC round.
    let hanging = Arc::new(HangingRpc);
    let settings = Arc::new(MemorySettings::default());
    let (mut stuck, _stuck_events) =
        LoginOrchestrator::new(hanging, settings.clone());
    stuck.process_direct_login(&direct_fields()).unwrap();
    let stale = stuck.session();
    assert!(!stale.is_terminal());

    // A replacement against a responsive server completes normally.
    let rpc = Arc::new(ScriptedRpc::default());
    rpc.push_reply(&good_login_reply());
    let (mut orchestrator, mut events) =
        LoginOrchestrator::new(rpc, settings);
    orchestrator.process_direct_login(&direct_fields()).unwrap();

    assert_eq!(events.recv().await, Some(LoginEvent::Started));
    assert!(matches!(
        events.recv().await,
        Some(LoginEvent::Succeeded { .. })
    ));
    assert_eq!(
        orchestrator.session().phase(),
        LoginPhase::ReplyReceived
    );
}

#[tokio::test]
async fn reinvoking_aborts_the_previous_worker() {
    let hanging = Arc::new(HangingRpc);
    let settings = Arc::new(MemorySettings::default());
    let (mut orchestrator, mut events) =
        LoginOrchestrator::new(hanging, settings);

    orchestrator.process_direct_login(&direct_fields()).unwrap();
    let first = orchestrator.session();

    orchestrator.process_direct_login(&direct_fields()).unwrap();
    let second = orchestrator.session();

    // Each attempt gets a fresh record; the stale one stops moving.
    assert_eq!(events.recv().await, Some(LoginEvent::Started));
    assert_eq!(events.recv().await, Some(LoginEvent::Started));

    // Let the surviving worker reach its RPC round.
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
    assert_ne!(first.phase(), LoginPhase::Idle);
    assert!(!first.is_terminal());
    assert_eq!(second.phase(), LoginPhase::WaitingForReply);
}

#[tokio::test]
async fn cancel_marks_the_attempt_failed() {
    let hanging = Arc::new(HangingRpc);
    let (mut orchestrator, mut events) =
        LoginOrchestrator::new(hanging, Arc::new(MemorySettings::default()));

    orchestrator.process_direct_login(&direct_fields()).unwrap();
    assert_eq!(events.recv().await, Some(LoginEvent::Started));

    orchestrator.cancel_login();
    let session = orchestrator.session();
    assert_eq!(session.phase(), LoginPhase::Failed);
    assert_eq!(session.error_message(), "login cancelled");
}

#[tokio::test]
async fn cancel_never_rewrites_a_finished_attempt() {
    let rpc = Arc::new(ScriptedRpc::default());
    rpc.push_reply(&good_login_reply());
    let (mut orchestrator, mut events) =
        LoginOrchestrator::new(rpc, Arc::new(MemorySettings::default()));

    orchestrator.process_direct_login(&direct_fields()).unwrap();
    assert_eq!(events.recv().await, Some(LoginEvent::Started));
    assert!(matches!(
        events.recv().await,
        Some(LoginEvent::Succeeded { .. })
    ));

    orchestrator.cancel_login();
    assert_eq!(
        orchestrator.session().phase(),
        LoginPhase::ReplyReceived
    );
}
