//! Session state: the record a login attempt writes and the UI polls.
//!
//! One [`SessionHandle`] is created per login attempt. The background
//! worker holds exclusive write access for the duration of that attempt;
//! the foreground reads through the same handle at any time. All access
//! goes through an explicit mutex — small scalar reads are not assumed
//! to be atomic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Progress of one login attempt.
///
/// This is a state machine with two terminal states:
///
/// ```text
///   Idle → Init → WaitingForReply ──→ AuthReplyReceived ──→ ReplyReceived
///                      │                     │
///                      └────→ Failed ←───────┘
/// ```
///
/// - **Idle**: no attempt has been started. This is the neutral default
///   a getter reports before the worker exists — distinct from any
///   in-flight or terminal state.
/// - **Init**: the attempt is configured but the worker hasn't begun.
/// - **WaitingForReply**: an RPC round is in flight.
/// - **AuthReplyReceived**: round 1 (authentication) succeeded; the
///   session hash and derived URLs are available.
/// - **ReplyReceived**: success terminal. All session parameters are set.
/// - **Failed**: failure terminal, reachable from any point. The error
///   message carries the best-available text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginPhase {
    /// No attempt started yet.
    Idle,
    /// Attempt configured, worker not yet running.
    Init,
    /// An RPC round is in flight.
    WaitingForReply,
    /// Authentication round succeeded; login round still to come.
    AuthReplyReceived,
    /// Success terminal: session parameters are complete.
    ReplyReceived,
    /// Failure terminal: see the error message.
    Failed,
}

impl LoginPhase {
    /// True for the two terminal phases.
    pub fn is_terminal(self) -> bool {
        matches!(self, LoginPhase::ReplyReceived | LoginPhase::Failed)
    }
}

/// Output parameters of a successful handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionParams {
    /// Opaque session identifier from the login reply.
    pub session_id: String,
    /// The authenticated agent's identifier.
    pub agent_id: String,
    /// Session-scoped integer required for transport-level binding.
    /// Zero means "not issued".
    pub circuit_code: u32,
    /// Resolved simulator address: host, plus `:port` when one was
    /// returned.
    pub grid_url: String,
    /// Hash carried from the authentication round into the login round.
    pub session_hash: String,
    /// Avatar storage service URL from the authentication round.
    pub avatar_storage_url: String,
}

#[derive(Debug)]
struct SessionRecord {
    phase: LoginPhase,
    params: SessionParams,
    error: String,
}

/// Cloneable handle to one login attempt's shared state.
///
/// Create one per attempt; never hand a handle still owned by an
/// in-flight worker to a new worker. Writers are crate-internal so that
/// only the engine (and [`SessionHandle::mark_cancelled`], for owners
/// that have already stopped the worker) can mutate the record.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    started: Arc<AtomicBool>,
    record: Arc<Mutex<SessionRecord>>,
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHandle {
    /// Creates a fresh, not-yet-started record.
    pub fn new() -> Self {
        Self {
            started: Arc::new(AtomicBool::new(false)),
            record: Arc::new(Mutex::new(SessionRecord {
                phase: LoginPhase::Init,
                params: SessionParams::default(),
                error: String::new(),
            })),
        }
    }

    /// Current phase. Reports [`LoginPhase::Idle`] until the attempt has
    /// been explicitly started, whatever the record holds.
    pub fn phase(&self) -> LoginPhase {
        if !self.started.load(Ordering::Acquire) {
            return LoginPhase::Idle;
        }
        self.lock().phase
    }

    /// Snapshot of the output parameters.
    pub fn params(&self) -> SessionParams {
        self.lock().params.clone()
    }

    /// The captured error message; empty unless the attempt failed.
    pub fn error_message(&self) -> String {
        self.lock().error.clone()
    }

    /// True once the attempt reached `ReplyReceived` or `Failed`.
    pub fn is_terminal(&self) -> bool {
        self.phase().is_terminal()
    }

    /// Records an externally cancelled attempt as failed.
    ///
    /// Only call after the worker has been stopped; a no-op if the
    /// attempt already reached a terminal phase.
    pub fn mark_cancelled(&self) {
        self.started.store(true, Ordering::Release);
        let mut record = self.lock();
        if !record.phase.is_terminal() {
            record.phase = LoginPhase::Failed;
            record.error = "login cancelled".to_string();
        }
    }

    pub(crate) fn mark_started(&self) {
        self.started.store(true, Ordering::Release);
    }

    pub(crate) fn set_phase(&self, phase: LoginPhase) {
        self.lock().phase = phase;
    }

    pub(crate) fn fail(&self, message: impl Into<String>) {
        let mut record = self.lock();
        record.phase = LoginPhase::Failed;
        record.error = message.into();
    }

    pub(crate) fn update_params(
        &self,
        update: impl FnOnce(&mut SessionParams),
    ) {
        update(&mut self.lock().params);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionRecord> {
        self.record.lock().expect("session record lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_is_idle_until_started() {
        let handle = SessionHandle::new();
        assert_eq!(handle.phase(), LoginPhase::Idle);
        assert!(!handle.is_terminal());

        handle.mark_started();
        assert_eq!(handle.phase(), LoginPhase::Init);
    }

    #[test]
    fn test_fail_captures_message_and_terminates() {
        let handle = SessionHandle::new();
        handle.mark_started();
        handle.fail("no route to host");

        assert_eq!(handle.phase(), LoginPhase::Failed);
        assert!(handle.is_terminal());
        assert_eq!(handle.error_message(), "no route to host");
    }

    #[test]
    fn test_params_snapshot_is_independent() {
        let handle = SessionHandle::new();
        handle.mark_started();
        handle.update_params(|p| p.session_id = "S1".to_string());

        let snapshot = handle.params();
        handle.update_params(|p| p.session_id = "S2".to_string());

        assert_eq!(snapshot.session_id, "S1");
        assert_eq!(handle.params().session_id, "S2");
    }

    #[test]
    fn test_cancel_does_not_overwrite_terminal_state() {
        let handle = SessionHandle::new();
        handle.mark_started();
        handle.set_phase(LoginPhase::ReplyReceived);

        handle.mark_cancelled();
        assert_eq!(handle.phase(), LoginPhase::ReplyReceived);
        assert!(handle.error_message().is_empty());
    }

    #[test]
    fn test_cancel_before_start_is_observable() {
        let handle = SessionHandle::new();
        handle.mark_cancelled();
        assert_eq!(handle.phase(), LoginPhase::Failed);
        assert_eq!(handle.error_message(), "login cancelled");
    }
}
