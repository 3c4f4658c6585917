//! Login handshake engine for Gridlink.
//!
//! This crate performs the one- or two-round RPC exchange that
//! authenticates a user and yields session parameters:
//!
//! 1. **Credentials** ([`Credentials`]) — a closed sum type over the
//!    supported login variants.
//! 2. **Session state** ([`SessionHandle`], [`LoginPhase`],
//!    [`SessionParams`]) — the thread-shared record the background worker
//!    writes and the foreground polls.
//! 3. **RPC seam** ([`RpcClient`], [`HttpRpcClient`]) — a generic
//!    method/params/options call against a configurable endpoint.
//! 4. **The worker** ([`spawn_login`]) — runs the handshake off the tick
//!    loop so blocking network calls cannot stall the UI.
//!
//! # How it fits in the stack
//!
//! ```text
//! Login Orchestrator (above)  ← picks the variant, starts the worker
//!     ↕
//! Handshake Engine (this crate)  ← talks RPC, fills in SessionParams
//!     ↕
//! HTTP (below)  ← reqwest, or a scripted client in tests
//! ```
//!
//! No error value ever crosses the worker boundary directly: the session
//! record is the sole channel between the worker and the foreground.

#![allow(async_fn_in_trait)]

mod credentials;
mod engine;
mod fingerprint;
mod rpc;
mod state;

pub use credentials::Credentials;
pub use engine::{LoginRequest, spawn_login};
pub use fingerprint::DeviceFingerprint;
pub use rpc::{HttpRpcClient, RpcClient, RpcError, RpcReply, RpcRequest, RpcValue};
pub use state::{LoginPhase, SessionHandle, SessionParams};
