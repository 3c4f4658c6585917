//! # Gridlink
//!
//! Session-establishment layer for a virtual-world client.
//!
//! Gridlink covers the two genuinely hard parts of getting a client into
//! a world: keeping one transport connection alive against a server that
//! may be down (`gridlink-transport`), and the multi-round RPC handshake
//! that turns credentials into session parameters (`gridlink-login`).
//! This crate adds the orchestrator that sequences them per credential
//! variant, persists the resulting settings, and publishes login events
//! for downstream consumers.
//!
//! Rendering, physics, UI, and application-message semantics live
//! elsewhere; they only see the inbound message channel and the session
//! parameters.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use gridlink::{LoginOrchestrator, MemorySettings};
//! use gridlink_login::HttpRpcClient;
//!
//! # async fn run() -> Result<(), gridlink::GridlinkError> {
//! let (mut orchestrator, mut events) = LoginOrchestrator::new(
//!     Arc::new(HttpRpcClient::new()),
//!     Arc::new(MemorySettings::default()),
//! );
//!
//! let mut fields = HashMap::new();
//! fields.insert("Username".to_string(), "Jane Doe".to_string());
//! fields.insert("Password".to_string(), "secret".to_string());
//! fields.insert("WorldAddress".to_string(), "example.org:9000".to_string());
//! orchestrator.process_direct_login(&fields)?;
//!
//! while let Some(event) = events.recv().await {
//!     // react to Started / Succeeded / Failed
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod orchestrator;
mod settings;

pub use error::{GridlinkError, LoginError};
pub use orchestrator::{CredentialFields, LoginEvent, LoginOrchestrator};
pub use settings::{MemorySettings, SettingsError, SettingsStore, TomlSettings};
