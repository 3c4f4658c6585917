//! Generic RPC client seam for the login handshake.
//!
//! The handshake engine doesn't care how calls reach the server — it
//! builds an [`RpcRequest`] (method name, ordered named parameters, an
//! options array of fixed string flags) and reads typed fields out of an
//! [`RpcReply`]. The [`RpcClient`] trait is the seam:
//!
//! - Production uses [`HttpRpcClient`] — one HTTP POST per call with a
//!   JSON body, against a configurable `address:port` endpoint.
//! - Tests script a mock client with canned replies.
//!
//! A missing required reply field is a *handshake* failure
//! ([`RpcError::MissingField`]), distinct from a transport failure.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A parameter or reply value. The wire carries strings and integers
/// only; anything richer belongs to the application layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcValue {
    /// An integer value.
    Int(i64),
    /// A string value.
    Str(String),
}

impl From<&str> for RpcValue {
    fn from(value: &str) -> Self {
        RpcValue::Str(value.to_string())
    }
}

impl From<String> for RpcValue {
    fn from(value: String) -> Self {
        RpcValue::Str(value)
    }
}

impl From<i64> for RpcValue {
    fn from(value: i64) -> Self {
        RpcValue::Int(value)
    }
}

/// One outbound RPC call: a method, its named parameters in order, and
/// the options flag array.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcRequest {
    method: String,
    params: Vec<(String, RpcValue)>,
    options: Vec<String>,
}

impl RpcRequest {
    /// Starts an empty call for `method`.
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            params: Vec::new(),
            options: Vec::new(),
        }
    }

    /// Appends a named parameter. Order is preserved on the wire.
    pub fn add_param(
        &mut self,
        name: impl Into<String>,
        value: impl Into<RpcValue>,
    ) {
        self.params.push((name.into(), value.into()));
    }

    /// Appends one flag to the options array.
    pub fn add_option(&mut self, flag: impl Into<String>) {
        self.options.push(flag.into());
    }

    /// The method name.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The named parameters, in insertion order.
    pub fn params(&self) -> &[(String, RpcValue)] {
        &self.params
    }

    /// Looks up a parameter by name.
    pub fn param(&self, name: &str) -> Option<&RpcValue> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// The options flags, in insertion order.
    pub fn options(&self) -> &[String] {
        &self.options
    }
}

/// A decoded reply: field name to typed value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RpcReply {
    fields: HashMap<String, RpcValue>,
}

impl RpcReply {
    /// Wraps a decoded field map.
    pub fn from_fields(fields: HashMap<String, RpcValue>) -> Self {
        Self { fields }
    }

    /// Raw access to one field.
    pub fn get(&self, name: &str) -> Option<&RpcValue> {
        self.fields.get(name)
    }

    /// A required string field.
    ///
    /// # Errors
    /// [`RpcError::MissingField`] when absent, [`RpcError::WrongType`]
    /// when present but not a string.
    pub fn string(&self, name: &str) -> Result<String, RpcError> {
        match self.fields.get(name) {
            Some(RpcValue::Str(s)) => Ok(s.clone()),
            Some(_) => Err(RpcError::WrongType {
                field: name.to_string(),
                expected: "string",
            }),
            None => Err(RpcError::MissingField(name.to_string())),
        }
    }

    /// A required integer field.
    ///
    /// # Errors
    /// [`RpcError::MissingField`] when absent, [`RpcError::WrongType`]
    /// when present but not an integer.
    pub fn int(&self, name: &str) -> Result<i64, RpcError> {
        match self.fields.get(name) {
            Some(RpcValue::Int(i)) => Ok(*i),
            Some(_) => Err(RpcError::WrongType {
                field: name.to_string(),
                expected: "integer",
            }),
            None => Err(RpcError::MissingField(name.to_string())),
        }
    }

    /// An optional string field; `None` when absent or mistyped.
    pub fn opt_string(&self, name: &str) -> Option<String> {
        match self.fields.get(name) {
            Some(RpcValue::Str(s)) => Some(s.clone()),
            _ => None,
        }
    }

    /// An optional integer field; `None` when absent or mistyped.
    pub fn opt_int(&self, name: &str) -> Option<i64> {
        match self.fields.get(name) {
            Some(RpcValue::Int(i)) => Some(*i),
            _ => None,
        }
    }
}

/// Errors that can occur on an RPC call.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// The HTTP layer failed: unreachable endpoint, non-success status,
    /// or a body that wasn't a field map.
    #[error("rpc transport failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint string wasn't a usable URL.
    #[error("invalid rpc endpoint: {0}")]
    InvalidEndpoint(String),

    /// A required reply field was absent.
    #[error("reply missing required field \"{0}\"")]
    MissingField(String),

    /// A reply field had the wrong type.
    #[error("reply field \"{field}\" is not a {expected}")]
    WrongType {
        /// Name of the offending field.
        field: String,
        /// What the handshake needed it to be.
        expected: &'static str,
    },
}

/// Issues RPC calls against an endpoint.
///
/// `Send + Sync + 'static` because the client is shared with the spawned
/// login worker and lives as long as the orchestrator.
pub trait RpcClient: Send + Sync + 'static {
    /// Performs one call and decodes the reply field map.
    ///
    /// # Errors
    /// Transport-level failures only; field-level problems surface when
    /// the caller reads the reply.
    fn call(
        &self,
        endpoint: &str,
        request: RpcRequest,
    ) -> impl Future<Output = Result<RpcReply, RpcError>> + Send;
}

/// The production [`RpcClient`]: RPC-over-HTTP with a JSON body.
#[derive(Debug, Clone, Default)]
pub struct HttpRpcClient {
    http: reqwest::Client,
}

impl HttpRpcClient {
    /// Creates a client with default HTTP settings.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RpcClient for HttpRpcClient {
    async fn call(
        &self,
        endpoint: &str,
        request: RpcRequest,
    ) -> Result<RpcReply, RpcError> {
        tracing::debug!(endpoint, method = request.method(), "rpc call");
        let response = self
            .http
            .post(endpoint)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;
        let fields: HashMap<String, RpcValue> = response.json().await?;
        Ok(RpcReply::from_fields(fields))
    }
}
