//! Login credentials: a closed sum type over the supported variants.
//!
//! The three variants drive different handshake flows:
//!
//! - [`Credentials::Direct`] — first/last name and password; a single
//!   login round against the world server.
//! - [`Credentials::Authenticated`] — an account on a separate
//!   authentication service; an authentication round first, then the
//!   login round carrying the session hash forward.
//! - [`Credentials::WebUrl`] — identity arrives as a pre-resolved URL
//!   (e.g. extracted from a web callback); a single login round with no
//!   username/password round-trip.
//!
//! The handshake engine dispatches on the discriminant in one `match`;
//! adding a variant forces every flow decision to be revisited.

use url::Url;

/// Identity material for one login attempt.
///
/// Created by the UI/CLI layer, consumed read-only by the handshake
/// engine and orchestrator. Replaced wholesale on each new attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Plain world-server login.
    Direct {
        /// Avatar first name.
        first_name: String,
        /// Avatar last name.
        last_name: String,
        /// Cleartext password; hashed before it ever leaves the process.
        password: String,
    },

    /// Login via a separate authentication service.
    Authenticated {
        /// Account name on the authentication service.
        account: String,
        /// Cleartext password; hashed before it ever leaves the process.
        password: String,
        /// Address of the authentication service.
        auth_url: Url,
    },

    /// Login with a pre-resolved identity URL.
    WebUrl {
        /// The identity URL handed back by the web login flow.
        identity_url: String,
    },
}

impl Credentials {
    /// True when this variant performs the authentication round before
    /// the login round.
    pub fn requires_authentication(&self) -> bool {
        matches!(self, Credentials::Authenticated { .. })
    }

    /// The password to fingerprint, when the variant carries one.
    pub fn password(&self) -> Option<&str> {
        match self {
            Credentials::Direct { password, .. }
            | Credentials::Authenticated { password, .. } => Some(password),
            Credentials::WebUrl { .. } => None,
        }
    }
}
