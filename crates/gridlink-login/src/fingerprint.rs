//! Device fingerprint: the one-way hashed identity tokens sent with
//! every login call.
//!
//! Three digests travel on the wire — the password, a MAC-address
//! token, and a hardware-id token. All are MD5 hex digests; the
//! password digest carries the fixed `$1$` prefix tag the login service
//! expects. The MAC and hardware tokens are opaque: the server compares
//! them against earlier logins, nothing validates them locally, and the
//! underlying cleartext never leaves the process.

/// The hashed identity tokens for one login call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFingerprint {
    /// `$1$` + MD5 hex digest of the password.
    pub password_hash: String,
    /// MD5 hex digest of the MAC-address token.
    pub mac_hash: String,
    /// MD5 hex digest of the hardware-id token.
    pub id0_hash: String,
}

impl DeviceFingerprint {
    /// Hashes explicit password, MAC, and hardware-id strings.
    pub fn new(password: &str, mac_addr: &str, hardware_id: &str) -> Self {
        Self {
            password_hash: format!("$1${}", md5_hex(password)),
            mac_hash: md5_hex(mac_addr),
            id0_hash: md5_hex(hardware_id),
        }
    }

    /// Builds a fingerprint from best-effort local machine identity.
    ///
    /// The tokens only need to be stable per machine, not globally
    /// meaningful — the server treats them as opaque.
    pub fn local(password: &str) -> Self {
        Self::new(password, &machine_token(), &hardware_token())
    }
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}

/// A stable per-machine token standing in for the MAC address.
fn machine_token() -> String {
    if let Ok(hostname) = std::fs::read_to_string("/etc/hostname") {
        let hostname = hostname.trim();
        if !hostname.is_empty() {
            return hostname.to_string();
        }
    }
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "unknown-host".to_string())
}

/// A stable per-installation token standing in for a hardware serial.
fn hardware_token() -> String {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| "/".to_string())
}
