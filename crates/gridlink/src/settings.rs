//! Durable configuration store for login-derived settings.
//!
//! The orchestrator persists resolved server/username/authentication
//! values under a `Login` section once a handshake succeeds, so the next
//! session can prefill them. The [`SettingsStore`] trait is the seam:
//! [`TomlSettings`] writes a TOML file on disk; [`MemorySettings`] backs
//! development and tests. Keys are created if absent and updated
//! otherwise; a failed attempt never touches the store.

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

/// Section name → key → value. BTreeMap keeps the file output stable.
type Sections = BTreeMap<String, BTreeMap<String, String>>;

/// Errors that can occur while loading or persisting settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Reading or writing the backing file failed.
    #[error("settings io failed: {0}")]
    Io(#[from] io::Error),

    /// The backing file exists but is not valid TOML.
    #[error("settings file is not valid toml: {0}")]
    Parse(#[from] toml::de::Error),

    /// The in-memory table could not be serialized.
    #[error("settings serialization failed: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// A durable section/key/value store.
///
/// Implementations serialize their own writes; callers may share one
/// store across tasks behind an `Arc`.
pub trait SettingsStore: Send + Sync + 'static {
    /// Creates or updates one key under a section.
    ///
    /// # Errors
    /// Persistence failures only; setting an existing key is an update,
    /// not an error.
    fn set(
        &self,
        section: &str,
        key: &str,
        value: &str,
    ) -> Result<(), SettingsError>;

    /// Reads one key, if present.
    fn get(&self, section: &str, key: &str) -> Option<String>;
}

/// File-backed [`SettingsStore`] in TOML format.
pub struct TomlSettings {
    path: PathBuf,
    sections: Mutex<Sections>,
}

impl TomlSettings {
    /// Opens (or lazily creates) the settings file at `path`.
    ///
    /// A missing file is an empty store; the file appears on the first
    /// write.
    ///
    /// # Errors
    /// Returns [`SettingsError::Parse`] for an existing but malformed
    /// file, [`SettingsError::Io`] for any other read failure.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let sections = match std::fs::read_to_string(&path) {
            Ok(text) => toml::from_str(&text)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Sections::default()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            sections: Mutex::new(sections),
        })
    }

    fn save(&self, sections: &Sections) -> Result<(), SettingsError> {
        let text = toml::to_string_pretty(sections)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, text)?;
        Ok(())
    }
}

impl SettingsStore for TomlSettings {
    fn set(
        &self,
        section: &str,
        key: &str,
        value: &str,
    ) -> Result<(), SettingsError> {
        let mut sections =
            self.sections.lock().expect("settings lock poisoned");
        sections
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        self.save(&sections)
    }

    fn get(&self, section: &str, key: &str) -> Option<String> {
        self.sections
            .lock()
            .expect("settings lock poisoned")
            .get(section)?
            .get(key)
            .cloned()
    }
}

/// In-memory [`SettingsStore`] for development and tests. Nothing is
/// persisted across processes.
#[derive(Default)]
pub struct MemorySettings {
    sections: Mutex<Sections>,
}

impl SettingsStore for MemorySettings {
    fn set(
        &self,
        section: &str,
        key: &str,
        value: &str,
    ) -> Result<(), SettingsError> {
        self.sections
            .lock()
            .expect("settings lock poisoned")
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, section: &str, key: &str) -> Option<String> {
        self.sections
            .lock()
            .expect("settings lock poisoned")
            .get(section)?
            .get(key)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!(
            "gridlink-settings-{}-{}.toml",
            name,
            std::process::id()
        ));
        path
    }

    #[test]
    fn test_memory_store_create_then_update() {
        let store = MemorySettings::default();
        assert_eq!(store.get("Login", "server"), None);

        store.set("Login", "server", "example.org:9000").unwrap();
        assert_eq!(
            store.get("Login", "server").as_deref(),
            Some("example.org:9000")
        );

        store.set("Login", "server", "other.org:9000").unwrap();
        assert_eq!(
            store.get("Login", "server").as_deref(),
            Some("other.org:9000")
        );
    }

    #[test]
    fn test_toml_store_roundtrips_through_the_file() {
        let path = temp_path("roundtrip");
        let _ = std::fs::remove_file(&path);

        let store = TomlSettings::open(&path).unwrap();
        store.set("Login", "username", "Jane Doe").unwrap();
        store.set("Login", "server", "example.org:9000").unwrap();
        drop(store);

        let reopened = TomlSettings::open(&path).unwrap();
        assert_eq!(
            reopened.get("Login", "username").as_deref(),
            Some("Jane Doe")
        );
        assert_eq!(
            reopened.get("Login", "server").as_deref(),
            Some("example.org:9000")
        );

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file_is_an_empty_store() {
        let path = temp_path("missing");
        let _ = std::fs::remove_file(&path);
        let store = TomlSettings::open(&path).unwrap();
        assert_eq!(store.get("Login", "server"), None);
    }

    #[test]
    fn test_malformed_file_is_rejected() {
        let path = temp_path("malformed");
        std::fs::write(&path, "not [valid toml").unwrap();
        assert!(matches!(
            TomlSettings::open(&path),
            Err(SettingsError::Parse(_))
        ));
        let _ = std::fs::remove_file(&path);
    }
}
