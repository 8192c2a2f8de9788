//! Supervisor settings.
//!
//! Settings can be built in code or read from a JSON file:
//!
//! ```json
//! {
//!   "registry_path": "/srv/bots/servers.json",
//!   "action_timeout_secs": 30,
//!   "kill_on_timeout": true,
//!   "history_limit": 500
//! }
//! ```
//!
//! Every field is optional.
use crate::error::{Error, Result};
use crate::registry::{resolve_registry_path, RegistryPathResolution};
use crate::server::lifecycle::DEFAULT_HISTORY_LIMIT;
use crate::server::DispatchOptions;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings for a [`Supervisor`](crate::Supervisor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SupervisorConfig {
    /// Registry file. Falls back to `SERVER_MANAGE_REGISTRY`, then
    /// `./.servers/servers.json`.
    pub registry_path: Option<PathBuf>,

    /// Upper bound on each lifecycle executable. `None` waits indefinitely.
    #[serde(rename = "action_timeout_secs", with = "duration_secs")]
    pub action_timeout: Option<Duration>,

    /// Kill an executable that exceeds `action_timeout`.
    pub kill_on_timeout: bool,

    /// Number of lifecycle events kept in memory.
    pub history_limit: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            registry_path: None,
            action_timeout: None,
            kill_on_timeout: true,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl SupervisorConfig {
    /// Loads settings from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the file does not exist and
    /// [`Error::Format`] if it is not a valid settings object.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::NotFound(path.to_path_buf()),
            _ => Error::io(path, e),
        })?;

        Self::parse_from_str(&content)
    }

    /// Parses settings from a JSON string.
    pub fn parse_from_str(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| Error::Format(format!("Failed to parse supervisor settings: {}", e)))
    }

    /// Sets the registry file.
    pub fn with_registry_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.registry_path = Some(path.into());
        self
    }

    /// Sets the per-executable timeout.
    pub fn with_action_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout = Some(timeout);
        self
    }

    /// Where the registry lives, after applying the environment and default.
    pub fn resolve_registry_path(&self) -> RegistryPathResolution {
        resolve_registry_path(self.registry_path.as_deref())
    }

    pub(crate) fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            timeout: self.action_timeout,
            kill_on_timeout: self.kill_on_timeout,
            cancel: None,
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&duration.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<f64>::deserialize(deserializer)?
            .map(|secs| Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_settings() {
        let config = SupervisorConfig::parse_from_str(
            r#"{"registry_path": "/srv/servers.json", "action_timeout_secs": 1.5}"#,
        )
        .unwrap();

        assert_eq!(config.registry_path, Some(PathBuf::from("/srv/servers.json")));
        assert_eq!(config.action_timeout, Some(Duration::from_millis(1500)));
        assert!(config.kill_on_timeout);
        assert_eq!(config.history_limit, DEFAULT_HISTORY_LIMIT);
    }

    #[test]
    fn test_empty_object_is_default() {
        assert_eq!(
            SupervisorConfig::parse_from_str("{}").unwrap(),
            SupervisorConfig::default()
        );
    }

    #[test]
    fn test_rejects_unknown_and_negative() {
        assert!(SupervisorConfig::parse_from_str(r#"{"registry": "x"}"#).is_err());
        assert!(SupervisorConfig::parse_from_str(r#"{"action_timeout_secs": -1}"#).is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("supervisor.json");
        std::fs::write(&path, r#"{"kill_on_timeout": false, "history_limit": 10}"#).unwrap();

        let config = SupervisorConfig::from_file(&path).unwrap();
        assert!(!config.kill_on_timeout);
        assert_eq!(config.history_limit, 10);
        assert_eq!(config.action_timeout, None);

        let missing = dir.path().join("missing.json");
        assert!(matches!(
            SupervisorConfig::from_file(&missing),
            Err(Error::NotFound(ref p)) if *p == missing
        ));

        std::fs::write(&path, "{kill_on_timeout: false").unwrap();
        assert!(matches!(
            SupervisorConfig::from_file(&path),
            Err(Error::Format(_))
        ));
    }
}
