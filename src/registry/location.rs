//! Registry file location.
//!
//! Resolution order:
//! 1. Explicit path provided by the caller (highest priority)
//! 2. `SERVER_MANAGE_REGISTRY` environment variable
//! 3. `./.servers/servers.json` relative to the working directory

use std::env;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the default registry location.
pub const REGISTRY_ENV_VAR: &str = "SERVER_MANAGE_REGISTRY";

/// Directory, relative to the working directory, holding the default registry.
pub const DEFAULT_REGISTRY_DIR: &str = ".servers";

/// File name of the default registry.
pub const DEFAULT_REGISTRY_FILE: &str = "servers.json";

/// Where a resolved registry path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryPathSource {
    /// Supplied by the caller.
    Explicit,
    /// Read from [`REGISTRY_ENV_VAR`].
    EnvVar,
    /// Built-in default.
    Default,
}

/// A resolved registry path and its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryPathResolution {
    pub path: PathBuf,
    pub source: RegistryPathSource,
}

/// `./.servers/servers.json`.
pub fn default_registry_path() -> PathBuf {
    Path::new(".")
        .join(DEFAULT_REGISTRY_DIR)
        .join(DEFAULT_REGISTRY_FILE)
}

/// Resolve the registry path from an explicit override, env var, or default.
pub fn resolve_registry_path(explicit: Option<&Path>) -> RegistryPathResolution {
    if let Some(path) = explicit {
        return RegistryPathResolution {
            path: path.to_path_buf(),
            source: RegistryPathSource::Explicit,
        };
    }

    if let Ok(env_path) = env::var(REGISTRY_ENV_VAR) {
        if !env_path.trim().is_empty() {
            return RegistryPathResolution {
                path: PathBuf::from(env_path),
                source: RegistryPathSource::EnvVar,
            };
        }
    }

    RegistryPathResolution {
        path: default_registry_path(),
        source: RegistryPathSource::Default,
    }
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_path() {
        assert_eq!(default_registry_path(), PathBuf::from("./.servers/servers.json"));
    }

    // One test touches the variable so parallel tests never observe it half-set.
    #[test]
    fn test_resolution_order() {
        let prev = env::var(REGISTRY_ENV_VAR).ok();

        unsafe {
            env::set_var(REGISTRY_ENV_VAR, "/tmp/from-env.json");
        }
        let resolved = resolve_registry_path(Some(Path::new("/tmp/explicit.json")));
        assert_eq!(resolved.source, RegistryPathSource::Explicit);
        assert_eq!(resolved.path, PathBuf::from("/tmp/explicit.json"));

        let resolved = resolve_registry_path(None);
        assert_eq!(resolved.source, RegistryPathSource::EnvVar);
        assert_eq!(resolved.path, PathBuf::from("/tmp/from-env.json"));

        unsafe {
            env::set_var(REGISTRY_ENV_VAR, "  ");
        }
        let resolved = resolve_registry_path(None);
        assert_eq!(resolved.source, RegistryPathSource::Default);
        assert_eq!(resolved.path, default_registry_path());

        unsafe {
            match prev {
                Some(value) => env::set_var(REGISTRY_ENV_VAR, value),
                None => env::remove_var(REGISTRY_ENV_VAR),
            }
        }
    }
}
