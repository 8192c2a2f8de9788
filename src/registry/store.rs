use crate::error::{Error, Result};
use crate::registry::Registry;
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Loads a registry from a JSON file.
///
/// The file must hold a single JSON object mapping server names to path
/// strings:
///
/// ```json
/// {
///   "alice": "/srv/bots/alice",
///   "bob": "/srv/bots/bob"
/// }
/// ```
///
/// Every path is normalized on the way in.
///
/// # Errors
///
/// Returns an error if:
/// * The file does not exist ([`Error::NotFound`])
/// * The file cannot be read ([`Error::Io`])
/// * The content is not a name-to-string object, or repeats a name ([`Error::Format`])
#[tracing::instrument(skip(path), fields(registry_path = ?path.as_ref()))]
pub fn load(path: impl AsRef<Path>) -> Result<Registry> {
    let path = path.as_ref();
    tracing::info!("Loading server registry");

    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            tracing::error!("Registry file does not exist");
            Error::NotFound(path.to_path_buf())
        } else {
            tracing::error!(error = %e, "Failed to read registry file");
            Error::io(path, e)
        }
    })?;

    let registry = parse_from_str(&content)?;
    tracing::info!(num_servers = registry.len(), "Loaded server registry");
    Ok(registry)
}

/// Parses a registry from a JSON string.
///
/// # Errors
///
/// Returns [`Error::Format`] if the string is not a JSON object of string
/// values, if a name is repeated, or if an entry fails validation.
pub fn parse_from_str(content: &str) -> Result<Registry> {
    serde_json::from_str(content)
        .map_err(|e| Error::Format(format!("Failed to parse registry JSON: {}", e)))
}

/// Serializes a registry to its persisted form.
///
/// Output is pretty-printed with sorted keys and a trailing newline, so the
/// same registry always produces the same bytes.
///
/// # Errors
///
/// Returns [`Error::Format`] if a path is not valid UTF-8.
pub fn to_json_string(registry: &Registry) -> Result<String> {
    let mut json = serde_json::to_string_pretty(registry)
        .map_err(|e| Error::Format(format!("Failed to serialize registry: {}", e)))?;
    json.push('\n');
    Ok(json)
}

/// Saves a registry to `path`, creating parent directories as needed.
///
/// The content is written to a uniquely named `<path>.<uuid>.tmp` next to the
/// target and then renamed over it, so a failed save leaves any previous file
/// intact. Concurrent saves never share a temporary file; the last rename wins.
///
/// # Errors
///
/// Returns an error if:
/// * A path cannot be serialized ([`Error::Format`]); nothing is written
/// * The directory, temporary file or rename fails ([`Error::Io`])
#[tracing::instrument(skip(registry, path), fields(registry_path = ?path.as_ref(), num_servers = registry.len()))]
pub fn save(registry: &Registry, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    tracing::info!("Saving server registry");

    let content = to_json_string(registry)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            tracing::error!(error = %e, "Failed to create registry directory");
            Error::io(parent, e)
        })?;
    }

    let temp_path = temp_path_for(path);
    if let Err(e) = write_synced(&temp_path, content.as_bytes()) {
        tracing::error!(error = %e, temp_path = ?temp_path, "Failed to write temporary registry file");
        let _ = fs::remove_file(&temp_path);
        return Err(Error::io(&temp_path, e));
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        tracing::error!(error = %e, "Failed to move registry file into place");
        let _ = fs::remove_file(&temp_path);
        return Err(Error::io(path, e));
    }

    tracing::info!("Saved server registry");
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut file_name = path.file_name().unwrap_or_default().to_os_string();
    file_name.push(format!(".{}.tmp", Uuid::new_v4().simple()));
    path.with_file_name(file_name)
}

fn write_synced(path: &Path, content: &[u8]) -> io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    file.write_all(content)?;
    file.sync_all()
}

impl Serialize for Registry {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self)
    }
}

impl<'de> Deserialize<'de> for Registry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(RegistryVisitor)
    }
}

/// Builds a [`Registry`] from a map, refusing repeated names.
///
/// `serde_json` hands every key to the visitor even when it repeats, so the
/// check happens here instead of being lost in a map insert.
struct RegistryVisitor;

impl<'de> Visitor<'de> for RegistryVisitor {
    type Value = Registry;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("an object mapping server names to path strings")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Registry, A::Error> {
        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));

        while let Some((name, path)) = map.next_entry::<String, String>()? {
            if !seen.insert(name.clone()) {
                return Err(de::Error::custom(format!("duplicate server name `{}`", name)));
            }
            entries.push((name, path));
        }

        Registry::from_entries(entries).map_err(de::Error::custom)
    }
}
