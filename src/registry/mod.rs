//! Server registry module.
//!
//! This module holds the in-memory mapping from server names to their control
//! paths, the operations that mutate it, and the store that persists it as a
//! JSON object on disk.
//!
//! # Examples
//!
//! Loading a registry from a file:
//!
//! ```no_run
//! use server_manage::registry::store;
//!
//! let registry = store::load(".servers/servers.json").unwrap();
//! println!("Loaded registry with {} servers", registry.len());
//! ```
//!
//! Building a registry programmatically:
//!
//! ```
//! use server_manage::registry::Registry;
//!
//! let mut registry = Registry::new();
//! registry.add([("alice", "/srv/bots/alice"), ("bob", "/srv/bots/bob")]).unwrap();
//!
//! // Adding an existing name is rejected without touching the registry
//! assert!(registry.add([("alice", "/elsewhere")]).is_err());
//! assert_eq!(registry.len(), 2);
//! ```
pub mod location;
pub mod store;
pub mod validator;

pub use location::{
    default_registry_path, resolve_registry_path, RegistryPathResolution, RegistryPathSource,
};

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

/// A single registered server.
///
/// `path` is the control base path: the lifecycle executables live next to it
/// as `<path>.start`, `<path>.restart` and `<path>.update`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEntry {
    /// Unique server name.
    pub name: String,
    /// Normalized control base path, without extension.
    pub path: PathBuf,
}

/// Mapping from server name to normalized control path.
///
/// Names are unique and iteration is sorted by name, so dispatch order and
/// the persisted form are the same on every run. Every stored path has gone
/// through [`normalize_path`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    servers: BTreeMap<String, PathBuf>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from `(name, path)` pairs, validating every entry.
    ///
    /// A name that appears more than once keeps its last path.
    pub fn from_entries<I, N, P>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (N, P)>,
        N: Into<String>,
        P: AsRef<Path>,
    {
        Ok(Self {
            servers: prepare_batch(entries)?,
        })
    }

    /// Number of registered servers.
    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// Whether no server is registered.
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Control path registered under `name`.
    pub fn get(&self, name: &str) -> Option<&Path> {
        self.servers.get(name).map(PathBuf::as_path)
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.servers.contains_key(name)
    }

    /// Registered names, in iteration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.servers.keys().map(String::as_str)
    }

    /// `(name, path)` pairs, in iteration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.servers
            .iter()
            .map(|(name, path)| (name.as_str(), path.as_path()))
    }

    /// Owned copy of the entry registered under `name`.
    pub fn entry(&self, name: &str) -> Option<ServerEntry> {
        self.servers.get_key_value(name).map(|(name, path)| ServerEntry {
            name: name.clone(),
            path: path.clone(),
        })
    }

    /// Inserts a batch of servers without overwriting any existing name.
    ///
    /// The whole batch is validated first. If any name is already registered
    /// the call fails with [`Error::Conflict`] listing every such name and the
    /// registry is left untouched.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn add<I, N, P>(&mut self, batch: I) -> Result<()>
    where
        I: IntoIterator<Item = (N, P)>,
        N: Into<String>,
        P: AsRef<Path>,
    {
        let batch = prepare_batch(batch)?;

        let conflicts: Vec<String> = batch
            .keys()
            .filter(|name| self.servers.contains_key(*name))
            .cloned()
            .collect();
        if !conflicts.is_empty() {
            tracing::debug!(?conflicts, "Rejecting add of existing servers");
            return Err(Error::Conflict(conflicts));
        }

        tracing::debug!(num_servers = batch.len(), "Adding servers");
        self.servers.extend(batch);
        Ok(())
    }

    /// Inserts or overwrites every server in the batch.
    ///
    /// Existing names are never an error. An invalid entry rejects the whole
    /// batch before anything is written.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn upsert<I, N, P>(&mut self, batch: I) -> Result<()>
    where
        I: IntoIterator<Item = (N, P)>,
        N: Into<String>,
        P: AsRef<Path>,
    {
        let batch = prepare_batch(batch)?;
        tracing::debug!(num_servers = batch.len(), "Upserting servers");
        self.servers.extend(batch);
        Ok(())
    }

    /// Removes every listed name that is registered.
    ///
    /// Unknown names are ignored. Returns how many entries were removed.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn remove<I, N>(&mut self, names: I) -> usize
    where
        I: IntoIterator<Item = N>,
        N: AsRef<str>,
    {
        let removed = names
            .into_iter()
            .filter(|name| self.servers.remove(name.as_ref()).is_some())
            .count();
        tracing::debug!(removed, "Removed servers");
        removed
    }

    /// Discards every registered server and installs `batch` instead.
    ///
    /// On a validation error the current content is kept.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn replace_all<I, N, P>(&mut self, batch: I) -> Result<()>
    where
        I: IntoIterator<Item = (N, P)>,
        N: Into<String>,
        P: AsRef<Path>,
    {
        self.servers = prepare_batch(batch)?;
        tracing::debug!(num_servers = self.servers.len(), "Replaced registry");
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Registry {
    type Item = (&'a String, &'a PathBuf);
    type IntoIter = std::collections::btree_map::Iter<'a, String, PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.servers.iter()
    }
}

/// Lexically normalizes a control path.
///
/// `.` components and redundant separators are dropped; `..` is kept since
/// resolving it would need the filesystem. The result may be empty, which
/// validation rejects.
pub fn normalize_path(path: &Path) -> PathBuf {
    path.components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect()
}

/// Validates and normalizes a whole batch before any of it is applied.
fn prepare_batch<I, N, P>(batch: I) -> Result<BTreeMap<String, PathBuf>>
where
    I: IntoIterator<Item = (N, P)>,
    N: Into<String>,
    P: AsRef<Path>,
{
    let mut prepared = BTreeMap::new();
    for (name, path) in batch {
        let name = name.into();
        validator::validate_server_name(&name)?;
        let path = normalize_path(path.as_ref());
        validator::validate_server_path(&name, &path)?;
        prepared.insert(name, path);
    }
    Ok(prepared)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Registry {
        Registry::from_entries([("a", "/srv/a")]).unwrap()
    }

    #[test]
    fn test_add_is_all_or_nothing() {
        let mut registry = sample();

        let err = registry
            .add([("a", "/srv/x"), ("b", "/srv/b")])
            .unwrap_err();

        assert!(matches!(err, Error::Conflict(ref names) if names == &["a".to_string()]));
        assert_eq!(registry, sample());
    }

    #[test]
    fn test_upsert_overwrites() {
        let mut registry = sample();

        registry.upsert([("a", "/srv/x"), ("b", "/srv/b")]).unwrap();

        assert_eq!(registry.get("a"), Some(Path::new("/srv/x")));
        assert_eq!(registry.get("b"), Some(Path::new("/srv/b")));
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut registry = sample();

        assert_eq!(registry.remove(["ghost"]), 0);
        assert_eq!(registry, sample());
    }

    #[test]
    fn test_replace_all_discards_previous() {
        let mut registry = sample();

        registry.replace_all([("z", "/srv/z")]).unwrap();

        assert!(!registry.contains("a"));
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["z"]);
    }

    #[test]
    fn test_invalid_entry_rejects_batch() {
        let mut registry = sample();

        assert!(registry.upsert([("b", "/srv/b"), ("", "/srv/c")]).is_err());
        assert!(registry.replace_all([("c", ".")]).is_err());
        assert_eq!(registry, sample());
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("./srv//bots/./alice")),
            PathBuf::from("srv/bots/alice")
        );
        assert_eq!(
            normalize_path(Path::new("/srv/../bots")),
            PathBuf::from("/srv/../bots")
        );
        assert_eq!(normalize_path(Path::new(".")), PathBuf::new());
    }
}
