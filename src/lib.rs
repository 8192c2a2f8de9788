/*!
 # server-manage

 A small supervisor for named servers driven by sibling executables.

 ## Overview

 Each server is registered under a unique name with a control path `P`.
 Lifecycle actions are performed by running executables that sit next to it:

 - `P.start` starts the server
 - `P.restart` restarts it
 - `P.update` updates it

 The supervisor keeps the name-to-path registry in a JSON file
 (`./.servers/servers.json` by default) and applies an action to every server,
 or to a chosen subset, one after another. A server that fails is reported and
 the remaining servers still run.

 ## Basic Usage

 ```no_run
 use server_manage::{Result, Supervisor, SupervisorConfig};

 #[tokio::main]
 async fn main() -> Result<()> {
     let mut supervisor = Supervisor::bot_farm(SupervisorConfig::default());

     // Load the registry from ./.servers/servers.json
     supervisor.load_servers()?;

     // Register a new server and persist the change
     supervisor.add_servers([("carol", "/srv/bots/carol")])?;
     supervisor.save_servers()?;

     // Start everything
     let report = supervisor.start::<&str>(&[]).await;
     println!("started: {:?}", report.successes);

     // Update only some of them
     let report = supervisor.update(&["alice", "carol"]).await;
     for failure in &report.failures {
         eprintln!("{} failed: {}", failure.name, failure.error);
     }

     Ok(())
 }
 ```

 ## Features

 - **Registry**: durable name-to-path mapping with atomic saves
 - **All-or-nothing adds**: adding an existing name leaves the registry untouched
 - **Pluggable backends**: any [`ServerBackend`] can drive the lifecycle
 - **Failure isolation**: per-server failures are collected in a [`DispatchReport`]
 - **Timeouts and cancellation**: bound each executable and stop a dispatch early
*/

pub mod config;
pub mod error;
pub mod registry;
pub mod server;

pub use config::SupervisorConfig;
pub use error::{Error, Result};
pub use registry::{Registry, ServerEntry};
pub use server::{
    Action, ActionOutcome, BinFileBackend, CancelFlag, DispatchReport, Dispatcher, ServerBackend,
    ServerLifecycleManager,
};

use registry::store;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Manage a registry of servers and run lifecycle actions against it
///
/// The supervisor exclusively owns its registry. Changes stay in memory until
/// [`save_servers`](Self::save_servers) is called.
/// All public methods are instrumented with `tracing` spans.
pub struct Supervisor {
    /// Settings
    config: SupervisorConfig,
    /// Resolved registry file
    registry_path: PathBuf,
    /// Registered servers
    registry: Registry,
    /// Runs the actions
    dispatcher: Dispatcher,
    /// Action history
    lifecycle: Arc<ServerLifecycleManager>,
    /// Checked before each server is run
    cancel: CancelFlag,
}

impl Supervisor {
    /// Create a supervisor with an empty registry and the given backend
    #[tracing::instrument(skip(config, backend))]
    pub fn new(config: SupervisorConfig, backend: Arc<dyn ServerBackend>) -> Self {
        let resolution = config.resolve_registry_path();
        tracing::info!(
            registry_path = ?resolution.path,
            source = ?resolution.source,
            "Creating new Supervisor"
        );

        let lifecycle = Arc::new(ServerLifecycleManager::with_limit(config.history_limit));
        let cancel = CancelFlag::new();
        let mut options = config.dispatch_options();
        options.cancel = Some(cancel.clone());

        let dispatcher = Dispatcher::new(backend)
            .with_options(options)
            .with_lifecycle(Arc::clone(&lifecycle));

        Self {
            config,
            registry_path: resolution.path,
            registry: Registry::new(),
            dispatcher,
            lifecycle,
            cancel,
        }
    }

    /// Create a supervisor whose servers are driven by sibling executables
    pub fn bot_farm(config: SupervisorConfig) -> Self {
        Self::new(config, Arc::new(BinFileBackend::new()))
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Registry file used by [`load_servers`](Self::load_servers) and
    /// [`save_servers`](Self::save_servers)
    pub fn registry_path(&self) -> &Path {
        &self.registry_path
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// History of every action run by this supervisor
    pub fn lifecycle(&self) -> &ServerLifecycleManager {
        &self.lifecycle
    }

    /// Flag that stops an in-flight dispatch after its current server
    ///
    /// Every dispatch started through this supervisor clears the flag before
    /// its first server, so cancelling between dispatches has no effect.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Replace the in-memory registry with the content of the registry file
    #[tracing::instrument(skip(self), fields(registry_path = ?self.registry_path))]
    pub fn load_servers(&mut self) -> Result<()> {
        self.registry = store::load(&self.registry_path)?;
        Ok(())
    }

    /// Replace the in-memory registry with the content of `path`
    #[tracing::instrument(skip(self, path), fields(registry_path = ?path.as_ref()))]
    pub fn load_servers_from(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.registry = store::load(path)?;
        Ok(())
    }

    /// Write the registry to the registry file
    #[tracing::instrument(skip(self), fields(registry_path = ?self.registry_path))]
    pub fn save_servers(&self) -> Result<()> {
        store::save(&self.registry, &self.registry_path)
    }

    /// Write the registry to `path`
    #[tracing::instrument(skip(self, path), fields(registry_path = ?path.as_ref()))]
    pub fn save_servers_to(&self, path: impl AsRef<Path>) -> Result<()> {
        store::save(&self.registry, path)
    }

    /// Register servers, refusing to overwrite any existing name
    pub fn add_servers<I, N, P>(&mut self, servers: I) -> Result<()>
    where
        I: IntoIterator<Item = (N, P)>,
        N: Into<String>,
        P: AsRef<Path>,
    {
        self.registry.add(servers)
    }

    /// Register servers, overwriting existing names
    pub fn update_servers<I, N, P>(&mut self, servers: I) -> Result<()>
    where
        I: IntoIterator<Item = (N, P)>,
        N: Into<String>,
        P: AsRef<Path>,
    {
        self.registry.upsert(servers)
    }

    /// Unregister servers; unknown names are ignored
    pub fn remove_servers<I, N>(&mut self, names: I) -> usize
    where
        I: IntoIterator<Item = N>,
        N: AsRef<str>,
    {
        self.registry.remove(names)
    }

    /// Replace every registered server with `servers`
    pub fn new_servers<I, N, P>(&mut self, servers: I) -> Result<()>
    where
        I: IntoIterator<Item = (N, P)>,
        N: Into<String>,
        P: AsRef<Path>,
    {
        self.registry.replace_all(servers)
    }

    /// Start the named servers, or all of them when `names` is empty
    ///
    /// Clears the cancel flag first, so a cancel only affects the dispatch in
    /// flight when it is requested.
    #[tracing::instrument(skip(self, names), fields(num_requested = names.len()))]
    pub async fn start<S: AsRef<str>>(&self, names: &[S]) -> DispatchReport {
        self.dispatch(Action::Start, names).await
    }

    /// Restart the named servers, or all of them when `names` is empty
    ///
    /// Clears the cancel flag first, like [`start`](Self::start).
    #[tracing::instrument(skip(self, names), fields(num_requested = names.len()))]
    pub async fn restart<S: AsRef<str>>(&self, names: &[S]) -> DispatchReport {
        self.dispatch(Action::Restart, names).await
    }

    /// Update the named servers, or all of them when `names` is empty
    ///
    /// Clears the cancel flag first, like [`start`](Self::start).
    #[tracing::instrument(skip(self, names), fields(num_requested = names.len()))]
    pub async fn update<S: AsRef<str>>(&self, names: &[S]) -> DispatchReport {
        self.dispatch(Action::Update, names).await
    }

    /// Run the action named `action` against the named servers
    ///
    /// Fails with [`Error::InvalidAction`] before running anything when
    /// `action` is not start, restart or update. Clears the cancel flag first,
    /// like [`start`](Self::start).
    #[tracing::instrument(skip(self, names), fields(num_requested = names.len()))]
    pub async fn run_action<S: AsRef<str>>(
        &self,
        action: &str,
        names: &[S],
    ) -> Result<DispatchReport> {
        let action = action.parse::<Action>().map_err(|e| {
            tracing::error!(requested = %action, "Rejecting unknown lifecycle action");
            e
        })?;
        Ok(self.dispatch(action, names).await)
    }

    async fn dispatch<S: AsRef<str>>(&self, action: Action, names: &[S]) -> DispatchReport {
        self.cancel.reset();
        self.dispatcher.dispatch(action, &self.registry, names).await
    }
}
