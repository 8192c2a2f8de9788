use crate::error::{Error, Result};
use crate::registry::{Registry, ServerEntry};
use crate::server::backend::{ExecOptions, ServerBackend};
use crate::server::lifecycle::{EventOutcome, ServerLifecycleManager};
use crate::server::Action;
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use uuid::Uuid;

/// Unique identifier for a single dispatch, used to correlate log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DispatchId(Uuid);

impl DispatchId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for DispatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shared flag asking an in-flight dispatch to stop scheduling entries.
///
/// The entry already running is allowed to finish.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clears the flag so the next dispatch runs normally.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Settings applied to every entry of a dispatch
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Upper bound on each executable. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Kill an executable that exceeds `timeout`
    pub kill_on_timeout: bool,
    /// Checked before each entry is scheduled
    pub cancel: Option<CancelFlag>,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            kill_on_timeout: true,
            cancel: None,
        }
    }
}

impl DispatchOptions {
    fn exec_options(&self) -> ExecOptions {
        ExecOptions {
            timeout: self.timeout,
            kill_on_timeout: self.kill_on_timeout,
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled)
    }
}

/// A server whose action failed
#[derive(Debug)]
pub struct DispatchFailure {
    /// Server name
    pub name: String,
    /// Control path the action ran against
    pub path: PathBuf,
    /// What went wrong
    pub error: Error,
}

/// Outcome of every entry a dispatch resolved
#[derive(Debug)]
pub struct DispatchReport {
    pub id: DispatchId,
    pub action: Action,
    /// Servers whose executable exited with status zero, in run order
    pub successes: Vec<String>,
    /// Servers whose executable failed, could not run, or timed out
    pub failures: Vec<DispatchFailure>,
    /// Requested names with no registry entry
    pub skipped: Vec<String>,
    /// Resolved servers never run because the dispatch was cancelled
    pub not_attempted: Vec<String>,
    pub cancelled: bool,
}

impl DispatchReport {
    fn new(action: Action) -> Self {
        Self {
            id: DispatchId::new(),
            action,
            successes: Vec::new(),
            failures: Vec::new(),
            skipped: Vec::new(),
            not_attempted: Vec::new(),
            cancelled: false,
        }
    }

    /// Whether every resolved server ran and succeeded
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    /// Number of servers whose executable was invoked
    pub fn attempted(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    /// Names of the failed servers, in run order
    pub fn failed_names(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.name.as_str()).collect()
    }
}

/// Applies a lifecycle action to a subset of a registry through a backend.
///
/// Entries run strictly one after another. A failing entry is recorded in the
/// report and the dispatch moves on to the next.
#[derive(Clone)]
pub struct Dispatcher {
    backend: Arc<dyn ServerBackend>,
    options: DispatchOptions,
    lifecycle: Option<Arc<ServerLifecycleManager>>,
}

impl Dispatcher {
    /// Create a dispatcher with default options
    pub fn new(backend: Arc<dyn ServerBackend>) -> Self {
        Self {
            backend,
            options: DispatchOptions::default(),
            lifecycle: None,
        }
    }

    /// Replace the dispatch options
    pub fn with_options(mut self, options: DispatchOptions) -> Self {
        self.options = options;
        self
    }

    /// Record one event per attempted entry into `lifecycle`
    pub fn with_lifecycle(mut self, lifecycle: Arc<ServerLifecycleManager>) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    /// Parses `action` and dispatches it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAction`] for anything other than start, restart
    /// or update, before any executable is run.
    pub async fn dispatch_named<S: AsRef<str>>(
        &self,
        action: &str,
        registry: &Registry,
        names: &[S],
    ) -> Result<DispatchReport> {
        let action = action.parse::<Action>().map_err(|e| {
            tracing::error!(requested = %action, "Rejecting unknown lifecycle action");
            e
        })?;
        Ok(self.dispatch(action, registry, names).await)
    }

    /// Runs `action` for the selected servers.
    ///
    /// With no `names`, every registered server runs in registry order.
    /// Otherwise only the listed servers run, in the order given; repeated
    /// names run once and names that are not registered are listed in
    /// [`DispatchReport::skipped`] without being run.
    #[tracing::instrument(skip(self, registry, names), fields(action = %action, num_requested = names.len()))]
    pub async fn dispatch<S: AsRef<str>>(
        &self,
        action: Action,
        registry: &Registry,
        names: &[S],
    ) -> DispatchReport {
        let mut report = DispatchReport::new(action);
        let targets = resolve_targets(registry, names, &mut report.skipped);

        for name in &report.skipped {
            tracing::warn!(dispatch_id = %report.id, server_name = %name, "Skipping unregistered server");
        }
        tracing::info!(dispatch_id = %report.id, num_servers = targets.len(), "Dispatching lifecycle action");

        let exec = self.options.exec_options();
        for (index, entry) in targets.iter().enumerate() {
            if self.options.is_cancelled() {
                report.cancelled = true;
                report.not_attempted = targets[index..].iter().map(|e| e.name.clone()).collect();
                tracing::warn!(
                    dispatch_id = %report.id,
                    not_attempted = report.not_attempted.len(),
                    "Dispatch cancelled"
                );
                break;
            }

            tracing::debug!(dispatch_id = %report.id, server_name = %entry.name, path = ?entry.path, "Running action");
            let result = match self.backend.execute(action, &entry.path, &exec).await {
                Ok(outcome) if outcome.success() => Ok(outcome),
                Ok(outcome) => Err(Error::Execution(outcome.describe())),
                Err(e) => Err(e),
            };

            match result {
                Ok(_) => {
                    self.record(&report, entry, EventOutcome::Succeeded, None);
                    report.successes.push(entry.name.clone());
                }
                Err(error) => {
                    tracing::warn!(
                        dispatch_id = %report.id,
                        server_name = %entry.name,
                        error = %error,
                        "Lifecycle action failed"
                    );
                    let outcome = match error {
                        Error::Timeout { .. } => EventOutcome::TimedOut,
                        _ => EventOutcome::Failed,
                    };
                    self.record(&report, entry, outcome, Some(error.to_string()));
                    report.failures.push(DispatchFailure {
                        name: entry.name.clone(),
                        path: entry.path.clone(),
                        error,
                    });
                }
            }
        }

        tracing::info!(
            dispatch_id = %report.id,
            succeeded = report.successes.len(),
            failed = report.failures.len(),
            skipped = report.skipped.len(),
            "Dispatch finished"
        );
        report
    }

    fn record(
        &self,
        report: &DispatchReport,
        entry: &ServerEntry,
        outcome: EventOutcome,
        details: Option<String>,
    ) {
        if let Some(lifecycle) = &self.lifecycle {
            lifecycle.record_event(report.id, entry.name.clone(), report.action, outcome, details);
        }
    }
}

/// Resolves requested names against the registry.
///
/// Unknown names are pushed onto `skipped` once each.
fn resolve_targets<S: AsRef<str>>(
    registry: &Registry,
    names: &[S],
    skipped: &mut Vec<String>,
) -> Vec<ServerEntry> {
    if names.is_empty() {
        return registry
            .iter()
            .map(|(name, path)| ServerEntry {
                name: name.to_string(),
                path: path.to_path_buf(),
            })
            .collect();
    }

    let mut seen = HashSet::new();
    let mut targets = Vec::new();
    for name in names.iter().map(AsRef::as_ref) {
        if !seen.insert(name) {
            continue;
        }
        match registry.entry(name) {
            Some(entry) => targets.push(entry),
            None => skipped.push(name.to_string()),
        }
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Registry {
        Registry::from_entries([("alice", "/srv/alice"), ("bob", "/srv/bob")]).unwrap()
    }

    #[test]
    fn test_resolve_all_in_registry_order() {
        let mut skipped = Vec::new();
        let targets = resolve_targets::<&str>(&registry(), &[], &mut skipped);

        let names: Vec<_> = targets.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob"]);
        assert!(skipped.is_empty());
    }

    #[test]
    fn test_resolve_selected_skips_unknown_and_repeats() {
        let mut skipped = Vec::new();
        let targets = resolve_targets(
            &registry(),
            &["bob", "ghost", "bob", "ghost"],
            &mut skipped,
        );

        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].path, PathBuf::from("/srv/bob"));
        assert_eq!(skipped, vec!["ghost".to_string()]);
    }

    #[test]
    fn test_cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let clone = flag.clone();

        clone.cancel();
        assert!(flag.is_cancelled());

        flag.reset();
        assert!(!clone.is_cancelled());
    }
}
