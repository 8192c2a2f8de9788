/// Server lifecycle module.
///
/// This module turns an abstract lifecycle action into concrete invocations
/// for a subset of registered servers. All public components are instrumented
/// with `tracing` spans.
///
/// # Components
///
/// * `action` - The closed set of lifecycle actions
/// * `backend` - The strategy trait mapping an action to an external invocation
/// * `bin_file` - Backend running sibling `<name>.<action>` executables
/// * `dispatch` - Sequential, failure-tolerant fan-out over the registry
/// * `lifecycle` - Bounded history of every action run
///
/// # Examples
///
/// Starting every registered server:
///
/// ```no_run
/// use server_manage::registry::Registry;
/// use server_manage::server::{Action, BinFileBackend, Dispatcher};
/// use std::sync::Arc;
///
/// # async fn run() {
/// let registry = Registry::from_entries([("alice", "/srv/bots/alice")]).unwrap();
/// let dispatcher = Dispatcher::new(Arc::new(BinFileBackend::new()));
///
/// let report = dispatcher.dispatch::<&str>(Action::Start, &registry, &[]).await;
/// for failure in &report.failures {
///     eprintln!("{} failed: {}", failure.name, failure.error);
/// }
/// # }
/// ```
pub mod action;
pub mod backend;
mod bin_file;
pub mod dispatch;
pub mod lifecycle;

pub use action::Action;
pub use backend::{ActionOutcome, ExecOptions, ServerBackend};
pub use bin_file::BinFileBackend;
pub use dispatch::{
    CancelFlag, DispatchFailure, DispatchId, DispatchOptions, DispatchReport, Dispatcher,
};
pub use lifecycle::{EventOutcome, ServerEvent, ServerLifecycleManager};
