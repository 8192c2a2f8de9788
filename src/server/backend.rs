use crate::error::Result;
use crate::server::Action;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// Per-invocation execution settings handed to a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecOptions {
    /// Upper bound on a single invocation. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Kill the child when `timeout` elapses instead of leaving it running.
    pub kill_on_timeout: bool,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            kill_on_timeout: true,
        }
    }
}

/// Result of running one lifecycle action against one server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionOutcome {
    /// Exit code, or `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Captured standard output, empty when output is not captured.
    pub stdout: String,
    /// Captured standard error, empty when output is not captured.
    pub stderr: String,
}

impl ActionOutcome {
    /// Outcome of a process that exited with `code` and printed nothing.
    pub fn from_exit_code(code: i32) -> Self {
        Self {
            exit_code: Some(code),
            ..Self::default()
        }
    }

    /// Whether the process exited with status zero.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Short human-readable description of a failed outcome.
    pub fn describe(&self) -> String {
        let status = match self.exit_code {
            Some(code) => format!("exited with status {}", code),
            None => "terminated by signal".to_string(),
        };
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            status
        } else {
            format!("{}: {}", status, stderr)
        }
    }
}

/// Strategy mapping an abstract lifecycle action onto a concrete invocation.
///
/// Implementations receive the normalized control path of a single server.
/// A returned `Err` or a non-zero [`ActionOutcome`] is recorded as a failure
/// for that server only; it never stops a dispatch.
#[async_trait]
pub trait ServerBackend: Send + Sync {
    /// Starts the server at `path`.
    async fn execute_start(&self, path: &Path, options: &ExecOptions) -> Result<ActionOutcome>;

    /// Restarts the server at `path`.
    async fn execute_restart(&self, path: &Path, options: &ExecOptions) -> Result<ActionOutcome>;

    /// Updates the server at `path`.
    async fn execute_update(&self, path: &Path, options: &ExecOptions) -> Result<ActionOutcome>;

    /// Routes `action` to the matching executor.
    async fn execute(
        &self,
        action: Action,
        path: &Path,
        options: &ExecOptions,
    ) -> Result<ActionOutcome> {
        match action {
            Action::Start => self.execute_start(path, options).await,
            Action::Restart => self.execute_restart(path, options).await,
            Action::Update => self.execute_update(path, options).await,
        }
    }
}
