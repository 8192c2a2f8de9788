// src/server/bin_file.rs
use crate::error::{Error, Result};
use crate::server::backend::{ActionOutcome, ExecOptions, ServerBackend};
use crate::server::Action;
use async_process::{Command, Stdio};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Backend where every action is a sibling executable of the control path.
///
/// For a server at `/srv/bots/alice`, `start` runs `/srv/bots/alice.start`,
/// `restart` runs `/srv/bots/alice.restart` and `update` runs
/// `/srv/bots/alice.update`. Executables get no arguments and inherit the
/// caller's environment. Exit status zero is success.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinFileBackend {
    /// Capture stdout/stderr instead of inheriting them
    capture_output: bool,
}

impl BinFileBackend {
    /// Create a backend that lets executables write to the caller's stdout/stderr
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture stdout/stderr into the [`ActionOutcome`].
    ///
    /// Start scripts that leave a daemon behind holding the pipes will keep the
    /// invocation open until the daemon exits, so only enable this for scripts
    /// that finish on their own.
    pub fn with_captured_output(mut self) -> Self {
        self.capture_output = true;
        self
    }

    /// Path of the executable that performs `action` for the server at `path`.
    pub fn executable_for(action: Action, path: &Path) -> Result<PathBuf> {
        let name = path.file_name().ok_or_else(|| {
            Error::Execution(format!("Server path {} has no final segment", path.display()))
        })?;

        let mut file_name = name.to_os_string();
        file_name.push(".");
        file_name.push(action.suffix());

        // A bare file name would be looked up on PATH instead of beside the server
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        Ok(parent.join(file_name))
    }

    #[tracing::instrument(skip_all, fields(action = %action, server_path = ?path))]
    async fn run(&self, action: Action, path: &Path, options: &ExecOptions) -> Result<ActionOutcome> {
        let executable = Self::executable_for(action, path)?;
        tracing::debug!(executable = ?executable, "Launching lifecycle executable");

        let mut command = Command::new(&executable);
        command
            .stdin(Stdio::null())
            .kill_on_drop(options.timeout.is_some() && options.kill_on_timeout);

        if self.capture_output {
            command.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }

        let mut child = command.spawn().map_err(|e| {
            tracing::warn!(error = %e, "Failed to launch lifecycle executable");
            Error::Execution(format!("Failed to launch {}: {}", executable.display(), e))
        })?;

        let outcome = if self.capture_output {
            let output = with_timeout(&executable, options, child.output()).await?;
            ActionOutcome {
                exit_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }
        } else {
            let status = with_timeout(&executable, options, child.status()).await?;
            ActionOutcome {
                exit_code: status.code(),
                ..ActionOutcome::default()
            }
        };

        tracing::debug!(exit_code = ?outcome.exit_code, "Lifecycle executable finished");
        Ok(outcome)
    }
}

/// Awaits a child future, bounded by `options.timeout` when set.
async fn with_timeout<T>(
    executable: &Path,
    options: &ExecOptions,
    wait: impl std::future::Future<Output = std::io::Result<T>>,
) -> Result<T> {
    let result = match options.timeout {
        Some(after) => tokio::time::timeout(after, wait).await.map_err(|_| {
            tracing::warn!(executable = ?executable, ?after, "Lifecycle executable timed out");
            Error::Timeout {
                path: executable.to_path_buf(),
                after,
            }
        })?,
        None => wait.await,
    };

    result.map_err(|e| {
        Error::Execution(format!("Failed to wait for {}: {}", executable.display(), e))
    })
}

#[async_trait]
impl ServerBackend for BinFileBackend {
    async fn execute_start(&self, path: &Path, options: &ExecOptions) -> Result<ActionOutcome> {
        self.run(Action::Start, path, options).await
    }

    async fn execute_restart(&self, path: &Path, options: &ExecOptions) -> Result<ActionOutcome> {
        self.run(Action::Restart, path, options).await
    }

    async fn execute_update(&self, path: &Path, options: &ExecOptions) -> Result<ActionOutcome> {
        self.run(Action::Update, path, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executable_is_sibling() {
        assert_eq!(
            BinFileBackend::executable_for(Action::Start, Path::new("/srv/bots/alice")).unwrap(),
            PathBuf::from("/srv/bots/alice.start")
        );
        assert_eq!(
            BinFileBackend::executable_for(Action::Update, Path::new("alice")).unwrap(),
            PathBuf::from("./alice.update")
        );
        assert!(BinFileBackend::executable_for(Action::Restart, Path::new("/")).is_err());
    }

    #[tokio::test]
    async fn test_missing_executable_is_execution_error() {
        let dir = tempfile::tempdir().unwrap();
        let backend = BinFileBackend::new();

        let err = backend
            .execute_start(&dir.path().join("ghost"), &ExecOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Execution(_)));
    }
}
