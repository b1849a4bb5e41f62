//! The command executor used by the scheduler's execution path.
//!
//! [`ShellExecutor`] spawns `<shell> -c <command>` with piped output and
//! `kill_on_drop(true)`. The child is owned by the future awaiting it, so when
//! cancellation or the deadline wins the race that future is dropped and the
//! process is killed with it. No exit path leaves a live child behind.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    error::{Result, TerminalError},
    output,
    types::{ExecOptions, ExecResult},
};

/// Runs a command string to completion or until `cancel` fires.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// # Errors
    ///
    /// - `Spawn` if the shell could not be launched.
    /// - `Cancelled` if `cancel` fired before the command exited.
    /// - `Timeout` if the configured deadline elapsed.
    /// - `Io` if collecting output failed.
    ///
    /// A non-zero exit is returned as `Ok` with `exit_code != 0`.
    async fn run(&self, command: &str, cancel: CancellationToken) -> Result<ExecResult>;
}

/// [`CommandExecutor`] backed by `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct ShellExecutor {
    options: ExecOptions,
}

impl ShellExecutor {
    pub fn new(options: ExecOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ExecOptions {
        &self.options
    }
}

#[async_trait]
impl CommandExecutor for ShellExecutor {
    async fn run(&self, command: &str, cancel: CancellationToken) -> Result<ExecResult> {
        debug!(shell = %self.options.shell, "exec: {command}");

        let child = Command::new(&self.options.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TerminalError::Spawn(format!("{}: {e}", self.options.shell)))?;

        let timeout = self.options.timeout();
        let deadline = async move {
            match timeout {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        let output = tokio::select! {
            res = child.wait_with_output() => res?,
            _ = cancel.cancelled() => {
                warn!("command cancelled, child killed");
                return Err(TerminalError::Cancelled);
            }
            _ = deadline => {
                let ms = timeout.map(|d| d.as_millis() as u64).unwrap_or_default();
                warn!(ms, "command deadline exceeded, child killed");
                return Err(TerminalError::Timeout { ms });
            }
        };

        let exit_code = output.status.code().unwrap_or(-1);
        let text = output::combine(&output.stdout, &output.stderr, self.options.max_output_chars);
        debug!(exit_code, bytes = text.len(), "exec finished");

        Ok(ExecResult {
            exit_code,
            output: text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn exec() -> ShellExecutor {
        ShellExecutor::new(ExecOptions::default())
    }

    #[tokio::test]
    async fn captures_stdout() {
        let res = exec().run("echo hi", CancellationToken::new()).await.unwrap();
        assert!(res.success());
        assert_eq!(res.output.trim(), "hi");
    }

    #[tokio::test]
    async fn nonzero_exit_is_not_an_error() {
        let res = exec()
            .run("echo oops >&2; exit 3", CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(res.exit_code, 3);
        assert_eq!(res.failure_message().as_deref(), Some("exit status 3"));
        assert!(res.output.contains("oops"));
    }

    #[tokio::test]
    async fn missing_shell_is_spawn_error() {
        let exec = ShellExecutor::new(ExecOptions {
            shell: "/definitely/not/a/shell".into(),
            ..ExecOptions::default()
        });
        let err = exec.run("true", CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, TerminalError::Spawn(_)));
    }

    #[tokio::test]
    async fn cancellation_kills_long_command() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = exec().run("sleep 10", cancel).await.unwrap_err();
        assert!(matches!(err, TerminalError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn deadline_kills_long_command() {
        let exec = ShellExecutor::new(ExecOptions {
            timeout_secs: Some(1),
            ..ExecOptions::default()
        });
        let started = Instant::now();
        let err = exec.run("sleep 10", CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, TerminalError::Timeout { ms: 1_000 }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn output_is_truncated_to_budget() {
        let exec = ShellExecutor::new(ExecOptions {
            max_output_chars: 100,
            ..ExecOptions::default()
        });
        let res = exec
            .run("head -c 5000 /dev/zero | tr '\\0' 'x'", CancellationToken::new())
            .await
            .unwrap();
        assert!(res.success());
        assert!(res.output.contains("chars omitted"));
        assert!(res.output.len() < 200);
    }
}
