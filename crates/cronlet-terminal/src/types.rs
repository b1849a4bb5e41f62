//! Shared data types for cronlet-terminal.

use std::time::Duration;

use cronlet_core::config::{ExecutorConfig, DEFAULT_MAX_OUTPUT_CHARS, DEFAULT_SHELL};
use serde::{Deserialize, Serialize};

/// Configuration knobs for command execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecOptions {
    /// Shell binary; commands run as `<shell> -c <command>`.
    pub shell: String,

    /// Deadline in seconds. `None` lets the command run until it exits or the
    /// caller cancels it.
    pub timeout_secs: Option<u64>,

    /// Maximum characters of combined output kept after truncation.
    pub max_output_chars: usize,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            shell: DEFAULT_SHELL.to_string(),
            timeout_secs: None,
            max_output_chars: DEFAULT_MAX_OUTPUT_CHARS,
        }
    }
}

impl From<&ExecutorConfig> for ExecOptions {
    fn from(cfg: &ExecutorConfig) -> Self {
        Self {
            shell: cfg.shell.clone(),
            timeout_secs: cfg.timeout_secs,
            max_output_chars: cfg.max_output_chars,
        }
    }
}

impl ExecOptions {
    pub(crate) fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Outcome of a command that ran to exit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecResult {
    /// Process exit code, or `-1` when the process was terminated by a signal.
    pub exit_code: i32,

    /// ANSI-stripped stdout followed by stderr, middle-truncated.
    pub output: String,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// `Some("exit status N")` for a non-zero exit, `None` on success.
    pub fn failure_message(&self) -> Option<String> {
        if self.success() {
            None
        } else {
            Some(format!("exit status {}", self.exit_code))
        }
    }
}
