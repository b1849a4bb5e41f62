//! Error types for the cronlet-terminal crate.

use thiserror::Error;

/// Ways a command can fail to produce an exit status.
///
/// A command that runs and exits non-zero is *not* an error here; see
/// [`crate::ExecResult::failure_message`].
#[derive(Debug, Error)]
pub enum TerminalError {
    /// The shell could not be spawned.
    #[error("spawn failed: {0}")]
    Spawn(String),

    /// Underlying I/O failure while collecting output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The command exceeded its deadline and was killed.
    #[error("command timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The caller's cancellation token fired; the child was killed.
    #[error("command cancelled")]
    Cancelled,
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, TerminalError>;
