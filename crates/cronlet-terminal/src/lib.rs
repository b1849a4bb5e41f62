//! `cronlet-terminal`: runs task commands through a shell and captures what
//! they print.
//!
//! ```rust,no_run
//! use cronlet_terminal::{CommandExecutor, ExecOptions, ShellExecutor};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let exec = ShellExecutor::new(ExecOptions::default());
//!     let result = exec.run("echo hello", CancellationToken::new()).await.unwrap();
//!     assert!(result.success());
//!     println!("{}", result.output);
//! }
//! ```

pub mod error;
pub mod executor;
pub mod output;
pub mod types;

pub use error::{Result, TerminalError};
pub use executor::{CommandExecutor, ShellExecutor};
pub use types::{ExecOptions, ExecResult};
