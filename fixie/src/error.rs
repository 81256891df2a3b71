//! Error kinds surfaced by script loading and shell execution.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FixieError {
    #[error("script not found at {0}")]
    ScriptNotFound(String),

    #[error("unknown function: {0}()")]
    UnknownFunction(String),

    #[error("command failed: {0}")]
    CommandFailed(String),

    /// The persistent shell exited; `None` when killed by a signal.
    #[error("shell exited with code {}", .0.map_or_else(|| "unknown".to_string(), |c| c.to_string()))]
    ShellTerminated(Option<i32>),

    #[error("persistent shell stdin unavailable")]
    NoStdin,
}
