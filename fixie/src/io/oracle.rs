//! Dry-run syntax checks against the real shell.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::assembler::CompletenessOracle;
use crate::io::config::SyntaxCheckConfig;

/// Asks `<program> -n -c <text>` whether `text` parses as a whole.
#[derive(Debug, Clone)]
pub struct BashSyntaxOracle {
    program: PathBuf,
    timeout: Duration,
}

impl BashSyntaxOracle {
    pub fn new(config: &SyntaxCheckConfig) -> Self {
        Self {
            program: config.program.clone(),
            timeout: config.timeout(),
        }
    }
}

impl CompletenessOracle for BashSyntaxOracle {
    async fn is_complete(&self, text: &str) -> bool {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-n")
            .arg("-c")
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => {
                let complete = output.status.success() && output.stderr.is_empty();
                debug!(complete, exit_code = ?output.status.code(), "syntax check");
                complete
            }
            Ok(Err(err)) => {
                warn!(program = %self.program.display(), err = %err, "syntax check failed to run");
                false
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis(), "syntax check timed out");
                false
            }
        }
    }
}
