//! Optional fixie configuration stored at `~/.fixie/config.toml`.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fixie configuration (TOML).
///
/// Every field has a default, so a missing file or a partial file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct FixieConfig {
    pub shell: ShellConfig,
    pub syntax_check: SyntaxCheckConfig,
}

/// The persistent shell that runs fragments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ShellConfig {
    pub program: PathBuf,
    /// Arguments passed when spawning the session (`-l` for a login shell).
    pub args: Vec<String>,
    /// Prepended to every chunk forwarded from the shell's stderr.
    pub stderr_prefix: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("/bin/bash"),
            args: vec!["-l".to_string()],
            stderr_prefix: "‼︎ ".to_string(),
        }
    }
}

/// The dry-run shell used to decide whether a buffer is a complete fragment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SyntaxCheckConfig {
    pub program: PathBuf,
    pub timeout_ms: u64,
}

impl Default for SyntaxCheckConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("/bin/bash"),
            timeout_ms: 10_000,
        }
    }
}

impl SyntaxCheckConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl FixieConfig {
    pub fn validate(&self) -> Result<()> {
        if self.shell.program.as_os_str().is_empty() {
            return Err(anyhow!("shell.program must not be empty"));
        }
        if self.syntax_check.program.as_os_str().is_empty() {
            return Err(anyhow!("syntax_check.program must not be empty"));
        }
        if self.syntax_check.timeout_ms == 0 {
            return Err(anyhow!("syntax_check.timeout_ms must be > 0"));
        }
        Ok(())
    }
}

/// Load `~/.fixie/config.toml`, falling back to defaults when it does not exist.
///
/// Most installs never create this file; the bundled defaults run a login
/// `bash` so profile aliases and `PATH` are available to fragments.
pub fn load_config(path: &Path) -> Result<FixieConfig> {
    let cfg = match fs::read_to_string(path) {
        Ok(contents) => toml::from_str::<FixieConfig>(&contents)
            .with_context(|| format!("parse {}", path.display()))?,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no config file, using defaults");
            FixieConfig::default()
        }
        Err(err) => return Err(err).with_context(|| format!("read {}", path.display())),
    };
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, FixieConfig::default());
        assert_eq!(cfg.shell.args, vec!["-l"]);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "[shell]\nargs = []\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert!(cfg.shell.args.is_empty());
        assert_eq!(cfg.shell.program, PathBuf::from("/bin/bash"));
        assert_eq!(cfg.syntax_check, SyntaxCheckConfig::default());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "[syntax_check]\ntimeout_ms = 0\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("timeout_ms"));
    }

    #[test]
    fn unreadable_path_is_an_error_not_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = load_config(temp.path()).unwrap_err();
        assert!(err.to_string().starts_with("read "));
    }
}
