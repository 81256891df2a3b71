//! Test-only helpers: scripted oracles, a recording reporter, shell fixtures.

use std::cell::RefCell;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tempfile::TempDir;

use crate::assembler::CompletenessOracle;
use crate::error::FixieError;
use crate::io::config::{FixieConfig, ShellConfig, SyntaxCheckConfig};
use crate::io::init::FixiePaths;
use crate::io::session::ShellSession;
use crate::report::Reporter;

/// Shell config for tests: `bash` from `PATH`, no login profile.
pub fn plain_shell() -> ShellConfig {
    ShellConfig {
        program: "bash".into(),
        args: Vec::new(),
        ..ShellConfig::default()
    }
}

/// Execute one fragment and collect its output and reported status.
pub async fn collect_output(
    session: &mut ShellSession,
    fragment: &str,
) -> Result<(String, Option<i32>), FixieError> {
    let mut output = session.execute(fragment).await?;
    let mut bytes = Vec::new();
    while let Some(chunk) = output.next_chunk().await? {
        bytes.extend(chunk);
    }
    Ok((String::from_utf8_lossy(&bytes).into_owned(), output.exit_code()))
}

/// Temporary home directory holding `script` and a plain-shell config.
pub fn temp_fixie_home(script: &str) -> Result<(TempDir, FixiePaths)> {
    let home = tempfile::tempdir().context("create temp home")?;
    let paths = write_fixie_home(home.path(), script)?;
    Ok((home, paths))
}

/// Write a script and a plain-shell config under `home/.fixie/`.
pub fn write_fixie_home(home: &Path, script: &str) -> Result<FixiePaths> {
    let paths = FixiePaths::new(home);
    fs::create_dir_all(&paths.root_dir)
        .with_context(|| format!("create {}", paths.root_dir.display()))?;
    fs::write(&paths.script_path, script)
        .with_context(|| format!("write {}", paths.script_path.display()))?;

    let config = FixieConfig {
        shell: plain_shell(),
        syntax_check: SyntaxCheckConfig {
            program: "bash".into(),
            ..SyntaxCheckConfig::default()
        },
    };
    let toml = toml::to_string_pretty(&config).context("serialize config")?;
    fs::write(&paths.config_path, toml)
        .with_context(|| format!("write {}", paths.config_path.display()))?;
    Ok(paths)
}

/// Oracle that balances block keywords at the start of each line.
///
/// `if`/`for`/`while`/`until`/`case` open a block; `fi`/`done`/`esac` close it.
#[derive(Debug, Default)]
pub struct KeywordOracle;

impl KeywordOracle {
    fn depth(text: &str) -> i32 {
        text.lines()
            .filter_map(|line| line.split_whitespace().next())
            .map(|word| match word {
                "if" | "for" | "while" | "until" | "case" => 1,
                "fi" | "done" | "esac" => -1,
                _ => 0,
            })
            .sum()
    }
}

impl CompletenessOracle for KeywordOracle {
    async fn is_complete(&self, text: &str) -> bool {
        Self::depth(text) == 0
    }
}

/// [`KeywordOracle`] that also records every buffer it was asked about.
#[derive(Debug, Default)]
pub struct RecordingOracle {
    seen: RefCell<Vec<String>>,
}

impl RecordingOracle {
    pub fn seen(&self) -> Vec<String> {
        self.seen.borrow().clone()
    }
}

impl CompletenessOracle for RecordingOracle {
    async fn is_complete(&self, text: &str) -> bool {
        self.seen.borrow_mut().push(text.to_string());
        KeywordOracle.is_complete(text).await
    }
}

/// One reporter callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Started(String),
    Fragment(String),
    Output(Vec<u8>),
    FragmentFinished(bool),
    Finished(String),
    Warning(String),
}

/// Reporter that keeps every callback for assertions.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub events: Vec<Event>,
}

impl RecordingReporter {
    pub fn started(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Started(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn fragments(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Fragment(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Warning(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn output_text(&self) -> String {
        let bytes: Vec<u8> = self
            .events
            .iter()
            .filter_map(|event| match event {
                Event::Output(chunk) => Some(chunk.as_slice()),
                _ => None,
            })
            .flatten()
            .copied()
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Reporter for RecordingReporter {
    fn function_started(&mut self, name: &str) {
        self.events.push(Event::Started(name.to_string()));
    }

    fn fragment_started(&mut self, fragment: &str) {
        self.events.push(Event::Fragment(fragment.to_string()));
    }

    fn output(&mut self, chunk: &[u8]) {
        self.events.push(Event::Output(chunk.to_vec()));
    }

    fn fragment_finished(&mut self, wrote_output: bool) {
        self.events.push(Event::FragmentFinished(wrote_output));
    }

    fn function_finished(&mut self, name: &str) {
        self.events.push(Event::Finished(name.to_string()));
    }

    fn warning(&mut self, message: &str) {
        self.events.push(Event::Warning(message.to_string()));
    }
}
