//! Locations under `~/.fixie/` and first-run scaffolding.

use std::fs::{self, DirBuilder, OpenOptions};
use std::io::Write;
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::info;

const DIR_MODE: u32 = 0o700;
const SCRIPT_MODE: u32 = 0o600;

/// All canonical fixie paths for a home directory.
#[derive(Debug, Clone)]
pub struct FixiePaths {
    pub root_dir: PathBuf,
    pub script_path: PathBuf,
    pub config_path: PathBuf,
}

impl FixiePaths {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        let root_dir = home.into().join(".fixie");
        Self {
            script_path: root_dir.join("list"),
            config_path: root_dir.join("config.toml"),
            root_dir,
        }
    }

    /// Paths for the current user's home directory.
    pub fn from_home() -> Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| anyhow!("cannot determine home directory"))?;
        Ok(Self::new(home))
    }
}

/// Create the fixie directory and a starter script if the script is missing.
///
/// Returns `true` when a new script was written. An existing script is never
/// touched.
pub fn ensure_default_script(paths: &FixiePaths) -> Result<bool> {
    if paths.script_path.exists() {
        return Ok(false);
    }
    create_private_dir(&paths.root_dir)?;

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(SCRIPT_MODE)
        .open(&paths.script_path)
        .with_context(|| format!("create {}", paths.script_path.display()))?;
    file.write_all(DEFAULT_SCRIPT.as_bytes())
        .with_context(|| format!("write {}", paths.script_path.display()))?;
    // `mode` above is filtered by the umask.
    fs::set_permissions(&paths.script_path, fs::Permissions::from_mode(SCRIPT_MODE))
        .with_context(|| format!("chmod {}", paths.script_path.display()))?;

    info!(path = %paths.script_path.display(), "created default script");
    Ok(true)
}

fn create_private_dir(path: &Path) -> Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    DirBuilder::new()
        .recursive(true)
        .mode(DIR_MODE)
        .create(path)
        .with_context(|| format!("create directory {}", path.display()))?;
    fs::set_permissions(path, fs::Permissions::from_mode(DIR_MODE))
        .with_context(|| format!("chmod {}", path.display()))
}

const DEFAULT_SCRIPT: &str = r#"// Functions run in one shared shell: `cd` in one line carries to the next.
// Run with `fixie <name>...`, list with `fixie --list`, stop on first error with `-e`.

// Shows where you are and what is here
func whereami() {
    pwd
    ls -la
}

// Counts down, one fragment per loop
func countdown() {
    for n in 3 2 1; do
        echo "$n..."
    done
    echo "liftoff"
}

// Opens the fixie list in your editor
func editList() {
    cd ~/.fixie
    ${EDITOR:-vi} list
}
"#;
