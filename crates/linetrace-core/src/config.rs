//! Blame cache configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory holding per-repository settings.
pub const CONFIG_DIR: &str = ".linetrace";

/// Exit code `git blame` uses for paths it does not know.
pub const DEFAULT_UNTRACKED_EXIT_CODE: i32 = 128;

/// Settings for the blame cache and its git backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlameConfig {
    /// Pass `-w` to ignore whitespace-only changes.
    pub ignore_whitespace: bool,
    /// Reload on every save, not only after unsaved edits.
    pub reblame_on_save: bool,
    /// Invocations of one operation allowed per window before shutting down.
    pub runaway_limit: usize,
    /// Length of the runaway window in milliseconds.
    pub runaway_window_ms: u64,
    /// Git executable to spawn.
    pub git_binary: String,
    /// Blame exit code that means "not under version control".
    pub untracked_exit_code: i32,
}

impl Default for BlameConfig {
    fn default() -> Self {
        Self {
            ignore_whitespace: false,
            reblame_on_save: false,
            runaway_limit: 50,
            runaway_window_ms: 1000,
            git_binary: "git".to_string(),
            untracked_exit_code: DEFAULT_UNTRACKED_EXIT_CODE,
        }
    }
}

impl BlameConfig {
    /// Load settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Load `.linetrace/config.json` under `root`, or defaults if it is absent.
    pub fn load_for_repo(root: impl AsRef<Path>) -> Result<Self> {
        let path = Self::repo_config_path(root);
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn repo_config_path(root: impl AsRef<Path>) -> PathBuf {
        root.as_ref().join(CONFIG_DIR).join("config.json")
    }

    pub fn runaway_window(&self) -> Duration {
        Duration::from_millis(self.runaway_window_ms)
    }
}
