//! Configuration for the boards engine, read from `boards.toml`.
//!
//! Settings are layered file → environment → CLI:
//! - `BOARDS_UNDO_LIMIT` overrides `[undo] limit`
//! - `BOARDS_LOG` overrides `[logging] level`
//! - `--verbose` forces debug logging
//!
//! # Configuration File Format
//!
//! ```toml
//! [undo]
//! limit = 100
//!
//! [view]
//! search_case_sensitive = false
//!
//! [logging]
//! level = "info"
//! json = false
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "boards.toml";

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// Undo history settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UndoSection {
    /// Maximum number of commands kept (0 = unbounded)
    #[serde(default = "default_undo_limit")]
    pub limit: usize,
}

fn default_undo_limit() -> usize {
    100
}

impl Default for UndoSection {
    fn default() -> Self {
        Self {
            limit: default_undo_limit(),
        }
    }
}

/// View computation settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewSection {
    /// Whether the title search matches case
    #[serde(default)]
    pub search_case_sensitive: bool,
}

/// Logging settings for the binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSection {
    /// Level or `EnvFilter` directive (e.g. "info", "boards=debug")
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Parsed `boards.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardsToml {
    #[serde(default)]
    pub undo: UndoSection,
    #[serde(default)]
    pub view: ViewSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl BoardsToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse boards.toml")
    }

    /// Load `boards.toml` from `dir`, or defaults if it doesn't exist.
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize boards.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply `BOARDS_*` environment overrides.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(limit) = lookup("BOARDS_UNDO_LIMIT") {
            self.undo.limit = limit
                .trim()
                .parse()
                .with_context(|| format!("Invalid BOARDS_UNDO_LIMIT '{}'", limit))?;
        }
        if let Some(level) = lookup("BOARDS_LOG")
            && !level.trim().is_empty()
        {
            self.logging.level = level.trim().to_string();
        }
        Ok(())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        let level = self.logging.level.trim();
        if level.is_empty() {
            warnings.push("Empty logging level: defaulting to 'info'".to_string());
        } else if !level.contains('=') && !LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
            warnings.push(format!(
                "Invalid logging level '{}'. Valid values: {}",
                level,
                LOG_LEVELS.join(", ")
            ));
        }

        if self.undo.limit == 0 {
            warnings.push("Undo limit is 0: history is unbounded".to_string());
        }

        warnings
    }
}

/// Effective configuration after every layer is applied.
#[derive(Debug, Clone)]
pub struct BoardsConfig {
    /// File the settings came from, if any
    pub config_path: Option<PathBuf>,
    pub toml: BoardsToml,
    /// CLI override: debug logging
    pub verbose: bool,
}

impl BoardsConfig {
    /// Resolve configuration. An explicit `config_path` must exist; otherwise
    /// `boards.toml` in the working directory is used when present.
    pub fn resolve(config_path: Option<&Path>, verbose: bool) -> Result<Self> {
        let (path, mut toml) = match config_path {
            Some(path) => (Some(path.to_path_buf()), BoardsToml::load(path)?),
            None => {
                let cwd = std::env::current_dir().context("Failed to resolve working directory")?;
                let candidate = cwd.join(CONFIG_FILE_NAME);
                let found = candidate.exists().then_some(candidate);
                (found, BoardsToml::load_or_default(&cwd)?)
            }
        };
        toml.apply_env_overrides()?;
        Ok(Self {
            config_path: path,
            toml,
            verbose,
        })
    }

    pub fn undo_limit(&self) -> usize {
        self.toml.undo.limit
    }

    pub fn search_case_sensitive(&self) -> bool {
        self.toml.view.search_case_sensitive
    }

    /// Filter directive for the tracing subscriber.
    pub fn log_filter(&self) -> String {
        if self.verbose {
            return "debug".to_string();
        }
        let level = self.toml.logging.level.trim();
        if level.is_empty() {
            default_log_level()
        } else {
            level.to_string()
        }
    }

    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }
}
