//! Invocation configuration.
//!
//! A [`Config`] is built once per command: defaults, then the optional
//! `waypoint.yaml` project file in the working directory, then command-line
//! flags. Values that depend on others (the migrations directory defaults to
//! `<cwd>/migrations`) are resolved when read, so setting `cwd` late still
//! moves the default directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{Direction, ScriptKind};

/// Per-unit timeout used when none (or an invalid one) is configured.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Environment name used when neither a flag nor [`ENV_VAR`] sets one.
pub const DEFAULT_ENV: &str = "development";

/// Environment variable consulted for the default environment name.
pub const ENV_VAR: &str = "WAYPOINT_ENV";

/// Project file looked up in the working directory.
pub const PROJECT_FILE: &str = "waypoint.yaml";

const DEFAULT_DIRECTORY: &str = "migrations";

#[derive(Debug, Clone)]
pub struct Config {
    cwd: PathBuf,
    env: Option<String>,
    directory: Option<PathBuf>,
    template: Option<PathBuf>,
    direction: Direction,
    limit: usize,
    timeout_ms: Option<u64>,
    args: Vec<String>,
    script_kind: ScriptKind,
}

impl Config {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            env: None,
            directory: None,
            template: None,
            direction: Direction::Up,
            limit: 0,
            timeout_ms: None,
            args: Vec::new(),
            script_kind: ScriptKind::Js,
        }
    }

    /// Config rooted at the process working directory.
    pub fn from_current_dir() -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir().map_err(ConfigError::Cwd)?;
        Ok(Self::new(cwd))
    }

    // -----------------------------------------------------------------------
    // Getters
    // -----------------------------------------------------------------------

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Explicit env, else `$WAYPOINT_ENV`, else `development`.
    pub fn env(&self) -> String {
        if let Some(env) = &self.env {
            return env.clone();
        }
        std::env::var(ENV_VAR)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ENV.to_owned())
    }

    /// Migrations directory, `<cwd>/migrations` unless overridden.
    pub fn directory(&self) -> PathBuf {
        self.directory
            .clone()
            .unwrap_or_else(|| self.cwd.join(DEFAULT_DIRECTORY))
    }

    /// Custom template path; `None` means the built-in template.
    pub fn template(&self) -> Option<&Path> {
        self.template.as_deref()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Maximum number of units per run; `0` means unlimited.
    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms())
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The positional arguments joined by a space, when there are any.
    pub fn name_filter(&self) -> Option<String> {
        let name = self.args.join(" ");
        (!name.is_empty()).then_some(name)
    }

    pub fn script_kind(&self) -> ScriptKind {
        self.script_kind
    }

    // -----------------------------------------------------------------------
    // Setters
    // -----------------------------------------------------------------------

    pub fn set_cwd(&mut self, cwd: impl Into<PathBuf>) -> &mut Self {
        self.cwd = cwd.into();
        self
    }

    pub fn set_env(&mut self, env: impl Into<String>) -> Result<&mut Self, ConfigError> {
        let env = env.into();
        if env.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "env",
                reason: "environment name must not be empty".to_owned(),
            });
        }
        self.env = Some(env);
        Ok(self)
    }

    /// Relative paths are resolved against the current `cwd`.
    pub fn set_directory(&mut self, dir: impl AsRef<Path>) -> Result<&mut Self, ConfigError> {
        let dir = dir.as_ref();
        if dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidDirectory(dir.to_path_buf()));
        }
        self.directory = Some(self.cwd.join(dir));
        Ok(self)
    }

    /// Relative paths are resolved against the current `cwd`.
    pub fn set_template(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.template = Some(self.cwd.join(path));
        self
    }

    pub fn set_direction(&mut self, direction: Direction) -> &mut Self {
        self.direction = direction;
        self
    }

    /// Parse and set the direction; anything but `up`/`down` is rejected.
    pub fn set_direction_str(&mut self, direction: &str) -> Result<&mut Self, ConfigError> {
        self.direction = direction.parse()?;
        Ok(self)
    }

    /// Negative limits clamp to `0` (unlimited).
    pub fn set_limit(&mut self, limit: i64) -> &mut Self {
        self.limit = usize::try_from(limit).unwrap_or(0);
        self
    }

    /// Non-positive timeouts fall back to [`DEFAULT_TIMEOUT_MS`].
    pub fn set_timeout_ms(&mut self, timeout_ms: i64) -> &mut Self {
        self.timeout_ms = u64::try_from(timeout_ms).ok().filter(|ms| *ms > 0);
        self
    }

    pub fn set_args(&mut self, args: Vec<String>) -> &mut Self {
        self.args = args;
        self
    }

    pub fn set_script_kind(&mut self, kind: ScriptKind) -> &mut Self {
        self.script_kind = kind;
        self
    }

    /// Apply the values present in a project file.
    pub fn apply_project_file(&mut self, file: &ProjectFile) -> Result<&mut Self, ConfigError> {
        if let Some(env) = &file.env {
            self.set_env(env.clone())?;
        }
        if let Some(dir) = &file.directory {
            self.set_directory(dir)?;
        }
        if let Some(template) = &file.template {
            self.set_template(template);
        }
        if let Some(timeout_ms) = file.timeout_ms {
            self.set_timeout_ms(timeout_ms);
        }
        if let Some(coffee) = file.coffee {
            self.set_script_kind(if coffee { ScriptKind::Coffee } else { ScriptKind::Js });
        }
        Ok(self)
    }
}

// ---------------------------------------------------------------------------
// Project file
// ---------------------------------------------------------------------------

/// Optional `waypoint.yaml` in the working directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coffee: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<PathBuf>,
}

impl ProjectFile {
    /// `<cwd>/waypoint.yaml`
    pub fn path_at(cwd: &Path) -> PathBuf {
        cwd.join(PROJECT_FILE)
    }

    /// Load the project file in `cwd`, `Ok(None)` when there is none.
    pub fn load_at(cwd: &Path) -> Result<Option<Self>, ConfigError> {
        let path = Self::path_at(cwd);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        if contents.trim().is_empty() {
            return Ok(Some(Self::default()));
        }
        serde_yaml::from_str(&contents)
            .map(Some)
            .map_err(|source| ConfigError::Parse { path, source })
    }
}
