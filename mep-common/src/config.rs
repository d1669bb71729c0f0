//! Bootstrap configuration, logging setup and external tool environment
//!
//! Configuration file resolution follows a fixed priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`MEP_CONFIG`)
//! 3. Per-user config file (`<config_dir>/me-pipeline/config.toml`)
//! 4. Compiled defaults (fallback)
//!
//! A missing config file is never fatal: a warning is logged and compiled
//! defaults are used. A config file that was named explicitly but cannot be
//! parsed is an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{info, warn};

/// Environment variable naming a config file
pub const CONFIG_ENV_VAR: &str = "MEP_CONFIG";

/// Environment variable naming the tool root directory
pub const TOOL_ROOT_ENV_VAR: &str = "MEP_TOOL_ROOT";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Directory holding the pipeline's `bin/` and `data/` folders
    #[serde(default)]
    pub tool_root: Option<PathBuf>,

    /// Minimum frame count for a functional run to be kept
    #[serde(default)]
    pub min_frames: Option<usize>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Compiled-in fallbacks used when no config file is available
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub config_file: Option<PathBuf>,
    pub log_level: String,
    pub min_frames: usize,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            config_file: dirs::config_dir().map(|d| d.join("me-pipeline").join("config.toml")),
            log_level: default_log_level(),
            min_frames: 50,
        }
    }
}

/// Resolves which config file (if any) should be read
pub struct ConfigResolver {
    env_var: String,
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new(CONFIG_ENV_VAR)
    }
}

impl ConfigResolver {
    pub fn new(env_var: &str) -> Self {
        Self {
            env_var: env_var.to_string(),
        }
    }

    /// Pick the config file path by priority; `None` means "use defaults"
    pub fn resolve(&self, cli_arg: Option<&Path>) -> Option<PathBuf> {
        // Priority 1: Command-line argument
        if let Some(path) = cli_arg {
            return Some(path.to_path_buf());
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(&self.env_var) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        // Priority 3: Per-user config file, only if present
        CompiledDefaults::for_current_platform()
            .config_file
            .filter(|p| p.exists())
    }

    /// Resolve and load the config
    ///
    /// An explicitly requested file (CLI or env) that does not exist logs a
    /// warning and falls back to defaults. A file that exists but fails to
    /// parse is an error.
    pub fn load(&self, cli_arg: Option<&Path>) -> Result<TomlConfig> {
        match self.resolve(cli_arg) {
            Some(path) if path.exists() => load_toml_config(&path),
            Some(path) => {
                warn!("Config file not found: {}, using defaults", path.display());
                Ok(TomlConfig::default())
            }
            None => {
                info!("No config file found, using compiled defaults");
                Ok(TomlConfig::default())
            }
        }
    }
}

/// Parse a bootstrap TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` takes precedence over the configured level. When a log file is
/// configured, output goes to that file instead of stderr.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match &config.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            builder
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    installed.map_err(|e| Error::Config(format!("Logging init failed: {}", e)))
}

/// Resolved locations of the external pipeline scripts and their data
///
/// Built once and handed to whatever spawns pipeline subprocesses. Nothing
/// here touches the current process environment; `apply` sets variables on
/// a single child `Command`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolEnvironment {
    pub bin_dir: PathBuf,
    pub data_dir: PathBuf,
    pub search_path: OsString,
}

impl ToolEnvironment {
    /// Resolve `bin/` and `data/` under `tool_root` and build a `PATH` value
    /// with `bin/` prepended to the inherited search path
    pub fn prepare(tool_root: &Path) -> Result<Self> {
        if !tool_root.is_dir() {
            return Err(Error::NotFound(format!(
                "tool root {}",
                tool_root.display()
            )));
        }

        let root = tool_root.canonicalize()?;
        let bin_dir = root.join("bin");
        let data_dir = root.join("data");

        let inherited = std::env::var_os("PATH").unwrap_or_default();
        let mut entries = vec![bin_dir.clone()];
        entries.extend(std::env::split_paths(&inherited));
        let search_path = std::env::join_paths(entries)
            .map_err(|e| Error::Config(format!("Cannot build PATH: {}", e)))?;

        Ok(Self {
            bin_dir,
            data_dir,
            search_path,
        })
    }

    /// Tool root priority: explicit argument, `MEP_TOOL_ROOT`, config file,
    /// then the directory holding the running executable
    pub fn resolve(cli_arg: Option<&Path>, config: &TomlConfig) -> Result<Self> {
        if let Some(root) = cli_arg {
            return Self::prepare(root);
        }
        if let Some(root) = std::env::var_os(TOOL_ROOT_ENV_VAR) {
            return Self::prepare(Path::new(&root));
        }
        if let Some(root) = &config.tool_root {
            return Self::prepare(root);
        }
        let exe = std::env::current_exe()?;
        let root = exe
            .parent()
            .ok_or_else(|| Error::Config("Executable has no parent directory".to_string()))?;
        Self::prepare(root)
    }

    /// Set `PATH` and `DATA_DIR` on a child process
    pub fn apply<'a>(&self, command: &'a mut Command) -> &'a mut Command {
        command
            .env("PATH", &self.search_path)
            .env("DATA_DIR", &self.data_dir)
    }

    /// Shell-sourceable view of the environment
    pub fn to_shell_exports(&self) -> String {
        format!(
            "export PATH=\"{}\"\nexport DATA_DIR=\"{}\"\n",
            self.search_path.to_string_lossy(),
            self.data_dir.display()
        )
    }
}
