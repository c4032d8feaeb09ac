//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.navtree/config.toml`. If missing on first run, a
//! commented-out default is generated so users can discover all options.
//!
//! Scene description files are loaded from here too (`load_scene_file`),
//! as TOML or JSON depending on the extension.

use log::{LevelFilter, debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::OutputFormat;
use crate::core::error::NavError;
use crate::core::scene::SceneFile;

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct NavtreeConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GeneralConfig {
    pub scenes_file: Option<String>,
    pub output: Option<OutputFormat>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub file: Option<String>,
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Info;
pub const DEFAULT_LOG_FILE: &str = "navtree.log";

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub scenes_file: Option<PathBuf>,
    pub output: OutputFormat,
    pub log_level: LevelFilter,
    pub log_file: PathBuf,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Json(serde_json::Error),
    Scene(NavError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
            ConfigError::Json(e) => write!(f, "JSON parse error: {e}"),
            ConfigError::Scene(e) => write!(f, "scene error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<NavError> for ConfigError {
    fn from(e: NavError) -> Self {
        ConfigError::Scene(e)
    }
}

// ============================================================================
// Loading
// ============================================================================

/// Returns the path to `~/.navtree/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".navtree").join("config.toml"))
}

/// Load config from `~/.navtree/config.toml`.
///
/// If the file doesn't exist, generates a commented-out default and
/// returns `NavtreeConfig::default()`. If it exists but is malformed,
/// returns `ConfigError::Parse`.
pub fn load_config() -> Result<NavtreeConfig, ConfigError> {
    let path = match config_path() {
        Some(p) => p,
        None => {
            warn!("Could not determine home directory, using default config");
            return Ok(NavtreeConfig::default());
        }
    };

    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(&path);
        return Ok(NavtreeConfig::default());
    }

    load_config_from(&path)
}

pub fn load_config_from(path: &Path) -> Result<NavtreeConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: NavtreeConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    info!("Loaded config from {}", path.display());
    debug!("Config: {:?}", config);
    Ok(config)
}

/// Generates a commented-out default config file at the given path.
fn generate_default_config(path: &Path) {
    let default_content = r#"# navtree configuration
# Every setting is optional; unset ones fall back to built-in defaults.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [general]
# scenes_file = "scenes.toml"        # Or set NAVTREE_SCENES env var
# output = "outline"                 # "json", "pretty" or "outline"

# [logging]
# level = "info"                     # "off", "error", "warn", "info", "debug", "trace"
# file = "navtree.log"
"#;

    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            warn!("Failed to create config directory: {}", e);
            return;
        }
    }
    if let Err(e) = fs::write(path, default_content) {
        warn!("Failed to write default config: {}", e);
    }
}

/// Parses a scene description; `.json` files as JSON, anything else as TOML.
pub fn load_scene_file(path: &Path) -> Result<SceneFile, ConfigError> {
    let contents = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let file: SceneFile = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&contents).map_err(ConfigError::Json)?,
        _ => toml::from_str(&contents).map_err(ConfigError::Parse)?,
    };
    info!("Loaded scene description from {}", path.display());
    Ok(file)
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
///
/// `cli_scenes` and `cli_output` are from CLI flags (None = not specified).
pub fn resolve(
    config: &NavtreeConfig,
    cli_scenes: Option<&Path>,
    cli_output: Option<OutputFormat>,
) -> ResolvedConfig {
    // Scenes file: CLI → env → config
    let scenes_file = cli_scenes
        .map(Path::to_path_buf)
        .or_else(|| std::env::var("NAVTREE_SCENES").ok().map(PathBuf::from))
        .or_else(|| config.general.scenes_file.as_ref().map(PathBuf::from));

    // Log level: env → config → default
    let log_level = std::env::var("NAVTREE_LOG_LEVEL")
        .ok()
        .or_else(|| config.logging.level.clone())
        .map(|level| parse_level(&level))
        .unwrap_or(DEFAULT_LOG_LEVEL);

    // Log file: env → config → default
    let log_file: PathBuf = std::env::var("NAVTREE_LOG_FILE")
        .ok()
        .or_else(|| config.logging.file.clone())
        .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string())
        .into();

    ResolvedConfig {
        scenes_file,
        output: cli_output.or(config.general.output).unwrap_or_default(),
        log_level,
        log_file,
    }
}

fn parse_level(level: &str) -> LevelFilter {
    level.parse().unwrap_or_else(|_| {
        warn!("Unknown log level {level:?}, using {DEFAULT_LOG_LEVEL}");
        DEFAULT_LOG_LEVEL
    })
}
