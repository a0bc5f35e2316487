use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::AppError;

// ---------------------------------------------------------------------------
// Config structs (parsed from TOML)
// ---------------------------------------------------------------------------

/// The parsed TOML config file. All fields are optional; anything absent
/// falls back to the CLI flag, environment variable, or built-in default.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub connection: ConnectionConfig,
    pub launch: LaunchSection,
    pub render: RenderConfig,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct LaunchSection {
    pub executable: Option<String>,
    pub extra_args: Option<Vec<String>>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub settle_delay_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Default config file location: `<config_dir>/rasterize/config.toml`.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("rasterize").join("config.toml"))
}

/// Load the configuration file.
///
/// An explicit `--config` path must exist and parse; the default location
/// is optional and a missing file there yields an empty config.
///
/// # Errors
///
/// Returns `AppError` (usage-class, exit 1) if an explicit path is missing
/// or if any file fails to parse.
pub fn load(explicit: Option<&Path>) -> Result<ConfigFile, AppError> {
    if let Some(path) = explicit {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::config_invalid(&path.display().to_string(), &e.to_string())
        })?;
        return parse(&contents, path);
    }

    match default_config_path() {
        Some(path) if path.exists() => {
            let contents = std::fs::read_to_string(&path).map_err(|e| {
                AppError::config_invalid(&path.display().to_string(), &e.to_string())
            })?;
            parse(&contents, &path)
        }
        _ => Ok(ConfigFile::default()),
    }
}

fn parse(contents: &str, path: &Path) -> Result<ConfigFile, AppError> {
    toml::from_str(contents)
        .map_err(|e| AppError::config_invalid(&path.display().to_string(), &e.to_string()))
}
