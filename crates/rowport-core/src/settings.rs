//! Settings file loading
//!
//! Settings live in `<config_dir>/rowport/settings.toml`. Every key is
//! optional; missing sections fall back to their defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Result, RowportError};

/// How an ambiguous `NN/NN/YYYY` date is read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateOrder {
    /// `03/04/2026` is March 4th
    #[default]
    MonthFirst,
    /// `03/04/2026` is April 3rd
    DayFirst,
}

/// Per-row write failure policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnError {
    /// Record the failure and continue with the next row
    #[default]
    Skip,
    /// Stop before the next batch
    Abort,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub chunk_size: usize,
    pub csv_bom: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            csv_bom: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    pub batch_size: usize,
    pub validate_first: bool,
    pub on_error: OnError,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            batch_size: 100,
            validate_first: false,
            on_error: OnError::Skip,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatSettings {
    pub date_order: DateOrder,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RowportSettings {
    pub export: ExportSettings,
    pub import: ImportSettings,
    pub formats: FormatSettings,
}

impl RowportSettings {
    /// Default settings file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("rowport").join("settings.toml"))
    }

    /// Read and validate a settings file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                RowportError::NotFound(format!("settings file {}", path.display()))
            }
            _ => RowportError::Io(e),
        })?;
        let settings: Self = toml::from_str(&text).map_err(|e| {
            RowportError::Configuration(format!("{}: {}", path.display(), e))
        })?;
        settings.validate()?;
        tracing::debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    /// Load `path` if given, else the default file if it exists, else defaults.
    ///
    /// An explicitly given file that does not exist is an error.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.export.chunk_size == 0 {
            return Err(RowportError::Configuration(
                "export.chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.import.batch_size == 0 {
            return Err(RowportError::Configuration(
                "import.batch_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
