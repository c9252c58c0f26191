#![allow(clippy::result_large_err)]

use super::{ConfigValidator, PipelineConfig};
use crate::core::error::AppError;
use crate::core::pipeline::queue::thread_pool_size_from_env;
use crate::core::types::ErrorCategory;
use std::path::Path;

/// File name looked up in a project root.
pub const CONFIG_FILE_NAME: &str = "stagechain.toml";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load config from project root (root/stagechain.toml)
    /// Environment variables override config file values
    pub fn load_from_workspace(workspace_path: &Path) -> Result<PipelineConfig, AppError> {
        Self::load(&workspace_path.join(CONFIG_FILE_NAME))
    }

    /// Load defaults, then the file at `path` if present, then env overrides, then validate.
    pub fn load(path: &Path) -> Result<PipelineConfig, AppError> {
        let mut config = Self::load_from_file(path)?.unwrap_or_default();
        Self::apply_env_overrides(&mut config);
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Load config from specific file path
    /// Returns Ok(None) if file doesn't exist
    pub fn load_from_file(path: &Path) -> Result<Option<PipelineConfig>, AppError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::new(
                ErrorCategory::IoError,
                format!("Failed to read config file {}: {}", path.display(), e),
            )
        })?;

        let config: PipelineConfig = toml::from_str(&content).map_err(|e| {
            AppError::new(
                ErrorCategory::SerializationError,
                format!("Failed to parse config file {}: {}", path.display(), e),
            )
        })?;

        Ok(Some(config))
    }

    fn apply_env_overrides(config: &mut PipelineConfig) {
        if let Some(size) = thread_pool_size_from_env() {
            config.thread_pool_size = Some(size);
        }
    }
}
