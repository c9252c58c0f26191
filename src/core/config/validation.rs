#![allow(clippy::result_large_err)]

use super::PipelineConfig;
use crate::core::error::{AppError, CODE_INVALID_CONFIG};
use crate::core::types::ErrorCategory;

pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate configuration rules
    pub fn validate(config: &PipelineConfig) -> Result<(), AppError> {
        if config.thread_pool_size == Some(0) {
            return Err(AppError::new(
                ErrorCategory::ValidationError,
                "thread_pool_size must be >= 1",
            )
            .with_code(CODE_INVALID_CONFIG));
        }

        if let Some(ext) = config.extensions.iter().find(|ext| ext.trim().is_empty()) {
            return Err(AppError::new(
                ErrorCategory::ValidationError,
                format!("extensions must not contain blank entries, got {:?}", ext),
            )
            .with_code(CODE_INVALID_CONFIG));
        }

        config.rule_list()?;
        Ok(())
    }
}
