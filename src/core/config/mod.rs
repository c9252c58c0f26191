#![allow(clippy::result_large_err)]

pub mod loader;
pub mod validation;

pub use loader::ConfigLoader;
pub use validation::ConfigValidator;

use crate::core::error::AppError;
use crate::core::pipeline::queue::WorkQueue;
use crate::core::pipeline::rules::RuleList;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Pipeline configuration loaded from stagechain.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Rule declarations in declared order
    #[serde(rename = "use", default)]
    pub rules: Vec<Value>,

    /// Extensions always treated as supported
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Native worker pool size the work queue is sized against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_pool_size: Option<usize>,
}

fn default_extensions() -> Vec<String> {
    [".css", ".pcss", ".postcss", ".sss"]
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            extensions: default_extensions(),
            thread_pool_size: None,
        }
    }
}

impl PipelineConfig {
    /// Parse the declared rules.
    pub fn rule_list(&self) -> Result<RuleList, AppError> {
        RuleList::parse(&self.rules)
    }

    /// Build a work queue sized for the configured worker pool.
    pub fn work_queue(&self) -> WorkQueue {
        WorkQueue::for_thread_pool_size(self.thread_pool_size)
    }
}
