pub mod config;
pub mod error;
pub mod pipeline;
pub mod types;

pub use config::{ConfigLoader, PipelineConfig};
pub use error::AppError;
pub use pipeline::{
    FnStage, PathCondition, Payload, Pipeline, PipelineOptions, ProcessContext, Rule, RuleList,
    Stage, StageContext, WorkQueue,
};
pub use types::{ErrorCategory, ErrorSeverity};
