//! Ordered stage pipeline with a shared bounded work queue.

pub mod executor;
pub mod matcher;
pub mod queue;
pub mod registry;
pub mod rules;
pub mod stage;

pub use executor::{Pipeline, PipelineOptions};
pub use matcher::{matches, PathCondition, PathPattern};
pub use queue::WorkQueue;
pub use registry::StageRegistry;
pub use rules::{Rule, RuleList};
pub use stage::{FnStage, Payload, ProcessContext, Stage, StageContext};
