#![allow(clippy::result_large_err)] // Pipeline returns AppError so stage failures keep their structured context.

use crate::core::config::PipelineConfig;
use crate::core::error::{AppError, CODE_STAGE_FAILED};
use crate::core::pipeline::matcher::matches;
use crate::core::pipeline::queue::WorkQueue;
use crate::core::pipeline::registry::StageRegistry;
use crate::core::pipeline::rules::{Rule, RuleList};
use crate::core::pipeline::stage::{Payload, ProcessContext, Stage, StageContext};
use std::sync::Arc;
use tracing::Instrument;

/// Inputs for building a [`Pipeline`].
#[derive(Default)]
pub struct PipelineOptions {
    pub rules: RuleList,
    /// Extensions that mark a path as supported regardless of stage conditions.
    pub extensions: Vec<String>,
    /// Stages listed in order; later entries override earlier ones of the same name.
    pub stages: Vec<Arc<dyn Stage>>,
}

/// Applies declared stages to payloads, last-declared first.
pub struct Pipeline {
    rules: RuleList,
    extensions: Vec<String>,
    registry: StageRegistry,
    queue: Arc<WorkQueue>,
}

/// One planned invocation: a rule plus the context its stage will receive.
struct Step<'a> {
    index: usize,
    rule: &'a Rule,
    context: StageContext,
}

impl Pipeline {
    /// Build a pipeline that submits stage calls to the process-wide queue.
    pub fn new(options: PipelineOptions) -> Self {
        Self::with_queue(options, WorkQueue::global())
    }

    pub fn with_queue(options: PipelineOptions, queue: Arc<WorkQueue>) -> Self {
        let PipelineOptions {
            rules,
            extensions,
            stages,
        } = options;
        let mut pipeline = Self {
            rules,
            extensions,
            registry: StageRegistry::new(),
            queue,
        };
        for stage in stages {
            pipeline.list_stage(stage);
        }
        pipeline
    }

    /// Build from loaded configuration. Fails on invalid rule declarations.
    pub fn from_config(
        config: &PipelineConfig,
        stages: Vec<Arc<dyn Stage>>,
        queue: Arc<WorkQueue>,
    ) -> Result<Self, AppError> {
        let rules = config.rule_list()?;
        Ok(Self::with_queue(
            PipelineOptions {
                rules,
                extensions: config.extensions.clone(),
                stages,
            },
            queue,
        ))
    }

    /// Make `stage` active if a rule references it. Returns whether it was listed.
    pub fn list_stage(&mut self, stage: Arc<dyn Stage>) -> bool {
        self.registry.register(&self.rules, stage)
    }

    pub fn unlist_stage(&mut self, name: &str) -> bool {
        let removed = self.registry.unregister(name);
        if removed {
            tracing::info!(stage = name, "stage unlisted");
        }
        removed
    }

    pub fn get_stage(&self, name: &str) -> Option<Arc<dyn Stage>> {
        self.registry.get(name)
    }

    /// Active stage names in active order.
    pub fn stage_names(&self) -> Vec<String> {
        self.registry.names()
    }

    pub fn rules(&self) -> &RuleList {
        &self.rules
    }

    pub fn queue(&self) -> &Arc<WorkQueue> {
        &self.queue
    }

    /// Whether `path` has a configured extension or matches an active stage condition.
    pub fn is_supported(&self, path: &str) -> bool {
        let lowered = path.to_lowercase();
        self.extensions.iter().any(|ext| lowered.ends_with(ext.as_str()))
            || self.registry.any_matches(path)
    }

    /// Run every applicable stage over a copy of `payload`, one step at a time.
    ///
    /// Steps follow the rule list in reverse. A rule whose stage is missing, or whose
    /// stage neither always processes nor matches `context.id`, passes the payload
    /// through. The first stage failure ends the run and is returned.
    pub async fn process(
        &self,
        payload: &Payload,
        context: &ProcessContext,
    ) -> Result<Payload, AppError> {
        let steps = self.plan(context);
        let span = tracing::debug_span!("process", id = %context.id, steps = steps.len());
        async move {
            let mut current = payload.clone();
            for step in steps {
                current = self.run_step(step, current).await?;
            }
            Ok(current)
        }
        .instrument(span)
        .await
    }

    fn plan(&self, context: &ProcessContext) -> Vec<Step<'_>> {
        self.rules
            .iter()
            .rev()
            .enumerate()
            .map(|(index, rule)| Step {
                index,
                rule,
                context: context.for_rule(&rule.options),
            })
            .collect()
    }

    async fn run_step(&self, step: Step<'_>, payload: Payload) -> Result<Payload, AppError> {
        let name = step.rule.stage_name.as_str();
        let Some(stage) = self.registry.get(name) else {
            tracing::trace!(stage = name, step = step.index, "stage not listed; passing through");
            return Ok(payload);
        };
        if !stage.always_process() && !matches(&step.context.id, stage.condition()) {
            tracing::trace!(stage = name, step = step.index, "stage does not apply; passing through");
            return Ok(payload);
        }

        tracing::debug!(stage = name, step = step.index, "running stage");
        self.queue
            .submit(stage.process(payload, step.context))
            .await
            .map_err(|err| stage_failure(err, name, step.index))
    }
}

fn stage_failure(mut err: AppError, stage: &str, step: usize) -> AppError {
    if err.has_generated_code() {
        err.code = CODE_STAGE_FAILED.to_string();
    }
    err.add_context("stage", stage);
    err.add_context("step", &step.to_string());
    tracing::warn!(stage, step, code = %err.code, "stage failed: {}", err.message);
    err
}
