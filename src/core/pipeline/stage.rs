use crate::core::error::AppError;
use crate::core::pipeline::matcher::PathCondition;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

/// Content flowing through the pipeline. Each stage returns a replacement value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted: Option<Value>,
}

impl Payload {
    pub fn new<T: Into<String>>(code: T) -> Self {
        Self {
            code: code.into(),
            map: None,
            extracted: None,
        }
    }

    pub fn with_map<T: Into<String>>(mut self, map: T) -> Self {
        self.map = Some(map.into());
        self
    }
}

/// Context shared by every step of one `process` call.
#[derive(Clone, Debug, Default)]
pub struct ProcessContext {
    /// Identifying path of the payload, used for condition matching.
    pub id: String,
    pub source_map: bool,
    dependencies: Arc<Mutex<BTreeSet<PathBuf>>>,
    warnings: Arc<Mutex<Vec<String>>>,
}

impl ProcessContext {
    pub fn new<T: Into<String>>(id: T) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_source_map(mut self, enabled: bool) -> Self {
        self.source_map = enabled;
        self
    }

    /// Derive the context handed to one stage, carrying that rule's options.
    pub fn for_rule(&self, options: &Map<String, Value>) -> StageContext {
        StageContext {
            id: self.id.clone(),
            source_map: self.source_map,
            options: options.clone(),
            dependencies: Arc::clone(&self.dependencies),
            warnings: Arc::clone(&self.warnings),
        }
    }

    /// Files reported as dependencies by stages so far.
    pub fn dependencies(&self) -> Vec<PathBuf> {
        self.dependencies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Warnings reported by stages so far, in report order.
    pub fn warnings(&self) -> Vec<String> {
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Per-step view of the process context.
#[derive(Clone, Debug)]
pub struct StageContext {
    pub id: String,
    pub source_map: bool,
    pub options: Map<String, Value>,
    dependencies: Arc<Mutex<BTreeSet<PathBuf>>>,
    warnings: Arc<Mutex<Vec<String>>>,
}

impl StageContext {
    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    pub fn add_dependency<P: Into<PathBuf>>(&self, path: P) {
        self.dependencies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into());
    }

    pub fn warn<T: Into<String>>(&self, message: T) {
        let message = message.into();
        tracing::warn!(id = %self.id, "{}", message);
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
    }
}

/// Transform registered under a unique name.
#[async_trait]
pub trait Stage: Send + Sync + 'static {
    /// Name referenced by rules.
    fn name(&self) -> &str;

    /// Path condition; `None` never matches by path.
    fn condition(&self) -> Option<&PathCondition> {
        None
    }

    /// Run regardless of the payload path.
    fn always_process(&self) -> bool {
        false
    }

    async fn process(&self, payload: Payload, ctx: StageContext) -> Result<Payload, AppError>;
}

type StageFn =
    Arc<dyn Fn(Payload, StageContext) -> BoxFuture<'static, Result<Payload, AppError>> + Send + Sync>;

/// Stage backed by a closure.
#[derive(Clone)]
pub struct FnStage {
    name: String,
    condition: Option<PathCondition>,
    always_process: bool,
    run: StageFn,
}

impl FnStage {
    pub fn new<N, F, Fut>(name: N, run: F) -> Self
    where
        N: Into<String>,
        F: Fn(Payload, StageContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Payload, AppError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            condition: None,
            always_process: false,
            run: Arc::new(move |payload, ctx| Box::pin(run(payload, ctx))),
        }
    }

    pub fn with_condition(mut self, condition: PathCondition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn always(mut self) -> Self {
        self.always_process = true;
        self
    }
}

#[async_trait]
impl Stage for FnStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn condition(&self) -> Option<&PathCondition> {
        self.condition.as_ref()
    }

    fn always_process(&self) -> bool {
        self.always_process
    }

    async fn process(&self, payload: Payload, ctx: StageContext) -> Result<Payload, AppError> {
        (self.run)(payload, ctx).await
    }
}
