use crate::core::pipeline::matcher::matches;
use crate::core::pipeline::rules::RuleList;
use crate::core::pipeline::stage::Stage;
use std::sync::Arc;

/// Active stages, restricted to names declared by the rule list.
///
/// Same-name registration replaces the earlier entry and moves it to the end.
#[derive(Clone, Default)]
pub struct StageRegistry {
    stages: Vec<Arc<dyn Stage>>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `stage` if `rules` references it. Returns whether it was added.
    pub fn register(&mut self, rules: &RuleList, stage: Arc<dyn Stage>) -> bool {
        let name = stage.name().to_string();
        if !rules.declares(&name) {
            tracing::debug!(stage = %name, "stage not referenced by rules; ignoring");
            return false;
        }
        let replaced = self.unregister(&name);
        self.stages.push(stage);
        tracing::info!(stage = %name, replaced, "stage registered");
        true
    }

    /// Remove any stage named `name`. Returns whether one was removed.
    pub fn unregister(&mut self, name: &str) -> bool {
        let before = self.stages.len();
        self.stages.retain(|stage| stage.name() != name);
        before != self.stages.len()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Stage>> {
        self.stages
            .iter()
            .find(|stage| stage.name() == name)
            .cloned()
    }

    /// Whether any active stage's condition matches `path`.
    pub fn any_matches(&self, path: &str) -> bool {
        self.stages
            .iter()
            .any(|stage| matches(path, stage.condition()))
    }

    pub fn names(&self) -> Vec<String> {
        self.stages
            .iter()
            .map(|stage| stage.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
