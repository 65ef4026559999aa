use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PlannerError, PlannerResult};

/// Per-node planner settings.
///
/// Every field is optional in the JSON form; missing fields take the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Shard allocation awareness attributes of the cluster. Routing does not
    /// support them yet, so any value here makes sharded reads fail.
    pub awareness_attributes: Vec<String>,
    /// Skip shards without an active copy instead of failing the query.
    pub ignore_missing_shards: bool,
    /// Plan `SELECT count(*)` as a dedicated count phase.
    pub count_pushdown: bool,
    /// Group on the collector when the keys are the clustered-by column or the primary key.
    pub reduce_on_collector: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            awareness_attributes: vec![],
            ignore_missing_shards: false,
            count_pushdown: true,
            reduce_on_collector: true,
        }
    }
}

impl PlannerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ignoring_missing_shards() -> Self {
        Self { ignore_missing_shards: true, ..Self::default() }
    }

    /// Plain two-tier planning: no count phase, no collector-local group by.
    pub fn generic() -> Self {
        Self { count_pushdown: false, reduce_on_collector: false, ..Self::default() }
    }

    pub fn with_awareness_attributes(mut self, attributes: &[&str]) -> Self {
        self.awareness_attributes = attributes.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn from_json(json: &str) -> PlannerResult<Self> {
        serde_json::from_str(json).map_err(|e| PlannerError::InvalidConfig(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> PlannerResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| PlannerError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }
}
