//! Engine configuration.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a graphlet engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum selection-set nesting accepted by the analyzer.
    pub max_depth: usize,
    /// Maximum query complexity accepted by the analyzer.
    pub max_complexity: usize,
    /// Estimated list size used when weighing a list field's subtree.
    pub list_cost_multiplier: usize,
    /// Per-field cost overrides keyed `"Type.field"` (default cost is 1).
    pub field_costs: FxHashMap<String, usize>,
    /// Deadline for a whole request, in milliseconds.
    pub request_timeout_ms: u64,
    /// Reject requests that carry an inline operation instead of a
    /// persisted-query identifier.
    pub enforce_persisted_queries_only: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: 32,
            max_complexity: 10_000,
            list_cost_multiplier: 10,
            field_costs: FxHashMap::default(),
            request_timeout_ms: 30_000,
            enforce_persisted_queries_only: false,
        }
    }
}

impl EngineConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum query depth.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Sets the maximum query complexity.
    pub fn with_max_complexity(mut self, complexity: usize) -> Self {
        self.max_complexity = complexity;
        self
    }

    /// Sets the list-size estimate used by the analyzer.
    pub fn with_list_cost_multiplier(mut self, multiplier: usize) -> Self {
        self.list_cost_multiplier = multiplier;
        self
    }

    /// Overrides the cost of one field.
    pub fn with_field_cost(mut self, field: impl Into<String>, cost: usize) -> Self {
        self.field_costs.insert(field.into(), cost);
        self
    }

    /// Sets the request deadline.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Requires persisted-query identifiers on every request.
    pub fn with_persisted_queries_only(mut self) -> Self {
        self.enforce_persisted_queries_only = true;
        self
    }

    /// The request deadline as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// The cost of one field, honoring overrides.
    pub fn field_cost(&self, type_name: &str, field_name: &str) -> usize {
        self.field_costs
            .get(&format!("{}.{}", type_name, field_name))
            .copied()
            .unwrap_or(1)
    }
}
