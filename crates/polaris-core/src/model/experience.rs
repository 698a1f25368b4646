//! Distilled strategy records produced by the Evolution Service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A `(trigger, insight, strategy)` tuple, paired with a vector entry in the
/// experience collection keyed by `id` (spec.md §3, §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experience {
    pub id: String,
    pub user_id: String,
    pub trigger_scenario: String,
    pub insight: String,
    pub strategy: String,
    pub created_at: DateTime<Utc>,
}

impl Experience {
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        trigger_scenario: impl Into<String>,
        insight: impl Into<String>,
        strategy: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            trigger_scenario: trigger_scenario.into(),
            insight: insight.into(),
            strategy: strategy.into(),
            created_at: Utc::now(),
        }
    }
}
