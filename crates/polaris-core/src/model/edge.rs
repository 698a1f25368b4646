//! Directed, typed edges between nodes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The closed relation vocabulary used by the core (spec.md §3). Unrecognized
/// relation strings degrade to `RelatesTo` at the point a consumer interprets
/// them; the edge row itself always stores the raw string verbatim so no
/// extractor output is silently lost.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Owns,
    DecomposesTo,
    AchievedBy,
    HasGoal,
    HasProject,
    ConsistsOf,
    HasTask,
    Executes,
    Mentions,
    RelatesTo,
    Knows,
    Supports,
    PartnersWith,
    BelongsTo,
    Influences,
    ContributesTo,
    BlockedBy,
    Generates,
    Defines,
    IsA,
    PartOf,
}

impl Relation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::Owns => "OWNS",
            Relation::DecomposesTo => "DECOMPOSES_TO",
            Relation::AchievedBy => "ACHIEVED_BY",
            Relation::HasGoal => "HAS_GOAL",
            Relation::HasProject => "HAS_PROJECT",
            Relation::ConsistsOf => "CONSISTS_OF",
            Relation::HasTask => "HAS_TASK",
            Relation::Executes => "EXECUTES",
            Relation::Mentions => "MENTIONS",
            Relation::RelatesTo => "RELATES_TO",
            Relation::Knows => "KNOWS",
            Relation::Supports => "SUPPORTS",
            Relation::PartnersWith => "PARTNERS_WITH",
            Relation::BelongsTo => "BELONGS_TO",
            Relation::Influences => "INFLUENCES",
            Relation::ContributesTo => "CONTRIBUTES_TO",
            Relation::BlockedBy => "BLOCKED_BY",
            Relation::Generates => "GENERATES",
            Relation::Defines => "DEFINES",
            Relation::IsA => "IS_A",
            Relation::PartOf => "PART_OF",
        }
    }

    /// Degrade any relation string to a known member of the closed set,
    /// falling back to `RelatesTo`. Used by consumers of stored edges, never
    /// by the writer (which stores the raw string as-is).
    pub fn degrade(raw: &str) -> Relation {
        match raw {
            "OWNS" => Relation::Owns,
            "DECOMPOSES_TO" => Relation::DecomposesTo,
            "ACHIEVED_BY" => Relation::AchievedBy,
            "HAS_GOAL" => Relation::HasGoal,
            "HAS_PROJECT" => Relation::HasProject,
            "CONSISTS_OF" => Relation::ConsistsOf,
            "HAS_TASK" => Relation::HasTask,
            "EXECUTES" => Relation::Executes,
            "MENTIONS" => Relation::Mentions,
            "KNOWS" => Relation::Knows,
            "SUPPORTS" => Relation::Supports,
            "PARTNERS_WITH" => Relation::PartnersWith,
            "BELONGS_TO" => Relation::BelongsTo,
            "INFLUENCES" => Relation::Influences,
            "CONTRIBUTES_TO" => Relation::ContributesTo,
            "BLOCKED_BY" => Relation::BlockedBy,
            "GENERATES" => Relation::Generates,
            "DEFINES" => Relation::Defines,
            "IS_A" => Relation::IsA,
            "PART_OF" => Relation::PartOf,
            _ => Relation::RelatesTo,
        }
    }
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A directed edge. Composite primary key is (`source`, `target`, `relation`,
/// `user_id`); inserts are idempotent (insert-ignore at the store).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub source: String,
    pub target: String,
    /// Stored verbatim; use `Relation::degrade` to interpret against the closed set.
    pub relation: String,
    pub user_id: String,
    #[serde(default)]
    pub properties: Value,
    pub created_at: DateTime<Utc>,
}

impl Edge {
    pub fn new(
        user_id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        relation: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relation: relation.into(),
            user_id: user_id.into(),
            properties: Value::Object(Default::default()),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_relation_degrades_to_relates_to() {
        assert_eq!(Relation::degrade("FRIENDS_WITH"), Relation::RelatesTo);
    }

    #[test]
    fn known_relation_roundtrips() {
        for r in [Relation::Owns, Relation::HasGoal, Relation::BlockedBy] {
            assert_eq!(Relation::degrade(r.as_str()), r);
        }
    }
}
