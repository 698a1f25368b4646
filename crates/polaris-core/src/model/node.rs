//! Knowledge Node — the fundamental unit of the strategic graph.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Five-tier strategic taxonomy plus the supporting entity types (spec.md §3).
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum NodeType {
    SelfNode,
    Vision,
    Goal,
    Project,
    #[default]
    Task,
    Action,
    Insight,
    Person,
    Organization,
    Concept,
    Log,
    Event,
    Experience,
    Tool,
}

impl Serialize for NodeType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NodeType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(NodeType::parse_name(&s))
    }
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::SelfNode => "Self",
            NodeType::Vision => "Vision",
            NodeType::Goal => "Goal",
            NodeType::Project => "Project",
            NodeType::Task => "Task",
            NodeType::Action => "Action",
            NodeType::Insight => "Insight",
            NodeType::Person => "Person",
            NodeType::Organization => "Organization",
            NodeType::Concept => "Concept",
            NodeType::Log => "Log",
            NodeType::Event => "Event",
            NodeType::Experience => "Experience",
            NodeType::Tool => "Tool",
        }
    }

    /// Parse a type name as returned by the extractor. Unrecognized types
    /// degrade to `Concept` (spec.md §9, "Dynamic/unstructured LLM output").
    pub fn parse_name(s: &str) -> Self {
        match s {
            "Self" => NodeType::SelfNode,
            "Vision" => NodeType::Vision,
            "Goal" => NodeType::Goal,
            "Project" => NodeType::Project,
            "Task" => NodeType::Task,
            "Action" => NodeType::Action,
            "Insight" => NodeType::Insight,
            "Person" => NodeType::Person,
            "Organization" => NodeType::Organization,
            "Concept" => NodeType::Concept,
            "Log" => NodeType::Log,
            "Event" => NodeType::Event,
            "Experience" => NodeType::Experience,
            "Tool" => NodeType::Tool,
            _ => NodeType::Concept,
        }
    }

    /// Sort rank used by the `strategic` view (Self→Vision→Goal→Project→Task→Insight→others).
    pub fn strategic_rank(&self) -> u8 {
        match self {
            NodeType::SelfNode => 0,
            NodeType::Vision => 1,
            NodeType::Goal => 2,
            NodeType::Project => 3,
            NodeType::Task => 4,
            NodeType::Insight => 5,
            _ => 6,
        }
    }

    /// The default `alignment_score` for a freshly created node of this type
    /// (1.0 for Self/Vision, 0.5 otherwise — spec.md §3).
    pub fn default_alignment_score(&self) -> f64 {
        match self {
            NodeType::SelfNode | NodeType::Vision => 1.0,
            _ => 0.5,
        }
    }

    /// Whether nodes of this type start life `pending` when created purely by
    /// extraction (Task and Person do; everything else starts `confirmed`).
    pub fn default_pending_on_extraction(&self) -> bool {
        matches!(self, NodeType::Task | NodeType::Person)
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Staging/confirmation lifecycle state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Pending,
    Confirmed,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Pending => "pending",
            NodeStatus::Confirmed => "confirmed",
        }
    }

    pub fn parse_name(s: &str) -> Self {
        match s {
            "pending" => NodeStatus::Pending,
            _ => NodeStatus::Confirmed,
        }
    }
}

/// Start/target date pair carried on a node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_date: Option<DateTime<Utc>>,
}

/// A node in the strategic graph.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub user_id: String,
    pub node_type: NodeType,
    pub name: String,
    pub content: String,
    /// Free-form key/value blob, including the `dossier` field merged on upsert.
    #[serde(default)]
    pub attributes: Value,
    pub status: NodeStatus,
    #[serde(default)]
    pub time_metadata: TimeMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategic_role: Option<String>,
    pub energy_impact: i32,
    pub alignment_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Node {
    /// Construct a node with the defaults an extraction pass would apply:
    /// `pending` for Task/Person, `confirmed` otherwise; alignment_score per
    /// the type default; stable id derived from `name` unless it is a
    /// Self/Vision singleton (callers override those explicitly).
    pub fn new(user_id: impl Into<String>, node_type: NodeType, name: impl Into<String>) -> Self {
        let name = name.into();
        let id = stable_id(&name);
        let status = if node_type.default_pending_on_extraction() {
            NodeStatus::Pending
        } else {
            NodeStatus::Confirmed
        };
        Self {
            id,
            user_id: user_id.into(),
            alignment_score: node_type.default_alignment_score(),
            node_type,
            name,
            content: String::new(),
            attributes: Value::Object(Default::default()),
            status,
            time_metadata: TimeMetadata::default(),
            strategic_role: None,
            energy_impact: 0,
            source_file: None,
            created_at: Utc::now(),
        }
    }
}

/// Deterministic id for a non-Self/Vision entity: `con_{hex16(md5(name))}`.
///
/// Pure function of `name` so repeated extraction of the same canonical name
/// converges on the same node — the basis of idempotent upsert.
pub fn stable_id(name: &str) -> String {
    let digest = md5::compute(name.as_bytes());
    let hex = format!("{:x}", digest);
    format!("con_{}", &hex[..16])
}

/// The canonical `Self` node id for a user: `user_id` itself.
pub fn self_node_id(user_id: &str) -> String {
    user_id.to_string()
}

/// The canonical `Vision` node id for a user: `vision_{user_id}`.
pub fn vision_node_id(user_id: &str) -> String {
    format!("vision_{}", user_id)
}
