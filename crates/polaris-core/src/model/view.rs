//! Graph projection types returned by `GraphStore::get_graph_data` / `get_stats`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{Edge, Node};

/// One of the four view-typed graph projections (spec.md §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewType {
    Global,
    Strategic,
    People,
    Staging,
}

impl ViewType {
    pub fn parse_name(s: &str) -> Self {
        match s {
            "strategic" => ViewType::Strategic,
            "people" | "social" => ViewType::People,
            "staging" => ViewType::Staging,
            _ => ViewType::Global,
        }
    }

    /// Row cap applied to the primary node set before ghost-node auto-fill.
    pub fn cap(&self) -> usize {
        match self {
            ViewType::Global => 2000,
            ViewType::Strategic => 1000,
            ViewType::People => 2000,
            ViewType::Staging => 2000,
        }
    }
}

/// `{nodes, links}` projection consumed by the UI and retrieval layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphData {
    pub nodes: Vec<Node>,
    pub links: Vec<Edge>,
}

/// Node/edge counts returned by `GetStats`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphStats {
    pub total_nodes: i64,
    pub nodes_by_type: HashMap<String, i64>,
    pub total_edges: i64,
}
