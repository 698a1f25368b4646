//! Core data model: nodes, edges, views, and experiences.
//!
//! Mirrors the five-tier strategic graph (Self → Vision → Goal → Project →
//! Task, plus People and Concepts) described in the specification. Nodes and
//! edges are flat rows — the engine never materializes an in-memory object
//! graph; traversal happens in SQL plus a small seen-id set at the view
//! layer (see `graph::views`).

mod edge;
mod experience;
mod node;
mod view;

pub use edge::{Edge, Relation};
pub use experience::Experience;
pub use node::{stable_id, self_node_id, vision_node_id, Node, NodeStatus, NodeType, TimeMetadata};
pub use view::{GraphData, GraphStats, ViewType};
