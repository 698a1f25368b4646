//! Staging mirror — the human-gated airlock between extraction and the
//! canonical graph (spec.md §4.1, §9 "Human-in-the-loop").

use rusqlite::params;
use serde_json::json;

use crate::error::GraphResult;
use crate::model::{Edge, GraphData, Node};

use super::store::GraphStore;

impl GraphStore {
    /// Load extracted nodes/edges into the staging mirror, tagging every
    /// node with `source_file`. Additive; staging primary keys absorb
    /// duplicates from re-ingesting the same file (idempotency, not dedup).
    pub fn add_to_staging(
        &self,
        user_id: &str,
        nodes: Vec<Node>,
        edges: Vec<Edge>,
        source_file: &str,
    ) -> GraphResult<()> {
        for mut node in nodes {
            node.user_id = user_id.to_string();
            node.source_file = Some(source_file.to_string());
            if let Err(e) = self.upsert_node("staging_nodes", node) {
                tracing::warn!(error = %e, "skipping invalid staged node");
            }
        }
        for mut edge in edges {
            edge.user_id = user_id.to_string();
            if let Err(e) = self.upsert_edge("staging_nodes", "staging_edges", edge) {
                tracing::warn!(error = %e, "skipping invalid staged edge");
            }
        }
        Ok(())
    }

    pub fn get_staging(&self, user_id: &str) -> GraphResult<GraphData> {
        let conn = self.reader()?;
        let mut node_stmt =
            conn.prepare("SELECT * FROM staging_nodes WHERE user_id = ?1 ORDER BY created_at")?;
        let nodes: Vec<Node> = node_stmt
            .query_map(params![user_id], Self::node_from_row)?
            .filter_map(Result::ok)
            .collect();

        let mut edge_stmt =
            conn.prepare("SELECT * FROM staging_edges WHERE user_id = ?1 ORDER BY created_at")?;
        let links: Vec<Edge> = edge_stmt
            .query_map(params![user_id], Self::edge_from_row)?
            .filter_map(Result::ok)
            .collect();

        Ok(GraphData { nodes, links })
    }

    /// Promote staged rows to canonical. `node_ids = None` promotes
    /// everything; otherwise only the given subset, and only edges whose
    /// both endpoints are in that subset (spec.md §4.1).
    pub fn commit_staging(&self, user_id: &str, node_ids: Option<&[String]>) -> GraphResult<usize> {
        let staged = self.get_staging(user_id)?;
        let selected: Vec<Node> = match node_ids {
            Some(ids) => staged
                .nodes
                .into_iter()
                .filter(|n| ids.contains(&n.id))
                .collect(),
            None => staged.nodes,
        };
        let selected_ids: std::collections::HashSet<&str> =
            selected.iter().map(|n| n.id.as_str()).collect();

        let promoted_edges: Vec<Edge> = staged
            .links
            .into_iter()
            .filter(|e| selected_ids.contains(e.source.as_str()) && selected_ids.contains(e.target.as_str()))
            .collect();

        let promoted_count = selected.len();
        for node in &selected {
            self.upsert_node("nodes", node.clone())?;
        }
        for edge in &promoted_edges {
            self.upsert_edge("nodes", "edges", edge.clone())?;
        }

        let conn = self.writer()?;
        for node in &selected {
            conn.execute(
                "DELETE FROM staging_nodes WHERE id = ?1 AND user_id = ?2",
                params![node.id, user_id],
            )?;
        }
        for edge in &promoted_edges {
            conn.execute(
                "DELETE FROM staging_edges WHERE source = ?1 AND target = ?2 AND relation = ?3 AND user_id = ?4",
                params![edge.source, edge.target, edge.relation, user_id],
            )?;
        }
        Ok(promoted_count)
    }

    /// Rewrite staged edges from `source_id` to point at `target_id`
    /// (master), then delete `source_id` (slave). Reversible at the record
    /// level only in the sense that it acts solely on staging rows.
    pub fn merge_staging(&self, user_id: &str, source_id: &str, target_id: &str) -> GraphResult<()> {
        let conn = self.writer()?;
        conn.execute(
            "UPDATE OR IGNORE staging_edges SET source = ?1 WHERE source = ?2 AND user_id = ?3",
            params![target_id, source_id, user_id],
        )?;
        conn.execute(
            "UPDATE OR IGNORE staging_edges SET target = ?1 WHERE target = ?2 AND user_id = ?3",
            params![target_id, source_id, user_id],
        )?;
        conn.execute(
            "DELETE FROM staging_edges WHERE (source = ?1 OR target = ?1) AND user_id = ?2",
            params![source_id, user_id],
        )?;
        conn.execute(
            "DELETE FROM staging_nodes WHERE id = ?1 AND user_id = ?2",
            params![source_id, user_id],
        )?;
        Ok(())
    }

    pub fn update_staging_node(&self, node: Node) -> GraphResult<Node> {
        self.upsert_node("staging_nodes", node)
    }

    pub fn delete_staging_node(&self, user_id: &str, node_id: &str) -> GraphResult<bool> {
        let conn = self.writer()?;
        conn.execute(
            "DELETE FROM staging_edges WHERE (source = ?1 OR target = ?1) AND user_id = ?2",
            params![node_id, user_id],
        )?;
        let changed = conn.execute(
            "DELETE FROM staging_nodes WHERE id = ?1 AND user_id = ?2",
            params![node_id, user_id],
        )?;
        Ok(changed > 0)
    }

    pub fn clear_staging(&self, user_id: &str) -> GraphResult<()> {
        let conn = self.writer()?;
        conn.execute(
            "DELETE FROM staging_nodes WHERE user_id = ?1",
            params![user_id],
        )?;
        conn.execute(
            "DELETE FROM staging_edges WHERE user_id = ?1",
            params![user_id],
        )?;
        Ok(())
    }
}
