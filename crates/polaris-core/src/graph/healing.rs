//! Self-healing: duplicate-vision/self merging and id canonicalization,
//! run idempotently on every `GraphStore::open` (spec.md §4.1, §8 scenario 4).

use rusqlite::{params, Connection};

use crate::error::GraphResult;
use crate::model::{self_node_id, vision_node_id};

use super::store::GraphStore;

impl GraphStore {
    /// Merges stray `Self`/`Vision` nodes into the canonical singleton for
    /// their user, in both the canonical graph and the staging mirror.
    pub fn self_heal(&self) -> GraphResult<()> {
        let conn = self.writer()?;
        heal_singleton(&conn, "nodes", "edges", "Vision", vision_node_id)?;
        heal_singleton(&conn, "nodes", "edges", "Self", self_node_id)?;
        heal_singleton(&conn, "staging_nodes", "staging_edges", "Vision", vision_node_id)?;
        heal_singleton(&conn, "staging_nodes", "staging_edges", "Self", self_node_id)?;
        Ok(())
    }
}

fn heal_singleton(
    conn: &Connection,
    node_table: &str,
    edge_table: &str,
    node_type: &str,
    canonical_id: fn(&str) -> String,
) -> GraphResult<()> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, user_id, content FROM {node_table} WHERE type = ?1"
    ))?;
    let strays: Vec<(String, String, String)> = stmt
        .query_map(params![node_type], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?
        .filter_map(Result::ok)
        .collect();
    drop(stmt);

    for (id, user_id, content) in strays {
        let canonical = canonical_id(&user_id);
        if id == canonical {
            continue;
        }

        let canonical_exists: bool = conn
            .query_row(
                &format!("SELECT 1 FROM {node_table} WHERE id = ?1"),
                params![canonical],
                |_| Ok(true),
            )
            .unwrap_or(false);

        redirect_edges(conn, edge_table, &id, &canonical)?;

        if canonical_exists {
            if !content.trim().is_empty() {
                conn.execute(
                    &format!(
                        "UPDATE {node_table} SET content = TRIM(content || ' ' || ?1)
                         WHERE id = ?2 AND (content IS NULL OR content NOT LIKE '%' || ?1 || '%')"
                    ),
                    params![content, canonical],
                )?;
            }
            conn.execute(
                &format!("DELETE FROM {node_table} WHERE id = ?1"),
                params![id],
            )?;
            tracing::info!(stray = id, canonical, node_type, "self-heal: merged duplicate singleton");
        } else {
            conn.execute(
                &format!("UPDATE {node_table} SET id = ?1 WHERE id = ?2"),
                params![canonical, id],
            )?;
            tracing::info!(stray = id, canonical, node_type, "self-heal: renamed singleton to canonical id");
        }
    }
    Ok(())
}

fn redirect_edges(conn: &Connection, edge_table: &str, from: &str, to: &str) -> GraphResult<()> {
    // Move edges one at a time rather than a bulk UPDATE so we never violate
    // the (source, target, relation, user_id) primary key if the canonical
    // node already has an equivalent edge.
    conn.execute(
        &format!(
            "DELETE FROM {edge_table}
             WHERE source = ?1 AND EXISTS (
                 SELECT 1 FROM {edge_table} e2
                 WHERE e2.target = {edge_table}.target AND e2.relation = {edge_table}.relation
                   AND e2.user_id = {edge_table}.user_id AND e2.source = ?2
             )"
        ),
        params![from, to],
    )?;
    conn.execute(
        &format!("UPDATE {edge_table} SET source = ?1 WHERE source = ?2"),
        params![to, from],
    )?;

    conn.execute(
        &format!(
            "DELETE FROM {edge_table}
             WHERE target = ?1 AND EXISTS (
                 SELECT 1 FROM {edge_table} e2
                 WHERE e2.source = {edge_table}.source AND e2.relation = {edge_table}.relation
                   AND e2.user_id = {edge_table}.user_id AND e2.target = ?2
             )"
        ),
        params![from, to],
    )?;
    conn.execute(
        &format!("UPDATE {edge_table} SET target = ?1 WHERE target = ?2"),
        params![to, from],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Node, NodeType};

    #[test]
    fn heals_duplicate_vision_into_canonical() {
        let store = GraphStore::open_in_memory().unwrap();

        // Bootstrap the canonical vision directly (bypassing the normal path).
        let mut canonical_vision = Node::new("u1", NodeType::Vision, "vision");
        canonical_vision.id = vision_node_id("u1");
        canonical_vision.content = "Build EOS".into();
        store.upsert_node("nodes", canonical_vision).unwrap();

        let other_goal = Node::new("u1", NodeType::Goal, "Other goal");
        store.upsert_node("nodes", other_goal.clone()).unwrap();

        // Insert a stray duplicate vision with edges pointing at it,
        // bypassing upsert_node's id canonicalization via raw SQL.
        {
            let conn = store.writer().unwrap();
            conn.execute(
                "INSERT INTO nodes (id, user_id, type, name, content, attributes, status,
                    time_metadata, energy_impact, alignment_score, created_at)
                 VALUES ('old_vision_x', 'u1', 'Vision', 'stray', 'Ship fast', '{}', 'confirmed',
                    '{}', 0, 1.0, ?1)",
                rusqlite::params![chrono::Utc::now().to_rfc3339()],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO edges (source, target, relation, user_id, properties, created_at)
                 VALUES ('u1', 'old_vision_x', 'OWNS', 'u1', '{}', ?1)",
                rusqlite::params![chrono::Utc::now().to_rfc3339()],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO edges (source, target, relation, user_id, properties, created_at)
                 VALUES ('old_vision_x', ?1, 'RELATES_TO', 'u1', '{}', ?2)",
                rusqlite::params![other_goal.id, chrono::Utc::now().to_rfc3339()],
            )
            .unwrap();
        }

        store.self_heal().unwrap();

        let conn = store.writer().unwrap();
        let stray_exists: bool = conn
            .query_row(
                "SELECT 1 FROM nodes WHERE id = 'old_vision_x'",
                [],
                |_| Ok(true),
            )
            .unwrap_or(false);
        assert!(!stray_exists);

        let canonical: String = conn
            .query_row(
                "SELECT content FROM nodes WHERE id = ?1",
                params![vision_node_id("u1")],
                |row| row.get(0),
            )
            .unwrap();
        assert!(canonical.contains("Build EOS"));
        assert!(canonical.contains("Ship fast"));

        let redirected: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM edges WHERE target = ?1 OR source = ?1",
                params![vision_node_id("u1")],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(redirected, 2);
    }
}
