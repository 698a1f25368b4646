//! Core node/edge CRUD, batch dossier merge, experiences, and bulk clear.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde_json::{json, Value};

use crate::error::{GraphError, GraphResult};
use crate::model::{
    self_node_id, stable_id, vision_node_id, Edge, Experience, GraphStats, Node, NodeStatus,
    NodeType, TimeMetadata,
};

use super::migrations;

static MEMORY_DB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Where reader connections go to find the same data the writer sees.
enum Backend {
    File(PathBuf),
    /// A named, shared-cache in-memory database URI. Plain
    /// `Connection::open_in_memory()` connections are each their own private
    /// database, so a second reader connection needs this instead to see the
    /// writer's data at all.
    Memory(String),
}

/// Main storage handle. `&self` methods only (interior mutability via
/// `Mutex`), so the rest of the engine can share one `Arc<GraphStore>`.
pub struct GraphStore {
    writer: Mutex<Connection>,
    backend: Backend,
}

impl GraphStore {
    /// Open (creating if absent) the graph database at `path`, apply schema
    /// migrations, and run the self-healing pass (spec.md §4.1).
    pub fn open(path: impl AsRef<Path>) -> GraphResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)?;
        Self::configure(&conn)?;
        migrations::apply_migrations(&conn)?;

        let store = Self {
            writer: Mutex::new(conn),
            backend: Backend::File(path),
        };
        store.self_heal()?;
        Ok(store)
    }

    /// In-memory store, for tests. Uses a uniquely named shared-cache
    /// database so `reader()` connections see the same data as `writer`.
    pub fn open_in_memory() -> GraphResult<Self> {
        let id = MEMORY_DB_COUNTER.fetch_add(1, Ordering::Relaxed);
        let uri = format!("file:polaris_graph_mem_{id}?mode=memory&cache=shared");
        let conn = Connection::open_with_flags(
            &uri,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_URI,
        )?;
        Self::configure(&conn)?;
        migrations::apply_migrations(&conn)?;
        let store = Self {
            writer: Mutex::new(conn),
            backend: Backend::Memory(uri),
        };
        store.self_heal()?;
        Ok(store)
    }

    fn configure(conn: &Connection) -> GraphResult<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    /// Acquire the writer lock for a single short-lived operation. Every
    /// method takes the lock, does its work, and releases it immediately —
    /// no method holds it across an await or a second lock acquisition
    /// (spec.md §5, "kept short").
    pub(super) fn writer(&self) -> GraphResult<std::sync::MutexGuard<'_, Connection>> {
        self.writer
            .lock()
            .map_err(|_| GraphError::Init("writer lock poisoned".into()))
    }

    /// Opens a fresh, short-lived connection for a single read. Never takes
    /// the writer mutex, so a long write never blocks a concurrent read and
    /// a long read never blocks a concurrent write (spec.md §5, "Readers
    /// obtain a short-lived connection and do not block each other").
    pub(super) fn reader(&self) -> GraphResult<Connection> {
        let conn = match &self.backend {
            Backend::File(path) => Connection::open(path)?,
            Backend::Memory(uri) => Connection::open_with_flags(
                uri,
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_URI,
            )?,
        };
        Self::configure(&conn)?;
        Ok(conn)
    }

    // ========================================================================
    // ROW <-> NODE/EDGE
    // ========================================================================

    pub(super) fn node_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Node> {
        let type_str: String = row.get("type")?;
        let status_str: String = row.get("status")?;
        let attrs_str: String = row.get("attributes")?;
        let time_str: String = row.get("time_metadata")?;
        Ok(Node {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            node_type: NodeType::parse_name(&type_str),
            name: row.get("name")?,
            content: row.get("content")?,
            attributes: serde_json::from_str(&attrs_str).unwrap_or(json!({})),
            status: NodeStatus::parse_name(&status_str),
            time_metadata: serde_json::from_str(&time_str).unwrap_or_default(),
            strategic_role: row.get("strategic_role")?,
            energy_impact: row.get("energy_impact")?,
            alignment_score: row.get("alignment_score")?,
            source_file: row.get("source_file")?,
            created_at: row.get("created_at")?,
        })
    }

    pub(super) fn edge_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Edge> {
        let props_str: String = row.get("properties")?;
        Ok(Edge {
            source: row.get("source")?,
            target: row.get("target")?,
            relation: row.get("relation")?,
            user_id: row.get("user_id")?,
            properties: serde_json::from_str(&props_str).unwrap_or(json!({})),
            created_at: row.get("created_at")?,
        })
    }

    // ========================================================================
    // UPSERT NODE / EDGE
    // ========================================================================

    /// Idempotent by `id`. Self/Vision ids are always overridden to their
    /// canonical form. On conflict, `content` is preserved unless the
    /// incoming value is non-empty; attributes/status/energy/alignment are
    /// overwritten (spec.md §4.1).
    pub fn upsert_node(&self, table: &str, mut node: Node) -> GraphResult<Node> {
        if matches!(node.node_type, NodeType::SelfNode) {
            node.id = self_node_id(&node.user_id);
        } else if matches!(node.node_type, NodeType::Vision) {
            node.id = vision_node_id(&node.user_id);
        } else if node.id.is_empty() {
            node.id = stable_id(&node.name);
        }

        let conn = self.writer()?;
        let existing: Option<String> = conn
            .query_row(
                &format!("SELECT content FROM {table} WHERE id = ?1"),
                params![node.id],
                |row| row.get(0),
            )
            .optional()?;

        let content = match existing {
            Some(prev) if node.content.is_empty() => prev,
            _ => node.content.clone(),
        };

        conn.execute(
            &format!(
                "INSERT INTO {table}
                    (id, user_id, type, name, content, attributes, status, time_metadata,
                     strategic_role, energy_impact, alignment_score, source_file, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    content = ?5,
                    attributes = excluded.attributes,
                    status = excluded.status,
                    time_metadata = excluded.time_metadata,
                    strategic_role = excluded.strategic_role,
                    energy_impact = excluded.energy_impact,
                    alignment_score = excluded.alignment_score,
                    source_file = excluded.source_file"
            ),
            params![
                node.id,
                node.user_id,
                node.node_type.as_str(),
                node.name,
                content,
                node.attributes.to_string(),
                node.status.as_str(),
                serde_json::to_string(&node.time_metadata).unwrap_or_else(|_| "{}".into()),
                node.strategic_role,
                node.energy_impact,
                node.alignment_score,
                node.source_file,
                node.created_at.to_rfc3339(),
            ],
        )?;

        node.content = content;
        Ok(node)
    }

    /// Insert-ignore; relation stored verbatim (spec.md §3, §4.1). Rejects
    /// edges whose endpoints are not owned by `user_id`.
    pub fn upsert_edge(&self, table: &str, edges_table: &str, edge: Edge) -> GraphResult<bool> {
        let conn = self.writer()?;
        let owns = |id: &str| -> rusqlite::Result<bool> {
            conn.query_row(
                &format!("SELECT 1 FROM {table} WHERE id = ?1 AND user_id = ?2"),
                params![id, edge.user_id],
                |_| Ok(true),
            )
            .optional()
            .map(|r| r.unwrap_or(false))
        };

        if !owns(&edge.source)? {
            return Err(GraphError::PermissionDenied {
                user_id: edge.user_id.clone(),
                id: edge.source.clone(),
            });
        }
        if !owns(&edge.target)? {
            return Err(GraphError::PermissionDenied {
                user_id: edge.user_id.clone(),
                id: edge.target.clone(),
            });
        }

        let changed = conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {edges_table}
                    (source, target, relation, user_id, properties, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
            ),
            params![
                edge.source,
                edge.target,
                edge.relation,
                edge.user_id,
                edge.properties.to_string(),
                edge.created_at.to_rfc3339(),
            ],
        )?;
        Ok(changed > 0)
    }

    /// Batch entity upsert with dossier merging: for each key in
    /// `attributes.dossier`, list-valued fields are unioned+deduplicated;
    /// everything else is replaced by the incoming value (spec.md §4.1).
    pub fn batch_upsert_entities(
        &self,
        table: &str,
        user_id: &str,
        entities: Vec<Node>,
    ) -> GraphResult<Vec<Node>> {
        let mut out = Vec::with_capacity(entities.len());
        for mut entity in entities {
            entity.user_id = user_id.to_string();
            let merged_attrs = {
                let conn = self.writer()?;
                let existing_attrs: Option<String> = conn
                    .query_row(
                        &format!("SELECT attributes FROM {table} WHERE id = ?1"),
                        params![if entity.id.is_empty() {
                            stable_id(&entity.name)
                        } else {
                            entity.id.clone()
                        }],
                        |row| row.get(0),
                    )
                    .optional()?;
                match existing_attrs {
                    Some(raw) => {
                        let existing: Value = serde_json::from_str(&raw).unwrap_or(json!({}));
                        merge_dossier(existing, entity.attributes.clone())
                    }
                    None => entity.attributes.clone(),
                }
            };
            entity.attributes = merged_attrs;
            match self.upsert_node(table, entity) {
                Ok(n) => out.push(n),
                Err(e) => tracing::warn!(error = %e, "skipping invalid entity in batch upsert"),
            }
        }
        Ok(out)
    }

    /// Append-only chat-turn / file-chunk log node.
    pub fn add_log(
        &self,
        table: &str,
        user_id: &str,
        log_id: &str,
        content: &str,
        timestamp: chrono::DateTime<Utc>,
        log_type: &str,
    ) -> GraphResult<Node> {
        let mut node = Node::new(user_id, NodeType::Log, log_id);
        node.id = log_id.to_string();
        node.content = content.to_string();
        node.attributes = json!({ "timestamp": timestamp.to_rfc3339(), "log_type": log_type });
        node.status = NodeStatus::Confirmed;
        node.created_at = timestamp;
        self.upsert_node(table, node)
    }

    // ========================================================================
    // TYPED QUERIES
    // ========================================================================

    pub fn get_nodes_by_type(&self, user_id: &str, node_type: NodeType) -> GraphResult<Vec<Node>> {
        let conn = self.reader()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM nodes WHERE user_id = ?1 AND type = ?2 ORDER BY created_at DESC",
        )?;
        let rows = stmt
            .query_map(params![user_id, node_type.as_str()], Self::node_from_row)?
            .filter_map(Result::ok)
            .collect();
        Ok(rows)
    }

    pub fn get_sub_entities(
        &self,
        user_id: &str,
        parent_id: &str,
        relation: Option<&str>,
    ) -> GraphResult<Vec<Node>> {
        let conn = self.reader()?;
        let sql = match relation {
            Some(_) => {
                "SELECT n.* FROM nodes n
                 JOIN edges e ON e.target = n.id
                 WHERE e.source = ?1 AND e.user_id = ?2 AND e.relation = ?3"
            }
            None => {
                "SELECT n.* FROM nodes n
                 JOIN edges e ON e.target = n.id
                 WHERE e.source = ?1 AND e.user_id = ?2"
            }
        };
        let mut stmt = conn.prepare(sql)?;
        let rows: Vec<Node> = if let Some(r) = relation {
            stmt.query_map(params![parent_id, user_id, r], Self::node_from_row)?
                .filter_map(Result::ok)
                .collect()
        } else {
            stmt.query_map(params![parent_id, user_id], Self::node_from_row)?
                .filter_map(Result::ok)
                .collect()
        };
        Ok(rows)
    }

    /// Text serialization of all Vision/Goal/Project nodes, used as an LLM
    /// prompt fragment (spec.md §4.1).
    pub fn get_strategic_context(&self, user_id: &str) -> GraphResult<String> {
        let conn = self.reader()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM nodes WHERE user_id = ?1 AND type IN ('Vision', 'Goal', 'Project')
             ORDER BY CASE type WHEN 'Vision' THEN 0 WHEN 'Goal' THEN 1 ELSE 2 END, created_at",
        )?;
        let nodes: Vec<Node> = stmt
            .query_map(params![user_id], Self::node_from_row)?
            .filter_map(Result::ok)
            .collect();

        let mut out = String::new();
        for node in nodes {
            out.push_str(&format!(
                "[{}] {}: {}\n",
                node.node_type, node.name, node.content
            ));
        }
        Ok(out)
    }

    pub fn get_stats(&self, user_id: &str) -> GraphResult<GraphStats> {
        let conn = self.reader()?;
        let total_nodes: i64 = conn.query_row(
            "SELECT COUNT(*) FROM nodes WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        let total_edges: i64 = conn.query_row(
            "SELECT COUNT(*) FROM edges WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        let mut stmt = conn.prepare(
            "SELECT type, COUNT(*) FROM nodes WHERE user_id = ?1 GROUP BY type",
        )?;
        let mut nodes_by_type = HashMap::new();
        let rows = stmt.query_map(params![user_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (t, c) = row?;
            nodes_by_type.insert(t, c);
        }
        Ok(GraphStats {
            total_nodes,
            nodes_by_type,
            total_edges,
        })
    }

    // ========================================================================
    // EXPERIENCES
    // ========================================================================

    pub fn add_experience(
        &self,
        user_id: &str,
        id: &str,
        trigger: &str,
        insight: &str,
        strategy: &str,
    ) -> GraphResult<Experience> {
        let exp = Experience::new(id, user_id, trigger, insight, strategy);
        let conn = self.writer()?;
        conn.execute(
            "INSERT INTO experiences (id, user_id, trigger_scenario, insight, strategy, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET trigger_scenario = excluded.trigger_scenario,
                insight = excluded.insight, strategy = excluded.strategy",
            params![
                exp.id,
                exp.user_id,
                exp.trigger_scenario,
                exp.insight,
                exp.strategy,
                exp.created_at.to_rfc3339()
            ],
        )?;
        Ok(exp)
    }

    pub fn get_all_experiences(&self, user_id: &str) -> GraphResult<Vec<Experience>> {
        let conn = self.reader()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, trigger_scenario, insight, strategy, created_at
             FROM experiences WHERE user_id = ?1 ORDER BY created_at DESC",
        )?;
        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok(Experience {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    trigger_scenario: row.get(2)?,
                    insight: row.get(3)?,
                    strategy: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?
            .filter_map(Result::ok)
            .collect();
        Ok(rows)
    }

    // ========================================================================
    // BULK CLEAR
    // ========================================================================

    /// Clears graph, H3, calibrations, and experiences for `user_id`.
    pub fn clear_all(&self, user_id: &str) -> GraphResult<()> {
        self.clear_graph_only(user_id)?;
        let conn = self.writer()?;
        for table in ["h3_energy", "h3_calibrations", "persona_configs", "experiences"] {
            conn.execute(
                &format!("DELETE FROM {table} WHERE user_id = ?1"),
                params![user_id],
            )?;
        }
        Ok(())
    }

    /// Clears only the canonical + staging graph (nodes/edges), leaving
    /// experiences and external collaborator tables intact.
    pub fn clear_graph_only(&self, user_id: &str) -> GraphResult<()> {
        let conn = self.writer()?;
        for table in ["nodes", "edges", "staging_nodes", "staging_edges"] {
            conn.execute(
                &format!("DELETE FROM {table} WHERE user_id = ?1"),
                params![user_id],
            )?;
        }
        Ok(())
    }
}

/// Merge `incoming` into `existing` dossier-style: list-valued fields union
/// and dedupe, everything else is replaced by the incoming value.
pub(super) fn merge_dossier(existing: Value, incoming: Value) -> Value {
    let mut existing = existing;
    let Some(existing_obj) = existing.as_object_mut() else {
        return incoming;
    };
    let Some(incoming_obj) = incoming.as_object() else {
        return Value::Object(existing_obj.clone());
    };

    let existing_dossier = existing_obj
        .entry("dossier")
        .or_insert_with(|| json!({}))
        .clone();
    let incoming_dossier = incoming_obj.get("dossier").cloned().unwrap_or(json!({}));

    let merged_dossier = match (existing_dossier.as_object(), incoming_dossier.as_object()) {
        (Some(e), Some(i)) => {
            let mut merged = e.clone();
            for (key, incoming_value) in i {
                match (merged.get(key).and_then(|v| v.as_array()), incoming_value.as_array()) {
                    (Some(existing_list), Some(incoming_list)) => {
                        let mut union: Vec<Value> = existing_list.clone();
                        for item in incoming_list {
                            if !union.contains(item) {
                                union.push(item.clone());
                            }
                        }
                        merged.insert(key.clone(), Value::Array(union));
                    }
                    _ => {
                        merged.insert(key.clone(), incoming_value.clone());
                    }
                }
            }
            Value::Object(merged)
        }
        _ => incoming_dossier,
    };

    for (key, value) in incoming_obj {
        if key != "dossier" {
            existing_obj.insert(key.clone(), value.clone());
        }
    }
    existing_obj.insert("dossier".to_string(), merged_dossier);
    Value::Object(existing_obj.clone())
}
