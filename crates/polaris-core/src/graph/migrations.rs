//! Database migrations for the relational graph store (`brain.db`).
//!
//! Versioned the way the teacher's `storage::migrations` module is: a
//! `MIGRATIONS` list applied in order, tracked via `PRAGMA user_version`.
//! Schema evolution never drops an existing column (spec.md §7, `SchemaDrift`).

use rusqlite::Connection;

use crate::error::GraphResult;

pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub up: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema: nodes, edges, staging mirror, experiences",
        up: MIGRATION_V1_UP,
    },
    Migration {
        version: 2,
        description: "Passthrough tables for external H3/persona collaborators (ClearAll target)",
        up: MIGRATION_V2_UP,
    },
];

const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS nodes (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    type TEXT NOT NULL,
    name TEXT NOT NULL,
    content TEXT NOT NULL DEFAULT '',
    attributes TEXT NOT NULL DEFAULT '{}',
    status TEXT NOT NULL DEFAULT 'confirmed',
    time_metadata TEXT NOT NULL DEFAULT '{}',
    strategic_role TEXT,
    energy_impact INTEGER NOT NULL DEFAULT 0,
    alignment_score REAL NOT NULL DEFAULT 0.5,
    source_file TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_nodes_user ON nodes(user_id);
CREATE INDEX IF NOT EXISTS idx_nodes_type ON nodes(type);
CREATE INDEX IF NOT EXISTS idx_nodes_status ON nodes(status);

CREATE TABLE IF NOT EXISTS edges (
    source TEXT NOT NULL,
    target TEXT NOT NULL,
    relation TEXT NOT NULL,
    user_id TEXT NOT NULL,
    properties TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    PRIMARY KEY (source, target, relation, user_id)
);

CREATE INDEX IF NOT EXISTS idx_edges_user ON edges(user_id);
CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source);
CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target);

CREATE TABLE IF NOT EXISTS staging_nodes (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    type TEXT NOT NULL,
    name TEXT NOT NULL,
    content TEXT NOT NULL DEFAULT '',
    attributes TEXT NOT NULL DEFAULT '{}',
    status TEXT NOT NULL DEFAULT 'pending',
    time_metadata TEXT NOT NULL DEFAULT '{}',
    strategic_role TEXT,
    energy_impact INTEGER NOT NULL DEFAULT 0,
    alignment_score REAL NOT NULL DEFAULT 0.5,
    source_file TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_staging_nodes_user ON staging_nodes(user_id);

CREATE TABLE IF NOT EXISTS staging_edges (
    source TEXT NOT NULL,
    target TEXT NOT NULL,
    relation TEXT NOT NULL,
    user_id TEXT NOT NULL,
    properties TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    PRIMARY KEY (source, target, relation, user_id)
);

CREATE INDEX IF NOT EXISTS idx_staging_edges_user ON staging_edges(user_id);

CREATE TABLE IF NOT EXISTS experiences (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    trigger_scenario TEXT NOT NULL,
    insight TEXT NOT NULL,
    strategy TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_experiences_user ON experiences(user_id);
"#;

/// H3 energy scoring, calibration, and persona-config rows are owned by
/// external collaborators (spec.md §1 "Out of scope"); the core only needs
/// enough shape to honor `ClearAll`'s contract of wiping them per user.
const MIGRATION_V2_UP: &str = r#"
CREATE TABLE IF NOT EXISTS h3_energy (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    payload TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS h3_calibrations (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    payload TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS persona_configs (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    payload TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_h3_energy_user ON h3_energy(user_id);
CREATE INDEX IF NOT EXISTS idx_h3_calibrations_user ON h3_calibrations(user_id);
CREATE INDEX IF NOT EXISTS idx_persona_configs_user ON persona_configs(user_id);
"#;

/// Columns that may be missing on a `nodes` table created by an older schema
/// revision. Introspected and added on open; never dropped (spec.md §4.1,
/// "Schema evolution").
const OPTIONAL_NODE_COLUMNS: &[(&str, &str)] = &[
    ("status", "TEXT NOT NULL DEFAULT 'confirmed'"),
    ("time_metadata", "TEXT NOT NULL DEFAULT '{}'"),
    ("strategic_role", "TEXT"),
    ("energy_impact", "INTEGER NOT NULL DEFAULT 0"),
    ("alignment_score", "REAL NOT NULL DEFAULT 0.5"),
    ("source_file", "TEXT"),
];

pub fn apply_migrations(conn: &Connection) -> GraphResult<()> {
    let current: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    for migration in MIGRATIONS {
        if migration.version > current {
            conn.execute_batch(migration.up)?;
            conn.pragma_update(None, "user_version", migration.version)?;
            tracing::info!(
                version = migration.version,
                description = migration.description,
                "applied graph store migration"
            );
        }
    }
    ensure_optional_node_columns(conn)?;
    Ok(())
}

fn ensure_optional_node_columns(conn: &Connection) -> GraphResult<()> {
    let mut existing = std::collections::HashSet::new();
    let mut stmt = conn.prepare("PRAGMA table_info(nodes)")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in rows {
        existing.insert(name?);
    }
    drop(stmt);

    for (column, ddl) in OPTIONAL_NODE_COLUMNS {
        if !existing.contains(*column) {
            tracing::info!(column, "self-migrating: adding missing nodes column");
            conn.execute(&format!("ALTER TABLE nodes ADD COLUMN {} {}", column, ddl), [])?;
        }
    }
    Ok(())
}
