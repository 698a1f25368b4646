//! Graph Store — durable, user-partitioned storage of nodes, edges, the
//! staging mirror, and experiences (spec.md §4.1).
//!
//! Backed by `rusqlite`, one writer connection guarded by a mutex and a
//! short-lived reader connection opened fresh per call, following the
//! single-writer/many-readers shape the teacher's `storage::sqlite::Storage`
//! uses. All mutations serialize through `writer`; reads go through their own
//! `Connection::open` and never take the writer's lock, so readers never
//! block each other or the writer, and WAL journal mode keeps them
//! consistent with whatever the writer has committed.

mod healing;
mod migrations;
mod staging;
mod store;
mod views;

pub use store::GraphStore;
