//! SQLite-backed directory for the Identra entity graph.
//!
//! Entities and groups are stored as JSON documents with the columns the
//! engine filters on (kind, any-object type) extracted alongside; memberships,
//! realms and the materialized dynamic relation are plain relational rows.
//! A single file holds the whole graph so one group mutation stays within one
//! database; `open_in_memory` serves tests.

mod directory;

pub use directory::SqliteDirectory;
