//! Persistent course index.
//!
//! Two collections share one SQLite database: a catalog of course metadata
//! (one row per course, embedded for fuzzy name resolution) and the chunk
//! table the content search runs over. [`sqlite`] backs both with sqlite-vec
//! virtual tables so nearest-neighbor queries stay inside SQL.

pub mod sqlite;

pub use sqlite::SqliteCourseStore;
