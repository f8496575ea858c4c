//! Persistent key/value store adapter.
//!
//! A synchronous string backend (SQLite or in-memory) wrapped with JSON
//! (de)serialization and key namespacing. The mutation queue, the
//! notification subsystem and user preferences each own one scope.

mod backend;
mod json;
mod preferences;

pub use backend::{KeyValueBackend, MemoryBackend, SqliteBackend};
pub use json::JsonStore;
pub use preferences::Preferences;
