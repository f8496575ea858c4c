/// Schema for the offline database.
pub const SCHEMA: &str = r#"
-- Synchronous key/value store (values are JSON text)
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Named cache generations
CREATE TABLE IF NOT EXISTS cache_names (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Response snapshots, exclusively owned by one generation
CREATE TABLE IF NOT EXISTS cache_entries (
    cache_name TEXT NOT NULL,
    request_key TEXT NOT NULL,
    status INTEGER NOT NULL,
    response_type TEXT NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (cache_name, request_key),
    FOREIGN KEY (cache_name) REFERENCES cache_names(name) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_cache_entries_name ON cache_entries(cache_name);
"#;
