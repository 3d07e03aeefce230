//! Database schema definitions

/// SQL to create the base queries table.
///
/// Columns added after the initial release (runs_count, last_used_at,
/// description) are owned by migrations, not this statement.
pub const CREATE_QUERIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS queries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    query_text TEXT NOT NULL,
    database_name TEXT,
    cluster_name TEXT,
    url TEXT,
    timestamp TEXT,
    request_body TEXT,
    response_preview TEXT,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP,
    UNIQUE(query_text, database_name, cluster_name)
)
"#;

/// SQL to create the schema version tracking table
pub const CREATE_SCHEMA_VERSION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT DEFAULT CURRENT_TIMESTAMP,
    description TEXT
)
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_queries_created_at ON queries(created_at)",
];

/// All base schema creation statements, in execution order
pub fn base_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![CREATE_QUERIES_TABLE, CREATE_SCHEMA_VERSION_TABLE];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}
