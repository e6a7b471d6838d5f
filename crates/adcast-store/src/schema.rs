/// SQL DDL for the adcast click store.
pub const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA busy_timeout = 5000;
PRAGMA synchronous = NORMAL;
"#;

/// DDL for a clicks table. The name comes from configuration, so callers must
/// pass it through [`is_valid_table_name`] first.
pub fn create_clicks_table(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ad_id INTEGER NOT NULL,
            timestamp TEXT NOT NULL,
            video_time REAL NOT NULL,
            x INTEGER NOT NULL,
            y INTEGER NOT NULL,
            hover_time REAL NOT NULL,
            recorded_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_{table}_ad ON {table}(ad_id);"
    )
}

/// Table names are interpolated into SQL, so only plain identifiers pass:
/// ASCII letter or underscore first, then letters, digits, underscores.
pub fn is_valid_table_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
