//! Versioned schema for the cache database.

use ::duckdb::{Connection, ToSql};

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_cache_tables",
        sql: r#"
CREATE TABLE IF NOT EXISTS equity_cache (
    cache_key TEXT PRIMARY KEY,
    label TEXT NOT NULL,
    payload TEXT NOT NULL,
    payload_bytes BIGINT NOT NULL,
    fetched_at_us BIGINT NOT NULL,
    ttl_us BIGINT NOT NULL,
    expires_at_us BIGINT NOT NULL
);

CREATE TABLE IF NOT EXISTS options_cache (
    cache_key TEXT PRIMARY KEY,
    label TEXT NOT NULL,
    payload TEXT NOT NULL,
    payload_bytes BIGINT NOT NULL,
    fetched_at_us BIGINT NOT NULL,
    ttl_us BIGINT NOT NULL,
    expires_at_us BIGINT NOT NULL
);

CREATE TABLE IF NOT EXISTS fixed_income_cache (
    cache_key TEXT PRIMARY KEY,
    label TEXT NOT NULL,
    payload TEXT NOT NULL,
    payload_bytes BIGINT NOT NULL,
    fetched_at_us BIGINT NOT NULL,
    ttl_us BIGINT NOT NULL,
    expires_at_us BIGINT NOT NULL
);
"#,
    },
    Migration {
        version: "0002_expiry_indexes",
        sql: r#"
CREATE INDEX IF NOT EXISTS idx_equity_cache_expiry ON equity_cache (expires_at_us);
CREATE INDEX IF NOT EXISTS idx_options_cache_expiry ON options_cache (expires_at_us);
CREATE INDEX IF NOT EXISTS idx_fixed_income_cache_expiry ON fixed_income_cache (expires_at_us);
"#,
    },
];

/// Apply every migration not yet recorded in `schema_migrations`.
pub fn apply_migrations(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    for migration in MIGRATIONS {
        let params: [&dyn ToSql; 1] = [&migration.version];
        let applied_count: i64 = connection.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            params.as_slice(),
            |row| row.get(0),
        )?;

        if applied_count == 0 {
            connection.execute_batch(migration.sql)?;
            connection.execute(
                "INSERT INTO schema_migrations (version) VALUES (?)",
                params.as_slice(),
            )?;
        }
    }

    Ok(())
}

/// Versions recorded as applied, oldest first.
pub fn applied_versions(connection: &Connection) -> Result<Vec<String>, ::duckdb::Error> {
    let mut statement =
        connection.prepare("SELECT version FROM schema_migrations ORDER BY version")?;
    let mut rows = statement.query([] as [&dyn ToSql; 0])?;
    let mut versions = Vec::new();
    while let Some(row) = rows.next()? {
        versions.push(row.get(0)?);
    }
    Ok(versions)
}
