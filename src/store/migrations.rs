//! Version-tracked schema migrations for the libSQL sinks.
//!
//! Run logs and the overview are separate database files with separate
//! schemas. Each has its own ordered migration list; `run_migrations()`
//! checks the file's current version and applies only the new steps.
//! Table and column names mirror the sink headers verbatim.

use libsql::Connection;

use crate::error::DatabaseError;

/// A single migration step.
pub struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// Schema of a per-run log file. Add new versions to the end.
pub static RUN_LOG_MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "run_log_tables",
    sql: r#"
        CREATE TABLE IF NOT EXISTS _meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS "Run Log" (
            "Timestamp" TEXT NOT NULL,
            "Rule Name" TEXT NOT NULL,
            "Subject" TEXT NOT NULL,
            "Email Date" TEXT NOT NULL,
            "Reason" TEXT NOT NULL,
            "Unread Messages Count" INTEGER NOT NULL,
            "Custom Labels" TEXT NOT NULL,
            "Labels" TEXT NOT NULL,
            "Gmail Category" TEXT NOT NULL,
            "Action Taken" TEXT NOT NULL,
            "ThreadID" TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS "Fallback Log" (
            "Timestamp" TEXT NOT NULL,
            "Issue" TEXT NOT NULL,
            "Subject" TEXT NOT NULL,
            "ThreadID" TEXT NOT NULL,
            "Details" TEXT NOT NULL
        );
    "#,
}];

/// Schema of the overview file. Add new versions to the end.
pub static OVERVIEW_MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "overview_table",
    sql: r#"
        CREATE TABLE IF NOT EXISTS "Overview" (
            "Run Timestamp" TEXT NOT NULL,
            "Log File Name" TEXT NOT NULL,
            "Log File ID" TEXT NOT NULL,
            "Link to Log" TEXT NOT NULL,
            "Status" TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_overview_log_file_id ON "Overview"("Log File ID");
    "#,
}];

/// Apply every migration in `migrations` newer than the file's current version.
///
/// Creates the `_migrations` table if it doesn't exist.
pub async fn run_migrations(
    conn: &Connection,
    migrations: &[Migration],
) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to create _migrations table: {e}")))?;

    let current_version = get_current_version(conn).await?;

    for migration in migrations {
        if migration.version > current_version {
            tracing::debug!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            conn.execute_batch(migration.sql).await.map_err(|e| {
                DatabaseError::Migration(format!(
                    "Migration V{} ({}) failed: {e}",
                    migration.version, migration.name
                ))
            })?;
            seed_version(conn, migration.version, migration.name).await?;
        }
    }

    Ok(())
}

/// Get the highest applied migration version, or 0 if none.
async fn get_current_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to query migration version: {e}")))?;

    let row = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to read migration version: {e}")))?;

    match row {
        Some(row) => row
            .get::<i64>(0)
            .map_err(|e| DatabaseError::Migration(format!("Failed to parse version: {e}"))),
        None => Ok(0),
    }
}

/// Record a migration as applied.
async fn seed_version(conn: &Connection, version: i64, name: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO _migrations (version, name) VALUES (?1, ?2)",
        libsql::params![version, name],
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to record migration V{version}: {e}")))?;
    Ok(())
}
