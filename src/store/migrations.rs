//! Version-tracked database migrations for the libSQL backend.
//!
//! Each migration has a version number and SQL. `run_migrations()` checks
//! the current version and applies only the new ones sequentially.
//! On first run against a pre-versioning DB (a `users` table exists but no
//! `_migrations` rows), the old `goals` column is renamed and V1 is seeded
//! without re-creating tables.

use libsql::Connection;

use crate::error::DatabaseError;

/// A single migration step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial_schema",
        sql: r#"
            CREATE TABLE IF NOT EXISTS users (
                user_id TEXT PRIMARY KEY,
                state TEXT NOT NULL DEFAULT 'new',
                gender TEXT,
                activity TEXT,
                age INTEGER,
                weight REAL,
                height REAL,
                goals_json TEXT
            );

            CREATE TABLE IF NOT EXISTS intake (
                user_id TEXT NOT NULL,
                date TEXT NOT NULL,
                protein REAL NOT NULL DEFAULT 0,
                fat REAL NOT NULL DEFAULT 0,
                carb REAL NOT NULL DEFAULT 0,
                PRIMARY KEY (user_id, date)
            );
        "#,
    },
    Migration {
        version: 2,
        name: "row_timestamps",
        sql: r#"
            ALTER TABLE users ADD COLUMN updated_at TEXT;
            ALTER TABLE intake ADD COLUMN updated_at TEXT;
            CREATE INDEX IF NOT EXISTS idx_intake_date ON intake(date);
        "#,
    },
];

/// Run all pending migrations against the given connection.
///
/// Creates the `_migrations` table if it doesn't exist.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
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

    let mut current_version = get_current_version(conn).await?;

    if current_version == 0 && table_exists(conn, "users").await? {
        if column_exists(conn, "users", "goals").await? {
            conn.execute("ALTER TABLE users RENAME COLUMN goals TO goals_json", ())
                .await
                .map_err(|e| {
                    DatabaseError::Migration(format!("Failed to rename legacy goals column: {e}"))
                })?;
        }
        // V1 is all IF NOT EXISTS, so this only fills in a missing intake table.
        conn.execute_batch(MIGRATIONS[0].sql).await.map_err(|e| {
            DatabaseError::Migration(format!("Failed to complete legacy schema: {e}"))
        })?;

        seed_version(conn, 1, "initial_schema").await?;
        current_version = 1;
        tracing::info!("Legacy database detected, seeded migration V1");
    }

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
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

    let version = get_current_version(conn).await?;
    tracing::info!(version, "Database migrations complete");

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
        Some(row) => {
            let version: i64 = row.get(0).map_err(|e| {
                DatabaseError::Migration(format!("Failed to parse migration version: {e}"))
            })?;
            Ok(version)
        }
        None => Ok(0),
    }
}

async fn table_exists(conn: &Connection, table: &str) -> Result<bool, DatabaseError> {
    count_is_positive(
        conn,
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
        libsql::params![table],
    )
    .await
}

async fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool, DatabaseError> {
    count_is_positive(
        conn,
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name=?2",
        libsql::params![table, column],
    )
    .await
}

async fn count_is_positive(
    conn: &Connection,
    sql: &str,
    params: impl libsql::params::IntoParams,
) -> Result<bool, DatabaseError> {
    let mut rows = conn
        .query(sql, params)
        .await
        .map_err(|e| DatabaseError::Query(format!("Failed to inspect schema: {e}")))?;

    let row = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Query(format!("Failed to read schema check: {e}")))?;

    match row {
        Some(row) => {
            let count: i64 = row.get(0).unwrap_or(0);
            Ok(count > 0)
        }
        None => Ok(false),
    }
}

/// Insert a version record into `_migrations`.
async fn seed_version(conn: &Connection, version: i64, name: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO _migrations (version, name) VALUES (?1, ?2)",
        libsql::params![version, name],
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to record migration V{version}: {e}")))?;
    Ok(())
}
