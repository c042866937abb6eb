//! Schema setup for the records database.
//!
//! Each script runs once, inside its own transaction together with its row
//! in `_migrations`, so a failed script leaves no partial schema behind.

use rusqlite::{params, Connection};

use super::error::DatabaseError;

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_intake_tables",
        sql: include_str!("sql/001_create_intake_tables.sql"),
    },
    Migration {
        version: 2,
        description: "create_maestro_table",
        sql: include_str!("sql/002_create_maestro.sql"),
    },
    Migration {
        version: 3,
        description: "index_maestro_key",
        sql: include_str!("sql/003_index_maestro_key.sql"),
    },
];

/// Brings the schema of `conn` up to the latest version.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime'))
        );",
    )?;

    let applied: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > applied) {
        log::info!(
            "Applying schema v{} ({})",
            migration.version,
            migration.description
        );
        apply(conn, migration).map_err(|e| DatabaseError::Migration {
            version: migration.version,
            reason: e.to_string(),
        })?;
    }

    Ok(())
}

fn apply(conn: &Connection, migration: &Migration) -> Result<(), rusqlite::Error> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(migration.sql)?;
    tx.execute(
        "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
        params![migration.version, migration.description],
    )?;
    tx.commit()
}
