//! SQLite schema for the catalog database.
//!
//! The schema version is tracked through `PRAGMA user_version` so that
//! future versions can ship incremental migrations. Timestamps are stored
//! as integer unix seconds.

use anyhow::{bail, Result};
use rusqlite::Connection;
use tracing::info;

/// Current schema version, written to `PRAGMA user_version` on creation.
pub const SCHEMA_VERSION: i64 = 1;

const DEFAULT_TIMESTAMP: &str = "(cast(strftime('%s','now') as int))";

fn create_schema_sql() -> String {
    format!(
        r#"
        CREATE TABLE tracks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_path TEXT NOT NULL UNIQUE,
            title TEXT,
            artist TEXT,
            mood TEXT NOT NULL,
            energy TEXT NOT NULL DEFAULT 'low',
            tempo_bpm INTEGER,
            has_vocals INTEGER NOT NULL DEFAULT 0,
            musical_key TEXT,
            intensity INTEGER CHECK (intensity BETWEEN 1 AND 10),
            time_affinity TEXT DEFAULT 'any',
            lyrics TEXT,
            duration_seconds INTEGER NOT NULL CHECK (duration_seconds >= 0),
            status TEXT NOT NULL DEFAULT 'pending',
            created_at INTEGER NOT NULL DEFAULT {ts}
        );
        CREATE INDEX idx_tracks_mood_status ON tracks(mood, status);

        CREATE TABLE play_stats (
            file_path TEXT PRIMARY KEY NOT NULL
                REFERENCES tracks(file_path) ON DELETE CASCADE,
            play_count INTEGER NOT NULL DEFAULT 0 CHECK (play_count >= 0),
            last_played_at INTEGER,
            created_at INTEGER NOT NULL DEFAULT {ts}
        );

        CREATE TABLE listen_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            track_id INTEGER NOT NULL REFERENCES tracks(id),
            mood TEXT NOT NULL,
            event_type TEXT NOT NULL
                CHECK (event_type IN ('play', 'skip', 'complete')),
            listen_seconds INTEGER NOT NULL DEFAULT 0,
            playlist_position INTEGER,
            created_at INTEGER NOT NULL DEFAULT {ts}
        );
        CREATE INDEX idx_listen_events_track ON listen_events(track_id);
        "#,
        ts = DEFAULT_TIMESTAMP
    )
}

/// Create the schema on a brand new database, or verify the version of an
/// existing one. Errors out on databases newer than this build understands.
pub fn migrate_if_needed(conn: &Connection) -> Result<()> {
    let table_count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
            [],
            |r| r.get(0),
        )
        .unwrap_or(0);

    if table_count == 0 {
        info!("Creating catalog db schema at version {}", SCHEMA_VERSION);
        conn.execute_batch(&create_schema_sql())?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        return Ok(());
    }

    let db_version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    if db_version > SCHEMA_VERSION {
        bail!(
            "Catalog database version {} is newer than supported version {}",
            db_version,
            SCHEMA_VERSION
        );
    }
    if db_version < SCHEMA_VERSION {
        // Version 1 is the first versioned schema; pre-versioning databases
        // already have the same table layout and only need the stamp.
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    }

    Ok(())
}
