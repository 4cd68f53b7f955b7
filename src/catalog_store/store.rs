//! SQLite-backed catalog store implementation.
//!
//! All writes go through a single guarded connection; SQLite permits one
//! writer at a time, and the busy timeout makes concurrent writers wait
//! instead of failing immediately.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;

use super::models::{Energy, ListenEvent, MoodStats, Track, TrackStatus};
use super::schema::migrate_if_needed;
use super::trait_def::{CatalogStore, PlayTx, StoreError};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Standard column list for track queries. Play data comes from
/// `play_stats` via LEFT JOIN so never-played tracks still appear.
const TRACK_COLUMNS: &str = "t.id, t.file_path, t.title, t.artist, t.mood, t.energy, \
     t.tempo_bpm, t.has_vocals, t.musical_key, t.intensity, t.time_affinity, \
     t.lyrics, t.duration_seconds, t.status, t.created_at, \
     COALESCE(ps.play_count, 0), ps.last_played_at";

const TRACK_FROM: &str = "FROM tracks t LEFT JOIN play_stats ps ON t.file_path = ps.file_path";

/// SQLite-backed catalog store.
#[derive(Clone)]
pub struct SqliteCatalogStore {
    conn: Arc<Mutex<Connection>>,
}

fn timestamp_from_column(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

fn row_to_track(row: &Row) -> rusqlite::Result<Track> {
    let energy: String = row.get(5)?;
    let status: String = row.get(13)?;
    let has_vocals: i64 = row.get(7)?;
    let created_at: i64 = row.get(14)?;
    let last_played_at: Option<i64> = row.get(16)?;

    Ok(Track {
        id: row.get(0)?,
        file_path: row.get(1)?,
        title: row.get(2)?,
        artist: row.get(3)?,
        mood: row.get(4)?,
        energy: Energy::from_db_str(&energy),
        tempo_bpm: row.get(6)?,
        has_vocals: has_vocals != 0,
        musical_key: row.get(8)?,
        intensity: row.get(9)?,
        time_affinity: row.get(10)?,
        lyrics: row.get(11)?,
        duration_seconds: row.get(12)?,
        status: TrackStatus::from_db_str(&status),
        created_at: timestamp_from_column(created_at),
        play_count: row.get(15)?,
        last_played_at: last_played_at.map(timestamp_from_column),
    })
}

impl SqliteCatalogStore {
    /// Open the catalog database, creating it with the current schema if it
    /// does not exist yet.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open_with_flags(
            db_path.as_ref(),
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open catalog database")?;

        migrate_if_needed(&conn)?;

        // WAL keeps readers unblocked while a write is in flight.
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        let track_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM tracks", [], |r| r.get(0))
            .unwrap_or(0);
        info!("Opened catalog database: {} tracks", track_count);

        Ok(SqliteCatalogStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

impl CatalogStore for SqliteCatalogStore {
    fn get_by_mood(&self, mood: &str, instrumental_only: bool) -> Result<Vec<Track>> {
        let mut sql = format!(
            "SELECT {} {} WHERE t.mood = ?1 AND t.status = ?2",
            TRACK_COLUMNS, TRACK_FROM
        );
        if instrumental_only {
            sql.push_str(" AND t.has_vocals = 0");
        }
        // Least played first; among equals, never-played before longest-idle.
        sql.push_str(
            " ORDER BY COALESCE(ps.play_count, 0) ASC, ps.last_played_at ASC NULLS FIRST",
        );

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&sql)?;
        let tracks = stmt
            .query_map(params![mood, TrackStatus::Approved.to_db_str()], row_to_track)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to query tracks by mood")?;
        Ok(tracks)
    }

    fn get_by_id(&self, track_id: i64) -> Result<Option<Track>> {
        let sql = format!(
            "SELECT {} {} WHERE t.id = ?1",
            TRACK_COLUMNS, TRACK_FROM
        );
        let conn = self.conn.lock().unwrap();
        conn.query_row(&sql, params![track_id], row_to_track)
            .optional()
            .context("Failed to get track by id")
    }

    fn get_mood_stats(&self) -> Result<Vec<MoodStats>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT mood, COUNT(*), COALESCE(SUM(duration_seconds), 0) \
             FROM tracks WHERE status = ?1 GROUP BY mood ORDER BY mood",
        )?;
        let stats = stmt
            .query_map(params![TrackStatus::Approved.to_db_str()], |row| {
                Ok(MoodStats {
                    mood: row.get(0)?,
                    track_count: row.get(1)?,
                    total_duration_seconds: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to query mood stats")?;
        Ok(stats)
    }

    fn ping(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT 1", [], |_| Ok(()))
            .context("Catalog database unreachable")
    }

    fn with_play_tx(&self, f: &mut dyn FnMut(&mut dyn PlayTx) -> Result<()>) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        {
            let mut play_tx = SqlitePlayTx { tx: &tx };
            // Dropping the uncommitted transaction on error rolls everything back.
            f(&mut play_tx)?;
        }
        tx.commit().context("Failed to commit play transaction")
    }
}

struct SqlitePlayTx<'a> {
    tx: &'a Transaction<'a>,
}

impl PlayTx for SqlitePlayTx<'_> {
    fn update_play_stats(&mut self, track_id: i64) -> Result<()> {
        // Single INSERT...SELECT resolves the file path and upserts in one
        // statement; zero affected rows means the track id is unknown.
        let affected = self
            .tx
            .execute(
                "INSERT INTO play_stats (file_path, play_count, last_played_at) \
                 SELECT file_path, 1, ?1 FROM tracks WHERE id = ?2 \
                 ON CONFLICT(file_path) DO UPDATE SET \
                     play_count = play_count + 1, \
                     last_played_at = excluded.last_played_at",
                params![Utc::now().timestamp(), track_id],
            )
            .context("Failed to update play stats")?;

        if affected == 0 {
            return Err(StoreError::TrackNotFound(track_id).into());
        }
        Ok(())
    }

    fn record_listen_event(&mut self, event: &ListenEvent) -> Result<()> {
        self.tx
            .execute(
                "INSERT INTO listen_events \
                 (track_id, mood, event_type, listen_seconds, playlist_position) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    event.track_id,
                    event.mood,
                    event.kind.as_str(),
                    event.listen_seconds.max(0),
                    event.playlist_position,
                ],
            )
            .context("Failed to record listen event")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_store::models::ListenEventKind;
    use tempfile::TempDir;

    fn create_tmp_store() -> (SqliteCatalogStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteCatalogStore::new(temp_dir.path().join("catalog.db")).unwrap();
        (store, temp_dir)
    }

    fn insert_track(
        store: &SqliteCatalogStore,
        file_path: &str,
        mood: &str,
        status: &str,
        has_vocals: bool,
    ) -> i64 {
        let conn = store.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO tracks (file_path, mood, duration_seconds, status, has_vocals) \
             VALUES (?1, ?2, 180, ?3, ?4)",
            params![file_path, mood, status, has_vocals as i64],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    fn play_count(store: &SqliteCatalogStore, file_path: &str) -> i64 {
        let conn = store.conn.lock().unwrap();
        conn.query_row(
            "SELECT play_count FROM play_stats WHERE file_path = ?1",
            params![file_path],
            |r| r.get(0),
        )
        .optional()
        .unwrap()
        .unwrap_or(0)
    }

    fn listen_event_count(store: &SqliteCatalogStore) -> i64 {
        let conn = store.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM listen_events", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn get_by_mood_filters_status_and_mood() {
        let (store, _tmp) = create_tmp_store();
        insert_track(&store, "a.mp3", "focus", "approved", false);
        insert_track(&store, "b.mp3", "focus", "pending", false);
        insert_track(&store, "c.mp3", "calm", "approved", false);

        let tracks = store.get_by_mood("focus", false).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].file_path, "a.mp3");
    }

    #[test]
    fn get_by_mood_instrumental_filter() {
        let (store, _tmp) = create_tmp_store();
        insert_track(&store, "vocal.mp3", "focus", "approved", true);
        insert_track(&store, "instrumental.mp3", "focus", "approved", false);

        let all = store.get_by_mood("focus", false).unwrap();
        assert_eq!(all.len(), 2);

        let instrumental = store.get_by_mood("focus", true).unwrap();
        assert_eq!(instrumental.len(), 1);
        assert_eq!(instrumental[0].file_path, "instrumental.mp3");
        assert!(!instrumental[0].has_vocals);
    }

    #[test]
    fn get_by_mood_orders_least_played_first() {
        let (store, _tmp) = create_tmp_store();
        let a = insert_track(&store, "a.mp3", "focus", "approved", false);
        insert_track(&store, "b.mp3", "focus", "approved", false);
        let c = insert_track(&store, "c.mp3", "focus", "approved", false);

        // a played twice, c once, b never.
        for id in [a, a, c] {
            store
                .with_play_tx(&mut |tx| tx.update_play_stats(id))
                .unwrap();
        }

        let tracks = store.get_by_mood("focus", false).unwrap();
        let paths: Vec<&str> = tracks.iter().map(|t| t.file_path.as_str()).collect();
        assert_eq!(paths, vec!["b.mp3", "c.mp3", "a.mp3"]);
        assert_eq!(tracks[0].play_count, 0);
        assert!(tracks[0].last_played_at.is_none());
        assert_eq!(tracks[2].play_count, 2);
        assert!(tracks[2].last_played_at.is_some());
    }

    #[test]
    fn get_by_id_returns_none_for_unknown() {
        let (store, _tmp) = create_tmp_store();
        assert!(store.get_by_id(42).unwrap().is_none());

        let id = insert_track(&store, "a.mp3", "focus", "approved", false);
        let track = store.get_by_id(id).unwrap().unwrap();
        assert_eq!(track.file_path, "a.mp3");
        assert_eq!(track.mood, "focus");
        assert_eq!(track.status, TrackStatus::Approved);
    }

    #[test]
    fn update_play_stats_upserts_and_increments() {
        let (store, _tmp) = create_tmp_store();
        let id = insert_track(&store, "a.mp3", "focus", "approved", false);

        store
            .with_play_tx(&mut |tx| tx.update_play_stats(id))
            .unwrap();
        assert_eq!(play_count(&store, "a.mp3"), 1);

        store
            .with_play_tx(&mut |tx| tx.update_play_stats(id))
            .unwrap();
        assert_eq!(play_count(&store, "a.mp3"), 2);
    }

    #[test]
    fn update_play_stats_fails_for_unknown_track() {
        let (store, _tmp) = create_tmp_store();
        let err = store
            .with_play_tx(&mut |tx| tx.update_play_stats(999))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::TrackNotFound(999))
        ));
    }

    #[test]
    fn failed_transaction_rolls_back_all_writes() {
        let (store, _tmp) = create_tmp_store();
        let id = insert_track(&store, "a.mp3", "focus", "approved", false);

        let result = store.with_play_tx(&mut |tx| {
            tx.update_play_stats(id)?;
            tx.record_listen_event(&ListenEvent {
                track_id: id,
                mood: "focus".to_string(),
                kind: ListenEventKind::Play,
                listen_seconds: 30,
                playlist_position: None,
            })?;
            anyhow::bail!("injected failure after both writes")
        });
        assert!(result.is_err());

        // Neither the statistic update nor the event survived the rollback.
        assert_eq!(play_count(&store, "a.mp3"), 0);
        assert_eq!(listen_event_count(&store), 0);
    }

    #[test]
    fn record_listen_event_clamps_negative_seconds() {
        let (store, _tmp) = create_tmp_store();
        let id = insert_track(&store, "a.mp3", "focus", "approved", false);

        store
            .with_play_tx(&mut |tx| {
                tx.record_listen_event(&ListenEvent {
                    track_id: id,
                    mood: "focus".to_string(),
                    kind: ListenEventKind::Skip,
                    listen_seconds: -5,
                    playlist_position: Some(2),
                })
            })
            .unwrap();

        let conn = store.conn.lock().unwrap();
        let (seconds, kind, position): (i64, String, Option<i64>) = conn
            .query_row(
                "SELECT listen_seconds, event_type, playlist_position FROM listen_events",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .unwrap();
        assert_eq!(seconds, 0);
        assert_eq!(kind, "skip");
        assert_eq!(position, Some(2));
    }

    #[test]
    fn mood_stats_aggregate_approved_only() {
        let (store, _tmp) = create_tmp_store();
        insert_track(&store, "a.mp3", "focus", "approved", false);
        insert_track(&store, "b.mp3", "focus", "approved", false);
        insert_track(&store, "c.mp3", "focus", "pending", false);
        insert_track(&store, "d.mp3", "calm", "approved", false);

        let stats = store.get_mood_stats().unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].mood, "calm");
        assert_eq!(stats[0].track_count, 1);
        assert_eq!(stats[0].total_duration_seconds, 180);
        assert_eq!(stats[1].mood, "focus");
        assert_eq!(stats[1].track_count, 2);
        assert_eq!(stats[1].total_duration_seconds, 360);
    }

    #[test]
    fn play_stats_survive_track_metadata_reimport() {
        let (store, _tmp) = create_tmp_store();
        let id = insert_track(&store, "a.mp3", "focus", "approved", false);
        store
            .with_play_tx(&mut |tx| tx.update_play_stats(id))
            .unwrap();

        // Re-import with the same path: stats row keyed by path is kept.
        {
            let conn = store.conn.lock().unwrap();
            conn.execute("UPDATE tracks SET title = 'renamed' WHERE id = ?1", params![id])
                .unwrap();
        }
        assert_eq!(play_count(&store, "a.mp3"), 1);

        let track = store.get_by_id(id).unwrap().unwrap();
        assert_eq!(track.play_count, 1);
    }

    #[test]
    fn ping_succeeds_on_open_database() {
        let (store, _tmp) = create_tmp_store();
        store.ping().unwrap();
    }
}
