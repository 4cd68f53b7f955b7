//! Data models for the track catalog.
//!
//! Tracks carry their cumulative play statistics, joined in from the
//! `play_stats` table at query time rather than stored on the track row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Enumerations
// =============================================================================

/// Energy classification of a track.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Energy {
    Low,
    Medium,
    High,
}

impl Energy {
    /// Convert from database string representation.
    pub fn from_db_str(s: &str) -> Self {
        match s {
            "medium" => Energy::Medium,
            "high" => Energy::High,
            _ => Energy::Low,
        }
    }

    /// Convert to database string representation.
    pub fn to_db_str(self) -> &'static str {
        match self {
            Energy::Low => "low",
            Energy::Medium => "medium",
            Energy::High => "high",
        }
    }
}

/// Lifecycle status of a track. Only approved tracks are ever served.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackStatus {
    Approved,
    Pending,
    Unknown,
}

impl TrackStatus {
    pub fn from_db_str(s: &str) -> Self {
        match s {
            "approved" => TrackStatus::Approved,
            "pending" => TrackStatus::Pending,
            _ => TrackStatus::Unknown,
        }
    }

    pub fn to_db_str(self) -> &'static str {
        match self {
            TrackStatus::Approved => "approved",
            TrackStatus::Pending => "pending",
            TrackStatus::Unknown => "unknown",
        }
    }
}

/// Kind of a listen engagement event.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListenEventKind {
    Play,
    Skip,
    Complete,
}

impl ListenEventKind {
    /// Parse a wire value. Returns `None` for anything outside the fixed set.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "play" => Some(ListenEventKind::Play),
            "skip" => Some(ListenEventKind::Skip),
            "complete" => Some(ListenEventKind::Complete),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ListenEventKind::Play => "play",
            ListenEventKind::Skip => "skip",
            ListenEventKind::Complete => "complete",
        }
    }
}

// =============================================================================
// Entities
// =============================================================================

/// A catalog entry, including joined play statistics.
#[derive(Clone, Debug, Serialize)]
pub struct Track {
    pub id: i64,
    pub file_path: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,

    pub mood: String,
    pub energy: Energy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tempo_bpm: Option<i64>,
    pub has_vocals: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub musical_key: Option<String>,

    /// 1 = light listening, 10 = deep listening.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intensity: Option<i64>,
    /// morning, afternoon, evening, night or any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_affinity: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub lyrics: Option<String>,

    pub duration_seconds: i64,
    pub status: TrackStatus,
    pub created_at: DateTime<Utc>,

    /// Sourced from `play_stats` via LEFT JOIN, 0 when never played.
    pub play_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_played_at: Option<DateTime<Utc>>,
}

/// A single listen engagement occurrence, written once and never updated.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListenEvent {
    pub track_id: i64,
    pub mood: String,
    pub kind: ListenEventKind,
    pub listen_seconds: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playlist_position: Option<i64>,
}

/// Aggregated per-mood catalog statistics.
#[derive(Clone, Debug, Serialize)]
pub struct MoodStats {
    pub mood: String,
    pub track_count: i64,
    pub total_duration_seconds: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listen_event_kind_parses_only_fixed_set() {
        assert_eq!(ListenEventKind::parse("play"), Some(ListenEventKind::Play));
        assert_eq!(ListenEventKind::parse("skip"), Some(ListenEventKind::Skip));
        assert_eq!(
            ListenEventKind::parse("complete"),
            Some(ListenEventKind::Complete)
        );
        assert_eq!(ListenEventKind::parse("pause"), None);
        assert_eq!(ListenEventKind::parse(""), None);
        assert_eq!(ListenEventKind::parse("PLAY"), None);
    }

    #[test]
    fn energy_db_round_trip() {
        for energy in [Energy::Low, Energy::Medium, Energy::High] {
            assert_eq!(Energy::from_db_str(energy.to_db_str()), energy);
        }
        assert_eq!(Energy::from_db_str("garbage"), Energy::Low);
    }

    #[test]
    fn track_status_db_round_trip() {
        assert_eq!(TrackStatus::from_db_str("approved"), TrackStatus::Approved);
        assert_eq!(TrackStatus::from_db_str("pending"), TrackStatus::Pending);
        assert_eq!(TrackStatus::from_db_str("draft"), TrackStatus::Unknown);
    }
}
