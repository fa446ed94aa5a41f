use serde::{Deserialize, Serialize};

use crate::index::models::{TrackRecord, normalize_key};

/// Minimal, shareable view of a track. A list of these is the only
/// vocabulary the playlist generator may draw from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub genres: Vec<String>,
    pub duration_ms: Option<u64>,
    pub valence: Option<f64>,
    pub energy: Option<f64>,
    pub tempo: Option<f64>,
    pub liveness: Option<f64>,
    pub acousticness: Option<f64>,
    pub instrumentalness: Option<f64>,
    pub danceability: Option<f64>,
    pub year: Option<i32>,
    pub uri: Option<String>,
    pub track_id: Option<String>,
}

impl CatalogEntry {
    pub fn from_track(t: &TrackRecord) -> Self {
        Self {
            title: t.title.trim().to_string(),
            artist: t.artist.trim().to_string(),
            genres: t
                .genres
                .iter()
                .map(|g| g.trim())
                .filter(|g| !g.is_empty())
                .map(str::to_string)
                .collect(),
            duration_ms: t.duration_ms,
            valence: t.valence,
            energy: t.energy,
            tempo: t.tempo,
            liveness: t.liveness,
            acousticness: t.acousticness,
            instrumentalness: t.instrumentalness,
            danceability: t.danceability,
            year: t.year,
            uri: t.uri.clone(),
            track_id: t.track_id.clone(),
        }
    }

    /// Normalized (title, artist) used for membership checks.
    pub fn key(&self) -> (String, String) {
        (normalize_key(&self.title), normalize_key(&self.artist))
    }

    /// Preferred external identifier: URI, then bare track id.
    pub fn identifier(&self) -> Option<&str> {
        self.uri.as_deref().or(self.track_id.as_deref())
    }
}

/// Project the first `max_items` tracks into catalog entries, in order.
pub fn project_catalog(tracks: &[TrackRecord], max_items: usize) -> Vec<CatalogEntry> {
    tracks
        .iter()
        .take(max_items)
        .map(CatalogEntry::from_track)
        .collect()
}
