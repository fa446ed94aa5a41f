use serde::{Deserialize, Serialize};

/// One track row from the metadata table.
///
/// Audio features stay `Option` so callers can tell a missing column value
/// apart from a real zero. Use the accessor methods for neutral defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub uri: Option<String>,
    pub track_id: Option<String>,
    pub title: String,
    pub artist: String,
    pub duration_ms: Option<u64>,
    pub genres: Vec<String>,

    pub valence: Option<f64>,
    pub energy: Option<f64>,
    pub tempo: Option<f64>,
    pub acousticness: Option<f64>,
    pub instrumentalness: Option<f64>,
    pub danceability: Option<f64>,
    pub liveness: Option<f64>,

    /// 0-100 streaming popularity.
    pub popularity: Option<f64>,
    pub year: Option<i32>,
    pub explicit: Option<bool>,
}

/// Popularity assumed for tracks without one.
pub const DEFAULT_POPULARITY: f64 = 50.0;

impl TrackRecord {
    pub fn valence_or_zero(&self) -> f64 {
        self.valence.unwrap_or(0.0)
    }

    pub fn energy_or_zero(&self) -> f64 {
        self.energy.unwrap_or(0.0)
    }

    pub fn tempo_or_zero(&self) -> f64 {
        self.tempo.unwrap_or(0.0)
    }

    pub fn popularity_or_default(&self) -> f64 {
        self.popularity.unwrap_or(DEFAULT_POPULARITY)
    }

    /// Lowercased, trimmed artist used for duplicate detection.
    pub fn artist_key(&self) -> String {
        normalize_key(&self.artist)
    }

    /// Lowercased, trimmed title used for duplicate detection.
    pub fn title_key(&self) -> String {
        normalize_key(&self.title)
    }

    /// (title, artist) pair, both normalized.
    pub fn pair_key(&self) -> (String, String) {
        (self.title_key(), self.artist_key())
    }

    /// Preferred external identifier: URI, then bare track id.
    pub fn identifier(&self) -> Option<&str> {
        self.uri.as_deref().or(self.track_id.as_deref())
    }
}

/// Trim and lowercase a title or artist for comparison.
pub fn normalize_key(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Split a delimited genre string into trimmed, non-empty genres.
/// "indie pop, dream pop,, " → ["indie pop", "dream pop"]
pub fn parse_genres(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_genres() {
        assert_eq!(
            parse_genres("indie pop, dream pop,, "),
            vec!["indie pop".to_string(), "dream pop".to_string()]
        );
        assert!(parse_genres("").is_empty());
        assert!(parse_genres(" , ,").is_empty());
    }

    #[test]
    fn test_keys_ignore_case_and_whitespace() {
        let t = TrackRecord {
            title: "  Holocene ".into(),
            artist: "Bon IVER".into(),
            ..Default::default()
        };
        assert_eq!(t.pair_key(), ("holocene".to_string(), "bon iver".to_string()));
    }

    #[test]
    fn test_identifier_prefers_uri() {
        let mut t = TrackRecord {
            uri: Some("spotify:track:abc".into()),
            track_id: Some("abc".into()),
            ..Default::default()
        };
        assert_eq!(t.identifier(), Some("spotify:track:abc"));
        t.uri = None;
        assert_eq!(t.identifier(), Some("abc"));
        t.track_id = None;
        assert_eq!(t.identifier(), None);
    }

    #[test]
    fn test_neutral_defaults() {
        let t = TrackRecord::default();
        assert_eq!(t.valence_or_zero(), 0.0);
        assert_eq!(t.popularity_or_default(), 50.0);
    }
}
