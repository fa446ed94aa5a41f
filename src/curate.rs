use serde::Serialize;

use crate::config::CurationConfig;
use crate::dedup::dedupe_candidates;
use crate::encoder::QueryEncoder;
use crate::index::models::TrackRecord;
use crate::progression::{mean_duration_ms, select_iso_progression, target_track_count};
use crate::retriever::{Result, Retriever};
use crate::scoring::{Jitter, MoodTarget, ScoringParams, score_candidates};
use crate::severity::{Phq9Severity, needs_referral};

/// Inputs for one curation call.
#[derive(Debug, Clone)]
pub struct CurationRequest {
    /// Mood slider, 0-10.
    pub pre_mood: i32,
    /// PHQ-9 score, reported only.
    pub phq9: u8,
    /// "30" or "30-45" minutes.
    pub desired_minutes: String,
    /// User's favourite track URIs or ids.
    pub top_ids: Vec<String>,
    pub location: String,
}

/// A curated progression and what shaped it.
#[derive(Debug, Clone, Serialize)]
pub struct CurationOutcome {
    pub plan: Vec<TrackRecord>,
    pub target_count: usize,
    pub mood_target: MoodTarget,
    pub severity: Phq9Severity,
    pub referral_suggested: bool,
    /// Candidates left after scoring filters and dedup.
    pub pool_size: usize,
}

impl CurationOutcome {
    pub fn is_underfilled(&self) -> bool {
        self.plan.len() < self.target_count
    }
}

/// Retrieval-to-progression pipeline over one retriever.
pub struct Curator<E> {
    retriever: Retriever<E>,
    settings: CurationConfig,
}

impl<E: QueryEncoder> Curator<E> {
    pub fn new(retriever: Retriever<E>, settings: CurationConfig) -> Self {
        Self { retriever, settings }
    }

    /// Build a reflect → transition → uplift progression for one listener.
    ///
    /// Returns fewer tracks than the target when the pool can't fill every
    /// phase; that is not an error.
    pub fn curate(&self, req: &CurationRequest, jitter: &mut dyn Jitter) -> Result<CurationOutcome> {
        let pool = self
            .retriever
            .search(&self.settings.base_query, self.settings.pool_size)?;

        let params = ScoringParams {
            pre_mood: req.pre_mood,
            location: &req.location,
            top_ids: &req.top_ids,
            popularity_floor: self.settings.popularity_floor,
        };
        let ranked = dedupe_candidates(score_candidates(pool, &params, jitter));

        let tracks: Vec<&TrackRecord> = ranked.iter().map(|c| &c.track).collect();
        let target_count = target_track_count(
            &req.desired_minutes,
            mean_duration_ms(&tracks),
            self.settings.max_tracks,
        );

        let mood_target = MoodTarget::from_pre_mood(req.pre_mood);
        let plan = select_iso_progression(&ranked, &mood_target, target_count);

        let severity = Phq9Severity::from_score(req.phq9);
        let outcome = CurationOutcome {
            plan,
            target_count,
            mood_target,
            severity,
            referral_suggested: needs_referral(req.phq9),
            pool_size: ranked.len(),
        };

        if outcome.is_underfilled() {
            log::warn!(
                "Progression under-filled: {} of {} tracks from a pool of {}",
                outcome.plan.len(),
                target_count,
                ranked.len()
            );
        }
        log::info!(
            "Curated {} tracks for mood {} ({}), location {:?}",
            outcome.plan.len(),
            req.pre_mood,
            severity.label(),
            req.location
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::EncodeError;
    use crate::index::metadata::MetadataStore;
    use crate::index::{TRACKS_FILE, VECTORS_FILE, VectorIndex};
    use crate::progression::select_with_uplift;
    use crate::scoring::{NoJitter, UniformJitter};
    use std::path::Path;

    struct UnitEncoder;

    impl QueryEncoder for UnitEncoder {
        fn encode(&self, _model: &str, _text: &str) -> std::result::Result<Vec<f32>, EncodeError> {
            Ok(vec![1.0, 0.0])
        }
    }

    fn make_track(i: usize, valence: f64, energy: f64, genres: &[&str]) -> TrackRecord {
        TrackRecord {
            uri: Some(format!("spotify:track:{i}")),
            title: format!("Song {i}"),
            artist: format!("Artist {i}"),
            duration_ms: Some(210_000),
            genres: genres.iter().map(|g| g.to_string()).collect(),
            valence: Some(valence),
            energy: Some(energy),
            tempo: Some(90.0 + i as f64),
            popularity: Some(75.0),
            ..Default::default()
        }
    }

    /// Grid of tracks covering the low-mood target box, plus noise.
    fn write_library(dir: &Path) -> usize {
        let mut tracks = Vec::new();
        let mut i = 0;
        for v in 0..6 {
            for e in 0..6 {
                let valence = 0.21 + v as f64 * 0.05;
                let energy = 0.20 + e as f64 * 0.07;
                tracks.push(make_track(i, valence, energy, &["indonesian pop"]));
                i += 1;
            }
        }
        // Same artist as Song 0: must never appear twice
        let mut dup = make_track(999, 0.22, 0.21, &[]);
        dup.artist = "artist 0 ".into();
        tracks.push(dup);
        // Explicit and unpopular tracks are filtered
        let mut explicit = make_track(1000, 0.25, 0.25, &[]);
        explicit.explicit = Some(true);
        tracks.push(explicit);
        let mut obscure = make_track(1001, 0.25, 0.25, &[]);
        obscure.popularity = Some(10.0);
        tracks.push(obscure);

        let rows: Vec<Vec<f32>> = (0..tracks.len())
            .map(|j| {
                let s = 1.0 - j as f32 * 0.01;
                vec![s, (1.0 - s * s).max(0.0).sqrt()]
            })
            .collect();
        VectorIndex::from_rows(&rows)
            .unwrap()
            .write(&dir.join(VECTORS_FILE))
            .unwrap();
        let store = MetadataStore::create(&dir.join(TRACKS_FILE)).unwrap();
        for (row, t) in tracks.iter().enumerate() {
            store.insert_track(row, t).unwrap();
        }
        tracks.len()
    }

    fn request(minutes: &str) -> CurationRequest {
        CurationRequest {
            pre_mood: 2,
            phq9: 12,
            desired_minutes: minutes.into(),
            top_ids: vec![],
            location: "Indonesia".into(),
        }
    }

    fn curator(dir: &Path) -> Curator<UnitEncoder> {
        Curator::new(Retriever::new(dir, UnitEncoder), CurationConfig::default())
    }

    #[test]
    fn test_curate_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        write_library(dir.path());
        let outcome = curator(dir.path()).curate(&request("30-45"), &mut NoJitter).unwrap();

        assert_eq!(outcome.target_count, 12);
        assert!(!outcome.plan.is_empty());
        assert!(outcome.plan.len() <= 12);
        assert_eq!(outcome.severity, Phq9Severity::Moderate);
        assert!(!outcome.referral_suggested);

        // Dedup keeps one track per artist, filters drop explicit/unpopular
        let titles: Vec<&str> = outcome.plan.iter().map(|t| t.title.as_str()).collect();
        assert!(!titles.contains(&"Song 1000"));
        assert!(!titles.contains(&"Song 1001"));
        let artists: std::collections::HashSet<String> =
            outcome.plan.iter().map(|t| t.artist_key()).collect();
        assert_eq!(artists.len(), outcome.plan.len());

        // Smooth ordering by valence
        for pair in outcome.plan.windows(2) {
            assert!(pair[0].valence_or_zero() <= pair[1].valence_or_zero());
        }
    }

    #[test]
    fn test_curate_is_repeatable_with_fixed_jitter() {
        let dir = tempfile::tempdir().unwrap();
        write_library(dir.path());
        let c = curator(dir.path());
        let a = c.curate(&request("30-45"), &mut UniformJitter::seeded(7)).unwrap();
        let b = c.curate(&request("30-45"), &mut UniformJitter::seeded(7)).unwrap();
        assert_eq!(a.plan, b.plan);
    }

    #[test]
    fn test_curate_small_pool_underfills() {
        let dir = tempfile::tempdir().unwrap();
        let tracks = vec![
            make_track(0, 0.22, 0.22, &[]),
            make_track(1, 0.45, 0.50, &[]),
        ];
        VectorIndex::from_rows(&[vec![1.0, 0.0], vec![0.9, 0.1]])
            .unwrap()
            .write(&dir.path().join(VECTORS_FILE))
            .unwrap();
        let store = MetadataStore::create(&dir.path().join(TRACKS_FILE)).unwrap();
        for (row, t) in tracks.iter().enumerate() {
            store.insert_track(row, t).unwrap();
        }

        let outcome = curator(dir.path()).curate(&request("30-45"), &mut NoJitter).unwrap();
        assert!(outcome.is_underfilled());
        assert_eq!(outcome.plan.len(), 2);
    }

    #[test]
    fn test_curate_then_uplift_selection() {
        let dir = tempfile::tempdir().unwrap();
        write_library(dir.path());
        let outcome = curator(dir.path()).curate(&request("30-45"), &mut NoJitter).unwrap();
        let picked = select_with_uplift(&outcome.plan, 6);
        let last = picked.last().unwrap().energy_or_zero();
        assert!(picked.iter().all(|t| t.energy_or_zero() <= last));
    }

    #[test]
    fn test_curate_missing_index_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = curator(&dir.path().join("nope"))
            .curate(&request("30"), &mut NoJitter)
            .unwrap_err();
        assert!(err.to_string().contains("nope"));
    }
}
