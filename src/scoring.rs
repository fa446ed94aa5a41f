use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::{Regex, RegexBuilder};
use serde::Serialize;

use crate::index::models::{DEFAULT_POPULARITY, TrackRecord};

/// Bonus when genres match the target location.
const LOCAL_BOOST: f64 = 0.40;
/// Bonus when genres look English/American.
const ENGLISH_BOOST: f64 = 0.15;
/// Penalty for Indian-subcontinent genres outside an Indian locale.
const INDIAN_PENALTY: f64 = -0.30;
/// Similarity bonus for tracks in the user's top list.
const AFFINITY_BOOST: f64 = 0.15;
/// Preferred tempo in BPM.
const IDEAL_TEMPO: f64 = 95.0;
/// Jitter range is [-JITTER_AMPLITUDE, +JITTER_AMPLITUDE].
pub const JITTER_AMPLITUDE: f64 = 0.03;

/// Location → genre substrings that mark local content.
const LOCAL_SYNONYMS: &[(&str, &[&str])] = &[
    ("indonesia", &["indones", "indo", "bahasa indonesia", "dangdut", "pop indonesia"]),
    ("japan", &["japan", "japanese", "j-pop"]),
    ("korea", &["korea", "korean", "k-pop"]),
    ("malaysia", &["malay", "malaysian"]),
    ("philippines", &["philippine", "tagalog", "opm"]),
    ("thailand", &["thai", "thailand"]),
    ("vietnam", &["vietnam", "viet"]),
    ("china", &["chinese", "mandarin", "c-pop"]),
    ("taiwan", &["taiwan", "taiwanese", "mandopop"]),
    ("hong kong", &["cantopop", "cantonese", "hong kong"]),
    ("singapore", &["singapore", "singaporean"]),
];

const ENGLISH_SYNONYMS: &[&str] = &[
    "english", "american", "us", "usa", "british", "uk", "international",
];

const INDIAN_SYNONYMS: &[&str] = &[
    "india", "indian", "bollywood", "hindi", "punjabi", "tamil", "telugu",
    "malayalam", "kannada", "marathi", "bengali",
];

/// A retrieved track plus the scores derived for it during one curation.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub track: TrackRecord,
    /// Retrieval similarity (plus any affinity boost).
    pub score: f64,
    pub loc_boost: f64,
    pub en_boost: f64,
    pub locale_penalty: f64,
    pub iso_score: f64,
}

impl Candidate {
    pub fn new(track: TrackRecord, score: f64) -> Self {
        Self {
            track,
            score,
            loc_boost: 0.0,
            en_boost: 0.0,
            locale_penalty: 0.0,
            iso_score: 0.0,
        }
    }
}

/// Target valence and energy ranges derived from the pre-session mood.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MoodTarget {
    pub valence: (f64, f64),
    pub energy: (f64, f64),
}

impl MoodTarget {
    /// Map a 0-10 mood slider to target ranges. Out-of-range input is clamped.
    /// Valence starts low and rises with mood; energy is a gentle band that
    /// steps up once mood is above 4.
    pub fn from_pre_mood(pre_mood: i32) -> Self {
        let m = pre_mood.clamp(0, 10) as f64;
        let start_valence = 0.15 + m * 0.03;
        let end_valence = (start_valence + 0.25).min(0.75);
        let energy = if m <= 4.0 { (0.20, 0.55) } else { (0.30, 0.60) };
        Self {
            valence: (start_valence.max(0.05), end_valence),
            energy,
        }
    }

    /// Closeness of `valence` to the middle of the target range (≤ 0).
    pub fn valence_fit(&self, valence: f64) -> f64 {
        range_fit(valence, self.valence)
    }

    /// Closeness of `energy` to the middle of the target range (≤ 0).
    pub fn energy_fit(&self, energy: f64) -> f64 {
        range_fit(energy, self.energy)
    }
}

fn range_fit(x: f64, (lo, hi): (f64, f64)) -> f64 {
    -(x.clamp(lo, hi) - (lo + hi) / 2.0).abs()
}

/// Source of per-candidate score noise.
pub trait Jitter {
    fn sample(&mut self) -> f64;
}

/// Deterministic: never perturbs scores.
pub struct NoJitter;

impl Jitter for NoJitter {
    fn sample(&mut self) -> f64 {
        0.0
    }
}

/// Uniform noise in [-amplitude, +amplitude].
pub struct UniformJitter {
    rng: StdRng,
    amplitude: f64,
}

impl UniformJitter {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            amplitude: JITTER_AMPLITUDE,
        }
    }

    /// Seeded from the current wall-clock minute: stable within a minute,
    /// different across minutes.
    pub fn per_minute() -> Self {
        let minute = chrono::Utc::now().timestamp().max(0) as u64 / 60;
        Self::seeded(minute)
    }
}

impl Jitter for UniformJitter {
    fn sample(&mut self) -> f64 {
        self.rng.random_range(-self.amplitude..=self.amplitude)
    }
}

/// Inputs that shape one scoring pass.
#[derive(Debug, Clone)]
pub struct ScoringParams<'a> {
    pub pre_mood: i32,
    pub location: &'a str,
    pub top_ids: &'a [String],
    pub popularity_floor: f64,
}

/// Case-insensitive "contains any of" matcher over a track's genres.
struct GenreMatcher {
    re: Option<Regex>,
}

impl GenreMatcher {
    fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let alternatives: Vec<String> = patterns
            .iter()
            .map(|p| p.as_ref().trim())
            .filter(|p| !p.is_empty())
            .map(regex::escape)
            .collect();
        if alternatives.is_empty() {
            return Self { re: None };
        }
        let re = RegexBuilder::new(&alternatives.join("|"))
            .case_insensitive(true)
            .build()
            .ok();
        Self { re }
    }

    fn matches(&self, genres: &[String]) -> bool {
        match &self.re {
            Some(re) => genres.iter().any(|g| re.is_match(g)),
            None => false,
        }
    }
}

/// Genre patterns for a location. Unknown locations match on their own name.
pub fn local_patterns(location: &str) -> Vec<String> {
    let loc = location.trim().to_lowercase();
    LOCAL_SYNONYMS
        .iter()
        .find(|(name, _)| *name == loc)
        .map(|(_, patterns)| patterns.iter().map(|p| p.to_string()).collect())
        .unwrap_or_else(|| vec![loc])
}

/// Set `loc_boost`, `en_boost` and `locale_penalty` on every candidate.
pub fn apply_locale_boosts(candidates: &mut [Candidate], location: &str) {
    let loc = location.trim().to_lowercase();
    let local = GenreMatcher::new(&local_patterns(&loc));
    let english = GenreMatcher::new(ENGLISH_SYNONYMS);
    let indian = GenreMatcher::new(INDIAN_SYNONYMS);
    let penalize_indian = !loc.is_empty() && !loc.starts_with("india");

    for c in candidates.iter_mut() {
        let genres = &c.track.genres;
        c.loc_boost = if local.matches(genres) { LOCAL_BOOST } else { 0.0 };
        c.en_boost = if english.matches(genres) { ENGLISH_BOOST } else { 0.0 };
        c.locale_penalty = if penalize_indian && indian.matches(genres) {
            INDIAN_PENALTY
        } else {
            0.0
        };
    }
}

/// Add the affinity boost to candidates whose URI or track id is in `top_ids`.
pub fn apply_affinity_boost(candidates: &mut [Candidate], top_ids: &[String]) {
    if top_ids.is_empty() {
        return;
    }
    let top: HashSet<String> = top_ids.iter().map(|t| t.to_lowercase()).collect();
    for c in candidates.iter_mut() {
        let hit = [&c.track.uri, &c.track.track_id]
            .into_iter()
            .flatten()
            .any(|id| !id.is_empty() && top.contains(&id.to_lowercase()));
        if hit {
            c.score += AFFINITY_BOOST;
        }
    }
}

/// Composite relevance of one candidate, before jitter.
pub fn iso_score(c: &Candidate, target: &MoodTarget) -> f64 {
    let t = &c.track;
    let sv = target.valence_fit(t.valence_or_zero());
    let se = target.energy_fit(t.energy_or_zero());
    let acousticness = t.acousticness.unwrap_or(0.0);
    let instrumentalness = t.instrumentalness.unwrap_or(0.0);
    let tempo_pref = -(t.tempo.unwrap_or(100.0) - IDEAL_TEMPO).abs() / 200.0;
    let popularity = t.popularity_or_default() / 100.0;

    c.score * 0.50
        + sv * 0.8
        + se * 0.6
        + acousticness * 0.05
        - instrumentalness * 0.20
        + tempo_pref
        + popularity * 0.45
        + c.loc_boost
        + c.en_boost
        + c.locale_penalty
}

/// Filter, boost and score a retrieved pool; returns it sorted by `iso_score`
/// descending.
pub fn score_candidates(
    pool: Vec<Candidate>,
    params: &ScoringParams<'_>,
    jitter: &mut dyn Jitter,
) -> Vec<Candidate> {
    let retrieved = pool.len();

    let mut candidates: Vec<Candidate> = pool
        .into_iter()
        .filter(|c| c.track.valence.is_some() && c.track.energy.is_some() && c.track.tempo.is_some())
        .filter(|c| c.track.explicit != Some(true))
        .map(|mut c| {
            c.track.popularity = Some(c.track.popularity.unwrap_or(DEFAULT_POPULARITY));
            c
        })
        .filter(|c| c.track.popularity_or_default() >= params.popularity_floor)
        .collect();

    log::debug!(
        "Scoring: {} retrieved, {} after feature/explicit/popularity filters",
        retrieved,
        candidates.len()
    );

    apply_locale_boosts(&mut candidates, params.location);
    apply_affinity_boost(&mut candidates, params.top_ids);

    let target = MoodTarget::from_pre_mood(params.pre_mood);
    for c in candidates.iter_mut() {
        c.iso_score = iso_score(c, &target) + jitter.sample();
    }

    candidates.sort_by(|a, b| b.iso_score.total_cmp(&a.iso_score));
    candidates
}
