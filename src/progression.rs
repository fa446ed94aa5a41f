use std::cmp::Ordering;
use std::collections::HashSet;

use crate::index::models::TrackRecord;
use crate::scoring::{Candidate, MoodTarget};

/// Minutes used when the duration spec can't be parsed.
pub const DEFAULT_MINUTES: (u32, u32) = (30, 45);
/// Average track length assumed for an empty pool (3.5 minutes).
pub const FALLBACK_DURATION_MS: f64 = 210_000.0;
/// Fewest tracks a progression asks for.
pub const MIN_TRACKS: usize = 8;

/// Parse "30" or "30-45" (minutes). Anything else yields `DEFAULT_MINUTES`.
pub fn parse_duration_spec(spec: &str) -> (u32, u32) {
    let parsed = match spec.split_once('-') {
        Some((a, b)) => a.trim().parse().ok().zip(b.trim().parse().ok()),
        None => spec.trim().parse().ok().map(|m| (m, m)),
    };
    parsed.unwrap_or_else(|| {
        log::debug!("Unparseable duration {spec:?}, using {DEFAULT_MINUTES:?} minutes");
        DEFAULT_MINUTES
    })
}

/// Convert a minute range to a (min, max) track-count range.
/// At least `MIN_TRACKS`, and max is at least two above min.
pub fn minutes_to_track_count(minutes: (u32, u32), avg_duration_ms: f64) -> (usize, usize) {
    let avg_ms = if avg_duration_ms > 0.0 { avg_duration_ms } else { FALLBACK_DURATION_MS };
    let avg_min = avg_ms / 60_000.0;
    let min_tracks = MIN_TRACKS.max((minutes.0 as f64 / avg_min) as usize);
    let max_tracks = (min_tracks + 2).max((minutes.1 as f64 / avg_min) as usize);
    (min_tracks, max_tracks)
}

/// Mean duration of tracks that have one, or the fallback.
pub fn mean_duration_ms(tracks: &[&TrackRecord]) -> f64 {
    let durations: Vec<f64> = tracks
        .iter()
        .filter_map(|t| t.duration_ms)
        .map(|d| d as f64)
        .collect();
    if durations.is_empty() {
        FALLBACK_DURATION_MS
    } else {
        durations.iter().sum::<f64>() / durations.len() as f64
    }
}

/// Number of tracks to curate, capped at `cap`.
pub fn target_track_count(spec: &str, avg_duration_ms: f64, cap: usize) -> usize {
    let (min_tracks, max_tracks) =
        minutes_to_track_count(parse_duration_spec(spec), avg_duration_ms);
    cap.min(min_tracks.max(max_tracks))
}

fn share(n: usize, fraction: f64) -> usize {
    (n as f64 * fraction).round() as usize
}

/// (reflect, transition, uplift) sizes for a progression of `n` tracks.
pub fn phase_sizes(n: usize) -> (usize, usize, usize) {
    let n1 = 3.max(share(n, 0.3));
    let n3 = 3.max(share(n, 0.3));
    let n2 = 1.max(n.saturating_sub(n1 + n3));
    (n1, n2, n3)
}

/// Inclusive valence/energy box a phase draws from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseWindow {
    pub valence: (f64, f64),
    pub energy: (f64, f64),
}

impl PhaseWindow {
    pub fn contains(&self, t: &TrackRecord) -> bool {
        let v = t.valence_or_zero();
        let e = t.energy_or_zero();
        v >= self.valence.0 && v <= self.valence.1 && e >= self.energy.0 && e <= self.energy.1
    }
}

/// Reflect, transition and uplift windows, sliding from the low corner of the
/// mood target toward its high corner.
pub fn phase_windows(target: &MoodTarget) -> [PhaseWindow; 3] {
    let (v0, v1) = target.valence;
    let (e0, e1) = target.energy;
    [
        PhaseWindow {
            valence: (v0, (v0 + 0.10).min(v1)),
            energy: (e0, (e0 + 0.10).min(e1)),
        },
        PhaseWindow {
            valence: ((v0 + 0.05).min(v1), (v0 + 0.18).min(v1)),
            energy: ((e0 + 0.08).min(e1), (e0 + 0.20).min(e1)),
        },
        PhaseWindow {
            valence: ((v0 + 0.15).min(v1), v1),
            energy: ((e0 + 0.18).min(e1), e1),
        },
    ]
}

/// Drop repeated (title, artist) pairs, keeping the first.
fn dedupe_pairs(tracks: Vec<TrackRecord>) -> Vec<TrackRecord> {
    let mut seen = HashSet::new();
    tracks.into_iter().filter(|t| seen.insert(t.pair_key())).collect()
}

/// Valence, energy, tempo ascending; popularity descending.
fn progression_order(a: &TrackRecord, b: &TrackRecord) -> Ordering {
    a.valence_or_zero()
        .total_cmp(&b.valence_or_zero())
        .then(a.energy_or_zero().total_cmp(&b.energy_or_zero()))
        .then(a.tempo_or_zero().total_cmp(&b.tempo_or_zero()))
        .then(b.popularity_or_default().total_cmp(&a.popularity_or_default()))
}

/// Pick up to `n` tracks from ranked, deduplicated candidates across the
/// three mood phases, then order them as a smooth progression.
///
/// May return fewer than `n` when the windows don't hold enough candidates.
pub fn select_iso_progression(
    ranked: &[Candidate],
    target: &MoodTarget,
    n: usize,
) -> Vec<TrackRecord> {
    let (n1, n2, n3) = phase_sizes(n);
    let windows = phase_windows(target);

    let mut picked = Vec::new();
    for (window, size) in windows.iter().zip([n1, n2, n3]) {
        let phase: Vec<TrackRecord> = ranked
            .iter()
            .filter(|c| window.contains(&c.track))
            .take(size)
            .map(|c| c.track.clone())
            .collect();
        log::debug!("Phase window {:?}: {} of {} wanted", window, phase.len(), size);
        picked.extend(phase);
    }

    let mut plan = dedupe_pairs(picked);
    plan.truncate(n);
    plan.sort_by(progression_order);
    plan
}

/// Lowest valence, then energy, then highest popularity first.
fn calm_order(a: &&TrackRecord, b: &&TrackRecord) -> Ordering {
    a.valence_or_zero()
        .total_cmp(&b.valence_or_zero())
        .then(a.energy_or_zero().total_cmp(&b.energy_or_zero()))
        .then(b.popularity_or_default().total_cmp(&a.popularity_or_default()))
}

/// Highest energy, then valence, then popularity first.
fn uplift_order(a: &&TrackRecord, b: &&TrackRecord) -> Ordering {
    b.energy_or_zero()
        .total_cmp(&a.energy_or_zero())
        .then(b.valence_or_zero().total_cmp(&a.valence_or_zero()))
        .then(b.popularity_or_default().total_cmp(&a.popularity_or_default()))
}

/// Sort `pool`, split off its first `n` and leave the rest in `pool`.
fn take_first<'a>(
    pool: &mut Vec<&'a TrackRecord>,
    n: usize,
    order: fn(&&TrackRecord, &&TrackRecord) -> Ordering,
) -> Vec<&'a TrackRecord> {
    pool.sort_by(order);
    let rest = pool.split_off(n.min(pool.len()));
    std::mem::replace(pool, rest)
}

/// Move the first highest-energy track to the end.
pub fn close_on_max_energy(tracks: &mut Vec<TrackRecord>) {
    if tracks.len() < 2 {
        return;
    }
    let mut best = 0;
    for (i, t) in tracks.iter().enumerate().skip(1) {
        if t.energy_or_zero() > tracks[best].energy_or_zero() {
            best = i;
        }
    }
    if best != tracks.len() - 1 {
        let peak = tracks.remove(best);
        tracks.push(peak);
    }
}

/// Reflect → transition → uplift selection of `count` tracks (at least 3)
/// whose last track is always the most energetic one.
pub fn select_with_uplift(tracks: &[TrackRecord], count: usize) -> Vec<TrackRecord> {
    if tracks.is_empty() {
        return Vec::new();
    }
    let count = count.max(3);
    let n_reflect = 2.max(share(count, 0.3));
    let n_transition = 2.max(share(count, 0.4));
    let n_uplift = 1.max(count.saturating_sub(n_reflect + n_transition));

    let mut pool: Vec<&TrackRecord> = tracks.iter().collect();
    let reflect = take_first(&mut pool, n_reflect, calm_order);
    let transition = take_first(&mut pool, n_transition, calm_order);
    let uplift = take_first(&mut pool, n_uplift, uplift_order);

    let combined: Vec<TrackRecord> = reflect
        .into_iter()
        .chain(transition)
        .chain(uplift)
        .cloned()
        .collect();
    let mut out = dedupe_pairs(combined);
    out.truncate(count);
    close_on_max_energy(&mut out);
    out
}
