use std::collections::HashSet;

use crate::scoring::Candidate;

/// Keep the first candidate for each artist and each title, in order.
///
/// A candidate is dropped if either its normalized artist or its normalized
/// title was already seen, so the result has at most one track per artist.
pub fn dedupe_candidates(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen_artists = HashSet::new();
    let mut seen_titles = HashSet::new();
    let before = candidates.len();

    let kept: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| {
            let artist = c.track.artist_key();
            let title = c.track.title_key();
            if seen_artists.contains(&artist) || seen_titles.contains(&title) {
                return false;
            }
            seen_artists.insert(artist);
            seen_titles.insert(title);
            true
        })
        .collect();

    log::debug!("Dedup: {} → {} candidates", before, kept.len());
    kept
}
