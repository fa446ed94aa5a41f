use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::catalog::CatalogEntry;
use crate::index::models::normalize_key;

/// One generated playlist slot.
///
/// Deserializes from either `{"title": ..., "artist": ...}` or a
/// `"Title - Artist"` string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawPlaylistItem")]
pub struct PlaylistItem {
    pub title: String,
    pub artist: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPlaylistItem {
    Pair {
        #[serde(default)]
        title: String,
        #[serde(default)]
        artist: String,
    },
    Line(String),
}

impl From<RawPlaylistItem> for PlaylistItem {
    fn from(raw: RawPlaylistItem) -> Self {
        match raw {
            RawPlaylistItem::Pair { title, artist } => Self { title, artist },
            RawPlaylistItem::Line(line) => PlaylistItem::parse_line(&line),
        }
    }
}

impl PlaylistItem {
    /// Split "Title - Artist" on the last " - ". No separator means no artist.
    pub fn parse_line(line: &str) -> Self {
        match line.rsplit_once(" - ") {
            Some((title, artist)) => Self {
                title: title.trim().to_string(),
                artist: artist.trim().to_string(),
            },
            None => Self {
                title: line.trim().to_string(),
                artist: String::new(),
            },
        }
    }

    pub fn key(&self) -> (String, String) {
        (normalize_key(&self.title), normalize_key(&self.artist))
    }

    fn display(&self) -> String {
        format!("{} - {}", self.title, self.artist)
    }
}

/// Playlist object returned by the generator. Keys this crate doesn't know
/// about (title, description, ...) are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedPlaylist {
    #[serde(default)]
    pub playlist: Vec<PlaylistItem>,
    #[serde(default)]
    pub genres: Vec<String>,
    /// Identifiers parallel to `playlist`, filled in by validation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uris: Option<Vec<Option<String>>>,
    /// Human-readable validation note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Outcome of checking a generated playlist against its catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub playlist: Vec<PlaylistItem>,
    /// "title - artist" of every entry not in the catalog.
    pub dropped: Vec<String>,
    /// Catalog entries appended to reach the requested count.
    pub backfilled: usize,
    pub genres: Vec<String>,
    pub identifiers: Option<Vec<Option<String>>>,
}

/// Restrict `generated` to catalog members, backfill or truncate to `count`,
/// close on the most energetic track and recompute genres.
///
/// Never fails on content: mismatches are dropped and reported. `generated`
/// is rewritten in place and the same data is returned for diagnostics.
pub fn validate_playlist(
    generated: &mut GeneratedPlaylist,
    catalog: &[CatalogEntry],
    count: usize,
) -> ValidationResult {
    let mut by_key: HashMap<(String, String), usize> = HashMap::new();
    for (i, entry) in catalog.iter().enumerate() {
        by_key.entry(entry.key()).or_insert(i);
    }

    // (item as generated, catalog row)
    let mut selected: Vec<(PlaylistItem, usize)> = Vec::new();
    let mut used: HashSet<(String, String)> = HashSet::new();
    let mut dropped = Vec::new();

    for item in &generated.playlist {
        let key = item.key();
        match by_key.get(&key) {
            Some(&row) => {
                if used.insert(key) {
                    selected.push((item.clone(), row));
                } else {
                    log::debug!("Skipping repeated entry {}", item.display());
                }
            }
            None => dropped.push(item.display()),
        }
    }

    let mut backfilled = 0;
    for (row, entry) in catalog.iter().enumerate() {
        if selected.len() >= count {
            break;
        }
        if used.insert(entry.key()) {
            let item = PlaylistItem {
                title: entry.title.clone(),
                artist: entry.artist.clone(),
            };
            selected.push((item, row));
            backfilled += 1;
        }
    }
    selected.truncate(count);

    close_on_peak_energy(&mut selected, catalog);

    let mut seen_genres = HashSet::new();
    let genres: Vec<String> = selected
        .iter()
        .flat_map(|(_, row)| catalog[*row].genres.iter())
        .filter(|g| seen_genres.insert(g.as_str()))
        .cloned()
        .collect();

    let ids: Vec<Option<String>> = selected
        .iter()
        .map(|(_, row)| catalog[*row].identifier().map(str::to_string))
        .collect();
    let identifiers = ids.iter().any(Option::is_some).then_some(ids);

    log::info!(
        "Validated playlist: {} kept, {} dropped, {} backfilled (catalog {}, wanted {})",
        selected.len() - backfilled,
        dropped.len(),
        backfilled,
        catalog.len(),
        count
    );

    let playlist: Vec<PlaylistItem> = selected.into_iter().map(|(item, _)| item).collect();

    generated.playlist = playlist.clone();
    generated.genres = genres.clone();
    generated.uris = identifiers.clone();
    generated.note = if dropped.is_empty() {
        None
    } else {
        Some(format!(
            "{} track(s) not in the catalog were dropped",
            dropped.len()
        ))
    };

    ValidationResult {
        playlist,
        dropped,
        backfilled,
        genres,
        identifiers,
    }
}

/// Move the first entry with the highest catalog energy to the end.
/// Entries without an energy value never win.
fn close_on_peak_energy(selected: &mut Vec<(PlaylistItem, usize)>, catalog: &[CatalogEntry]) {
    let mut best: Option<(usize, f64)> = None;
    for (i, (_, row)) in selected.iter().enumerate() {
        if let Some(energy) = catalog[*row].energy {
            if best.is_none_or(|(_, e)| energy > e) {
                best = Some((i, energy));
            }
        }
    }
    if let Some((i, _)) = best {
        if i + 1 != selected.len() {
            let peak = selected.remove(i);
            selected.push(peak);
        }
    }
}
