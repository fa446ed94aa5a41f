use std::path::Path;

use rusqlite::{Connection, OpenFlags, Row, params};

use super::{IndexError, Result};
use super::models::{TrackRecord, parse_genres};

/// SQLite-backed track metadata table, one row per indexed vector.
pub struct MetadataStore {
    pub conn: Connection,
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS tracks (
        row_idx           INTEGER PRIMARY KEY,
        uri               TEXT,
        track_id          TEXT,
        title             TEXT NOT NULL,
        artist            TEXT NOT NULL,
        duration_ms       INTEGER,
        genres            TEXT,

        -- Audio features, all nullable
        valence           REAL,
        energy            REAL,
        tempo             REAL,
        acousticness      REAL,
        instrumentalness  REAL,
        danceability      REAL,
        liveness          REAL,

        popularity        REAL,
        year              INTEGER,
        explicit          INTEGER
    );
";

impl MetadataStore {
    /// Open an existing table read-only.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        Ok(Self { conn })
    }

    /// Create (or open for writing) a table at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Insert a track at a given vector row.
    pub fn insert_track(&self, row_idx: usize, t: &TrackRecord) -> Result<()> {
        let genres = t.genres.join(", ");
        self.conn.execute(
            "INSERT OR REPLACE INTO tracks (
                row_idx, uri, track_id, title, artist, duration_ms, genres,
                valence, energy, tempo, acousticness, instrumentalness,
                danceability, liveness, popularity, year, explicit
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7,
                ?8, ?9, ?10, ?11, ?12,
                ?13, ?14, ?15, ?16, ?17
            )",
            params![
                row_idx as i64, t.uri, t.track_id, t.title, t.artist,
                t.duration_ms.map(|d| d as i64), genres,
                t.valence, t.energy, t.tempo, t.acousticness, t.instrumentalness,
                t.danceability, t.liveness, t.popularity, t.year, t.explicit,
            ],
        )?;
        Ok(())
    }

    pub fn count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM tracks", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Load every track ordered by vector row.
    ///
    /// Row indices must run 0..n without gaps, since position `i` pairs with
    /// vector row `i`.
    pub fn load_all(&self) -> Result<Vec<TrackRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT uri, track_id, title, artist, duration_ms, genres,
                    valence, energy, tempo, acousticness, instrumentalness,
                    danceability, liveness, popularity, year, explicit, row_idx
             FROM tracks
             ORDER BY row_idx",
        )?;

        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(16)?, row_to_track(row)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut tracks = Vec::with_capacity(rows.len());
        for (position, (row_idx, track)) in rows.into_iter().enumerate() {
            if row_idx != position as i64 {
                return Err(IndexError::RowGap { position, row_idx });
            }
            tracks.push(track);
        }
        Ok(tracks)
    }
}

fn row_to_track(row: &Row<'_>) -> rusqlite::Result<TrackRecord> {
    let duration_ms: Option<i64> = row.get(4)?;
    let genres: Option<String> = row.get(5)?;
    Ok(TrackRecord {
        uri: row.get(0)?,
        track_id: row.get(1)?,
        title: row.get(2)?,
        artist: row.get(3)?,
        duration_ms: duration_ms.filter(|d| *d >= 0).map(|d| d as u64),
        genres: genres.as_deref().map(parse_genres).unwrap_or_default(),
        valence: row.get(6)?,
        energy: row.get(7)?,
        tempo: row.get(8)?,
        acousticness: row.get(9)?,
        instrumentalness: row.get(10)?,
        danceability: row.get(11)?,
        liveness: row.get(12)?,
        popularity: row.get(13)?,
        year: row.get(14)?,
        explicit: row.get(15)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_track() -> TrackRecord {
        TrackRecord {
            uri: Some("spotify:track:4fbvXwMTXPWaFyaMWUm9CR".into()),
            track_id: Some("4fbvXwMTXPWaFyaMWUm9CR".into()),
            title: "Holocene".into(),
            artist: "Bon Iver".into(),
            duration_ms: Some(336_613),
            genres: vec!["indie folk".into(), "chamber pop".into()],
            valence: Some(0.15),
            energy: Some(0.32),
            tempo: Some(147.9),
            acousticness: Some(0.84),
            instrumentalness: Some(0.01),
            danceability: None,
            liveness: None,
            popularity: Some(71.0),
            year: Some(2011),
            explicit: Some(false),
        }
    }

    #[test]
    fn test_insert_and_load() {
        let store = MetadataStore::open_in_memory().unwrap();
        store.insert_track(0, &test_track()).unwrap();
        let tracks = store.load_all().unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0], test_track());
    }

    #[test]
    fn test_load_orders_by_row() {
        let store = MetadataStore::open_in_memory().unwrap();
        let mut second = test_track();
        second.title = "Second".into();
        store.insert_track(1, &second).unwrap();
        store.insert_track(0, &test_track()).unwrap();

        let tracks = store.load_all().unwrap();
        assert_eq!(tracks[0].title, "Holocene");
        assert_eq!(tracks[1].title, "Second");
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_null_columns_load_as_none() {
        let store = MetadataStore::open_in_memory().unwrap();
        store
            .conn
            .execute(
                "INSERT INTO tracks (row_idx, title, artist) VALUES (0, 'Bare', 'Nobody')",
                [],
            )
            .unwrap();
        let tracks = store.load_all().unwrap();
        assert_eq!(tracks[0].genres, Vec::<String>::new());
        assert_eq!(tracks[0].valence, None);
        assert_eq!(tracks[0].popularity, None);
        assert_eq!(tracks[0].explicit, None);
    }
}
