use std::path::PathBuf;
use std::sync::OnceLock;

use thiserror::Error;

use crate::encoder::{EncodeError, QueryEncoder};
use crate::index::{IndexError, LoadedIndex};
use crate::scoring::Candidate;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("k must be a positive integer")]
    InvalidK,
    #[error("query vector has dimension {query}, index has {index}")]
    DimensionMismatch { query: usize, index: usize },
}

pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Owned handle to the vector index and its query encoder.
///
/// The index is read from disk on first use and kept for the lifetime of the
/// handle; it is read-only afterwards.
pub struct Retriever<E> {
    dir: PathBuf,
    encoder: E,
    loaded: OnceLock<LoadedIndex>,
}

impl<E: QueryEncoder> Retriever<E> {
    pub fn new(dir: impl Into<PathBuf>, encoder: E) -> Self {
        Self {
            dir: dir.into(),
            encoder,
            loaded: OnceLock::new(),
        }
    }

    /// Load the index now if it isn't loaded yet.
    pub fn load(&self) -> Result<&LoadedIndex> {
        if let Some(index) = self.loaded.get() {
            return Ok(index);
        }
        let index = LoadedIndex::load(&self.dir)?;
        Ok(self.loaded.get_or_init(|| index))
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.get().is_some()
    }

    /// Encode `query` and return up to `k` tracks, most similar first.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<Candidate>> {
        if k == 0 {
            return Err(RetrievalError::InvalidK);
        }
        let index = self.load()?;
        let vector = self.encoder.encode(&index.model, query)?;
        if vector.len() != index.vectors.dim() {
            return Err(RetrievalError::DimensionMismatch {
                query: vector.len(),
                index: index.vectors.dim(),
            });
        }

        let hits = index.vectors.search(&vector, k);
        log::debug!("Search k={k} returned {} hits", hits.len());

        Ok(hits
            .into_iter()
            .map(|(row, score)| Candidate::new(index.tracks[row].clone(), f64::from(score)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::metadata::MetadataStore;
    use crate::index::models::TrackRecord;
    use crate::index::{TRACKS_FILE, VECTORS_FILE, VectorIndex};
    use std::cell::Cell;
    use std::path::Path;

    /// Returns a fixed vector and counts calls.
    struct FixedEncoder {
        vector: Vec<f32>,
        calls: Cell<usize>,
    }

    impl QueryEncoder for FixedEncoder {
        fn encode(&self, model: &str, _text: &str) -> std::result::Result<Vec<f32>, EncodeError> {
            assert_eq!(model, crate::DEFAULT_EMBEDDING_MODEL);
            self.calls.set(self.calls.get() + 1);
            Ok(self.vector.clone())
        }
    }

    fn encoder(vector: Vec<f32>) -> FixedEncoder {
        FixedEncoder { vector, calls: Cell::new(0) }
    }

    fn write_index(dir: &Path) {
        let rows = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.6, 0.8]];
        VectorIndex::from_rows(&rows)
            .unwrap()
            .write(&dir.join(VECTORS_FILE))
            .unwrap();
        let store = MetadataStore::create(&dir.join(TRACKS_FILE)).unwrap();
        for (i, title) in ["East", "North", "Between"].iter().enumerate() {
            let t = TrackRecord {
                title: title.to_string(),
                artist: format!("Artist {i}"),
                ..Default::default()
            };
            store.insert_track(i, &t).unwrap();
        }
    }

    #[test]
    fn test_search_is_lazy_and_ordered() {
        let dir = tempfile::tempdir().unwrap();
        write_index(dir.path());
        let retriever = Retriever::new(dir.path(), encoder(vec![0.0, 1.0]));
        assert!(!retriever.is_loaded());

        let hits = retriever.search("calm", 2).unwrap();
        assert!(retriever.is_loaded());
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].track.title, "North");
        assert_eq!(hits[1].track.title, "Between");
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!((hits[1].score - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_search_returns_fewer_than_k() {
        let dir = tempfile::tempdir().unwrap();
        write_index(dir.path());
        let retriever = Retriever::new(dir.path(), encoder(vec![1.0, 0.0]));
        assert_eq!(retriever.search("anything", 600).unwrap().len(), 3);
    }

    #[test]
    fn test_zero_k_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let retriever = Retriever::new(dir.path(), encoder(vec![1.0, 0.0]));
        assert!(matches!(retriever.search("q", 0), Err(RetrievalError::InvalidK)));
        assert_eq!(retriever.encoder.calls.get(), 0);
    }

    #[test]
    fn test_missing_index_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let retriever = Retriever::new(dir.path().join("absent"), encoder(vec![1.0]));
        let err = retriever.search("q", 5).unwrap_err();
        assert!(matches!(err, RetrievalError::Index(IndexError::NotFound { .. })));
        assert!(err.to_string().contains("absent"));
    }

    #[test]
    fn test_dimension_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        write_index(dir.path());
        let retriever = Retriever::new(dir.path(), encoder(vec![1.0, 0.0, 0.0]));
        assert!(matches!(
            retriever.search("q", 1),
            Err(RetrievalError::DimensionMismatch { query: 3, index: 2 })
        ));
    }
}
