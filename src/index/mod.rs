pub mod metadata;
pub mod models;

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use metadata::MetadataStore;
use models::TrackRecord;

/// Flat vector file, see `VectorIndex::write`.
pub const VECTORS_FILE: &str = "vectors.bin";
/// SQLite metadata table.
pub const TRACKS_FILE: &str = "tracks.db";
/// Optional sidecar naming the embedding model.
pub const MODEL_INFO_FILE: &str = "metadata.json";

const MAGIC: &[u8; 4] = b"ISOV";
const HEADER_LEN: usize = 12;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("index not found in {dir}: missing {missing}")]
    NotFound { dir: PathBuf, missing: PathBuf },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("invalid model info: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed vector file: {0}")]
    Format(String),
    #[error("metadata row {position} has row_idx {row_idx}; row indices must run 0..n")]
    RowGap { position: usize, row_idx: i64 },
    #[error("vector file has {vectors} rows but metadata table has {tracks}")]
    RowMismatch { vectors: usize, tracks: usize },
}

pub type Result<T> = std::result::Result<T, IndexError>;

/// Exhaustive inner-product index over fixed-dimension vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dim: usize,
    data: Vec<f32>,
}

impl VectorIndex {
    /// Build from row vectors. All rows must share one dimension.
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        let dim = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut data = Vec::with_capacity(dim * rows.len());
        for (i, row) in rows.iter().enumerate() {
            if row.len() != dim {
                return Err(IndexError::Format(format!(
                    "row {i} has dimension {} (expected {dim})",
                    row.len()
                )));
            }
            data.extend_from_slice(row);
        }
        Ok(Self { dim, data })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        if self.dim == 0 { 0 } else { self.data.len() / self.dim }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }

    /// Read a vector file: `ISOV`, u32 LE dim, u32 LE count, then f32 LE values.
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        if bytes.len() < HEADER_LEN || &bytes[..4] != MAGIC {
            return Err(IndexError::Format("missing ISOV header".into()));
        }
        let dim = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        let count = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;

        let expected = dim
            .checked_mul(count)
            .and_then(|n| n.checked_mul(4))
            .and_then(|n| n.checked_add(HEADER_LEN))
            .ok_or_else(|| {
                IndexError::Format(format!("header size {count}x{dim} overflows"))
            })?;
        if bytes.len() != expected {
            return Err(IndexError::Format(format!(
                "expected {expected} bytes for {count}x{dim} vectors, found {}",
                bytes.len()
            )));
        }

        let data = bytes[HEADER_LEN..]
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Self { dim, data })
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.data.len() * 4);
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&(self.dim as u32).to_le_bytes());
        bytes.extend_from_slice(&(self.len() as u32).to_le_bytes());
        for v in &self.data {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Top-`k` rows by inner product with `query`, best first.
    /// Ties go to the lower row. Returns fewer than `k` if the index is smaller.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        let n = self.len();
        if n == 0 || k == 0 || query.len() != self.dim {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f32)> = (0..n)
            .map(|i| (i, inner_product(self.row(i), query)))
            .collect();

        let by_score = |a: &(usize, f32), b: &(usize, f32)| {
            b.1.total_cmp(&a.1).then(a.0.cmp(&b.0))
        };

        // Partial sort: only need the top k
        if k < n {
            scored.select_nth_unstable_by(k - 1, by_score);
            scored.truncate(k);
        }
        scored.sort_by(by_score);
        scored
    }
}

fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    embedding_model: Option<String>,
}

/// A loaded index directory: vectors, their track rows, and the model id.
#[derive(Debug)]
pub struct LoadedIndex {
    pub vectors: VectorIndex,
    pub tracks: Vec<TrackRecord>,
    pub model: String,
}

impl LoadedIndex {
    /// Load `vectors.bin`, `tracks.db` and the optional `metadata.json` from `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let vectors_path = dir.join(VECTORS_FILE);
        let tracks_path = dir.join(TRACKS_FILE);
        for required in [&vectors_path, &tracks_path] {
            if !required.exists() {
                return Err(IndexError::NotFound {
                    dir: dir.to_path_buf(),
                    missing: required.clone(),
                });
            }
        }

        let vectors = VectorIndex::read(&vectors_path)?;
        let tracks = MetadataStore::open(&tracks_path)?.load_all()?;
        if vectors.len() != tracks.len() {
            return Err(IndexError::RowMismatch {
                vectors: vectors.len(),
                tracks: tracks.len(),
            });
        }

        let model = read_model_id(&dir.join(MODEL_INFO_FILE))?;

        log::info!(
            "Loaded index from {}: {} tracks, {}-dim, model {}",
            dir.display(),
            tracks.len(),
            vectors.dim(),
            model
        );

        Ok(Self { vectors, tracks, model })
    }
}

/// Model id from the sidecar file, or the default when the file is absent.
fn read_model_id(path: &Path) -> Result<String> {
    if !path.exists() {
        log::debug!("No {} sidecar, using default model", MODEL_INFO_FILE);
        return Ok(crate::DEFAULT_EMBEDDING_MODEL.to_string());
    }
    let info: ModelInfo = serde_json::from_str(&fs::read_to_string(path)?)?;
    Ok(info
        .embedding_model
        .unwrap_or_else(|| crate::DEFAULT_EMBEDDING_MODEL.to_string()))
}
