pub mod catalog;
pub mod config;
pub mod curate;
pub mod dedup;
pub mod encoder;
pub mod generator;
pub mod index;
pub mod progression;
pub mod retriever;
pub mod scoring;
pub mod severity;
pub mod validate;

/// Application name for XDG paths
pub const APP_NAME: &str = "isotune";

/// Embedding model assumed when an index has no `metadata.json`.
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-mpnet-base-v2";
