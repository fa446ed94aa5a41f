use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::EmbeddingConfig;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("embedding request failed: {0}")]
    Http(String),
    #[error("embedding request timed out")]
    Timeout,
    #[error("embedding service returned HTTP {0}")]
    Status(u16),
    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),
    #[error("embedding service returned an empty vector")]
    EmptyEmbedding,
}

impl From<ureq::Error> for EncodeError {
    fn from(e: ureq::Error) -> Self {
        match e {
            ureq::Error::Timeout(_) => EncodeError::Timeout,
            ureq::Error::StatusCode(code) => EncodeError::Status(code),
            other => EncodeError::Http(other.to_string()),
        }
    }
}

/// Maps query text into the same vector space as the index.
///
/// Implementations must return vectors produced by `model`; similarity scores
/// against an index built with a different model are meaningless.
pub trait QueryEncoder {
    fn encode(&self, model: &str, text: &str) -> Result<Vec<f32>, EncodeError>;
}

/// OpenAI-compatible embeddings request body.
#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Encoder backed by a remote embeddings endpoint.
pub struct HttpEncoder {
    agent: ureq::Agent,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpEncoder {
    pub fn new(config: &EmbeddingConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .build()
            .into();
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty());
        if api_key.is_none() {
            log::debug!("{} not set, sending unauthenticated embedding requests", config.api_key_env);
        }
        Self {
            agent,
            endpoint: config.endpoint.clone(),
            api_key,
        }
    }
}

impl QueryEncoder for HttpEncoder {
    fn encode(&self, model: &str, text: &str) -> Result<Vec<f32>, EncodeError> {
        log::debug!("Encoding query with {model} via {}", self.endpoint);
        let body = EmbeddingRequest { model, input: [text] };

        let mut request = self.agent.post(&self.endpoint);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response: EmbeddingResponse = request
            .send_json(&body)?
            .body_mut()
            .read_json()
            .map_err(|e| EncodeError::InvalidResponse(e.to_string()))?;

        let mut vector = response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EncodeError::InvalidResponse("no embedding in response".into()))?;

        if vector.is_empty() {
            return Err(EncodeError::EmptyEmbedding);
        }
        l2_normalize(&mut vector);
        Ok(vector)
    }
}

/// Scale `v` to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-12 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_normalize() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector() {
        let mut v = vec![0.0, 0.0];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0]);
    }

    #[test]
    fn test_request_serialization() {
        let body = EmbeddingRequest {
            model: "sentence-transformers/all-mpnet-base-v2",
            input: ["calm acoustic"],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "sentence-transformers/all-mpnet-base-v2");
        assert_eq!(json["input"][0], "calm acoustic");
    }

    #[test]
    fn test_response_deserialize() {
        let json = r#"{"object": "list", "data": [{"index": 0, "embedding": [0.1, 0.2]}]}"#;
        let r: EmbeddingResponse = serde_json::from_str(json).unwrap();
        assert_eq!(r.data[0].embedding, vec![0.1, 0.2]);
    }
}
