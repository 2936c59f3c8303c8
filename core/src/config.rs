use crate::bm25::Bm25Params;
use crate::error::{Result, SearchError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const BM25_K1: f64 = 1.5;
pub const BM25_B: f64 = 0.75;
pub const DEFAULT_SEARCH_LIMIT: usize = 5;
pub const DEFAULT_HYBRID_ALPHA: f64 = 0.5;
pub const DEFAULT_RRF_K: u32 = 60;
/// Candidates fetched per source are `limit * DEFAULT_OVERSAMPLE_FACTOR`.
pub const DEFAULT_OVERSAMPLE_FACTOR: usize = 500;
pub const DEFAULT_CHUNK_SIZE: usize = 200;
pub const DEFAULT_SEMANTIC_CHUNK_SIZE: usize = 4;
pub const DEFAULT_SEMANTIC_CHUNK_OVERLAP: usize = 1;
pub const DEFAULT_EMBEDDING_DIM: usize = 384;
pub const DEFAULT_CAPABILITY_TIMEOUT_MS: u64 = 2_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub bm25: Bm25Params,
    pub oversample_factor: usize,
    pub alpha: f64,
    pub rrf_k: u32,
    pub embedding_dim: usize,
    pub capability_timeout_ms: u64,
    pub semantic_chunk_size: usize,
    pub semantic_chunk_overlap: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            bm25: Bm25Params::default(),
            oversample_factor: DEFAULT_OVERSAMPLE_FACTOR,
            alpha: DEFAULT_HYBRID_ALPHA,
            rrf_k: DEFAULT_RRF_K,
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            capability_timeout_ms: DEFAULT_CAPABILITY_TIMEOUT_MS,
            semantic_chunk_size: DEFAULT_SEMANTIC_CHUNK_SIZE,
            semantic_chunk_overlap: DEFAULT_SEMANTIC_CHUNK_OVERLAP,
        }
    }
}

impl SearchConfig {
    /// Read a JSON config; omitted fields keep their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: SearchConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        const OP: &str = "SearchConfig::validate";
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(SearchError::invalid(OP, format!("alpha {} outside [0, 1]", self.alpha)));
        }
        if self.oversample_factor == 0 {
            return Err(SearchError::invalid(OP, "oversample_factor must be at least 1"));
        }
        if self.embedding_dim == 0 {
            return Err(SearchError::invalid(OP, "embedding_dim must be at least 1"));
        }
        if self.semantic_chunk_overlap >= self.semantic_chunk_size {
            return Err(SearchError::invalid(OP, "semantic_chunk_overlap must be smaller than semantic_chunk_size"));
        }
        self.bm25.validate(OP)
    }

    pub fn capability_timeout(&self) -> Duration { Duration::from_millis(self.capability_timeout_ms) }

    /// Number of candidates requested from each source for a final `limit`.
    pub fn fetch_limit(&self, limit: usize) -> usize { limit.saturating_mul(self.oversample_factor) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: SearchConfig = serde_json::from_str(r#"{ "alpha": 0.8, "bm25": { "k1": 1.2, "b": 0.5 } }"#).unwrap();
        assert_eq!(config.alpha, 0.8);
        assert_eq!(config.bm25.k1, 1.2);
        assert_eq!(config.rrf_k, DEFAULT_RRF_K);
        assert_eq!(config.fetch_limit(5), 2_500);
        config.validate().unwrap();
    }

    #[test]
    fn rejects_out_of_range_alpha() {
        let config = SearchConfig { alpha: 1.5, ..SearchConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn reads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("search.json");
        std::fs::write(&path, r#"{ "oversample_factor": 10 }"#).unwrap();
        let config = SearchConfig::from_json_file(&path).unwrap();
        assert_eq!(config.oversample_factor, 10);
    }
}
