use crate::error::{Result, SearchError};
use crate::tokenizer::{EnglishTokenizer, Tokenizer};
use std::sync::Arc;

/// Maps text to a fixed-dimension vector.
pub trait EmbeddingProvider: Send + Sync {
    fn dimension(&self) -> usize;

    /// Fails with [`SearchError::EmptyInput`] on blank text.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, &b| (hash ^ b as u64).wrapping_mul(FNV_PRIME))
}

/// Deterministic feature-hashing embedder: every term and every adjacent term
/// pair is hashed into a signed bucket, then the vector is L2-normalized.
///
/// No model download, stable across runs and platforms. Texts sharing terms
/// land close together, which is all the fusion layer needs from it.
pub struct HashEmbedder {
    dimension: usize,
    tokenizer: Arc<dyn Tokenizer>,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Result<Self> { Self::with_tokenizer(dimension, Arc::new(EnglishTokenizer)) }

    pub fn with_tokenizer(dimension: usize, tokenizer: Arc<dyn Tokenizer>) -> Result<Self> {
        if dimension == 0 {
            return Err(SearchError::invalid("HashEmbedder::new", "dimension must be at least 1"));
        }
        Ok(Self { dimension, tokenizer })
    }

    fn accumulate(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let hash = fnv1a(feature.as_bytes());
        let bucket = (hash % self.dimension as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

impl EmbeddingProvider for HashEmbedder {
    fn dimension(&self) -> usize { self.dimension }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(SearchError::EmptyInput);
        }
        let terms = self.tokenizer.tokenize(text);
        let mut vector = vec![0.0f32; self.dimension];
        for term in &terms {
            self.accumulate(&mut vector, term, 1.0);
        }
        for pair in terms.windows(2) {
            self.accumulate(&mut vector, &format!("{} {}", pair[0], pair[1]), 0.5);
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(vector)
    }
}
