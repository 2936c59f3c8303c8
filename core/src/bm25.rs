//! Term weighting formulas. Everything here is a pure function of index
//! statistics; [`crate::index::InvertedIndex`] supplies the counts.

use crate::config;
use crate::error::{Result, SearchError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self { Self { k1: config::BM25_K1, b: config::BM25_B } }
}

impl Bm25Params {
    /// `k1` must be finite and non-negative, `b` within `[0, 1]`.
    pub fn validate(&self, operation: &'static str) -> Result<()> {
        if !self.k1.is_finite() || self.k1 < 0.0 || !(0.0..=1.0).contains(&self.b) {
            return Err(SearchError::invalid(
                operation,
                format!("bm25 requires k1 >= 0 and b in [0, 1], got k1={} b={}", self.k1, self.b),
            ));
        }
        Ok(())
    }
}

/// Smoothed IDF: `ln((N + 1) / (df + 1))`. Finite and non-negative for any `df <= N`.
pub fn idf(num_docs: usize, doc_freq: usize) -> f64 {
    ((num_docs as f64 + 1.0) / (doc_freq as f64 + 1.0)).ln()
}

/// BM25 IDF: `ln((N - df + 0.5) / (df + 0.5) + 1)`. The `+ 1` keeps it positive
/// even for terms present in most documents.
pub fn bm25_idf(num_docs: usize, doc_freq: usize) -> f64 {
    let n = num_docs as f64;
    let df = doc_freq as f64;
    ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
}

/// Saturated, length-normalized term frequency. `avg_doc_len` must be
/// positive whenever `term_freq` is non-zero.
pub fn bm25_tf(term_freq: u32, doc_len: u32, avg_doc_len: f64, params: Bm25Params) -> f64 {
    if term_freq == 0 {
        return 0.0;
    }
    let tf = term_freq as f64;
    let length_norm = 1.0 - params.b + params.b * (doc_len as f64 / avg_doc_len);
    (tf * (params.k1 + 1.0)) / (tf + params.k1 * length_norm)
}
