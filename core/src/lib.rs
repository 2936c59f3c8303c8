//! Hybrid retrieval engine: a BM25 inverted index, a dense-vector candidate
//! source, and the two rank-fusion strategies that merge them.

pub mod bm25;
pub mod chunking;
pub mod config;
pub mod corpus;
pub mod document;
pub mod embedding;
pub mod error;
pub mod fusion;
pub mod index;
pub mod normalize;
pub mod persist;
pub mod search;
pub mod tokenizer;
pub mod vector;

pub use bm25::Bm25Params;
pub use config::SearchConfig;
pub use document::{Candidate, Document, FusedResult};
pub use embedding::{EmbeddingProvider, HashEmbedder};
pub use error::{Result, SearchError};
pub use fusion::{rrf_fusion, weighted_fusion, FusedEntry};
pub use index::{Bm25Hit, InvertedIndex, SharedIndex};
pub use normalize::normalize_scores;
pub use search::HybridSearch;
pub use tokenizer::{EnglishTokenizer, Tokenizer};
pub use vector::{FlatVectorIndex, VectorIndex, VectorMatch};

pub type DocId = u32;
