use crate::error::{Result, SearchError};
use crate::DocId;
use serde::{Deserialize, Serialize};

/// An indexed record. Identity is `id`; the index never mutates it after build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub title: String,
    pub description: String,
}

impl Document {
    pub fn new(id: DocId, title: impl Into<String>, description: impl Into<String>) -> Result<Self> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(SearchError::invalid("Document::new", format!("document {id} has a blank title")));
        }
        Ok(Self { id, title, description: description.into() })
    }

    /// The text the index tokenizes for this document.
    pub fn indexed_text(&self) -> String { format!("{} {}", self.title, self.description) }
}

/// One entry of a ranked candidate list handed to fusion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Candidate {
    pub doc_id: DocId,
    pub score: f64,
    /// 1-based position in the source list.
    pub rank: usize,
}

impl Candidate {
    pub fn new(doc_id: DocId, score: f64, rank: usize) -> Result<Self> {
        if rank == 0 {
            return Err(SearchError::invalid("Candidate::new", "rank is 1-based"));
        }
        if !score.is_finite() {
            return Err(SearchError::invalid("Candidate::new", format!("score for document {doc_id} is {score}")));
        }
        Ok(Self { doc_id, score, rank })
    }

    /// Assign ranks 1..=n to an already ordered `(doc_id, score)` sequence.
    pub fn ranked<I>(scored: I) -> Result<Vec<Candidate>>
    where
        I: IntoIterator<Item = (DocId, f64)>,
    {
        scored
            .into_iter()
            .enumerate()
            .map(|(pos, (doc_id, score))| Candidate::new(doc_id, score, pos + 1))
            .collect()
    }
}

/// A fused hit hydrated with document metadata.
///
/// For weighted fusion the contributions are normalized source scores; for
/// RRF they are the per-source `1 / (k + rank)` terms.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedResult {
    pub doc_id: DocId,
    pub title: String,
    pub description: String,
    pub lexical_score: f64,
    pub semantic_score: f64,
    pub score: f64,
    pub lexical_rank: Option<usize>,
    pub semantic_rank: Option<usize>,
}
