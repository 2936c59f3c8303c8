use crate::chunking::sentence_chunks;
use crate::document::Document;
use crate::embedding::EmbeddingProvider;
use crate::error::{Result, SearchError};
use crate::persist::{read_artifact, write_artifact};
use crate::DocId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Nearest-neighbour search over document embeddings.
pub trait VectorIndex: Send + Sync {
    fn dimension(&self) -> usize;

    /// Up to `limit` documents, descending by similarity. Fails with
    /// [`SearchError::DimensionMismatch`] when `query` has the wrong length.
    fn search(&self, query: &[f32], limit: usize) -> Result<Vec<VectorMatch>>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorMatch {
    pub score: f32,
    pub document: Document,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChunkEmbedding {
    doc_id: DocId,
    chunk: usize,
    vector: Vec<f32>,
}

#[derive(Serialize, Deserialize)]
struct EmbeddingCache {
    dimension: usize,
    max_sentences: usize,
    overlap: usize,
    chunks: Vec<ChunkEmbedding>,
    documents: BTreeMap<DocId, Document>,
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Exact cosine search over sentence chunks of `"{title}: {description}"`.
/// A document scores as its best-matching chunk.
pub struct FlatVectorIndex {
    dimension: usize,
    max_sentences: usize,
    overlap: usize,
    chunks: Vec<ChunkEmbedding>,
    documents: BTreeMap<DocId, Document>,
}

impl FlatVectorIndex {
    pub fn build<I>(documents: I, embedder: &dyn EmbeddingProvider, max_sentences: usize, overlap: usize) -> Result<Self>
    where
        I: IntoIterator<Item = Document>,
    {
        let dimension = embedder.dimension();
        let mut chunks = Vec::new();
        let mut by_id = BTreeMap::new();
        for doc in documents {
            let text = format!("{}: {}", doc.title, doc.description);
            let mut pieces = sentence_chunks(&text, max_sentences, overlap)?;
            if pieces.is_empty() {
                pieces.push(doc.title.clone());
            }
            for (chunk, piece) in pieces.iter().enumerate() {
                let vector = embedder.embed(piece)?;
                if vector.len() != dimension {
                    return Err(SearchError::DimensionMismatch { expected: dimension, actual: vector.len() });
                }
                chunks.push(ChunkEmbedding { doc_id: doc.id, chunk, vector });
            }
            by_id.insert(doc.id, doc);
        }
        tracing::info!(num_docs = by_id.len(), num_chunks = chunks.len(), dimension, "embedded document chunks");
        Ok(Self { dimension, max_sentences, overlap, chunks, documents: by_id })
    }

    pub fn len(&self) -> usize { self.documents.len() }

    pub fn is_empty(&self) -> bool { self.documents.is_empty() }

    pub fn num_chunks(&self) -> usize { self.chunks.len() }

    /// Sentence window and overlap the chunks were cut with.
    pub fn chunking(&self) -> (usize, usize) { (self.max_sentences, self.overlap) }

    pub fn save(&self, path: &Path) -> Result<()> {
        let cache = EmbeddingCache {
            dimension: self.dimension,
            max_sentences: self.max_sentences,
            overlap: self.overlap,
            chunks: self.chunks.clone(),
            documents: self.documents.clone(),
        };
        write_artifact(path, "embeddings", &cache)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let cache: EmbeddingCache = read_artifact(path, "embeddings")?;
        if let Some(bad) = cache.chunks.iter().find(|c| c.vector.len() != cache.dimension) {
            return Err(SearchError::DimensionMismatch { expected: cache.dimension, actual: bad.vector.len() });
        }
        Ok(Self {
            dimension: cache.dimension,
            max_sentences: cache.max_sentences,
            overlap: cache.overlap,
            chunks: cache.chunks,
            documents: cache.documents,
        })
    }

    /// Reuse the embeddings cached at `path` when they cover exactly
    /// `documents` at the embedder's dimension with the same chunking;
    /// otherwise embed and rewrite.
    pub fn load_or_build(
        path: &Path,
        documents: Vec<Document>,
        embedder: &dyn EmbeddingProvider,
        max_sentences: usize,
        overlap: usize,
    ) -> Result<Self> {
        if path.is_file() {
            match Self::load(path) {
                Ok(cached)
                    if cached.dimension == embedder.dimension()
                        && cached.chunking() == (max_sentences, overlap)
                        && cached.documents.values().eq(documents.iter()) =>
                {
                    tracing::info!(path = %path.display(), num_docs = cached.len(), "reusing cached embeddings");
                    return Ok(cached);
                }
                Ok(_) => tracing::warn!(path = %path.display(), "cached embeddings are stale; rebuilding"),
                Err(err) => tracing::warn!(path = %path.display(), error = %err, "cached embeddings unreadable; rebuilding"),
            }
        }
        let built = Self::build(documents, embedder, max_sentences, overlap)?;
        built.save(path)?;
        Ok(built)
    }
}

impl VectorIndex for FlatVectorIndex {
    fn dimension(&self) -> usize { self.dimension }

    fn search(&self, query: &[f32], limit: usize) -> Result<Vec<VectorMatch>> {
        if query.len() != self.dimension {
            return Err(SearchError::DimensionMismatch { expected: self.dimension, actual: query.len() });
        }
        let mut best: BTreeMap<DocId, f32> = BTreeMap::new();
        for chunk in &self.chunks {
            let score = cosine(query, &chunk.vector);
            best.entry(chunk.doc_id).and_modify(|s| *s = s.max(score)).or_insert(score);
        }
        let mut ranked: Vec<(DocId, f32)> = best.into_iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit);
        Ok(ranked
            .into_iter()
            .filter_map(|(id, score)| self.documents.get(&id).map(|doc| VectorMatch { score, document: doc.clone() }))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;

    fn corpus() -> Vec<Document> {
        vec![
            Document::new(1, "Jaws", "A great white shark attacks a beach town.").unwrap(),
            Document::new(2, "Paris Love", "Two strangers fall in love in Paris. They dance.").unwrap(),
            Document::new(3, "Deep Blue Sea", "Scientists breed smart sharks. The sharks attack.").unwrap(),
        ]
    }

    #[test]
    fn ranks_documents_by_best_chunk() {
        let embedder = HashEmbedder::new(256).unwrap();
        let index = FlatVectorIndex::build(corpus(), &embedder, 1, 0).unwrap();
        assert_eq!(index.len(), 3);
        assert!(index.num_chunks() > 3);
        let hits = index.search(&embedder.embed("shark attack").unwrap(), 3).unwrap();
        assert_eq!(hits.len(), 3);
        assert_ne!(hits[0].document.id, 2);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn wrong_query_dimension_is_rejected() {
        let embedder = HashEmbedder::new(16).unwrap();
        let index = FlatVectorIndex::build(corpus(), &embedder, 4, 1).unwrap();
        let err = index.search(&[0.0; 8], 3).err().unwrap();
        assert!(matches!(err, SearchError::DimensionMismatch { expected: 16, actual: 8 }));
    }

    #[test]
    fn cache_is_reused_only_when_it_matches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("embeddings.bin");
        let small = HashEmbedder::new(16).unwrap();
        let built = FlatVectorIndex::load_or_build(&path, corpus(), &small, 4, 1).unwrap();
        assert!(path.is_file());
        let reused = FlatVectorIndex::load_or_build(&path, corpus(), &small, 4, 1).unwrap();
        assert_eq!(reused.num_chunks(), built.num_chunks());

        let wide = HashEmbedder::new(32).unwrap();
        let rebuilt = FlatVectorIndex::load_or_build(&path, corpus(), &wide, 4, 1).unwrap();
        assert_eq!(rebuilt.dimension(), 32);

        let narrow = FlatVectorIndex::load_or_build(&path, corpus(), &wide, 1, 0).unwrap();
        let fresh = FlatVectorIndex::build(corpus(), &wide, 1, 0).unwrap();
        assert_eq!(narrow.chunking(), (1, 0));
        assert_eq!(narrow.num_chunks(), fresh.num_chunks());
        assert!(narrow.num_chunks() > rebuilt.num_chunks());
        assert_eq!(FlatVectorIndex::load(&path).unwrap().chunking(), (1, 0));
    }
}
