use crate::config::SearchConfig;
use crate::document::{Candidate, FusedResult};
use crate::embedding::{EmbeddingProvider, HashEmbedder};
use crate::error::{Result, SearchError};
use crate::fusion::{rrf_fusion, weighted_fusion, FusedEntry};
use crate::index::{Bm25Hit, InvertedIndex, SharedIndex};
use crate::persist::IndexPaths;
use crate::vector::{FlatVectorIndex, VectorIndex, VectorMatch};
use std::sync::Arc;
use tokio::task;
use tokio::time::timeout;

/// Coordinates lexical and semantic retrieval, fusion and hydration.
///
/// Both external capabilities run on the blocking pool under the configured
/// timeout. If either fails or times out, the query continues on the lexical
/// ranking alone; lexical errors are returned to the caller.
pub struct HybridSearch {
    index: SharedIndex,
    embedder: Arc<dyn EmbeddingProvider>,
    vectors: Arc<dyn VectorIndex>,
    config: SearchConfig,
}

impl HybridSearch {
    pub fn new(
        index: SharedIndex,
        embedder: Arc<dyn EmbeddingProvider>,
        vectors: Arc<dyn VectorIndex>,
        config: SearchConfig,
    ) -> Result<Self> {
        config.validate()?;
        if embedder.dimension() != vectors.dimension() {
            return Err(SearchError::DimensionMismatch { expected: vectors.dimension(), actual: embedder.dimension() });
        }
        Ok(Self { index, embedder, vectors, config })
    }

    /// Load the index at `paths` and pair it with the hash embedder and a flat
    /// vector index, reusing cached embeddings when they still match.
    pub fn open(paths: &IndexPaths, config: SearchConfig) -> Result<Self> {
        config.validate()?;
        let index = InvertedIndex::load(paths)?;
        let embedder = Arc::new(HashEmbedder::new(config.embedding_dim)?);
        let vectors = FlatVectorIndex::load_or_build(
            &paths.embeddings(),
            index.documents().cloned().collect(),
            embedder.as_ref(),
            config.semantic_chunk_size,
            config.semantic_chunk_overlap,
        )?;
        Self::new(SharedIndex::new(index), embedder, Arc::new(vectors), config)
    }

    pub fn config(&self) -> &SearchConfig { &self.config }

    pub fn index(&self) -> &SharedIndex { &self.index }

    pub fn bm25_search(&self, query: &str, limit: usize) -> Result<Vec<Bm25Hit>> {
        self.index.snapshot()?.bm25_search_with(query, limit, self.config.bm25)
    }

    /// Embed `query` and ask the vector index for its nearest documents.
    pub async fn semantic_search(&self, query: &str, limit: usize) -> Result<Vec<VectorMatch>> {
        if query.trim().is_empty() {
            return Err(SearchError::EmptyInput);
        }
        let embedder = Arc::clone(&self.embedder);
        let text = query.to_owned();
        let vector = self.bounded("embedding provider", move || embedder.embed(&text)).await?;
        let vectors = Arc::clone(&self.vectors);
        self.bounded("vector index", move || vectors.search(&vector, limit)).await
    }

    pub async fn weighted_search(&self, query: &str, alpha: f64, limit: usize) -> Result<Vec<FusedResult>> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(SearchError::invalid("weighted_search", format!("alpha {alpha} outside [0, 1]")));
        }
        let (index, lexical, semantic) = self.candidates(query, limit).await?;
        let fused = weighted_fusion(&lexical, &semantic, alpha, limit)?;
        Ok(hydrate(&index, fused))
    }

    pub async fn rrf_search(&self, query: &str, k: u32, limit: usize) -> Result<Vec<FusedResult>> {
        let (index, lexical, semantic) = self.candidates(query, limit).await?;
        Ok(hydrate(&index, rrf_fusion(&lexical, &semantic, k, limit)))
    }

    async fn candidates(&self, query: &str, limit: usize) -> Result<(Arc<InvertedIndex>, Vec<Candidate>, Vec<Candidate>)> {
        if query.trim().is_empty() {
            return Err(SearchError::EmptyInput);
        }
        let index = self.index.snapshot()?;
        let fetch = self.config.fetch_limit(limit);
        let terms = index.tokenizer().tokenize(query);
        tracing::debug!(query, ?terms, fetch, "hybrid search");

        let hits = index.bm25_search_with(query, fetch, self.config.bm25)?;
        let lexical = Candidate::ranked(hits.into_iter().map(|h| (h.id, h.score)))?;
        let semantic = self.semantic_candidates(query, fetch).await;
        tracing::debug!(lexical = lexical.len(), semantic = semantic.len(), "collected candidates");
        Ok((index, lexical, semantic))
    }

    async fn semantic_candidates(&self, query: &str, fetch: usize) -> Vec<Candidate> {
        let ranked = self
            .semantic_search(query, fetch)
            .await
            .and_then(|matches| Candidate::ranked(matches.into_iter().map(|m| (m.document.id, m.score as f64))));
        match ranked {
            Ok(candidates) => candidates,
            Err(err) => {
                tracing::warn!(error = %err, "semantic candidates unavailable; ranking on lexical scores only");
                Vec::new()
            }
        }
    }

    async fn bounded<T, F>(&self, capability: &'static str, call: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        match timeout(self.config.capability_timeout(), task::spawn_blocking(call)).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(SearchError::CapabilityFailed { capability, reason: join.to_string() }),
            Err(_) => Err(SearchError::CapabilityTimeout { capability, timeout_ms: self.config.capability_timeout_ms }),
        }
    }
}

fn hydrate(index: &InvertedIndex, fused: Vec<FusedEntry>) -> Vec<FusedResult> {
    fused
        .into_iter()
        .filter_map(|entry| match index.document(entry.doc_id) {
            Some(doc) => Some(FusedResult {
                doc_id: entry.doc_id,
                title: doc.title.clone(),
                description: doc.description.clone(),
                lexical_score: entry.lexical_score,
                semantic_score: entry.semantic_score,
                score: entry.score,
                lexical_rank: entry.lexical_rank,
                semantic_rank: entry.semantic_rank,
            }),
            None => {
                tracing::warn!(doc_id = entry.doc_id, "fused document missing from the index; skipped");
                None
            }
        })
        .collect()
}
