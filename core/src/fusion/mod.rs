//! Merging the lexical and semantic candidate lists into one ranking.
//!
//! - **Weighted**: min-max normalize each list, then `alpha * lexical + (1 - alpha) * semantic`.
//! - **RRF**: sum `1 / (k + rank)` over the lists a document appears in.
//!
//! Both strategies share [`merge_max_by_id`]: a document listed more than once
//! by the same source keeps only its best contribution from that source.

mod rrf;
mod weighted;

pub use rrf::{rrf_fusion, rrf_score};
pub use weighted::weighted_fusion;

use crate::DocId;
use serde::Serialize;
use std::collections::BTreeMap;

/// A fused document before hydration with title and description.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedEntry {
    pub doc_id: DocId,
    pub lexical_score: f64,
    pub semantic_score: f64,
    pub score: f64,
    pub lexical_rank: Option<usize>,
    pub semantic_rank: Option<usize>,
}

impl FusedEntry {
    fn new(doc_id: DocId) -> Self {
        Self { doc_id, lexical_score: 0.0, semantic_score: 0.0, score: 0.0, lexical_rank: None, semantic_rank: None }
    }

    fn slot(&mut self, source: Source) -> (&mut f64, &mut Option<usize>) {
        match source {
            Source::Lexical => (&mut self.lexical_score, &mut self.lexical_rank),
            Source::Semantic => (&mut self.semantic_score, &mut self.semantic_rank),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Source {
    Lexical,
    Semantic,
}

/// Record `(doc_id, contribution, rank)` triples from one source, keeping the
/// maximum contribution and the best rank per document. Absent documents
/// keep a contribution of `0.0`.
pub(crate) fn merge_max_by_id<I>(entries: &mut BTreeMap<DocId, FusedEntry>, source: Source, items: I)
where
    I: IntoIterator<Item = (DocId, f64, usize)>,
{
    for (doc_id, contribution, rank) in items {
        let entry = entries.entry(doc_id).or_insert_with(|| FusedEntry::new(doc_id));
        let (value, best_rank) = entry.slot(source);
        if best_rank.is_none() || contribution > *value {
            *value = contribution;
        }
        *best_rank = Some(best_rank.map_or(rank, |r| r.min(rank)));
    }
}

/// Descending by fused score, ties by ascending document id.
pub(crate) fn rank_and_truncate(entries: BTreeMap<DocId, FusedEntry>, limit: usize) -> Vec<FusedEntry> {
    let mut ranked: Vec<FusedEntry> = entries.into_values().collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.doc_id.cmp(&b.doc_id)));
    ranked.truncate(limit);
    ranked
}
