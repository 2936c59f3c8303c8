use super::{merge_max_by_id, rank_and_truncate, Source};
use crate::document::Candidate;
use crate::error::{Result, SearchError};
use crate::normalize::normalize_scores;
use std::collections::BTreeMap;

/// Score-based fusion: `alpha * lexical + (1 - alpha) * semantic` over
/// independently min-max normalized lists.
pub fn weighted_fusion(
    lexical: &[Candidate],
    semantic: &[Candidate],
    alpha: f64,
    limit: usize,
) -> Result<Vec<super::FusedEntry>> {
    if !(0.0..=1.0).contains(&alpha) {
        return Err(SearchError::invalid("weighted_fusion", format!("alpha {alpha} outside [0, 1]")));
    }

    let mut entries = BTreeMap::new();
    for (source, list) in [(Source::Lexical, lexical), (Source::Semantic, semantic)] {
        let scores: Vec<f64> = list.iter().map(|c| c.score).collect();
        let normalized = normalize_scores(&scores);
        merge_max_by_id(
            &mut entries,
            source,
            list.iter().zip(normalized).map(|(c, n)| (c.doc_id, n, c.rank)),
        );
    }
    for entry in entries.values_mut() {
        entry.score = alpha * entry.lexical_score + (1.0 - alpha) * entry.semantic_score;
    }
    Ok(rank_and_truncate(entries, limit))
}
