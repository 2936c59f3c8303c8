use super::{merge_max_by_id, rank_and_truncate, FusedEntry, Source};
use crate::document::Candidate;
use std::collections::BTreeMap;

/// `1 / (k + rank)` with a 1-based `rank`.
pub fn rrf_score(rank: usize, k: u32) -> f64 { 1.0 / (k as f64 + rank as f64) }

/// Reciprocal Rank Fusion. A document's score is the sum of its per-list RRF
/// terms, so agreement between the two sources outranks a lone top hit.
/// Within one list only its best rank counts.
pub fn rrf_fusion(lexical: &[Candidate], semantic: &[Candidate], k: u32, limit: usize) -> Vec<FusedEntry> {
    let mut entries = BTreeMap::new();
    for (source, list) in [(Source::Lexical, lexical), (Source::Semantic, semantic)] {
        merge_max_by_id(&mut entries, source, list.iter().map(|c| (c.doc_id, rrf_score(c.rank, k), c.rank)));
    }
    for entry in entries.values_mut() {
        entry.score = entry.lexical_score + entry.semantic_score;
    }
    rank_and_truncate(entries, limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DocId;

    fn list(ids: &[DocId]) -> Vec<Candidate> {
        Candidate::ranked(ids.iter().enumerate().map(|(i, &id)| (id, 100.0 - i as f64))).unwrap()
    }

    #[test]
    fn agreement_at_rank_one() {
        let fused = rrf_fusion(&list(&[1, 2]), &list(&[1, 3]), 60, 10);
        assert_eq!(fused[0].doc_id, 1);
        assert!((fused[0].score - 2.0 / 61.0).abs() < 1e-12);
        assert_eq!(fused[0].lexical_rank, Some(1));
        assert_eq!(fused[0].semantic_rank, Some(1));
    }

    #[test]
    fn single_source_top_hit_scores_less() {
        let fused = rrf_fusion(&list(&[7, 1]), &list(&[1, 8]), 60, 10);
        let score = |id| fused.iter().find(|e| e.doc_id == id).unwrap().score;
        assert!((score(7) - 1.0 / 61.0).abs() < 1e-12);
        assert!(score(7) < score(1));
        assert_eq!(fused[0].doc_id, 1);
    }

    #[test]
    fn symmetric_ranks_tie_and_break_by_id() {
        let fused = rrf_fusion(&list(&[4, 2]), &list(&[2, 4]), 60, 10);
        assert_eq!(fused[0].score, fused[1].score);
        assert_eq!(fused[0].doc_id, 2);
    }

    #[test]
    fn one_empty_list_preserves_order() {
        let fused = rrf_fusion(&list(&[3, 1, 2]), &[], 60, 10);
        let ids: Vec<DocId> = fused.iter().map(|e| e.doc_id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert!(rrf_fusion(&[], &[], 60, 10).is_empty());
    }

    #[test]
    fn repeated_document_counts_its_best_rank_once() {
        let fused = rrf_fusion(&list(&[5, 6, 5]), &[], 60, 10);
        assert_eq!(fused.len(), 2);
        assert!((fused[0].score - 1.0 / 61.0).abs() < 1e-12);
    }

    #[test]
    fn truncates_to_limit() {
        let ids: Vec<DocId> = (0..50).collect();
        assert_eq!(rrf_fusion(&list(&ids), &list(&ids), 60, 3).len(), 3);
    }
}
