use retrieval_core::fusion::rrf_score;
use retrieval_core::{normalize_scores, rrf_fusion, weighted_fusion, Candidate, Document, InvertedIndex, SearchError};

fn index() -> InvertedIndex {
    InvertedIndex::build(vec![
        Document::new(1, "The Great Escape", "").unwrap(),
        Document::new(2, "Escape Room", "").unwrap(),
        Document::new(3, "The Room", "").unwrap(),
    ])
    .unwrap()
}

#[test]
fn normalization_examples() {
    assert_eq!(normalize_scores(&[]), Vec::<f64>::new());
    assert_eq!(normalize_scores(&[42.0]), vec![1.0]);
    assert_eq!(normalize_scores(&[5.0, 5.0, 5.0]), vec![1.0, 1.0, 1.0]);
    assert_eq!(normalize_scores(&[1.0, 2.0, 3.0]), vec![0.0, 0.5, 1.0]);
}

#[test]
fn absent_terms_have_zero_frequency_and_score() {
    let index = index();
    for doc in index.documents() {
        for term in ["great", "escape", "room", "shark"] {
            let tf = index.get_term_frequency(doc.id, term).unwrap();
            let occurs = index.get_documents(term).unwrap().iter().any(|d| d.id == doc.id);
            if !occurs {
                assert_eq!(tf, 0);
                assert_eq!(index.bm25(doc.id, term).unwrap(), 0.0);
            } else {
                assert!(tf > 0);
                assert!(index.bm25(doc.id, term).unwrap() > 0.0);
            }
        }
    }
}

#[test]
fn idf_decreases_as_terms_get_common() {
    let index = index();
    let rare = index.get_inverse_document_frequency("great").unwrap();
    let common = index.get_inverse_document_frequency("room").unwrap();
    let unseen = index.get_inverse_document_frequency("shark").unwrap();
    assert!(unseen >= rare && rare >= common);
}

#[test]
fn end_to_end_bm25_search() {
    let hits = index().bm25_search("escape room", 2).unwrap();
    assert_eq!(hits[0].id, 2);
    assert_eq!(hits.len(), 2);
}

#[test]
fn multi_token_lookup_is_invalid() {
    assert!(matches!(index().get_documents("escape room"), Err(SearchError::InvalidArgument { .. })));
}

#[test]
fn rrf_agreement_beats_single_source() {
    let lexical = Candidate::ranked(vec![(1, 9.0), (2, 5.0)]).unwrap();
    let semantic = Candidate::ranked(vec![(1, 0.9), (3, 0.5)]).unwrap();
    let fused = rrf_fusion(&lexical, &semantic, 60, 10);
    assert!((fused[0].score - 0.03279).abs() < 1e-5);
    assert!((rrf_score(1, 60) - 0.01639).abs() < 1e-5);
    assert!(rrf_score(1, 60) < fused[0].score);
}

#[test]
fn weighted_extremes_follow_one_source() {
    let lexical = Candidate::ranked(vec![(1, 3.0), (2, 2.0), (3, 1.0)]).unwrap();
    let semantic = Candidate::ranked(vec![(3, 0.9), (1, 0.4), (2, 0.1)]).unwrap();
    let order = |alpha| -> Vec<u32> {
        weighted_fusion(&lexical, &semantic, alpha, 3).unwrap().iter().map(|e| e.doc_id).collect()
    };
    assert_eq!(order(1.0), vec![1, 2, 3]);
    assert_eq!(order(0.0), vec![3, 1, 2]);
}
