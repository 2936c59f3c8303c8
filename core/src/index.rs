use crate::bm25::{self, Bm25Params};
use crate::document::Document;
use crate::error::{Result, SearchError};
use crate::persist::{self, IndexPaths};
use crate::tokenizer::{EnglishTokenizer, Tokenizer};
use crate::DocId;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// term -> ids of the documents containing it at least once
pub type Postings = BTreeMap<String, BTreeSet<DocId>>;
/// doc id -> (term -> occurrences in that document)
pub type TermFrequencies = BTreeMap<DocId, BTreeMap<String, u32>>;
pub type DocLengths = BTreeMap<DocId, u32>;
pub type DocMap = BTreeMap<DocId, Document>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bm25Hit {
    pub id: DocId,
    pub title: String,
    pub score: f64,
}

/// Postings, term counts, document lengths and the document map, built in one
/// pass and read-only afterwards. Ordered maps keep builds and saved bytes
/// reproducible.
pub struct InvertedIndex {
    pub(crate) postings: Postings,
    pub(crate) term_frequencies: TermFrequencies,
    pub(crate) doc_lengths: DocLengths,
    pub(crate) docmap: DocMap,
    tokenizer: Arc<dyn Tokenizer>,
}

impl InvertedIndex {
    pub fn build<I>(documents: I) -> Result<Self>
    where
        I: IntoIterator<Item = Document>,
    {
        Self::build_with(documents, Arc::new(EnglishTokenizer))
    }

    pub fn build_with<I>(documents: I, tokenizer: Arc<dyn Tokenizer>) -> Result<Self>
    where
        I: IntoIterator<Item = Document>,
    {
        let mut index = Self {
            postings: Postings::new(),
            term_frequencies: TermFrequencies::new(),
            doc_lengths: DocLengths::new(),
            docmap: DocMap::new(),
            tokenizer,
        };
        for doc in documents {
            index.add_document(doc)?;
        }
        tracing::info!(num_docs = index.num_docs(), num_terms = index.num_terms(), "built inverted index");
        Ok(index)
    }

    fn add_document(&mut self, doc: Document) -> Result<()> {
        if self.docmap.contains_key(&doc.id) {
            return Err(SearchError::invalid("InvertedIndex::build", format!("duplicate document id {}", doc.id)));
        }
        let tokens = self.tokenizer.tokenize(&doc.indexed_text());
        let counts = self.term_frequencies.entry(doc.id).or_default();
        for token in &tokens {
            *counts.entry(token.clone()).or_insert(0) += 1;
        }
        for term in counts.keys() {
            self.postings.entry(term.clone()).or_default().insert(doc.id);
        }
        self.doc_lengths.insert(doc.id, tokens.len() as u32);
        self.docmap.insert(doc.id, doc);
        Ok(())
    }

    /// Reassemble an index from its four structures, rejecting any
    /// inconsistency between them.
    pub(crate) fn from_parts(
        postings: Postings,
        term_frequencies: TermFrequencies,
        doc_lengths: DocLengths,
        docmap: DocMap,
        tokenizer: Arc<dyn Tokenizer>,
    ) -> Result<Self> {
        let corrupt = |reason: String| SearchError::IndexNotBuilt(format!("corrupt index: {reason}"));

        if docmap.len() != doc_lengths.len() || docmap.len() != term_frequencies.len() {
            return Err(corrupt(format!(
                "size mismatch: {} documents, {} lengths, {} term-frequency entries",
                docmap.len(),
                doc_lengths.len(),
                term_frequencies.len()
            )));
        }
        if !docmap.keys().eq(doc_lengths.keys()) || !docmap.keys().eq(term_frequencies.keys()) {
            return Err(corrupt("document ids differ between artifacts".into()));
        }
        for (id, doc) in &docmap {
            if doc.id != *id {
                return Err(corrupt(format!("document keyed {id} carries id {}", doc.id)));
            }
        }

        let mut pairs = 0usize;
        for (id, counts) in &term_frequencies {
            let total: u64 = counts.values().map(|&c| c as u64).sum();
            if counts.values().any(|&c| c == 0) || total != doc_lengths[id] as u64 {
                return Err(corrupt(format!("term counts of document {id} do not sum to its length")));
            }
            pairs += counts.len();
        }

        let mut posted = 0usize;
        for (term, ids) in &postings {
            for id in ids {
                let present = term_frequencies.get(id).is_some_and(|c| c.contains_key(term));
                if !present {
                    return Err(corrupt(format!("posting for '{term}' names document {id} without a count")));
                }
            }
            posted += ids.len();
        }
        if posted != pairs {
            return Err(corrupt(format!("{posted} postings for {pairs} term occurrences")));
        }

        Ok(Self { postings, term_frequencies, doc_lengths, docmap, tokenizer })
    }

    pub fn save(&self, paths: &IndexPaths) -> Result<()> { persist::save_index(paths, self) }

    pub fn load(paths: &IndexPaths) -> Result<Self> { Self::load_with(paths, Arc::new(EnglishTokenizer)) }

    pub fn load_with(paths: &IndexPaths, tokenizer: Arc<dyn Tokenizer>) -> Result<Self> {
        persist::load_index(paths, tokenizer)
    }

    pub fn num_docs(&self) -> usize { self.docmap.len() }

    pub fn num_terms(&self) -> usize { self.postings.len() }

    pub fn is_empty(&self) -> bool { self.docmap.is_empty() }

    pub fn document(&self, id: DocId) -> Option<&Document> { self.docmap.get(&id) }

    /// Documents in ascending id order.
    pub fn documents(&self) -> impl Iterator<Item = &Document> { self.docmap.values() }

    pub fn tokenizer(&self) -> &Arc<dyn Tokenizer> { &self.tokenizer }

    pub fn doc_length(&self, id: DocId) -> u32 { self.doc_lengths.get(&id).copied().unwrap_or(0) }

    pub fn average_document_length(&self) -> Result<f64> {
        if self.docmap.is_empty() {
            return Err(SearchError::EmptyIndex { operation: "average_document_length" });
        }
        let total: u64 = self.doc_lengths.values().map(|&l| l as u64).sum();
        Ok(total as f64 / self.doc_lengths.len() as f64)
    }

    /// Normalize `term` and require exactly one resulting token.
    fn single_term(&self, term: &str, operation: &'static str) -> Result<String> {
        let mut tokens = self.tokenizer.tokenize(term);
        match tokens.len() {
            1 => Ok(tokens.remove(0)),
            0 => Err(SearchError::invalid(operation, format!("'{term}' has no indexable term"))),
            n => Err(SearchError::invalid(operation, format!("'{term}' normalizes to {n} terms, expected one"))),
        }
    }

    fn doc_freq(&self, normalized: &str) -> usize { self.postings.get(normalized).map_or(0, BTreeSet::len) }

    fn raw_tf(&self, id: DocId, normalized: &str) -> u32 {
        self.term_frequencies
            .get(&id)
            .and_then(|counts| counts.get(normalized))
            .copied()
            .unwrap_or(0)
    }

    /// Documents containing `term`, ascending by id. Unknown terms yield nothing.
    pub fn get_documents(&self, term: &str) -> Result<Vec<&Document>> {
        let term = self.single_term(term, "get_documents")?;
        Ok(self
            .postings
            .get(&term)
            .into_iter()
            .flatten()
            .filter_map(|id| self.docmap.get(id))
            .collect())
    }

    /// Occurrences of `term` in document `id`; 0 for unknown documents or terms.
    pub fn get_term_frequency(&self, id: DocId, term: &str) -> Result<u32> {
        let term = self.single_term(term, "get_term_frequency")?;
        Ok(self.raw_tf(id, &term))
    }

    pub fn get_inverse_document_frequency(&self, term: &str) -> Result<f64> {
        let term = self.single_term(term, "get_inverse_document_frequency")?;
        Ok(bm25::idf(self.num_docs(), self.doc_freq(&term)))
    }

    pub fn get_tf_idf(&self, id: DocId, term: &str) -> Result<f64> {
        Ok(self.get_term_frequency(id, term)? as f64 * self.get_inverse_document_frequency(term)?)
    }

    pub fn get_bm25_inverse_document_frequency(&self, term: &str) -> Result<f64> {
        let term = self.single_term(term, "get_bm25_inverse_document_frequency")?;
        Ok(bm25::bm25_idf(self.num_docs(), self.doc_freq(&term)))
    }

    pub fn get_bm25_term_frequency(&self, id: DocId, term: &str, k1: f64, b: f64) -> Result<f64> {
        let params = Bm25Params { k1, b };
        params.validate("get_bm25_term_frequency")?;
        let avg = self.average_document_length().map_err(|_| SearchError::EmptyIndex { operation: "get_bm25_term_frequency" })?;
        let term = self.single_term(term, "get_bm25_term_frequency")?;
        Ok(bm25::bm25_tf(self.raw_tf(id, &term), self.doc_length(id), avg, params))
    }

    pub fn bm25(&self, id: DocId, term: &str) -> Result<f64> { self.bm25_with(id, term, Bm25Params::default()) }

    pub fn bm25_with(&self, id: DocId, term: &str, params: Bm25Params) -> Result<f64> {
        let tf = self.get_bm25_term_frequency(id, term, params.k1, params.b)?;
        Ok(tf * self.get_bm25_inverse_document_frequency(term)?)
    }

    pub fn bm25_search(&self, query: &str, limit: usize) -> Result<Vec<Bm25Hit>> {
        self.bm25_search_with(query, limit, Bm25Params::default())
    }

    /// Score every indexed document against every query term (repeated terms
    /// count once per occurrence). Ties keep ascending id order.
    pub fn bm25_search_with(&self, query: &str, limit: usize, params: Bm25Params) -> Result<Vec<Bm25Hit>> {
        params.validate("bm25_search")?;
        if self.is_empty() {
            return Ok(Vec::new());
        }
        let avg = self.average_document_length()?;
        let n = self.num_docs();
        let terms: Vec<(String, f64)> = self
            .tokenizer
            .tokenize(query)
            .into_iter()
            .map(|t| {
                let idf = bm25::bm25_idf(n, self.doc_freq(&t));
                (t, idf)
            })
            .collect();

        let mut hits: Vec<Bm25Hit> = self
            .docmap
            .values()
            .map(|doc| {
                let len = self.doc_length(doc.id);
                let score = terms
                    .iter()
                    .map(|(term, idf)| bm25::bm25_tf(self.raw_tf(doc.id, term), len, avg, params) * idf)
                    .sum();
                Bm25Hit { id: doc.id, title: doc.title.clone(), score }
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(limit);
        Ok(hits)
    }
}

/// Publishes a complete index to concurrent readers. Readers hold an `Arc`
/// snapshot; a rebuild replaces the whole structure at once.
#[derive(Clone, Default)]
pub struct SharedIndex {
    inner: Arc<RwLock<Option<Arc<InvertedIndex>>>>,
}

impl SharedIndex {
    pub fn new(index: InvertedIndex) -> Self {
        let shared = Self::default();
        shared.publish(index);
        shared
    }

    pub fn publish(&self, index: InvertedIndex) {
        let num_docs = index.num_docs();
        *self.inner.write() = Some(Arc::new(index));
        tracing::info!(num_docs, "published index");
    }

    pub fn snapshot(&self) -> Result<Arc<InvertedIndex>> {
        self.inner
            .read()
            .clone()
            .ok_or_else(|| SearchError::IndexNotBuilt("no index has been built or loaded".into()))
    }

    pub fn is_built(&self) -> bool { self.inner.read().is_some() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: DocId, title: &str, description: &str) -> Document { Document::new(id, title, description).unwrap() }

    fn movies() -> InvertedIndex {
        InvertedIndex::build(vec![
            doc(1, "The Great Escape", ""),
            doc(2, "Escape Room", ""),
            doc(3, "The Room", ""),
        ])
        .unwrap()
    }

    #[test]
    fn build_records_postings_counts_and_lengths() {
        let index = InvertedIndex::build(vec![doc(7, "Bear", "bear bear cub")]).unwrap();
        assert_eq!(index.get_term_frequency(7, "bear").unwrap(), 3);
        assert_eq!(index.doc_length(7), 4);
        assert_eq!(index.postings["bear"].len(), 1);
        let total: u32 = index.term_frequencies[&7].values().sum();
        assert_eq!(total, index.doc_length(7));
    }

    #[test]
    fn get_documents_is_sorted_by_id() {
        let index = movies();
        let ids: Vec<DocId> = index.get_documents("Escape").unwrap().iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(index.get_documents("zebra").unwrap().is_empty());
    }

    #[test]
    fn multi_token_lookups_are_rejected() {
        let index = movies();
        assert!(matches!(index.get_documents("escape room"), Err(SearchError::InvalidArgument { .. })));
        assert!(matches!(index.get_term_frequency(1, "the"), Err(SearchError::InvalidArgument { .. })));
        assert!(matches!(index.get_bm25_inverse_document_frequency("great escape"), Err(SearchError::InvalidArgument { .. })));
    }

    #[test]
    fn stopword_padding_leaves_a_single_term() {
        let index = movies();
        assert_eq!(index.get_term_frequency(3, "the room").unwrap(), 1);
        assert_eq!(
            index.get_bm25_inverse_document_frequency("the room").unwrap(),
            index.get_bm25_inverse_document_frequency("room").unwrap()
        );
        assert_eq!(index.get_documents("a room").unwrap().len(), 2);
    }

    #[test]
    fn out_of_range_bm25_parameters_are_rejected() {
        let index = movies();
        for (k1, b) in [(-1.0, 0.0), (f64::NAN, 0.75), (1.5, 1.5), (1.5, -0.1)] {
            assert!(
                matches!(index.get_bm25_term_frequency(2, "room", k1, b), Err(SearchError::InvalidArgument { .. })),
                "k1={k1} b={b}"
            );
        }
        let bad = Bm25Params { k1: -1.0, b: 0.0 };
        assert!(matches!(index.bm25_search_with("room", 3, bad), Err(SearchError::InvalidArgument { .. })));
        assert!(index.get_bm25_term_frequency(2, "room", 0.0, 0.0).unwrap().is_finite());
    }

    #[test]
    fn unknown_documents_and_terms_have_zero_frequency() {
        let index = movies();
        assert_eq!(index.get_term_frequency(3, "escape").unwrap(), 0);
        assert_eq!(index.get_term_frequency(99, "room").unwrap(), 0);
        assert_eq!(index.get_term_frequency(1, "zebra").unwrap(), 0);
        assert_eq!(index.bm25(3, "escape").unwrap(), 0.0);
        assert_eq!(index.bm25(42, "room").unwrap(), 0.0);
    }

    #[test]
    fn idf_formulas() {
        let index = movies();
        assert!((index.get_inverse_document_frequency("room").unwrap() - (4.0f64 / 3.0).ln()).abs() < 1e-12);
        assert!((index.get_inverse_document_frequency("zebra").unwrap() - 4.0f64.ln()).abs() < 1e-12);
        assert!((index.get_bm25_inverse_document_frequency("great").unwrap() - (2.5f64 / 1.5 + 1.0).ln()).abs() < 1e-12);
    }

    #[test]
    fn bm25_term_frequency_uses_length_normalization() {
        let index = movies();
        // doc 3 has one token against an average of 5/3
        let expected = 2.5 / (1.0 + 1.5 * (0.25 + 0.75 * (1.0 / (5.0 / 3.0))));
        let got = index.get_bm25_term_frequency(3, "room", 1.5, 0.75).unwrap();
        assert!((got - expected).abs() < 1e-12);
    }

    #[test]
    fn bm25_search_prefers_documents_matching_both_terms() {
        let index = movies();
        let hits = index.bm25_search("escape room", 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, 2);
        assert_eq!(hits[0].title, "Escape Room");
        assert!(hits[0].score > hits[1].score);
        let single: f64 = index.bm25(2, "escape").unwrap() + index.bm25(2, "room").unwrap();
        assert!((hits[0].score - single).abs() < 1e-12);
    }

    #[test]
    fn bm25_search_breaks_ties_by_id() {
        let index = InvertedIndex::build(vec![doc(5, "Alpha", ""), doc(2, "Beta", ""), doc(9, "Gamma", "")]).unwrap();
        let ids: Vec<DocId> = index.bm25_search("zebra", 10).unwrap().iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![2, 5, 9]);
    }

    #[test]
    fn empty_index_guards_statistics() {
        let index = InvertedIndex::build(Vec::new()).unwrap();
        assert!(matches!(index.average_document_length(), Err(SearchError::EmptyIndex { .. })));
        assert!(matches!(index.get_bm25_term_frequency(1, "room", 1.5, 0.75), Err(SearchError::EmptyIndex { .. })));
        assert!(index.bm25_search("room", 5).unwrap().is_empty());
        assert_eq!(index.get_inverse_document_frequency("room").unwrap(), 0.0);
    }

    #[test]
    fn duplicate_ids_fail_the_build() {
        let err = InvertedIndex::build(vec![doc(1, "A", ""), doc(1, "B", "")]).err().unwrap();
        assert!(matches!(err, SearchError::InvalidArgument { .. }));
    }

    #[test]
    fn from_parts_rejects_size_mismatch() {
        let index = movies();
        let mut lengths = index.doc_lengths.clone();
        lengths.remove(&3);
        let err = InvertedIndex::from_parts(
            index.postings.clone(),
            index.term_frequencies.clone(),
            lengths,
            index.docmap.clone(),
            Arc::new(EnglishTokenizer),
        )
        .err()
        .unwrap();
        assert!(matches!(err, SearchError::IndexNotBuilt(_)));
    }

    #[test]
    fn from_parts_rejects_dangling_postings() {
        let index = movies();
        let mut postings = index.postings.clone();
        postings.entry("ghost".into()).or_default().insert(1);
        assert!(InvertedIndex::from_parts(
            postings,
            index.term_frequencies.clone(),
            index.doc_lengths.clone(),
            index.docmap.clone(),
            Arc::new(EnglishTokenizer),
        )
        .is_err());
    }

    #[test]
    fn shared_index_requires_publish() {
        let shared = SharedIndex::default();
        assert!(matches!(shared.snapshot(), Err(SearchError::IndexNotBuilt(_))));
        shared.publish(movies());
        let snapshot = shared.snapshot().unwrap();
        shared.publish(InvertedIndex::build(vec![doc(4, "Jaws", "")]).unwrap());
        assert_eq!(snapshot.num_docs(), 3);
        assert_eq!(shared.snapshot().unwrap().num_docs(), 1);
    }
}
