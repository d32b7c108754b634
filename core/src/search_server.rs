use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::cmp::Ordering;
use std::collections::{btree_set, BTreeMap, BTreeSet};
use std::iter::Copied;

use crate::concurrent_map::ConcurrentMap;
use crate::config::{ExecutionPolicy, SearchConfig, EPSILON, MAX_RESULT_DOCUMENT_COUNT};
use crate::document::{status_is, DocId, Document, DocumentStatus};
use crate::error::{Result, SearchError};
use crate::index::InvertedIndex;
use crate::query::{parse_query, Query};
use crate::tokenizer::{is_valid_word, split_into_words};

struct DocumentData {
    rating: i32,
    status: DocumentStatus,
    text: String,
}

/// In-memory TF-IDF search engine over a mutable set of documents.
///
/// Reads (`find_top_documents*`, `match_document*`, `word_frequencies`) take `&self` and may run
/// from many threads at once. Adding and removing documents take `&mut self`, so the borrow
/// checker keeps readers out while the index changes.
pub struct SearchServer {
    stop_words: BTreeSet<String>,
    index: InvertedIndex,
    documents: BTreeMap<DocId, DocumentData>,
    document_ids: BTreeSet<DocId>,
    config: SearchConfig,
    pool: ThreadPool,
}

impl SearchServer {
    /// Builds a server with the default configuration. Fails if a stop word holds control characters.
    pub fn new<I, S>(stop_words: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_config(stop_words, SearchConfig::default())
    }

    /// Builds a server whose stop words are the space-separated words of `text`.
    pub fn from_stop_words_text(text: &str) -> Result<Self> {
        Self::new(split_into_words(text))
    }

    pub fn with_config<I, S>(stop_words: I, config: SearchConfig) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        config.validate()?;
        let stop_words: BTreeSet<String> = stop_words
            .into_iter()
            .map(|w| w.as_ref().to_string())
            .filter(|w| !w.is_empty())
            .collect();
        if !stop_words.iter().all(|w| is_valid_word(w)) {
            return Err(SearchError::invalid_arg("some of the stop words are invalid"));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("search-worker-{i}"))
            .build()
            .map_err(|e| SearchError::WorkerPool(e.to_string()))?;
        Ok(Self {
            stop_words,
            index: InvertedIndex::new(),
            documents: BTreeMap::new(),
            document_ids: BTreeSet::new(),
            config,
            pool,
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub(crate) fn pool(&self) -> &ThreadPool {
        &self.pool
    }

    pub fn add_document(
        &mut self,
        document_id: DocId,
        document: &str,
        status: DocumentStatus,
        ratings: &[i32],
    ) -> Result<()> {
        if document_id < 0 {
            return Err(SearchError::invalid_arg(format!("document id {document_id} is negative")));
        }
        if self.documents.contains_key(&document_id) {
            return Err(SearchError::invalid_arg(format!(
                "document with id {document_id} already added"
            )));
        }
        let words = self.split_into_words_no_stop(document)?;
        self.index.insert(document_id, &words);
        let rating = compute_average_rating(ratings);
        self.documents.insert(
            document_id,
            DocumentData { rating, status, text: document.to_string() },
        );
        self.document_ids.insert(document_id);
        tracing::debug!(document_id, words = words.len(), rating, %status, "document added");
        Ok(())
    }

    /// Top documents with status `Actual`, sequentially.
    pub fn find_top_documents(&self, raw_query: &str) -> Result<Vec<Document>> {
        self.find_top_documents_with_status(raw_query, DocumentStatus::Actual)
    }

    pub fn find_top_documents_with_status(
        &self,
        raw_query: &str,
        status: DocumentStatus,
    ) -> Result<Vec<Document>> {
        self.find_top_documents_policy(ExecutionPolicy::Sequential, raw_query, status_is(status))
    }

    pub fn find_top_documents_with<P>(&self, raw_query: &str, predicate: P) -> Result<Vec<Document>>
    where
        P: Fn(DocId, DocumentStatus, i32) -> bool + Sync,
    {
        self.find_top_documents_policy(ExecutionPolicy::Sequential, raw_query, predicate)
    }

    /// Ranks the documents accepted by `predicate` against `raw_query`.
    ///
    /// Results are ordered by descending relevance; relevances within `EPSILON` of each other
    /// are ordered by descending rating. At most `MAX_RESULT_DOCUMENT_COUNT` are returned.
    pub fn find_top_documents_policy<P>(
        &self,
        policy: ExecutionPolicy,
        raw_query: &str,
        predicate: P,
    ) -> Result<Vec<Document>>
    where
        P: Fn(DocId, DocumentStatus, i32) -> bool + Sync,
    {
        let query = parse_query(raw_query, &self.stop_words, true)?;
        let mut matched = match policy {
            ExecutionPolicy::Sequential => {
                let mut matched = self.find_all_documents(&query, &predicate);
                matched.sort_by(compare_by_relevance_then_rating);
                settle_near_ties(&mut matched);
                matched
            }
            ExecutionPolicy::Parallel => self.pool.install(|| {
                let mut matched = self.find_all_documents_parallel(&query, &predicate);
                matched.par_sort_by(compare_by_relevance_then_rating);
                settle_near_ties(&mut matched);
                matched
            }),
        };
        tracing::trace!(query = raw_query, hits = matched.len(), ?policy, "search finished");
        matched.truncate(MAX_RESULT_DOCUMENT_COUNT);
        Ok(matched)
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Ids of all documents, ascending.
    pub fn document_ids(&self) -> Copied<btree_set::Iter<'_, DocId>> {
        self.document_ids.iter().copied()
    }

    pub fn document_text(&self, document_id: DocId) -> Option<&str> {
        self.documents.get(&document_id).map(|data| data.text.as_str())
    }

    /// Term frequencies of a document; empty when the id is unknown.
    pub fn word_frequencies(&self, document_id: DocId) -> BTreeMap<&str, f64> {
        self.index.word_frequencies(document_id)
    }

    pub fn remove_document(&mut self, document_id: DocId) {
        self.remove_document_policy(ExecutionPolicy::Sequential, document_id);
    }

    /// Removes a document from the index. Unknown ids are ignored.
    pub fn remove_document_policy(&mut self, policy: ExecutionPolicy, document_id: DocId) {
        if self.documents.remove(&document_id).is_none() {
            return;
        }
        self.document_ids.remove(&document_id);
        match policy {
            ExecutionPolicy::Sequential => self.index.remove(document_id),
            ExecutionPolicy::Parallel => {
                let index = &mut self.index;
                self.pool.install(|| index.remove_parallel(document_id));
            }
        }
        tracing::debug!(document_id, ?policy, "document removed");
    }

    pub fn match_document(
        &self,
        raw_query: &str,
        document_id: DocId,
    ) -> Result<(Vec<&str>, DocumentStatus)> {
        self.match_document_policy(ExecutionPolicy::Sequential, raw_query, document_id)
    }

    /// Plus-terms of `raw_query` found in the document, sorted and deduplicated.
    ///
    /// If any minus-term occurs in the document the term list is empty. Fails with `OutOfRange`
    /// for an unknown id.
    pub fn match_document_policy(
        &self,
        policy: ExecutionPolicy,
        raw_query: &str,
        document_id: DocId,
    ) -> Result<(Vec<&str>, DocumentStatus)> {
        let status = self
            .documents
            .get(&document_id)
            .map(|data| data.status)
            .ok_or_else(|| SearchError::out_of_range(format!("unknown document id {document_id}")))?;

        match policy {
            ExecutionPolicy::Sequential => {
                let query = parse_query(raw_query, &self.stop_words, true)?;
                if query.minus_words.iter().any(|w| self.index.contains(w, document_id)) {
                    return Ok((Vec::new(), status));
                }
                let matched = query
                    .plus_words
                    .iter()
                    .filter_map(|w| self.term_in_document(w, document_id))
                    .collect();
                Ok((matched, status))
            }
            ExecutionPolicy::Parallel => {
                let query = parse_query(raw_query, &self.stop_words, false)?;
                self.pool.install(|| {
                    if query.minus_words.par_iter().any(|w| self.index.contains(w, document_id)) {
                        return Ok((Vec::new(), status));
                    }
                    let mut matched: Vec<&str> = query
                        .plus_words
                        .par_iter()
                        .filter_map(|w| self.term_in_document(w, document_id))
                        .collect();
                    matched.par_sort_unstable();
                    matched.dedup();
                    Ok((matched, status))
                })
            }
        }
    }

    fn term_in_document(&self, word: &str, document_id: DocId) -> Option<&str> {
        let term_id = self.index.term_id(word)?;
        let docs = self.index.postings(term_id)?;
        docs.contains_key(&document_id).then(|| self.index.term(term_id))
    }

    fn split_into_words_no_stop<'t>(&self, text: &'t str) -> Result<Vec<&'t str>> {
        let mut words = Vec::new();
        for word in split_into_words(text) {
            if !is_valid_word(word) {
                return Err(SearchError::invalid_arg(format!("word '{word}' is invalid")));
            }
            if !self.stop_words.contains(word) {
                words.push(word);
            }
        }
        Ok(words)
    }

    /// Postings of a live term together with its inverse document frequency.
    fn postings_with_idf(&self, word: &str) -> Option<(&BTreeMap<DocId, f64>, f64)> {
        let term_id = self.index.term_id(word)?;
        let docs = self.index.postings(term_id)?;
        if docs.is_empty() || self.documents.is_empty() {
            return None;
        }
        let idf = (self.document_count() as f64 / docs.len() as f64).ln();
        Some((docs, idf))
    }

    fn to_documents(&self, relevance: BTreeMap<DocId, f64>) -> Vec<Document> {
        relevance
            .into_iter()
            .filter_map(|(id, relevance)| {
                self.documents.get(&id).map(|data| Document::new(id, relevance, data.rating))
            })
            .collect()
    }

    fn find_all_documents<P>(&self, query: &Query<'_>, predicate: &P) -> Vec<Document>
    where
        P: Fn(DocId, DocumentStatus, i32) -> bool,
    {
        let mut document_to_relevance: BTreeMap<DocId, f64> = BTreeMap::new();
        for word in &query.plus_words {
            let Some((docs, idf)) = self.postings_with_idf(word) else {
                continue;
            };
            for (&document_id, &term_freq) in docs {
                if let Some(data) = self.documents.get(&document_id) {
                    if predicate(document_id, data.status, data.rating) {
                        *document_to_relevance.entry(document_id).or_insert(0.0) += term_freq * idf;
                    }
                }
            }
        }
        for word in &query.minus_words {
            let Some(term_id) = self.index.term_id(word) else {
                continue;
            };
            for document_id in self.index.postings(term_id).into_iter().flat_map(BTreeMap::keys) {
                document_to_relevance.remove(document_id);
            }
        }
        self.to_documents(document_to_relevance)
    }

    /// Same scoring as `find_all_documents`, spread over the current rayon pool.
    ///
    /// Each document collects its per-term contributions tagged with the term's position in the
    /// query, and they are summed in that order, so relevances are bit-identical to the
    /// sequential path. Minus-terms are erased only after every plus-term has been collected.
    fn find_all_documents_parallel<P>(&self, query: &Query<'_>, predicate: &P) -> Vec<Document>
    where
        P: Fn(DocId, DocumentStatus, i32) -> bool + Sync,
    {
        let contributions: ConcurrentMap<DocId, Vec<(usize, f64)>> =
            ConcurrentMap::new(self.config.workers);
        query.plus_words.par_iter().enumerate().for_each(|(position, word)| {
            let Some((docs, idf)) = self.postings_with_idf(word) else {
                return;
            };
            for (&document_id, &term_freq) in docs {
                if let Some(data) = self.documents.get(&document_id) {
                    if predicate(document_id, data.status, data.rating) {
                        contributions.update(document_id, |parts| parts.push((position, term_freq * idf)));
                    }
                }
            }
        });
        query.minus_words.par_iter().for_each(|word| {
            let Some(term_id) = self.index.term_id(word) else {
                return;
            };
            for document_id in self.index.postings(term_id).into_iter().flat_map(BTreeMap::keys) {
                contributions.erase(document_id);
            }
        });
        let document_to_relevance = contributions
            .into_ordinary_map()
            .into_iter()
            .map(|(document_id, mut parts)| {
                parts.sort_unstable_by_key(|&(position, _)| position);
                let mut relevance = 0.0;
                for (_, part) in parts {
                    relevance += part;
                }
                (document_id, relevance)
            })
            .collect();
        self.to_documents(document_to_relevance)
    }
}

impl<'a> IntoIterator for &'a SearchServer {
    type Item = DocId;
    type IntoIter = Copied<btree_set::Iter<'a, DocId>>;

    fn into_iter(self) -> Self::IntoIter {
        self.document_ids()
    }
}

/// Truncating mean of the ratings, zero when there are none.
fn compute_average_rating(ratings: &[i32]) -> i32 {
    if ratings.is_empty() {
        return 0;
    }
    let sum: i64 = ratings.iter().map(|&r| i64::from(r)).sum();
    (sum / ratings.len() as i64) as i32
}

/// Total order: descending relevance, then descending rating.
fn compare_by_relevance_then_rating(lhs: &Document, rhs: &Document) -> Ordering {
    rhs.relevance
        .total_cmp(&lhs.relevance)
        .then_with(|| rhs.rating.cmp(&lhs.rating))
}

/// Ranking order: relevances closer than `EPSILON` are ordered by descending rating.
///
/// Not transitive, so it must never be handed to a library sort.
fn compare_documents(lhs: &Document, rhs: &Document) -> Ordering {
    if (lhs.relevance - rhs.relevance).abs() < EPSILON {
        rhs.rating.cmp(&lhs.rating)
    } else {
        rhs.relevance.total_cmp(&lhs.relevance)
    }
}

/// Insertion pass over a slice already sorted by `compare_by_relevance_then_rating`.
///
/// An element only moves left past neighbours it ties with on relevance and outranks on
/// rating, so every adjacent pair ends up in `compare_documents` order.
fn settle_near_ties(documents: &mut [Document]) {
    for i in 1..documents.len() {
        let mut j = i;
        while j > 0 && compare_documents(&documents[j], &documents[j - 1]) == Ordering::Less {
            documents.swap(j, j - 1);
            j -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_rating_truncates() {
        assert_eq!(compute_average_rating(&[8, -3]), 2);
        assert_eq!(compute_average_rating(&[-8, 3]), -2);
        assert_eq!(compute_average_rating(&[7, 2, 7]), 5);
        assert_eq!(compute_average_rating(&[]), 0);
    }

    #[test]
    fn near_equal_relevance_falls_back_to_rating() {
        let a = Document::new(1, 0.5, 1);
        let b = Document::new(2, 0.5 + 1e-9, 9);
        assert_eq!(compare_documents(&a, &b), Ordering::Greater);
        let c = Document::new(3, 0.7, -5);
        assert_eq!(compare_documents(&c, &b), Ordering::Less);
    }

    fn is_ranked(documents: &[Document]) -> bool {
        documents.windows(2).all(|pair| compare_documents(&pair[0], &pair[1]) != Ordering::Greater)
    }

    #[test]
    fn close_relevances_rank_without_panicking() {
        // Relevances 3e-7 apart form near-tie chains longer than EPSILON.
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        for round in 0..500 {
            let mut documents: Vec<Document> = (0..40)
                .map(|i| {
                    seed ^= seed << 13;
                    seed ^= seed >> 7;
                    seed ^= seed << 17;
                    let rating = (seed % 21) as i32 - 10;
                    Document::new(i, 1.0 - f64::from((i * 7 + round) % 40) * 3e-7, rating)
                })
                .collect();
            documents.sort_by(compare_by_relevance_then_rating);
            settle_near_ties(&mut documents);
            assert!(is_ranked(&documents), "round {round}");
        }
    }

    #[test]
    fn settle_orders_exact_ties_by_rating() {
        let mut documents = vec![
            Document::new(1, 0.5, 1),
            Document::new(2, 0.9, 0),
            Document::new(3, 0.5, 7),
            Document::new(4, 0.5 + 1e-9, 3),
        ];
        documents.sort_by(compare_by_relevance_then_rating);
        settle_near_ties(&mut documents);
        let ids: Vec<_> = documents.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![2, 3, 4, 1]);
    }

    #[test]
    fn config_is_kept() {
        let server = SearchServer::with_config(["and"], SearchConfig::with_workers(3)).unwrap();
        assert_eq!(server.config().workers, 3);
    }

    #[test]
    fn index_stays_consistent_through_add_and_remove() {
        let mut server = SearchServer::with_config(["and"], SearchConfig::with_workers(2)).unwrap();
        server.add_document(1, "cat and dog", DocumentStatus::Actual, &[1]).unwrap();
        server.add_document(2, "dog and bird", DocumentStatus::Actual, &[2]).unwrap();
        assert!(server.index.is_consistent());
        server.remove_document_policy(ExecutionPolicy::Parallel, 1);
        assert!(server.index.is_consistent());
        assert_eq!(server.document_ids().collect::<Vec<_>>(), vec![2]);
    }
}
