use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::document::DocId;

pub type TermId = u32;

type FastMap<K, V> = HashMap<K, V, ahash::RandomState>;

/// Interns every indexed term once; index entries refer to terms by `TermId`.
///
/// A term is released when its last document goes away and its id is handed out again by the
/// next `intern`, so the table never holds more slots than the peak number of live terms.
#[derive(Default)]
pub struct TermDictionary {
    ids: FastMap<Arc<str>, TermId>,
    terms: Vec<Option<Arc<str>>>,
    free: Vec<TermId>,
}

impl TermDictionary {
    pub fn intern(&mut self, term: &str) -> TermId {
        if let Some(&id) = self.ids.get(term) {
            return id;
        }
        let shared: Arc<str> = Arc::from(term);
        let id = match self.free.pop() {
            Some(id) => {
                self.terms[id as usize] = Some(shared.clone());
                id
            }
            None => {
                self.terms.push(Some(shared.clone()));
                (self.terms.len() - 1) as TermId
            }
        };
        self.ids.insert(shared, id);
        id
    }

    pub fn release(&mut self, id: TermId) {
        if let Some(term) = self.terms.get_mut(id as usize).and_then(Option::take) {
            self.ids.remove(&term);
            self.free.push(id);
        }
    }

    pub fn get(&self, term: &str) -> Option<TermId> {
        self.ids.get(term).copied()
    }

    /// Text of a live term; empty for a released id.
    pub fn term(&self, id: TermId) -> &str {
        self.terms
            .get(id as usize)
            .and_then(Option::as_deref)
            .unwrap_or_default()
    }

    /// Number of live terms.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Allocated slots, live or free.
    pub fn capacity(&self) -> usize {
        self.terms.len()
    }
}

/// Term frequencies kept in two mirrored views: term to documents and document to terms.
///
/// Both views only change through `insert` and the `remove` methods, which always update them
/// together. Term buckets left empty by a removal are dropped so that document frequencies only
/// count live documents.
#[derive(Default)]
pub struct InvertedIndex {
    dictionary: TermDictionary,
    word_to_document_freqs: FastMap<TermId, BTreeMap<DocId, f64>>,
    document_to_word_freqs: BTreeMap<DocId, BTreeMap<TermId, f64>>,
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes `words` for `doc_id`; each occurrence contributes `1 / words.len()`.
    pub fn insert(&mut self, doc_id: DocId, words: &[&str]) {
        if words.is_empty() {
            return;
        }
        let inv_word_count = 1.0 / words.len() as f64;
        for word in words {
            let term_id = self.dictionary.intern(word);
            *self
                .word_to_document_freqs
                .entry(term_id)
                .or_default()
                .entry(doc_id)
                .or_insert(0.0) += inv_word_count;
            *self
                .document_to_word_freqs
                .entry(doc_id)
                .or_default()
                .entry(term_id)
                .or_insert(0.0) += inv_word_count;
        }
    }

    pub fn dictionary(&self) -> &TermDictionary {
        &self.dictionary
    }

    /// Removes `doc_id` term by term, visiting only the buckets it appears in.
    pub fn remove(&mut self, doc_id: DocId) {
        let Some(terms) = self.document_to_word_freqs.remove(&doc_id) else {
            return;
        };
        for term_id in terms.keys() {
            if let Some(docs) = self.word_to_document_freqs.get_mut(term_id) {
                docs.remove(&doc_id);
                if docs.is_empty() {
                    self.word_to_document_freqs.remove(term_id);
                    self.dictionary.release(*term_id);
                }
            }
        }
    }

    /// Removes `doc_id` by sweeping every term bucket in parallel on the current rayon pool.
    pub fn remove_parallel(&mut self, doc_id: DocId) {
        let Some(terms) = self.document_to_word_freqs.remove(&doc_id) else {
            return;
        };
        self.word_to_document_freqs.par_iter_mut().for_each(|(_, docs)| {
            docs.remove(&doc_id);
        });
        for term_id in terms.keys() {
            if self.word_to_document_freqs.get(term_id).is_some_and(BTreeMap::is_empty) {
                self.word_to_document_freqs.remove(term_id);
                self.dictionary.release(*term_id);
            }
        }
    }

    /// Looks up a term that currently has at least one document.
    pub fn term_id(&self, term: &str) -> Option<TermId> {
        self.dictionary
            .get(term)
            .filter(|id| self.word_to_document_freqs.contains_key(id))
    }

    pub fn term(&self, term_id: TermId) -> &str {
        self.dictionary.term(term_id)
    }

    pub fn postings(&self, term_id: TermId) -> Option<&BTreeMap<DocId, f64>> {
        self.word_to_document_freqs.get(&term_id)
    }

    pub fn document_frequency(&self, term_id: TermId) -> usize {
        self.postings(term_id).map_or(0, BTreeMap::len)
    }

    pub fn contains(&self, term: &str, doc_id: DocId) -> bool {
        self.term_id(term)
            .and_then(|id| self.postings(id))
            .is_some_and(|docs| docs.contains_key(&doc_id))
    }

    pub fn document_terms(&self, doc_id: DocId) -> Option<&BTreeMap<TermId, f64>> {
        self.document_to_word_freqs.get(&doc_id)
    }

    /// Term frequencies of one document keyed by the term text; empty for unknown documents.
    pub fn word_frequencies(&self, doc_id: DocId) -> BTreeMap<&str, f64> {
        self.document_terms(doc_id)
            .map(|terms| terms.iter().map(|(&id, &freq)| (self.term(id), freq)).collect())
            .unwrap_or_default()
    }

    pub fn num_terms(&self) -> usize {
        self.word_to_document_freqs.len()
    }
}

#[cfg(test)]
impl InvertedIndex {
    /// True when every (term, doc, freq) triple of one view exists in the other.
    pub(crate) fn is_consistent(&self) -> bool {
        let forward = self
            .word_to_document_freqs
            .iter()
            .flat_map(|(&t, docs)| docs.iter().map(move |(&d, &f)| (t, d, f)));
        let backward = self
            .document_to_word_freqs
            .iter()
            .flat_map(|(&d, terms)| terms.iter().map(move |(&t, &f)| (t, d, f)));
        let mut forward: Vec<_> = forward.collect();
        let mut backward: Vec<_> = backward.collect();
        forward.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        backward.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        forward == backward
    }
}
