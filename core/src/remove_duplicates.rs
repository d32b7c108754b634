use std::collections::BTreeSet;

use crate::document::DocId;
use crate::search_server::SearchServer;

/// Removes every document whose set of indexed terms equals that of an earlier document.
///
/// Documents are visited by ascending id, so the lowest id of each group survives. Returns the
/// removed ids in ascending order.
pub fn remove_duplicates(search_server: &mut SearchServer) -> Vec<DocId> {
    let mut duplicates = Vec::new();
    {
        let mut seen: BTreeSet<Vec<&str>> = BTreeSet::new();
        for document_id in search_server.document_ids() {
            let words: Vec<&str> = search_server.word_frequencies(document_id).into_keys().collect();
            if !seen.insert(words) {
                tracing::info!(document_id, "Found duplicate document id {document_id}");
                duplicates.push(document_id);
            }
        }
    }
    for &document_id in &duplicates {
        search_server.remove_document(document_id);
    }
    duplicates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentStatus;

    #[test]
    fn keeps_first_of_each_term_set() {
        let mut server = SearchServer::from_stop_words_text("and with").unwrap();
        let docs = [
            (1, "funny pet and nasty rat"),
            (2, "funny pet with curly hair"),
            (3, "funny pet with curly hair"),
            (4, "funny pet and curly hair"),
            (5, "funny funny pet and nasty nasty rat"),
            (6, "funny pet and not very nasty rat"),
            (7, "very nasty rat and not very funny pet"),
            (8, "pet with rat and rat and rat"),
            (9, "nasty rat with curly hair"),
        ];
        for (id, text) in docs {
            server.add_document(id, text, DocumentStatus::Actual, &[1, 2]).unwrap();
        }
        let removed = remove_duplicates(&mut server);
        assert_eq!(removed, vec![3, 4, 5, 7]);
        assert_eq!(server.document_count(), 5);
        assert_eq!(server.document_ids().collect::<Vec<_>>(), vec![1, 2, 6, 8, 9]);
    }

    #[test]
    fn documents_without_terms_are_duplicates_of_each_other() {
        let mut server = SearchServer::from_stop_words_text("the").unwrap();
        server.add_document(1, "the", DocumentStatus::Actual, &[]).unwrap();
        server.add_document(2, "the the", DocumentStatus::Actual, &[]).unwrap();
        assert_eq!(remove_duplicates(&mut server), vec![2]);
    }
}
