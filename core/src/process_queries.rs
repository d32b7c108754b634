use rayon::prelude::*;

use crate::document::Document;
use crate::error::Result;
use crate::search_server::SearchServer;

/// Runs every query against the server on its worker pool, returning results in query order.
///
/// If any query is malformed the whole batch fails with that query's error.
pub fn process_queries<S>(search_server: &SearchServer, queries: &[S]) -> Result<Vec<Vec<Document>>>
where
    S: AsRef<str> + Sync,
{
    search_server.pool().install(|| {
        queries
            .par_iter()
            .map(|query| search_server.find_top_documents(query.as_ref()))
            .collect()
    })
}

/// Like `process_queries`, concatenated into one sequence in query order.
pub fn process_queries_joined<S>(search_server: &SearchServer, queries: &[S]) -> Result<Vec<Document>>
where
    S: AsRef<str> + Sync,
{
    Ok(process_queries(search_server, queries)?.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use crate::document::DocumentStatus;

    fn server() -> SearchServer {
        let mut server =
            SearchServer::with_config(["and", "with"], SearchConfig::with_workers(3)).unwrap();
        let texts = [
            "funny pet and nasty rat",
            "funny pet with curly hair",
            "funny pet and not very nasty rat",
            "pet with rat and rat and rat",
            "nasty rat with curly hair",
        ];
        for (id, text) in texts.iter().enumerate() {
            server.add_document(id as i32 + 1, text, DocumentStatus::Actual, &[1, 2]).unwrap();
        }
        server
    }

    #[test]
    fn results_keep_query_order() {
        let server = server();
        let queries = ["nasty rat -not", "not very funny nasty pet", "curly hair"];
        let batches = process_queries(&server, &queries).unwrap();
        assert_eq!(batches.len(), 3);
        let sizes: Vec<_> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 5, 2]);
        for (batch, query) in batches.iter().zip(queries) {
            assert_eq!(batch, &server.find_top_documents(query).unwrap());
        }
    }

    #[test]
    fn joined_flattens_in_order() {
        let server = server();
        let queries = ["nasty rat -not", "curly hair"];
        let joined = process_queries_joined(&server, &queries).unwrap();
        let ids: Vec<_> = joined.iter().map(|d| d.id).collect();
        let expected: Vec<_> = process_queries(&server, &queries)
            .unwrap()
            .into_iter()
            .flatten()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, expected);
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn malformed_query_fails_batch() {
        let server = server();
        assert!(process_queries(&server, &["rat", "--rat"]).is_err());
    }
}
