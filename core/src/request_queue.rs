use std::collections::VecDeque;

use crate::config::MIN_IN_DAY;
use crate::document::{status_is, DocId, Document, DocumentStatus};
use crate::error::{Result, SearchError};
use crate::search_server::SearchServer;

/// Outcome of one recorded request.
#[derive(Debug, Clone, Copy)]
struct QueryResult {
    results: usize,
}

/// Runs searches against a server and remembers how many of the last `window` requests found
/// nothing.
///
/// The window counts calls, not time. Failed searches are not recorded.
pub struct RequestQueue<'a> {
    search_server: &'a SearchServer,
    requests: VecDeque<QueryResult>,
    no_result_requests: usize,
    window: usize,
}

impl<'a> RequestQueue<'a> {
    pub fn new(search_server: &'a SearchServer) -> Self {
        Self {
            search_server,
            requests: VecDeque::with_capacity(MIN_IN_DAY),
            no_result_requests: 0,
            window: MIN_IN_DAY,
        }
    }

    pub fn with_window(search_server: &'a SearchServer, window: usize) -> Result<Self> {
        if window == 0 {
            return Err(SearchError::invalid_arg("request window must be positive"));
        }
        Ok(Self {
            search_server,
            requests: VecDeque::with_capacity(window),
            no_result_requests: 0,
            window,
        })
    }

    pub fn add_find_request(&mut self, raw_query: &str) -> Result<Vec<Document>> {
        self.add_find_request_with_status(raw_query, DocumentStatus::Actual)
    }

    pub fn add_find_request_with_status(
        &mut self,
        raw_query: &str,
        status: DocumentStatus,
    ) -> Result<Vec<Document>> {
        self.add_find_request_with(raw_query, status_is(status))
    }

    pub fn add_find_request_with<P>(&mut self, raw_query: &str, predicate: P) -> Result<Vec<Document>>
    where
        P: Fn(DocId, DocumentStatus, i32) -> bool + Sync,
    {
        let documents = self.search_server.find_top_documents_with(raw_query, predicate)?;
        self.record(documents.len());
        Ok(documents)
    }

    /// Number of requests in the current window that returned no documents.
    pub fn no_result_requests(&self) -> usize {
        self.no_result_requests
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    fn record(&mut self, results: usize) {
        self.requests.push_back(QueryResult { results });
        if results == 0 {
            self.no_result_requests += 1;
        }
        if self.requests.len() > self.window {
            if let Some(evicted) = self.requests.pop_front() {
                if evicted.results == 0 {
                    self.no_result_requests -= 1;
                }
            }
        }
    }
}
