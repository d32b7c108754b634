pub mod concurrent_map;
pub mod config;
pub mod document;
pub mod error;
pub mod index;
pub mod log_duration;
pub mod process_queries;
pub mod query;
pub mod remove_duplicates;
pub mod request_queue;
pub mod search_server;
pub mod tokenizer;

pub use concurrent_map::ConcurrentMap;
pub use config::{ExecutionPolicy, SearchConfig, EPSILON, MAX_RESULT_DOCUMENT_COUNT, MIN_IN_DAY};
pub use document::{status_is, DocId, Document, DocumentStatus};
pub use error::{Result, SearchError};
pub use index::{InvertedIndex, TermId};
pub use log_duration::LogDuration;
pub use process_queries::{process_queries, process_queries_joined};
pub use remove_duplicates::remove_duplicates;
pub use request_queue::RequestQueue;
pub use search_server::SearchServer;
