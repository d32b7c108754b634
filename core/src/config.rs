use lazy_static::lazy_static;
use serde::Deserialize;

use crate::error::{Result, SearchError};

/// Upper bound on the number of documents returned by a single search.
pub const MAX_RESULT_DOCUMENT_COUNT: usize = 5;
/// Relevance values closer than this are ranked by rating instead.
pub const EPSILON: f64 = 1e-6;
/// Default request window of the request queue, one request per minute of a day.
pub const MIN_IN_DAY: usize = 1440;

lazy_static! {
    static ref DETECTED_PARALLELISM: usize = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .max(1);
}

/// How an operation distributes its work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionPolicy {
    #[default]
    Sequential,
    Parallel,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Worker threads of the engine pool, also the shard count of relevance maps.
    pub workers: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { workers: *DETECTED_PARALLELISM }
    }
}

impl SearchConfig {
    pub fn with_workers(workers: usize) -> Self {
        Self { workers }
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(SearchError::invalid_arg("worker count must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_uses_at_least_one_worker() {
        let cfg = SearchConfig::default();
        assert!(cfg.workers >= 1);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_workers_rejected() {
        assert!(SearchConfig::with_workers(0).validate().is_err());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let cfg: SearchConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, SearchConfig::default());
        let cfg: SearchConfig = serde_json::from_str(r#"{"workers": 3}"#).unwrap();
        assert_eq!(cfg.workers, 3);
    }
}
