use std::collections::BTreeSet;

use crate::error::{Result, SearchError};
use crate::tokenizer::{is_valid_word, split_into_words};

/// A parsed query. Terms borrow from the raw query text.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Query<'q> {
    pub plus_words: Vec<&'q str>,
    pub minus_words: Vec<&'q str>,
}

struct QueryWord<'q> {
    data: &'q str,
    is_minus: bool,
    is_stop: bool,
}

fn parse_query_word<'q>(text: &'q str, stop_words: &BTreeSet<String>) -> Result<QueryWord<'q>> {
    let (data, is_minus) = match text.strip_prefix('-') {
        Some(rest) => (rest, true),
        None => (text, false),
    };
    if data.is_empty() || data.starts_with('-') || !is_valid_word(data) {
        return Err(SearchError::invalid_arg(format!("query word '{text}' is invalid")));
    }
    Ok(QueryWord { data, is_minus, is_stop: stop_words.contains(data) })
}

/// Splits `text` into plus and minus terms, dropping stop words.
///
/// With `dedup` both lists come back sorted and free of repeats. The parallel match path skips
/// that step and deduplicates only the terms it actually matched.
pub fn parse_query<'q>(text: &'q str, stop_words: &BTreeSet<String>, dedup: bool) -> Result<Query<'q>> {
    let mut query = Query::default();
    for word in split_into_words(text) {
        let query_word = parse_query_word(word, stop_words)?;
        if query_word.is_stop {
            continue;
        }
        if query_word.is_minus {
            query.minus_words.push(query_word.data);
        } else {
            query.plus_words.push(query_word.data);
        }
    }
    if dedup {
        for words in [&mut query.plus_words, &mut query.minus_words] {
            words.sort_unstable();
            words.dedup();
        }
    }
    tracing::trace!(plus = query.plus_words.len(), minus = query.minus_words.len(), "parsed query");
    Ok(query)
}
