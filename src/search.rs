use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::trace;

use crate::row::{Searchable, Value};

// Collections at least this large are scanned with rayon.
const PARALLEL_THRESHOLD: usize = 4096;

/// Case-insensitive substring match of one value. `needle` must already be
/// lower-cased.
pub fn value_matches(value: &Value, needle: &str) -> bool {
    if value.is_falsy() {
        return false;
    }
    match value {
        Value::List(items) => items
            .iter()
            .any(|item| item.to_string().to_lowercase().contains(needle)),
        other => other.to_string().to_lowercase().contains(needle),
    }
}

fn row_matches<T: Searchable>(row: &T, needle: &str, fields: &[String]) -> bool {
    fields
        .iter()
        .any(|name| row.field(name).is_some_and(|v| value_matches(v, needle)))
}

/// Rows where at least one of `fields` contains `term`. An empty term returns
/// `rows` itself.
pub fn filter_rows<T>(rows: &Arc<Vec<T>>, term: &str, fields: &[String]) -> Arc<Vec<T>>
where
    T: Searchable + Clone + Send + Sync,
{
    if term.is_empty() {
        return Arc::clone(rows);
    }
    let needle = term.to_lowercase();
    let matches: Vec<T> = if rows.len() >= PARALLEL_THRESHOLD {
        rows.par_iter()
            .filter(|row| row_matches(*row, &needle, fields))
            .cloned()
            .collect()
    } else {
        rows.iter()
            .filter(|row| row_matches(*row, &needle, fields))
            .cloned()
            .collect()
    };
    Arc::new(matches)
}

struct FilterCache<T> {
    source: Arc<Vec<T>>,
    term: String,
    fields: Vec<String>,
    result: Arc<Vec<T>>,
}

/// Search state for one table: the current term and the fields it is matched
/// against. `apply` re-derives only when collection, term or fields changed.
pub struct SearchFilter<T> {
    term: String,
    fields: Vec<String>,
    cache: Option<FilterCache<T>>,
}

impl<T> SearchFilter<T>
where
    T: Searchable + Clone + Send + Sync,
{
    pub fn new(fields: Vec<String>) -> Self {
        SearchFilter {
            term: String::new(),
            fields,
            cache: None,
        }
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn set_term(&mut self, term: impl Into<String>) {
        self.term = term.into();
    }

    pub fn apply(&mut self, rows: &Arc<Vec<T>>) -> Arc<Vec<T>> {
        if let Some(cache) = &self.cache
            && Arc::ptr_eq(&cache.source, rows)
            && cache.term == self.term
            && cache.fields == self.fields
        {
            return Arc::clone(&cache.result);
        }

        let start_time = Instant::now();
        let result = filter_rows(rows, &self.term, &self.fields);
        trace!(
            "Search for \"{}\" kept {}/{} rows in {}us",
            self.term,
            result.len(),
            rows.len(),
            start_time.elapsed().as_micros()
        );
        self.cache = Some(FilterCache {
            source: Arc::clone(rows),
            term: self.term.clone(),
            fields: self.fields.clone(),
            result: Arc::clone(&result),
        });
        result
    }
}
