use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::paginator::Paginator;
use crate::row::Searchable;
use crate::search::SearchFilter;
use crate::viewport::{RowCountEstimator, SizingParams};

/// What the presentation layer reads for one table.
#[derive(Debug, Clone)]
pub struct TableState<T> {
    pub paginated_rows: Arc<Vec<T>>,
    pub current_page: usize,
    pub total_pages: usize,
    pub search_term: String,
    pub matching_rows: usize,
    pub rows_per_page: usize,
}

/// Search filter, paginator and row-count estimator for one page view.
pub struct TableOrchestrator<T> {
    rows: Arc<Vec<T>>,
    filter: SearchFilter<T>,
    paginator: Paginator<T>,
    estimator: RowCountEstimator,
}

impl<T> TableOrchestrator<T>
where
    T: Searchable + Clone + Send + Sync,
{
    pub fn new(fields: Vec<String>, sizing: SizingParams, debounce: Duration) -> Self {
        TableOrchestrator {
            rows: Arc::new(Vec::new()),
            filter: SearchFilter::new(fields),
            paginator: Paginator::new(sizing.min_rows),
            estimator: RowCountEstimator::new(sizing, debounce),
        }
    }

    /// Replaces the collection with a freshly fetched one.
    pub fn set_rows(&mut self, rows: Arc<Vec<T>>) {
        self.rows = rows;
    }

    pub fn search_term(&self) -> &str {
        self.filter.term()
    }

    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.filter.set_term(term);
    }

    pub fn set_current_page(&mut self, page: usize) {
        self.paginator.set_current_page(page);
    }

    pub fn next_page(&mut self) {
        self.paginator.next_page();
    }

    pub fn prev_page(&mut self) {
        self.paginator.prev_page();
    }

    pub fn first_page(&mut self) {
        self.paginator.first_page();
    }

    pub fn last_page(&mut self) {
        self.paginator.last_page();
    }

    /// Drops search and page position so a remounted view starts fresh.
    pub fn reset(&mut self) {
        self.filter.set_term("");
        self.paginator.reset();
    }

    pub fn attach(&mut self, viewport_height: usize) {
        self.estimator.attach(viewport_height);
    }

    pub fn detach(&mut self) {
        self.estimator.detach();
    }

    pub fn on_resize(&mut self, viewport_height: usize, now: Instant) {
        self.estimator.on_resize(viewport_height, now);
    }

    /// True when a debounced resize fired.
    pub fn poll_resize(&mut self, now: Instant) -> bool {
        self.estimator.poll(now).is_some()
    }

    pub fn time_until_resize(&self, now: Instant) -> Option<Duration> {
        self.estimator.time_until_due(now)
    }

    /// All rows matching the current search term.
    pub fn filtered(&mut self) -> Arc<Vec<T>> {
        self.filter.apply(&self.rows)
    }

    pub fn state(&mut self) -> TableState<T> {
        let filtered = self.filter.apply(&self.rows);
        self.paginator.set_rows_per_page(self.estimator.rows());
        let page = self.paginator.paginate(&filtered);
        TableState {
            paginated_rows: page.rows,
            current_page: page.current_page,
            total_pages: page.total_pages,
            search_term: self.filter.term().to_string(),
            matching_rows: page.total_rows,
            rows_per_page: self.paginator.rows_per_page(),
        }
    }
}
