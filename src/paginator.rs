use std::ops::Range;
use std::sync::Arc;

use tracing::trace;

/// `ceil(len / rows_per_page)`, zero for an empty collection.
pub fn total_pages(len: usize, rows_per_page: usize) -> usize {
    len.div_ceil(rows_per_page.max(1))
}

/// Index range of a 1-based page, clipped to the collection. Pages past the
/// end give an empty range.
pub fn page_range(len: usize, rows_per_page: usize, page: usize) -> Range<usize> {
    let rows_per_page = rows_per_page.max(1);
    let start = page
        .saturating_sub(1)
        .saturating_mul(rows_per_page)
        .min(len);
    let end = start.saturating_add(rows_per_page).min(len);
    start..end
}

#[derive(Debug, Clone)]
pub struct PageView<T> {
    pub rows: Arc<Vec<T>>,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_rows: usize,
}

struct PageCache<T> {
    source: Arc<Vec<T>>,
    rows_per_page: usize,
    page: usize,
    rows: Arc<Vec<T>>,
}

pub struct Paginator<T> {
    rows_per_page: usize,
    current_page: usize,
    total_pages: usize,
    // (collection length, rows per page) seen by the last sync
    shape: Option<(usize, usize)>,
    cache: Option<PageCache<T>>,
}

impl<T: Clone> Paginator<T> {
    pub fn new(rows_per_page: usize) -> Self {
        Paginator {
            rows_per_page: rows_per_page.max(1),
            current_page: 1,
            total_pages: 0,
            shape: None,
            cache: None,
        }
    }

    pub fn rows_per_page(&self) -> usize {
        self.rows_per_page
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn set_rows_per_page(&mut self, rows_per_page: usize) {
        self.rows_per_page = rows_per_page.max(1);
    }

    /// Moves to `page`, clamped into `[1, total_pages]`.
    pub fn set_current_page(&mut self, page: usize) {
        self.current_page = page.clamp(1, self.total_pages.max(1));
    }

    pub fn next_page(&mut self) {
        self.set_current_page(self.current_page.saturating_add(1));
    }

    pub fn prev_page(&mut self) {
        self.set_current_page(self.current_page.saturating_sub(1));
    }

    pub fn first_page(&mut self) {
        self.set_current_page(1);
    }

    pub fn last_page(&mut self) {
        self.set_current_page(self.total_pages);
    }

    /// Back to page 1 with no remembered collection shape.
    pub fn reset(&mut self) {
        self.current_page = 1;
        self.total_pages = 0;
        self.shape = None;
    }

    /// The rows of the current page of `rows`.
    pub fn paginate(&mut self, rows: &Arc<Vec<T>>) -> PageView<T> {
        self.sync(rows.len());

        let page_rows = match &self.cache {
            Some(cache)
                if Arc::ptr_eq(&cache.source, rows)
                    && cache.rows_per_page == self.rows_per_page
                    && cache.page == self.current_page =>
            {
                Arc::clone(&cache.rows)
            }
            _ => {
                let range = page_range(rows.len(), self.rows_per_page, self.current_page);
                let page_rows = Arc::new(rows[range].to_vec());
                self.cache = Some(PageCache {
                    source: Arc::clone(rows),
                    rows_per_page: self.rows_per_page,
                    page: self.current_page,
                    rows: Arc::clone(&page_rows),
                });
                page_rows
            }
        };

        PageView {
            rows: page_rows,
            current_page: self.current_page,
            total_pages: self.total_pages,
            total_rows: rows.len(),
        }
    }

    fn sync(&mut self, len: usize) {
        self.total_pages = total_pages(len, self.rows_per_page);
        let shape = (len, self.rows_per_page);
        if self.shape != Some(shape) {
            if self.shape.is_some() && self.current_page != 1 {
                trace!(
                    "Collection or page size changed to {:?}, back to page 1",
                    shape
                );
            }
            self.current_page = 1;
            self.shape = Some(shape);
        }
        if self.current_page > self.total_pages {
            self.current_page = self.total_pages.max(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(n: usize) -> Arc<Vec<usize>> {
        Arc::new((0..n).collect())
    }

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(1, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(23, 10), 3);
    }

    #[test]
    fn slice_lengths_stay_in_bounds() {
        for n in 0..40 {
            for p in 1..12 {
                for k in 1..=total_pages(n, p) {
                    let range = page_range(n, p, k);
                    assert_eq!(range.len(), p.min(n - (k - 1) * p), "n={n} p={p} k={k}");
                }
                assert!(page_range(n, p, total_pages(n, p) + 1).is_empty());
            }
        }
    }

    #[test]
    fn empty_collection_reports_page_one() {
        let mut pager = Paginator::new(10);
        let view = pager.paginate(&numbers(0));
        assert_eq!(view.current_page, 1);
        assert_eq!(view.total_pages, 0);
        assert!(view.rows.is_empty());
    }

    #[test]
    fn shrinking_collection_resets_to_first_page() {
        let mut pager = Paginator::new(10);
        let rows = numbers(50);
        pager.paginate(&rows);
        pager.set_current_page(5);
        let view = pager.paginate(&rows);
        assert_eq!(view.current_page, 5);
        assert_eq!(*view.rows, (40..50).collect::<Vec<_>>());

        let view = pager.paginate(&numbers(5));
        assert_eq!(view.current_page, 1);
        assert_eq!(view.total_pages, 1);
        assert_eq!(view.rows.len(), 5);
    }

    #[test]
    fn page_size_change_resets_to_first_page() {
        let mut pager = Paginator::new(10);
        let rows = numbers(50);
        pager.paginate(&rows);
        pager.set_current_page(3);
        pager.set_rows_per_page(25);
        let view = pager.paginate(&rows);
        assert_eq!(view.current_page, 1);
        assert_eq!(view.total_pages, 2);
    }

    #[test]
    fn setter_clamps_out_of_range_pages() {
        let mut pager = Paginator::new(10);
        let rows = numbers(23);
        pager.paginate(&rows);
        pager.set_current_page(99);
        assert_eq!(pager.current_page(), 3);
        pager.set_current_page(0);
        assert_eq!(pager.current_page(), 1);
        pager.prev_page();
        assert_eq!(pager.current_page(), 1);
        pager.last_page();
        let view = pager.paginate(&rows);
        assert_eq!(*view.rows, vec![20, 21, 22]);
    }

    #[test]
    fn identical_inputs_reuse_the_page() {
        let mut pager = Paginator::new(10);
        let rows = numbers(30);
        let first = pager.paginate(&rows);
        let second = pager.paginate(&rows);
        assert!(Arc::ptr_eq(&first.rows, &second.rows));
        pager.next_page();
        let third = pager.paginate(&rows);
        assert!(!Arc::ptr_eq(&first.rows, &third.rows));
        assert_eq!(third.rows[0], 10);
    }
}
