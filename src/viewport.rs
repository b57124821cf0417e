use std::time::{Duration, Instant};

use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizingParams {
    pub reserved_height: usize,
    pub row_height: usize,
    pub min_rows: usize,
}

/// `max(min_rows, floor((viewport_height - reserved_height) / row_height))`.
/// A viewport smaller than the reserved area yields `min_rows`.
pub fn estimate_rows(viewport_height: usize, params: &SizingParams) -> usize {
    let usable = viewport_height.saturating_sub(params.reserved_height);
    std::cmp::max(params.min_rows, usable / params.row_height.max(1))
}

/// A single pending deadline. Re-arming replaces the previous deadline so a
/// burst of resizes fires once after the burst settles.
#[derive(Debug)]
struct DebounceTimer {
    window: Duration,
    pending: Option<(Instant, usize)>,
}

impl DebounceTimer {
    fn arm(&mut self, now: Instant, viewport_height: usize) {
        self.pending = Some((now + self.window, viewport_height));
    }

    fn fire(&mut self, now: Instant) -> Option<usize> {
        match self.pending {
            Some((deadline, height)) if deadline <= now => {
                self.pending = None;
                Some(height)
            }
            _ => None,
        }
    }

    fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.pending
            .map(|(deadline, _)| deadline.saturating_duration_since(now))
    }
}

/// Rows that fit the viewport, tracked across resizes.
///
/// The estimator only listens while attached. `detach` (also run on drop)
/// stops listening and cancels a pending recompute.
#[derive(Debug)]
pub struct RowCountEstimator {
    params: SizingParams,
    timer: DebounceTimer,
    rows: usize,
    attached: bool,
}

impl RowCountEstimator {
    pub fn new(params: SizingParams, debounce: Duration) -> Self {
        RowCountEstimator {
            params,
            timer: DebounceTimer {
                window: debounce,
                pending: None,
            },
            rows: params.min_rows,
            attached: false,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn has_pending(&self) -> bool {
        self.timer.pending.is_some()
    }

    /// Starts listening and measures the viewport right away.
    pub fn attach(&mut self, viewport_height: usize) -> usize {
        self.attached = true;
        self.recompute(viewport_height)
    }

    pub fn detach(&mut self) {
        if self.timer.cancel() {
            trace!("Cancelled pending resize recompute");
        }
        self.attached = false;
    }

    pub fn recompute(&mut self, viewport_height: usize) -> usize {
        self.rows = estimate_rows(viewport_height, &self.params);
        self.rows
    }

    pub fn on_resize(&mut self, viewport_height: usize, now: Instant) {
        if self.attached {
            self.timer.arm(now, viewport_height);
        }
    }

    /// Runs the pending recompute once its window has passed. Returns the new
    /// row count when it fired.
    pub fn poll(&mut self, now: Instant) -> Option<usize> {
        let height = self.timer.fire(now)?;
        let previous = self.rows;
        let rows = self.recompute(height);
        if rows != previous {
            debug!("Rows per page {} -> {} (viewport height {})", previous, rows, height);
        }
        Some(rows)
    }

    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.timer.time_until_due(now)
    }
}

impl Drop for RowCountEstimator {
    fn drop(&mut self) {
        self.detach();
    }
}
