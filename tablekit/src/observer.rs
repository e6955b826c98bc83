//! Per-table instrumentation.
//!
//! Every table reports scheduling and flush activity to a [`TableObserver`].
//! The default [`LogObserver`] forwards to the `log` facade, tagged with the
//! table's label, so two tables in one process can be told apart.

use std::time::Duration;

use crate::events::{Event, EventBatch};

/// Summary of one completed flush.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Revision published by the flush.
    pub revision: u64,
    /// Whether every section was rebuilt from data.
    pub full: bool,
    pub rows_rebuilt: usize,
    pub cells_rebuilt: usize,
    pub config_changed: bool,
    pub extensions_changed: bool,
}

/// Receives scheduling and flush notifications for one table.
pub trait TableObserver: Send + Sync {
    /// An event was queued.
    fn on_dispatch(&self, _event: &Event) {}

    /// A flush is about to process `batch`.
    fn on_flush_start(&self, _batch: &EventBatch) {}

    /// A flush committed a new revision.
    fn on_flush_end(&self, _report: &FlushReport, _elapsed: Duration) {}

    /// A flush was aborted before committing.
    fn on_flush_error(&self, _error: &crate::TableError) {}
}

/// Observer that writes to the `log` facade.
#[derive(Debug, Clone)]
pub struct LogObserver {
    label: String,
}

impl LogObserver {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Default for LogObserver {
    fn default() -> Self {
        Self::new("table")
    }
}

impl TableObserver for LogObserver {
    fn on_dispatch(&self, event: &Event) {
        log::trace!("[{}] dispatch {}", self.label, event);
    }

    fn on_flush_start(&self, batch: &EventBatch) {
        if log::log_enabled!(log::Level::Debug) {
            let kinds: Vec<_> = batch.kinds().map(|k| k.as_str()).collect();
            log::debug!("[{}] process {:?}", self.label, kinds);
        }
    }

    fn on_flush_end(&self, report: &FlushReport, elapsed: Duration) {
        log::debug!(
            "[{}] revision {} in {:?} (full: {}, rows: {}, cells: {})",
            self.label,
            report.revision,
            elapsed,
            report.full,
            report.rows_rebuilt,
            report.cells_rebuilt
        );
    }

    fn on_flush_error(&self, error: &crate::TableError) {
        log::error!("[{}] process aborted: {}", self.label, error);
    }
}
