//! Paging over the presented body.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::PluginError;
use crate::events::{Dispatcher, EventKind};
use crate::extras::{Extras, Key};
use crate::node::Row;
use crate::plugin::{ConfigureContext, Plugin, priority};
use crate::table::TableView;

/// 1-based current page.
pub const PAGE: Key<usize> = Key::new("page");
/// Rows per page; 0 shows everything.
pub const PAGE_SIZE: Key<usize> = Key::new("page_size");
pub const TOTAL_ITEMS: Key<usize> = Key::new("total_items");
pub const TOTAL_PAGES: Key<usize> = Key::new("total_pages");

#[derive(Debug, Default)]
struct PageState {
    page: usize,
    page_size: usize,
    total_items: usize,
    total_pages: usize,
    /// Whether `total_items` has been counted at least once.
    counted: bool,
    dispatcher: Option<Dispatcher>,
}

impl PageState {
    fn effective_size(&self) -> usize {
        if self.page_size == 0 {
            self.total_items.max(1)
        } else {
            self.page_size
        }
    }

    fn recount(&mut self, total_items: usize) {
        if self.counted && total_items != self.total_items {
            self.page = 1;
        }
        self.counted = true;
        self.total_items = total_items;
        self.total_pages = total_items.div_ceil(self.effective_size());
        self.page = self.page.clamp(1, self.total_pages.max(1));
    }
}

/// Slices the presented body into pages. Runs after every other plugin so it
/// pages over the filtered rows.
#[derive(Debug)]
pub struct Pagination {
    state: Mutex<PageState>,
}

impl Pagination {
    pub fn new(page_size: usize) -> Self {
        Self {
            state: Mutex::new(PageState {
                page: 1,
                page_size,
                ..PageState::default()
            }),
        }
    }

    /// Start on `page` instead of the first one.
    pub fn starting_at(self, page: usize) -> Self {
        self.lock().page = page.max(1);
        self
    }

    fn lock(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, f: impl FnOnce(&mut PageState) -> bool) -> bool {
        let (changed, dispatcher) = {
            let mut state = self.lock();
            (f(&mut state), state.dispatcher.clone())
        };
        if changed && let Some(dispatcher) = dispatcher {
            dispatcher.dispatch(EventKind::UpdateCustomBody);
            dispatcher.dispatch(EventKind::UpdateExtensions);
        }
        changed
    }

    pub fn page(&self) -> usize {
        self.lock().page
    }

    pub fn page_size(&self) -> usize {
        self.lock().page_size
    }

    pub fn total_items(&self) -> usize {
        self.lock().total_items
    }

    pub fn total_pages(&self) -> usize {
        self.lock().total_pages
    }

    pub fn next_page(&self) -> bool {
        self.update(|s| {
            if s.page >= s.total_pages {
                return false;
            }
            s.page += 1;
            true
        })
    }

    pub fn prev_page(&self) -> bool {
        self.update(|s| {
            if s.page <= 1 {
                return false;
            }
            s.page -= 1;
            true
        })
    }

    /// Jump to `page`. Out-of-range pages are ignored.
    pub fn set_page(&self, page: usize) -> bool {
        self.update(|s| {
            if page < 1 || page > s.total_pages || page == s.page {
                return false;
            }
            s.page = page;
            true
        })
    }

    pub fn first_page(&self) -> bool {
        self.set_page(1)
    }

    pub fn last_page(&self) -> bool {
        let last = self.total_pages();
        self.set_page(last)
    }

    /// Change the page size and go back to the first page.
    pub fn set_page_size(&self, page_size: usize) -> bool {
        self.update(|s| {
            if s.page_size == page_size {
                return false;
            }
            s.page_size = page_size;
            s.page = 1;
            true
        })
    }
}

impl<T> Plugin<T> for Pagination {
    fn name(&self) -> &str {
        "pagination-plugin"
    }

    fn priority(&self) -> i32 {
        priority::SHOULD_BE_LAST
    }

    fn configure(&self, cx: &ConfigureContext<'_, T>) -> Result<Extras, PluginError> {
        self.lock().dispatcher = cx.handle().dispatcher();
        Ok(Extras::new())
    }

    fn extend(&self, _view: &TableView<'_, T>) -> Extras {
        let state = self.lock();
        Extras::new()
            .with(PAGE, state.page)
            .with(PAGE_SIZE, state.page_size)
            .with(TOTAL_ITEMS, state.total_items)
            .with(TOTAL_PAGES, state.total_pages)
    }

    fn on_update_custom_body(&self, rows: &mut Vec<Arc<Row>>, _data: &[T]) {
        let mut state = self.lock();
        state.recount(rows.len());
        let size = state.effective_size();
        let start = (state.page - 1) * size;
        let end = (start + size).min(rows.len());
        *rows = rows.get(start..end).map(<[_]>::to_vec).unwrap_or_default();
    }
}
