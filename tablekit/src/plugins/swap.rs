//! Body row swapping.
//!
//! Swaps are recorded by identity and replayed on every body rebuild, so a
//! swapped pair stays swapped while its records keep their `raw_id`.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::PluginError;
use crate::events::{Dispatcher, Event};
use crate::extras::{Extras, Key};
use crate::node::{Row, Section};
use crate::plugin::{ConfigureContext, Plugin};
use crate::table::TableView;

/// Number of recorded swaps, in extensions.
pub const SWAPS: Key<usize> = Key::new("swaps");

#[derive(Debug, Default)]
struct SwapState {
    swaps: Vec<(String, String)>,
    dispatcher: Option<Dispatcher>,
}

#[derive(Debug, Default)]
pub struct RowSwap {
    state: Mutex<SwapState>,
}

impl RowSwap {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SwapState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Swap the positions of two body rows.
    pub fn swap(&self, a: &Row, b: &Row) {
        if a.raw_id == b.raw_id {
            return;
        }
        let dispatcher = {
            let mut state = self.lock();
            state.swaps.push((a.raw_id.clone(), b.raw_id.clone()));
            state.dispatcher.clone()
        };
        if let Some(dispatcher) = dispatcher {
            dispatcher.dispatch(Event::create_rows(Section::Body));
        }
    }

    /// Forget every swap and restore data order.
    pub fn reset_swaps(&self) {
        let dispatcher = {
            let mut state = self.lock();
            state.swaps.clear();
            state.dispatcher.clone()
        };
        if let Some(dispatcher) = dispatcher {
            dispatcher.dispatch(Event::create_rows(Section::Body));
        }
    }
}

impl<T> Plugin<T> for RowSwap {
    fn name(&self) -> &str {
        "swap-row"
    }

    fn configure(&self, cx: &ConfigureContext<'_, T>) -> Result<Extras, PluginError> {
        self.lock().dispatcher = cx.handle().dispatcher();
        Ok(Extras::new())
    }

    fn extend(&self, _view: &TableView<'_, T>) -> Extras {
        Extras::new().with(SWAPS, self.lock().swaps.len())
    }

    fn on_reset(&self) {
        self.lock().swaps.clear();
    }

    fn after_create_rows(&self, section: Section, rows: &mut Vec<Row>, _data: &[T]) {
        if section != Section::Body {
            return;
        }
        let state = self.lock();
        for (a, b) in &state.swaps {
            let pa = rows.iter().position(|row| &row.raw_id == a);
            let pb = rows.iter().position(|row| &row.raw_id == b);
            if let (Some(pa), Some(pb)) = (pa, pb) {
                rows.swap(pa, pb);
            }
        }
    }
}
