//! In-place record edits with reset to the original data.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::PluginError;
use crate::extras::{Extras, Key};
use crate::node::Row;
use crate::plugin::{ConfigureContext, Plugin};
use crate::table::{TableHandle, TableView};

/// Data indices edited since the last reset, in extensions.
pub const CHANGED_ROWS: Key<Vec<usize>> = Key::new("changed_rows");

struct ChangeState<T> {
    initial: Option<Vec<T>>,
    handle: Option<TableHandle<T>>,
    changed: BTreeSet<usize>,
}

/// Edits records behind body rows.
///
/// The data seen by the first `configure` is kept; [`Table::reset`] restores
/// it.
///
/// [`Table::reset`]: crate::Table::reset
pub struct RowChange<T> {
    state: Mutex<ChangeState<T>>,
}

impl<T: Clone + Send + Sync + 'static> RowChange<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ChangeState {
                initial: None,
                handle: None,
                changed: BTreeSet::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChangeState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the record behind `row` with `f(previous)`.
    ///
    /// Must not be called from inside a hook. Returns `false` if the row has
    /// no backing record or the table is gone.
    pub fn change(&self, row: &Row, f: impl FnOnce(&T) -> T) -> bool {
        let Some(data_index) = row.data_index else {
            return false;
        };
        let Some(handle) = self.lock().handle.clone() else {
            return false;
        };
        let changed = handle.update_data_item(data_index, |item| *item = f(item));
        if changed {
            self.lock().changed.insert(data_index);
        }
        changed
    }

    /// [`change`](Self::change), then wait for the rebuild.
    pub async fn change_and_wait(&self, row: &Row, f: impl FnOnce(&T) -> T) -> bool {
        let changed = self.change(row, f);
        let handle = self.lock().handle.clone();
        if let Some(handle) = handle {
            handle.wait_for_updates().await;
        }
        changed
    }

    pub fn changed(&self) -> Vec<usize> {
        self.lock().changed.iter().copied().collect()
    }
}

impl<T: Clone + Send + Sync + 'static> Default for RowChange<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> Plugin<T> for RowChange<T> {
    fn name(&self) -> &str {
        "change-plugin"
    }

    fn configure(&self, cx: &ConfigureContext<'_, T>) -> Result<Extras, PluginError> {
        let mut state = self.lock();
        if state.initial.is_none() {
            state.initial = Some(cx.data().to_vec());
        }
        state.handle = Some(cx.handle().clone());
        Ok(Extras::new())
    }

    fn extend(&self, _view: &TableView<'_, T>) -> Extras {
        Extras::new().with(CHANGED_ROWS, self.changed())
    }

    fn on_reset(&self) {
        let (initial, handle) = {
            let mut state = self.lock();
            state.changed.clear();
            (state.initial.clone(), state.handle.clone())
        };
        if let (Some(initial), Some(handle)) = (initial, handle) {
            handle.set_data(initial);
        }
    }
}
