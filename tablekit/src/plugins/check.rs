//! Check marks on rows of any section.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::PluginError;
use crate::events::{Dispatcher, Event, EventKind};
use crate::extras::{Extras, Key};
use crate::node::{Row, Section};
use crate::plugin::{ConfigureContext, Plugin};
use crate::table::TableView;

/// `bool` on every row.
pub const CHECKED: Key<bool> = Key::new("checked");
/// Number of checked rows across all sections, in extensions.
pub const CHECKED_ROWS: Key<usize> = Key::new("checked_rows");

#[derive(Debug, Default)]
struct CheckState {
    checked: HashSet<(Section, String)>,
    dispatcher: Option<Dispatcher>,
}

/// Per-row check flag for head, body and footer rows.
#[derive(Debug, Default)]
pub struct RowCheck {
    state: Mutex<CheckState>,
}

impl RowCheck {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CheckState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_checked(&self, section: Section, raw_id: &str) -> bool {
        self.lock().checked.contains(&(section, raw_id.to_string()))
    }

    /// Flip a row's check mark and rebuild that row.
    pub fn toggle(&self, row: &Row) -> bool {
        let (next, dispatcher) = {
            let mut state = self.lock();
            let key = (row.section, row.raw_id.clone());
            let next = !state.checked.remove(&key);
            if next {
                state.checked.insert(key);
            }
            (next, state.dispatcher.clone())
        };
        if let Some(dispatcher) = dispatcher {
            dispatcher.dispatch(Event::update_row(row.section, row.index));
            dispatcher.dispatch(EventKind::UpdateExtensions);
        }
        next
    }

    /// Uncheck everything.
    pub fn reset_checks(&self) {
        let dispatcher = {
            let mut state = self.lock();
            state.checked.clear();
            state.dispatcher.clone()
        };
        if let Some(dispatcher) = dispatcher {
            dispatcher.dispatch(EventKind::UpdateRows);
            dispatcher.dispatch(EventKind::UpdateExtensions);
        }
    }
}

impl<T> Plugin<T> for RowCheck {
    fn name(&self) -> &str {
        "check-plugin"
    }

    fn configure(&self, cx: &ConfigureContext<'_, T>) -> Result<Extras, PluginError> {
        self.lock().dispatcher = cx.handle().dispatcher();
        Ok(Extras::new())
    }

    fn extend(&self, _view: &TableView<'_, T>) -> Extras {
        Extras::new().with(CHECKED_ROWS, self.lock().checked.len())
    }

    fn on_reset(&self) {
        self.lock().checked.clear();
    }

    fn on_create_row(&self, section: Section, row: &Row) -> Extras {
        Extras::new().with(CHECKED, self.is_checked(section, &row.raw_id))
    }
}
