//! Body filtering.
//!
//! The filter narrows the presented body (`custom_body`); `body` keeps one row
//! per record so row-keyed plugins keep seeing every record.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::error::PluginError;
use crate::events::{Dispatcher, EventKind};
use crate::extras::{Extras, Key};
use crate::node::Row;
use crate::plugin::{ConfigureContext, Plugin, priority};
use crate::table::TableView;

/// Serialized criteria, in extensions.
pub const CRITERIA: Key<Value> = Key::new("criteria");
/// Rows left after filtering, in extensions.
pub const FILTERED_ROWS: Key<usize> = Key::new("filtered_rows");

type Predicate<T, C> = Arc<dyn Fn(&T, &C, &Row) -> bool + Send + Sync>;

struct FilterState<C> {
    criteria: C,
    visible: usize,
    dispatcher: Option<Dispatcher>,
    pending: Option<JoinHandle<()>>,
}

/// Keeps body rows whose record matches the current criteria.
pub struct Filter<T, C> {
    predicate: Predicate<T, C>,
    debounce: Option<Duration>,
    state: Mutex<FilterState<C>>,
}

impl<T, C> Filter<T, C>
where
    C: Clone + Serialize + Send + Sync + 'static,
{
    pub fn new<F>(initial: C, predicate: F) -> Self
    where
        F: Fn(&T, &C, &Row) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
            debounce: None,
            state: Mutex::new(FilterState {
                criteria: initial,
                visible: 0,
                dispatcher: None,
                pending: None,
            }),
        }
    }

    /// Delay re-filtering until criteria stop changing for `delay`.
    pub fn debounce(mut self, delay: Duration) -> Self {
        self.debounce = Some(delay).filter(|d| !d.is_zero());
        self
    }

    fn lock(&self) -> MutexGuard<'_, FilterState<C>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn criteria(&self) -> C {
        self.lock().criteria.clone()
    }

    /// Replace the criteria.
    pub fn filter(&self, criteria: C) {
        self.filter_with(|_| criteria);
    }

    /// Derive new criteria from the current ones.
    pub fn filter_with(&self, f: impl FnOnce(&C) -> C) {
        let mut state = self.lock();
        state.criteria = f(&state.criteria);
        let Some(dispatcher) = state.dispatcher.clone() else {
            return;
        };
        dispatcher.dispatch(EventKind::UpdateExtensions);

        if let Some(pending) = state.pending.take() {
            pending.abort();
        }
        match (self.debounce, Handle::try_current()) {
            (Some(delay), Ok(runtime)) => {
                state.pending = Some(runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    dispatcher.dispatch(EventKind::UpdateCustomBody);
                }));
            }
            _ => dispatcher.dispatch(EventKind::UpdateCustomBody),
        }
    }
}

impl<T, C> Plugin<T> for Filter<T, C>
where
    T: Send + Sync + 'static,
    C: Clone + Serialize + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        "filter-plugin"
    }

    fn priority(&self) -> i32 {
        priority::HIGHEST
    }

    fn configure(&self, cx: &ConfigureContext<'_, T>) -> Result<Extras, PluginError> {
        self.lock().dispatcher = cx.handle().dispatcher();
        Ok(Extras::new())
    }

    fn extend(&self, _view: &TableView<'_, T>) -> Extras {
        let state = self.lock();
        Extras::new()
            .with(CRITERIA, serde_json::to_value(&state.criteria).unwrap_or_default())
            .with(FILTERED_ROWS, state.visible)
    }

    fn on_update_custom_body(&self, rows: &mut Vec<Arc<Row>>, data: &[T]) {
        let mut state = self.lock();
        rows.retain(|row| {
            row.data_index
                .and_then(|index| data.get(index))
                .is_none_or(|item| (self.predicate)(item, &state.criteria, row))
        });
        state.visible = rows.len();
    }
}
