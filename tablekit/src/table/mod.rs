//! The table facade.
//!
//! [`Table`] owns the data, columns and plugins, the built sections and the
//! event scheduler. Mutations go through `dispatch` (or a setter that
//! dispatches for you); the rebuild happens in a single flush on the tokio
//! runtime. [`Table::wait_for_updates`] resolves once that flush is done.

mod builder;
mod options;
mod plan;
mod process;
mod state;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use crate::column::Column;
use crate::error::TableError;
use crate::events::{Dispatcher, Event, EventKind, EventScheduler};
use crate::extras::Extras;
use crate::node::Row;
use crate::observer::{LogObserver, TableObserver};
use crate::plugin::{PluginRef, sort_plugins};

pub use options::{GetId, OptionsPatch, TableOptions};
pub use state::TableView;

use process::configure_all;
use state::TableState;

/// Identifies a subscription returned by [`Table::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(usize);

type Subscriber = Arc<dyn Fn(u64) + Send + Sync>;

pub(crate) struct Shared<T> {
    state: RwLock<TableState<T>>,
    scheduler: Arc<EventScheduler>,
    subscribers: Mutex<Vec<(SubscriptionId, Subscriber)>>,
    next_subscription: AtomicUsize,
    observer: Arc<dyn TableObserver>,
}

impl<T> Shared<T> {
    fn read_state(&self) -> RwLockReadGuard<'_, TableState<T>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, TableState<T>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify_subscribers(&self, revision: u64) {
        let subscribers: Vec<Subscriber> = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, f)| Arc::clone(f))
            .collect();
        for subscriber in subscribers {
            subscriber(revision);
        }
    }

    fn set_data(&self, data: Vec<T>) {
        self.write_state().data = data;
        self.scheduler.dispatch(Event::new(EventKind::UpdateData));
    }

    fn update_data_item(&self, index: usize, f: impl FnOnce(&mut T)) -> bool {
        {
            let mut state = self.write_state();
            let Some(item) = state.data.get_mut(index) else {
                return false;
            };
            f(item);
        }
        self.scheduler.dispatch(Event::update_data_item(index));
        true
    }
}

/// A headless table.
///
/// Cloning is cheap and yields another handle to the same table.
pub struct Table<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Table<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send + Sync + 'static> Table<T> {
    /// Build a table and configure its plugins.
    ///
    /// Fails if `get_id` is missing or a plugin fails to configure. The first
    /// flush is scheduled immediately; await [`wait_for_updates`] to read the
    /// built sections.
    ///
    /// [`wait_for_updates`]: Table::wait_for_updates
    pub fn new(options: TableOptions<T>) -> Result<Self, TableError> {
        let TableOptions {
            data,
            columns,
            mut plugins,
            get_id,
            label,
            observer,
            initial_events,
        } = options;
        let get_id = get_id.ok_or(TableError::MissingGetId)?;
        let observer: Arc<dyn TableObserver> =
            observer.unwrap_or_else(|| Arc::new(LogObserver::new(label)));
        sort_plugins(&mut plugins);

        let shared = Arc::new_cyclic(|weak: &Weak<Shared<T>>| {
            let weak = weak.clone();
            let scheduler = EventScheduler::new(
                move |batch| {
                    if let Some(shared) = weak.upgrade() {
                        process::process(&shared, batch);
                    }
                },
                Arc::clone(&observer),
            );
            Shared {
                state: RwLock::new(TableState::new(data, columns, get_id, plugins)),
                scheduler,
                subscribers: Mutex::new(Vec::new()),
                next_subscription: AtomicUsize::new(0),
                observer,
            }
        });
        let table = Self { shared };

        let handle = table.handle();
        let config = {
            let state = table.shared.read_state();
            configure_all(&state.plugins, &handle, &state.data, &state.columns)?
        };
        table.shared.write_state().config = config;

        for event in initial_events {
            table.dispatch(event);
        }
        Ok(table)
    }

    /// Weak handle for plugins and background tasks.
    pub fn handle(&self) -> TableHandle<T> {
        TableHandle::from_shared(&self.shared)
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(Arc::clone(&self.shared.scheduler))
    }

    /// Queue an event for the next flush.
    pub fn dispatch(&self, event: impl Into<Event>) {
        self.shared.scheduler.dispatch(event.into());
    }

    /// Replace the data and rebuild every section.
    pub fn set_data(&self, data: Vec<T>) {
        self.shared.set_data(data);
    }

    /// Mutate one record in place and rebuild its body row.
    ///
    /// Returns `false` if `index` is out of range.
    pub fn update_data_item(&self, index: usize, f: impl FnOnce(&mut T)) -> bool {
        self.shared.update_data_item(index, f)
    }

    /// Replace the columns.
    pub fn set_columns(&self, columns: Vec<Column<T>>) {
        self.shared.write_state().columns = columns;
        self.dispatch(EventKind::UpdateColumns);
    }

    /// Replace one column. Only its cells are rebuilt unless the header or
    /// footer layout changes.
    pub fn set_column(&self, index: usize, column: Column<T>) -> bool {
        {
            let mut state = self.shared.write_state();
            let Some(slot) = state.columns.get_mut(index) else {
                return false;
            };
            *slot = column;
        }
        self.dispatch(Event::update_column(index));
        true
    }

    /// Replace the plugins. They are configured before anything changes; on
    /// error the table keeps its current plugins.
    pub fn set_plugins(&self, plugins: Vec<PluginRef<T>>) -> Result<(), TableError> {
        self.set_options(OptionsPatch::new().plugins(plugins))
    }

    /// Apply a partial set of options.
    ///
    /// New plugins are configured against the patched data and columns first;
    /// on error nothing is applied.
    pub fn set_options(&self, patch: OptionsPatch<T>) -> Result<(), TableError> {
        if patch.is_empty() {
            return Ok(());
        }
        let OptionsPatch {
            data,
            columns,
            plugins,
            get_id,
        } = patch;
        let handle = self.handle();
        let mut events = Vec::new();
        {
            let mut state = self.shared.write_state();
            let plugins = match plugins {
                Some(mut plugins) => {
                    sort_plugins(&mut plugins);
                    let config = configure_all(
                        &plugins,
                        &handle,
                        data.as_deref().unwrap_or(&state.data[..]),
                        columns.as_deref().unwrap_or(&state.columns[..]),
                    )?;
                    Some((plugins, config))
                }
                None => None,
            };

            if let Some(data) = data {
                state.data = data;
                events.push(EventKind::UpdateData);
            }
            if let Some(columns) = columns {
                state.columns = columns;
                events.push(EventKind::UpdateColumns);
            }
            if let Some(get_id) = get_id {
                state.get_id = get_id;
                events.push(EventKind::UpdateAll);
            }
            if let Some((plugins, config)) = plugins {
                state.plugins = plugins;
                state.config = config;
                events.push(EventKind::UpdatePlugins);
            }
        }
        for kind in events {
            self.dispatch(kind);
        }
        Ok(())
    }

    /// Drop queued work, let plugins reset their state, and rebuild
    /// everything synchronously.
    pub fn reset(&self) {
        let scheduler = &self.shared.scheduler;
        scheduler.cancel_next_process();
        scheduler.clear();

        let plugins = self.shared.read_state().plugins.clone();
        for plugin in &plugins {
            plugin.on_reset();
        }

        scheduler.dispatch(Event::new(EventKind::UpdateAll));
        scheduler.flush();
    }

    /// Resolve once no flush is scheduled or running.
    pub async fn wait_for_updates(&self) {
        self.shared.scheduler.wait_idle().await;
    }

    /// Run a pending flush on the calling thread.
    ///
    /// Only needed without a tokio runtime; inside one, flushes run on their
    /// own.
    pub fn flush(&self) {
        self.shared.scheduler.flush();
    }

    /// Whether a flush is scheduled or running.
    pub fn is_pending(&self) -> bool {
        self.shared.scheduler.is_pending()
    }

    pub fn mount(&self) {
        self.dispatch(EventKind::Mount);
    }

    pub fn unmount(&self) {
        self.dispatch(EventKind::Unmount);
    }

    pub fn is_mounted(&self) -> bool {
        self.shared.read_state().mounted
    }

    /// Call `f` with the new revision after every committed flush.
    pub fn subscribe<F>(&self, f: F) -> SubscriptionId
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.shared.next_subscription.fetch_add(1, Ordering::SeqCst));
        self.shared
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(f)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self
            .shared
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|(sub, _)| *sub != id);
        subscribers.len() != before
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Run `f` against a consistent snapshot.
    pub fn read<R>(&self, f: impl FnOnce(TableView<'_, T>) -> R) -> R {
        let state = self.shared.read_state();
        f(state.view())
    }

    pub fn head(&self) -> Vec<Arc<Row>> {
        self.shared.read_state().head.clone()
    }

    pub fn body(&self) -> Vec<Arc<Row>> {
        self.shared.read_state().body.clone()
    }

    pub fn footer(&self) -> Vec<Arc<Row>> {
        self.shared.read_state().footer.clone()
    }

    /// The body after plugin narrowing (filtering, pagination).
    pub fn custom_body(&self) -> Vec<Arc<Row>> {
        self.shared.read_state().custom_body.clone()
    }

    pub fn config(&self) -> Extras {
        self.shared.read_state().config.clone()
    }

    pub fn extensions(&self) -> Extras {
        self.shared.read_state().extensions.clone()
    }

    pub fn revision(&self) -> u64 {
        self.shared.read_state().revision
    }

    pub fn len(&self) -> usize {
        self.shared.read_state().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn columns_len(&self) -> usize {
        self.shared.read_state().columns.len()
    }

    pub fn plugin_names(&self) -> Vec<String> {
        self.shared
            .read_state()
            .plugins
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    pub fn data(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.shared.read_state().data.clone()
    }
}

impl<T> std::fmt::Debug for Table<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.read_state();
        f.debug_struct("Table")
            .field("revision", &state.revision)
            .field("rows", &state.data.len())
            .field("columns", &state.columns.len())
            .field("plugins", &state.plugins.len())
            .finish_non_exhaustive()
    }
}

/// Weak handle to a table.
///
/// Plugins receive one in `configure`. Every method is a no-op once the table
/// is dropped.
///
/// `set_data`, `update_data_item` and `read` take the table's state lock:
/// calling them from inside a hook (other than `on_reset`) deadlocks. Use
/// `dispatch` there, or call them from a spawned task.
pub struct TableHandle<T> {
    shared: Weak<Shared<T>>,
}

impl<T> Clone for TableHandle<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Weak::clone(&self.shared),
        }
    }
}

impl<T> std::fmt::Debug for TableHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableHandle")
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl<T> TableHandle<T> {
    pub(crate) fn from_shared(shared: &Arc<Shared<T>>) -> Self {
        Self {
            shared: Arc::downgrade(shared),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.shared.strong_count() > 0
    }

    /// Upgrade to a full table.
    pub fn table(&self) -> Option<Table<T>> {
        self.shared.upgrade().map(|shared| Table { shared })
    }

    pub fn dispatch(&self, event: impl Into<Event>) {
        if let Some(shared) = self.shared.upgrade() {
            shared.scheduler.dispatch(event.into());
        }
    }

    pub fn dispatcher(&self) -> Option<Dispatcher> {
        self.shared
            .upgrade()
            .map(|shared| Dispatcher::new(Arc::clone(&shared.scheduler)))
    }

    pub fn set_data(&self, data: Vec<T>) {
        if let Some(shared) = self.shared.upgrade() {
            shared.set_data(data);
        }
    }

    pub fn update_data_item(&self, index: usize, f: impl FnOnce(&mut T)) -> bool {
        self.shared
            .upgrade()
            .is_some_and(|shared| shared.update_data_item(index, f))
    }

    pub fn read<R>(&self, f: impl FnOnce(TableView<'_, T>) -> R) -> Option<R> {
        let shared = self.shared.upgrade()?;
        let state = shared.read_state();
        Some(f(state.view()))
    }

    pub async fn wait_for_updates(&self) {
        let scheduler = self
            .shared
            .upgrade()
            .map(|shared| Arc::clone(&shared.scheduler));
        if let Some(scheduler) = scheduler {
            scheduler.wait_idle().await;
        }
    }
}
