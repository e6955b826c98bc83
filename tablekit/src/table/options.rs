//! Table construction options.

use std::sync::Arc;

use crate::column::Column;
use crate::events::{Event, EventKind};
use crate::observer::TableObserver;
use crate::plugin::{Plugin, PluginRef};

/// Derives a record's stable identity.
pub type GetId<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;

/// Options for [`Table::new`](super::Table::new).
///
/// # Example
///
/// ```ignore
/// let table = Table::new(
///     TableOptions::new()
///         .data(users)
///         .get_id(|user: &User| user.id.to_string())
///         .column(Column::map(|user: &User| user.name.clone()).head_text("Name"))
///         .plugin(selection.clone()),
/// )?;
/// ```
pub struct TableOptions<T> {
    pub(crate) data: Vec<T>,
    pub(crate) columns: Vec<Column<T>>,
    pub(crate) plugins: Vec<PluginRef<T>>,
    pub(crate) get_id: Option<GetId<T>>,
    pub(crate) label: String,
    pub(crate) observer: Option<Arc<dyn TableObserver>>,
    pub(crate) initial_events: Vec<Event>,
}

impl<T> Default for TableOptions<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            columns: Vec::new(),
            plugins: Vec::new(),
            get_id: None,
            label: "table".to_string(),
            observer: None,
            initial_events: vec![Event::new(EventKind::UpdateAll)],
        }
    }
}

impl<T> TableOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(mut self, data: Vec<T>) -> Self {
        self.data = data;
        self
    }

    pub fn columns(mut self, columns: Vec<Column<T>>) -> Self {
        self.columns = columns;
        self
    }

    /// Append one column.
    pub fn column(mut self, column: Column<T>) -> Self {
        self.columns.push(column);
        self
    }

    /// Append a plugin. Keep a clone of the `Arc` to call its methods later.
    pub fn plugin<P: Plugin<T> + 'static>(mut self, plugin: Arc<P>) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn plugins(mut self, plugins: Vec<PluginRef<T>>) -> Self {
        self.plugins = plugins;
        self
    }

    /// Identity function for body rows. Required.
    pub fn get_id<F>(mut self, f: F) -> Self
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        self.get_id = Some(Arc::new(f));
        self
    }

    /// Label used by the default log observer.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Replace the default [`LogObserver`](crate::observer::LogObserver).
    pub fn observer(mut self, observer: Arc<dyn TableObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Events dispatched right after construction. Defaults to `update:all`.
    pub fn initial_events(mut self, events: Vec<Event>) -> Self {
        self.initial_events = events;
        self
    }
}

/// Partial replacement of a table's options, see
/// [`Table::set_options`](super::Table::set_options).
pub struct OptionsPatch<T> {
    pub(crate) data: Option<Vec<T>>,
    pub(crate) columns: Option<Vec<Column<T>>>,
    pub(crate) plugins: Option<Vec<PluginRef<T>>>,
    pub(crate) get_id: Option<GetId<T>>,
}

impl<T> Default for OptionsPatch<T> {
    fn default() -> Self {
        Self {
            data: None,
            columns: None,
            plugins: None,
            get_id: None,
        }
    }
}

impl<T> OptionsPatch<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(mut self, data: Vec<T>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn columns(mut self, columns: Vec<Column<T>>) -> Self {
        self.columns = Some(columns);
        self
    }

    pub fn plugins(mut self, plugins: Vec<PluginRef<T>>) -> Self {
        self.plugins = Some(plugins);
        self
    }

    pub fn get_id<F>(mut self, f: F) -> Self
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        self.get_id = Some(Arc::new(f));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_none() && self.columns.is_none() && self.plugins.is_none() && self.get_id.is_none()
    }
}
