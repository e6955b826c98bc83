//! The plugin contract.
//!
//! A plugin is a set of optional hooks called at every stage of a flush. Only
//! [`Plugin::name`] and [`Plugin::configure`] must be implemented.
//!
//! # Ordering
//!
//! Plugins are stable-sorted by descending [`Plugin::priority`] when the table
//! receives them. Every hook runs in that order.
//!
//! # Merging
//!
//! - Cell and row bags returned by `on_create_*` hooks merge in hook order;
//!   a later hook overwrites an earlier hook's key.
//! - `config` and `extensions` are owned by priority: when two plugins return
//!   the same key, the higher-priority plugin's value is kept.
//!
//! # Re-entrancy
//!
//! Hooks run while the table's state is locked. They may dispatch events
//! (through a [`Dispatcher`](crate::events::Dispatcher) or a
//! [`TableHandle`]), but must not call data-mutating or reading table methods.
//! [`Plugin::on_reset`] is the exception: it runs before the lock is taken.

use std::sync::Arc;

use crate::column::Column;
use crate::error::PluginError;
use crate::events::EventBatch;
use crate::extras::Extras;
use crate::node::{Cell, Row, Section};
use crate::table::{TableHandle, TableView};

/// Standard priorities. Higher runs earlier.
pub mod priority {
    pub const SHOULD_BE_FIRST: i32 = 10_000;
    pub const HIGHEST: i32 = 1_000;
    pub const DEFAULT: i32 = 100;
    pub const LOWEST: i32 = 10;
    pub const SHOULD_BE_LAST: i32 = 0;
}

/// Shared plugin pointer as stored by the table.
pub type PluginRef<T> = Arc<dyn Plugin<T>>;

/// What a plugin sees when it is configured.
pub struct ConfigureContext<'a, T> {
    handle: &'a TableHandle<T>,
    data: &'a [T],
    columns: &'a [Column<T>],
}

impl<'a, T> ConfigureContext<'a, T> {
    pub(crate) fn new(handle: &'a TableHandle<T>, data: &'a [T], columns: &'a [Column<T>]) -> Self {
        Self {
            handle,
            data,
            columns,
        }
    }

    /// Handle to the table. Clone it to keep it past `configure`.
    pub fn handle(&self) -> &TableHandle<T> {
        self.handle
    }

    pub fn data(&self) -> &[T] {
        self.data
    }

    pub fn columns(&self) -> &[Column<T>] {
        self.columns
    }
}

/// A table extension.
#[allow(unused_variables)]
pub trait Plugin<T>: Send + Sync {
    /// Stable name, used in logs and errors.
    fn name(&self) -> &str;

    fn priority(&self) -> i32 {
        priority::DEFAULT
    }

    /// Capture the table handle and contribute to `config`.
    ///
    /// Called when the table is created, when plugins are replaced, and on
    /// every `update:config` / `update:all`.
    fn configure(&self, cx: &ConfigureContext<'_, T>) -> Result<Extras, PluginError>;

    /// Contribute to `extensions`.
    fn extend(&self, view: &TableView<'_, T>) -> Extras {
        Extras::new()
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    fn on_mount(&self) {}

    fn on_unmount(&self) {}

    /// Drop plugin state. Runs outside the state lock.
    fn on_reset(&self) {}

    // -------------------------------------------------------------------------
    // Change notifications
    // -------------------------------------------------------------------------

    fn on_update_data(&self, data: &[T]) {}

    fn on_update_data_item(&self, data_index: usize, item: &T) {}

    fn on_update_columns(&self, columns: &[Column<T>]) {}

    fn on_update_column(&self, column_index: usize, column: &Column<T>) {}

    fn on_update_plugins(&self) {}

    fn on_update_config(&self, config: &Extras) {}

    fn on_update_extensions(&self, extensions: &Extras) {}

    /// Sees the batch being processed whenever it contains `update:events`.
    fn on_update_events(&self, batch: &EventBatch) {}

    // -------------------------------------------------------------------------
    // Creation
    // -------------------------------------------------------------------------

    fn before_create_rows(&self, section: Section, data: &[T]) {}

    /// Fields to merge into a freshly built row.
    fn on_create_row(&self, section: Section, row: &Row) -> Extras {
        Extras::new()
    }

    /// Fields to merge into a freshly built cell, before its value is computed.
    fn on_create_cell(&self, section: Section, cell: &Cell) -> Extras {
        Extras::new()
    }

    /// Observe or rearrange a rebuilt section. Rows may be reordered, dropped
    /// or annotated; positions are renumbered afterwards.
    fn after_create_rows(&self, section: Section, rows: &mut Vec<Row>, data: &[T]) {}

    // -------------------------------------------------------------------------
    // Update
    // -------------------------------------------------------------------------

    fn on_update_rows(&self, section: Section, rows: &mut [Row]) {}

    fn on_update_row(&self, section: Section, row: &mut Row) {}

    fn on_update_cell(&self, section: Section, cell: &mut Cell) {}

    /// Narrow or reorder the presented body.
    fn on_update_custom_body(&self, rows: &mut Vec<Arc<Row>>, data: &[T]) {}
}

/// Stable sort by descending priority.
pub(crate) fn sort_plugins<T>(plugins: &mut [PluginRef<T>]) {
    plugins.sort_by_key(|plugin| std::cmp::Reverse(plugin.priority()));
}

/// Merge `config`/`extensions` contributions so the higher-priority plugin
/// keeps a contested key. `parts` must be in hook order.
pub(crate) fn merge_by_priority(parts: Vec<Extras>) -> Extras {
    let mut merged = Extras::new();
    for part in parts.into_iter().rev() {
        merged.merge(part);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str, i32);

    impl Plugin<()> for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn priority(&self) -> i32 {
            self.1
        }

        fn configure(&self, _: &ConfigureContext<'_, ()>) -> Result<Extras, PluginError> {
            Ok(Extras::new())
        }
    }

    #[test]
    fn sort_is_descending_and_stable() {
        let mut plugins: Vec<PluginRef<()>> = vec![
            Arc::new(Named("a", 5)),
            Arc::new(Named("b", 10)),
            Arc::new(Named("c", 5)),
            Arc::new(Named("d", priority::SHOULD_BE_LAST)),
        ];
        sort_plugins(&mut plugins);
        let names: Vec<_> = plugins.iter().map(|p| p.name().to_string()).collect();
        assert_eq!(names, vec!["b", "a", "c", "d"]);
    }

    #[test]
    fn earlier_in_hook_order_owns_contested_keys() {
        let x = crate::extras::Key::<i32>::new("x");
        let merged = merge_by_priority(vec![
            Extras::new().with(x, 10),
            Extras::new().with(x, 5).with(crate::extras::Key::<i32>::new("y"), 1),
        ]);
        assert_eq!(merged.get(x), Some(10));
        assert_eq!(merged.len(), 2);
    }
}
