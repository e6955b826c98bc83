//! Row selection.

use crate::error::PluginError;
use crate::extras::{Extras, Key};
use crate::node::{Row, Section};
use crate::plugin::{ConfigureContext, Plugin};
use crate::table::TableView;

use super::row_set::{FlagKeys, RowFlags};

/// `bool` on body rows.
pub const SELECTED: Key<bool> = Key::new("selected");
/// `bool` on head rows and in extensions.
pub const IS_ALL_SELECTED: Key<bool> = Key::new("is_all_selected");
/// `bool` on head rows and in extensions.
pub const HAS_SELECTED_ROWS: Key<bool> = Key::new("has_selected_rows");
/// Selected raw IDs in body order, in extensions.
pub const SELECTED_ROWS: Key<Vec<String>> = Key::new("selected_rows");

/// Tracks selected body rows by identity.
#[derive(Debug)]
pub struct RowSelection {
    flags: RowFlags,
}

impl RowSelection {
    pub fn new() -> Self {
        Self {
            flags: RowFlags::new(FlagKeys {
                row: SELECTED,
                all: IS_ALL_SELECTED,
                any: HAS_SELECTED_ROWS,
                list: SELECTED_ROWS,
            }),
        }
    }

    /// Toggle a body row, or force it with `Some(value)`. Returns the new
    /// state.
    pub fn toggle(&self, row: &Row, value: Option<bool>) -> bool {
        self.flags.toggle(row, value)
    }

    pub fn select_all(&self) {
        self.flags.set_all();
    }

    pub fn reset_selections(&self) {
        self.flags.reset();
    }

    pub fn is_selected(&self, raw_id: &str) -> bool {
        self.flags.contains(raw_id)
    }

    /// Selected raw IDs in body order.
    pub fn selected(&self) -> Vec<String> {
        self.flags.ids()
    }

    pub fn has_selected_rows(&self) -> bool {
        self.flags.any()
    }

    pub fn is_all_selected(&self) -> bool {
        self.flags.all()
    }
}

impl Default for RowSelection {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Plugin<T> for RowSelection {
    fn name(&self) -> &str {
        "row-select-plugin"
    }

    fn configure(&self, cx: &ConfigureContext<'_, T>) -> Result<Extras, PluginError> {
        self.flags.attach(cx.handle().dispatcher());
        log::debug!("row-select-plugin configured");
        Ok(Extras::new())
    }

    fn extend(&self, view: &TableView<'_, T>) -> Extras {
        self.flags.extend(view.body())
    }

    fn on_reset(&self) {
        self.flags.clear_silently();
    }

    fn on_create_row(&self, section: Section, row: &Row) -> Extras {
        self.flags.row_extras(section, row)
    }

    fn before_create_rows(&self, section: Section, _data: &[T]) {
        self.flags.before_rows(section);
    }

    fn after_create_rows(&self, section: Section, rows: &mut Vec<Row>, _data: &[T]) {
        if section == Section::Body {
            self.flags.after_body_rebuilt(rows);
        }
    }
}
