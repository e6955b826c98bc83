//! Hidden body rows.
//!
//! Hiding only annotates rows; the presentation layer decides what hidden
//! means.

use crate::error::PluginError;
use crate::extras::{Extras, Key};
use crate::node::{Row, Section};
use crate::plugin::{ConfigureContext, Plugin};
use crate::table::TableView;

use super::row_set::{FlagKeys, RowFlags};

/// `bool` on body rows.
pub const HIDDEN: Key<bool> = Key::new("hidden");
/// `bool` on head rows and in extensions.
pub const IS_ALL_HIDDEN: Key<bool> = Key::new("is_all_hidden");
/// `bool` on head rows and in extensions.
pub const HAS_HIDDEN: Key<bool> = Key::new("has_hidden");
/// Hidden raw IDs in body order, in extensions.
pub const HIDDEN_ROWS: Key<Vec<String>> = Key::new("hidden_rows");

#[derive(Debug)]
pub struct RowHidden {
    flags: RowFlags,
}

impl RowHidden {
    pub fn new() -> Self {
        Self {
            flags: RowFlags::new(FlagKeys {
                row: HIDDEN,
                all: IS_ALL_HIDDEN,
                any: HAS_HIDDEN,
                list: HIDDEN_ROWS,
            }),
        }
    }

    pub fn toggle(&self, row: &Row, value: Option<bool>) -> bool {
        self.flags.toggle(row, value)
    }

    pub fn hide_all(&self) {
        self.flags.set_all();
    }

    pub fn reset_hidden(&self) {
        self.flags.reset();
    }

    pub fn is_hidden(&self, raw_id: &str) -> bool {
        self.flags.contains(raw_id)
    }

    pub fn hidden(&self) -> Vec<String> {
        self.flags.ids()
    }
}

impl Default for RowHidden {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Plugin<T> for RowHidden {
    fn name(&self) -> &str {
        "hidden-row-plugin"
    }

    fn configure(&self, cx: &ConfigureContext<'_, T>) -> Result<Extras, PluginError> {
        self.flags.attach(cx.handle().dispatcher());
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
