//! Row and cell construction.

use crate::column::{Column, ColumnSlot, Composition};
use crate::node::{Cell, Row, Section};
use crate::plugin::PluginRef;

use super::options::GetId;
use super::state::TableView;

/// Builds rows and cells against one snapshot of the table's inputs.
pub(crate) struct Builder<'a, T> {
    pub plugins: &'a [PluginRef<T>],
    pub get_id: &'a GetId<T>,
    pub data: &'a [T],
    pub columns: &'a [Column<T>],
    pub composition: &'a Composition<T>,
}

impl<T> Builder<'_, T> {
    fn apply_cell_hooks(&self, section: Section, cell: &mut Cell) {
        for plugin in self.plugins {
            let extras = plugin.on_create_cell(section, cell);
            cell.extras.merge(extras);
        }
    }

    fn apply_row_hooks(&self, row: &mut Row) {
        for plugin in self.plugins {
            let extras = plugin.on_create_row(row.section, row);
            row.extras.merge(extras);
        }
    }

    /// Build the body cell for `column_index` of the record at `data_index`.
    pub fn body_cell(
        &self,
        data_index: usize,
        raw_id: &str,
        row_index: usize,
        column_index: usize,
        view: &TableView<'_, T>,
    ) -> Option<Cell> {
        let item = self.data.get(data_index)?;
        let column = self.columns.get(column_index)?;
        let mut cell = Cell::new(Section::Body, raw_id, column_index, column_index, row_index);
        self.apply_cell_hooks(Section::Body, &mut cell);
        cell.value = (column.body_accessor())(item, &cell, view);
        Some(cell)
    }

    fn slot_cell(
        &self,
        section: Section,
        slot: &ColumnSlot<T>,
        raw_id: &str,
        row_index: usize,
        index: usize,
        view: &TableView<'_, T>,
    ) -> Cell {
        let mut cell = Cell::new(section, raw_id, index, slot.column_index, row_index);
        self.apply_cell_hooks(section, &mut cell);
        cell.value = (slot.accessor)(&cell, view);
        cell
    }

    /// Build the head/footer cell contributed by `column_index` to row
    /// `row_index`. `None` if the column has no accessor for that row.
    pub fn section_cell(
        &self,
        section: Section,
        row_index: usize,
        column_index: usize,
        view: &TableView<'_, T>,
    ) -> Option<Cell> {
        let slots = self.composition.rows(section).get(row_index)?;
        let (index, slot) = slots
            .iter()
            .enumerate()
            .find(|(_, slot)| slot.column_index == column_index)?;
        Some(self.slot_cell(section, slot, &row_index.to_string(), row_index, index, view))
    }

    /// Build the body row for the record at `data_index`, placed at `index`.
    pub fn body_row(&self, data_index: usize, index: usize, view: &TableView<'_, T>) -> Option<Row> {
        let item = self.data.get(data_index)?;
        let raw_id = (self.get_id)(item);
        let mut row = Row::new(Section::Body, raw_id, index, Some(data_index));
        row.cells = (0..self.columns.len())
            .filter_map(|column_index| {
                self.body_cell(data_index, &row.raw_id, index, column_index, view)
            })
            .collect();
        self.apply_row_hooks(&mut row);
        Some(row)
    }

    /// Build head or footer row `index`.
    pub fn section_row(&self, section: Section, index: usize, view: &TableView<'_, T>) -> Option<Row> {
        let slots = self.composition.rows(section).get(index)?;
        let mut row = Row::new(section, index.to_string(), index, None);
        row.cells = slots
            .iter()
            .enumerate()
            .map(|(position, slot)| self.slot_cell(section, slot, &row.raw_id, index, position, view))
            .collect();
        self.apply_row_hooks(&mut row);
        Some(row)
    }

    /// Rebuild the row at `index`, reusing the old row's backing record for
    /// body rows.
    pub fn rebuild_row(&self, old: &Row, view: &TableView<'_, T>) -> Option<Row> {
        match old.section {
            Section::Body => self.body_row(old.data_index?, old.index, view),
            section => self.section_row(section, old.index, view),
        }
    }

    /// Rebuild one cell of `old`, keeping its position in the row.
    pub fn rebuild_cell(&self, old: &Row, column_index: usize, view: &TableView<'_, T>) -> Option<Cell> {
        match old.section {
            Section::Body => self.body_cell(old.data_index?, &old.raw_id, old.index, column_index, view),
            section => self.section_cell(section, old.index, column_index, view),
        }
    }

    /// Build a whole section, bracketed by the before/after hooks.
    ///
    /// Rows are renumbered after `after_create_rows` so that plugins may
    /// reorder or drop rows.
    pub fn rows(&self, section: Section, view: &TableView<'_, T>) -> Vec<Row> {
        for plugin in self.plugins {
            plugin.before_create_rows(section, self.data);
        }

        let mut rows: Vec<Row> = match section {
            Section::Body => (0..self.data.len())
                .filter_map(|i| self.body_row(i, i, view))
                .collect(),
            _ => (0..self.composition.rows(section).len())
                .filter_map(|i| self.section_row(section, i, view))
                .collect(),
        };

        for plugin in self.plugins {
            plugin.after_create_rows(section, &mut rows, self.data);
        }

        for (index, row) in rows.iter_mut().enumerate() {
            if row.index != index {
                row.reposition(index);
            }
        }
        log::trace!("built {} {} rows", rows.len(), section);
        rows
    }
}
