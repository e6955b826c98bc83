//! Row and cell snapshots.
//!
//! Rows are built once and published behind an `Arc`. A rebuild replaces the
//! `Arc` in its slot; untouched slots keep theirs, so `Arc::ptr_eq` tells a
//! reader exactly which rows changed between two revisions.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::extras::{Extras, Key};

/// One of the three table sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Head,
    Body,
    Footer,
}

impl Section {
    /// All sections, in declaration order.
    pub const ALL: [Section; 3] = [Section::Head, Section::Body, Section::Footer];

    /// Lowercase name used in event names.
    pub fn as_str(self) -> &'static str {
        match self {
            Section::Head => "head",
            Section::Body => "body",
            Section::Footer => "footer",
        }
    }

    pub(crate) fn slot(self) -> usize {
        match self {
            Section::Head => 0,
            Section::Body => 1,
            Section::Footer => 2,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    /// `cell-{column_index}-{raw_id}`
    pub id: String,
    /// Identity of the owning row.
    pub raw_id: String,
    /// Position within the row.
    pub index: usize,
    /// Declared position of the column in the table's `columns`.
    pub column_index: usize,
    /// Position of the owning row within its section.
    pub row_index: usize,
    pub section: Section,
    /// Accessor output. `Null` if the column has no accessor for the section.
    pub value: Value,
    /// Plugin-contributed fields.
    pub extras: Extras,
}

impl Cell {
    pub(crate) fn new(
        section: Section,
        raw_id: &str,
        index: usize,
        column_index: usize,
        row_index: usize,
    ) -> Self {
        Self {
            id: cell_id(column_index, raw_id),
            raw_id: raw_id.to_string(),
            index,
            column_index,
            row_index,
            section,
            value: Value::Null,
            extras: Extras::new(),
        }
    }

    /// Read a plugin-contributed field.
    pub fn get<V: DeserializeOwned>(&self, key: Key<V>) -> Option<V> {
        self.extras.get(key)
    }
}

/// A row of cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// `row-{index}-{raw_id}`
    pub id: String,
    /// Stable identity. `get_id(item)` for body rows, the row position for
    /// head and footer rows.
    pub raw_id: String,
    /// Position within the section.
    pub index: usize,
    /// Position of the backing record in `data`. Body rows only.
    pub data_index: Option<usize>,
    pub section: Section,
    pub cells: Vec<Cell>,
    /// Plugin-contributed fields.
    pub extras: Extras,
}

impl Row {
    pub(crate) fn new(
        section: Section,
        raw_id: String,
        index: usize,
        data_index: Option<usize>,
    ) -> Self {
        Self {
            id: row_id(index, &raw_id),
            raw_id,
            index,
            data_index,
            section,
            cells: Vec::new(),
            extras: Extras::new(),
        }
    }

    /// Read a plugin-contributed field.
    pub fn get<V: DeserializeOwned>(&self, key: Key<V>) -> Option<V> {
        self.extras.get(key)
    }

    /// Find the cell built for a declared column.
    pub fn cell_for_column(&self, column_index: usize) -> Option<&Cell> {
        self.cells.iter().find(|c| c.column_index == column_index)
    }

    /// Move the row to a new position, keeping its identity.
    pub(crate) fn reposition(&mut self, index: usize) {
        self.index = index;
        self.id = row_id(index, &self.raw_id);
        for cell in &mut self.cells {
            cell.row_index = index;
        }
    }
}

fn row_id(index: usize, raw_id: &str) -> String {
    format!("row-{index}-{raw_id}")
}

fn cell_id(column_index: usize, raw_id: &str) -> String {
    format!("cell-{column_index}-{raw_id}")
}
