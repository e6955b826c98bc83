//! Column definitions and header/footer composition.
//!
//! A column always contributes one cell to every body row. Its head and footer
//! are ordered lists of accessors, one per header (or footer) row; a `None`
//! entry leaves that row without a cell from this column.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::node::{Cell, Section};
use crate::table::TableView;

/// Computes a body cell value from its record.
pub type BodyAccessor<T> = Arc<dyn Fn(&T, &Cell, &TableView<'_, T>) -> Value + Send + Sync>;

/// Computes a head or footer cell value.
pub type SectionAccessor<T> = Arc<dyn Fn(&Cell, &TableView<'_, T>) -> Value + Send + Sync>;

/// A column definition.
pub struct Column<T> {
    kind: Option<String>,
    head: Vec<Option<SectionAccessor<T>>>,
    body: BodyAccessor<T>,
    footer: Vec<Option<SectionAccessor<T>>>,
}

impl<T> Column<T> {
    /// Create a column from its body accessor.
    pub fn new<F>(body: F) -> Self
    where
        F: Fn(&T, &Cell, &TableView<'_, T>) -> Value + Send + Sync + 'static,
    {
        Self {
            kind: None,
            head: Vec::new(),
            body: Arc::new(body),
            footer: Vec::new(),
        }
    }

    /// Create a column whose body value only depends on the record.
    pub fn map<F, V>(f: F) -> Self
    where
        F: Fn(&T) -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        Self::new(move |item, _, _| f(item).into())
    }

    /// Free-form tag for the presentation layer.
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Use a single header accessor, replacing any others.
    pub fn head<F>(mut self, f: F) -> Self
    where
        F: Fn(&Cell, &TableView<'_, T>) -> Value + Send + Sync + 'static,
    {
        self.head = vec![Some(Arc::new(f))];
        self
    }

    /// Append an accessor for the next header row.
    pub fn head_row<F>(mut self, f: F) -> Self
    where
        F: Fn(&Cell, &TableView<'_, T>) -> Value + Send + Sync + 'static,
    {
        self.head.push(Some(Arc::new(f)));
        self
    }

    /// Leave the next header row without a cell from this column.
    pub fn skip_head_row(mut self) -> Self {
        self.head.push(None);
        self
    }

    /// Single header with a fixed label.
    pub fn head_text(self, text: impl Into<String>) -> Self {
        let text = Value::String(text.into());
        self.head(move |_, _| text.clone())
    }

    /// Use a single footer accessor, replacing any others.
    pub fn footer<F>(mut self, f: F) -> Self
    where
        F: Fn(&Cell, &TableView<'_, T>) -> Value + Send + Sync + 'static,
    {
        self.footer = vec![Some(Arc::new(f))];
        self
    }

    /// Append an accessor for the next footer row.
    pub fn footer_row<F>(mut self, f: F) -> Self
    where
        F: Fn(&Cell, &TableView<'_, T>) -> Value + Send + Sync + 'static,
    {
        self.footer.push(Some(Arc::new(f)));
        self
    }

    /// Leave the next footer row without a cell from this column.
    pub fn skip_footer_row(mut self) -> Self {
        self.footer.push(None);
        self
    }

    pub fn kind_name(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    pub fn body_accessor(&self) -> &BodyAccessor<T> {
        &self.body
    }

    /// Number of header rows this column declares, skipped ones included.
    pub fn head_len(&self) -> usize {
        self.head.len()
    }

    pub fn footer_len(&self) -> usize {
        self.footer.len()
    }

    fn accessors(&self, section: Section) -> &[Option<SectionAccessor<T>>] {
        match section {
            Section::Head => &self.head,
            Section::Footer => &self.footer,
            Section::Body => &[],
        }
    }
}

impl<T> Clone for Column<T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind.clone(),
            head: self.head.clone(),
            body: Arc::clone(&self.body),
            footer: self.footer.clone(),
        }
    }
}

impl<T> fmt::Debug for Column<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("kind", &self.kind)
            .field("head", &self.head.iter().map(Option::is_some).collect::<Vec<_>>())
            .field("footer", &self.footer.iter().map(Option::is_some).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Composition
// =============================================================================

/// A column's contribution to one header or footer row.
pub struct ColumnSlot<T> {
    /// Declared position of the column.
    pub column_index: usize,
    pub accessor: SectionAccessor<T>,
}

impl<T> Clone for ColumnSlot<T> {
    fn clone(&self) -> Self {
        Self {
            column_index: self.column_index,
            accessor: Arc::clone(&self.accessor),
        }
    }
}

impl<T> fmt::Debug for ColumnSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnSlot")
            .field("column_index", &self.column_index)
            .finish_non_exhaustive()
    }
}

/// Header and footer rows expanded from the column list.
///
/// `head[r]` lists, in declaration order, the columns that contribute a cell
/// to header row `r`.
pub struct Composition<T> {
    pub head: Vec<Vec<ColumnSlot<T>>>,
    pub footer: Vec<Vec<ColumnSlot<T>>>,
}

impl<T> Composition<T> {
    /// Slots for `section`. The body has none; it uses every column.
    pub fn rows(&self, section: Section) -> &[Vec<ColumnSlot<T>>] {
        match section {
            Section::Head => &self.head,
            Section::Footer => &self.footer,
            Section::Body => &[],
        }
    }

    /// Column indices per row, for change detection.
    pub fn shape(&self, section: Section) -> Vec<Vec<usize>> {
        self.rows(section)
            .iter()
            .map(|row| row.iter().map(|slot| slot.column_index).collect())
            .collect()
    }
}

impl<T> Default for Composition<T> {
    fn default() -> Self {
        Self {
            head: Vec::new(),
            footer: Vec::new(),
        }
    }
}

impl<T> Clone for Composition<T> {
    fn clone(&self) -> Self {
        Self {
            head: self.head.clone(),
            footer: self.footer.clone(),
        }
    }
}

impl<T> fmt::Debug for Composition<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Composition")
            .field("head", &self.shape(Section::Head))
            .field("footer", &self.shape(Section::Footer))
            .finish()
    }
}

/// Expand every column's head/footer accessors into per-row slots.
pub fn compose_columns<T>(columns: &[Column<T>]) -> Composition<T> {
    Composition {
        head: compose_section(columns, Section::Head),
        footer: compose_section(columns, Section::Footer),
    }
}

fn compose_section<T>(columns: &[Column<T>], section: Section) -> Vec<Vec<ColumnSlot<T>>> {
    let depth = columns
        .iter()
        .map(|c| c.accessors(section).len())
        .max()
        .unwrap_or(0);
    let mut rows: Vec<Vec<ColumnSlot<T>>> = (0..depth).map(|_| Vec::new()).collect();
    for (column_index, column) in columns.iter().enumerate() {
        for (row, accessor) in column.accessors(section).iter().enumerate() {
            if let Some(accessor) = accessor {
                rows[row].push(ColumnSlot {
                    column_index,
                    accessor: Arc::clone(accessor),
                });
            }
        }
    }
    rows
}
