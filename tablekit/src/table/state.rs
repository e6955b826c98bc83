use std::sync::Arc;

use crate::column::{Column, Composition};
use crate::extras::Extras;
use crate::node::{Row, Section};
use crate::plugin::PluginRef;

use super::options::GetId;

/// Everything the table owns. Written only by the process loop and the
/// facade's setters.
pub(crate) struct TableState<T> {
    pub data: Vec<T>,
    pub columns: Vec<Column<T>>,
    pub composition: Composition<T>,
    pub get_id: GetId<T>,
    pub plugins: Vec<PluginRef<T>>,
    pub head: Vec<Arc<Row>>,
    pub body: Vec<Arc<Row>>,
    pub footer: Vec<Arc<Row>>,
    pub custom_body: Vec<Arc<Row>>,
    pub config: Extras,
    pub extensions: Extras,
    pub revision: u64,
    pub mounted: bool,
}

impl<T> TableState<T> {
    pub fn new(
        data: Vec<T>,
        columns: Vec<Column<T>>,
        get_id: GetId<T>,
        plugins: Vec<PluginRef<T>>,
    ) -> Self {
        Self {
            data,
            columns,
            composition: Composition::default(),
            get_id,
            plugins,
            head: Vec::new(),
            body: Vec::new(),
            footer: Vec::new(),
            custom_body: Vec::new(),
            config: Extras::new(),
            extensions: Extras::new(),
            revision: 0,
            mounted: false,
        }
    }

    pub fn view(&self) -> TableView<'_, T> {
        TableView {
            data: &self.data,
            columns: &self.columns,
            config: &self.config,
            extensions: &self.extensions,
            head: &self.head,
            body: &self.body,
            footer: &self.footer,
            custom_body: &self.custom_body,
            revision: self.revision,
        }
    }
}

/// Read-only view of the table.
///
/// Accessors and `extend` receive one while a flush is running; sections
/// already rebuilt in that flush are visible through it.
pub struct TableView<'a, T> {
    pub(crate) data: &'a [T],
    pub(crate) columns: &'a [Column<T>],
    pub(crate) config: &'a Extras,
    pub(crate) extensions: &'a Extras,
    pub(crate) head: &'a [Arc<Row>],
    pub(crate) body: &'a [Arc<Row>],
    pub(crate) footer: &'a [Arc<Row>],
    pub(crate) custom_body: &'a [Arc<Row>],
    pub(crate) revision: u64,
}

impl<'a, T> TableView<'a, T> {
    pub fn data(&self) -> &'a [T] {
        self.data
    }

    pub fn columns(&self) -> &'a [Column<T>] {
        self.columns
    }

    pub fn config(&self) -> &'a Extras {
        self.config
    }

    pub fn extensions(&self) -> &'a Extras {
        self.extensions
    }

    pub fn head(&self) -> &'a [Arc<Row>] {
        self.head
    }

    pub fn body(&self) -> &'a [Arc<Row>] {
        self.body
    }

    pub fn footer(&self) -> &'a [Arc<Row>] {
        self.footer
    }

    /// The body as presented after plugin narrowing.
    pub fn custom_body(&self) -> &'a [Arc<Row>] {
        self.custom_body
    }

    pub fn section(&self, section: Section) -> &'a [Arc<Row>] {
        match section {
            Section::Head => self.head,
            Section::Body => self.body,
            Section::Footer => self.footer,
        }
    }

    /// Revision of the last committed flush.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

impl<T> Clone for TableView<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for TableView<'_, T> {}
