//! Headless, plugin-extensible table engine.
//!
//! A [`Table`] turns a list of records and a list of [`Column`]s into `head`,
//! `body` and `footer` sections of plain [`Row`]/[`Cell`] snapshots, and keeps
//! them up to date as data, columns or plugin state change. Nothing is
//! rendered; a presentation layer subscribes and reads the sections.
//!
//! Changes are requested as events. Events dispatched in the same tick are
//! batched, broader requests cancel narrower ones, and a single flush rebuilds
//! the smallest part of the table that covers the batch.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tablekit::prelude::*;
//! use tablekit::plugins::{RowSelection, SELECTED};
//!
//! let selection = Arc::new(RowSelection::new());
//! let table = Table::new(
//!     TableOptions::new()
//!         .data(vec!["ada", "grace"])
//!         .get_id(|name: &&str| name.to_string())
//!         .column(Column::map(|name: &&str| name.to_string()).head_text("Name"))
//!         .plugin(selection.clone()),
//! )?;
//! table.wait_for_updates().await;
//!
//! selection.toggle(&table.body()[1], None);
//! table.wait_for_updates().await;
//! assert_eq!(table.body()[1].get(SELECTED), Some(true));
//! ```

pub mod column;
pub mod error;
pub mod events;
pub mod extras;
pub mod node;
pub mod observer;
pub mod plugin;
pub mod plugins;
pub mod table;

pub use column::{Column, Composition, compose_columns};
pub use error::{PluginError, TableError};
pub use events::{Dispatcher, Event, EventBatch, EventKind, EventScheduler, Payload};
pub use extras::{Extras, Key};
pub use node::{Cell, Row, Section};
pub use observer::{FlushReport, LogObserver, TableObserver};
pub use plugin::{ConfigureContext, Plugin, PluginRef, priority};
pub use table::{OptionsPatch, SubscriptionId, Table, TableHandle, TableOptions, TableView};

/// Prelude for common imports
pub mod prelude {
    pub use crate::column::Column;
    pub use crate::error::{PluginError, TableError};
    pub use crate::events::{Dispatcher, Event, EventKind, Payload};
    pub use crate::extras::{Extras, Key};
    pub use crate::node::{Cell, Row, Section};
    pub use crate::plugin::{ConfigureContext, Plugin, priority};
    pub use crate::table::{OptionsPatch, Table, TableHandle, TableOptions, TableView};
}
