//! The closed event vocabulary and its cancellation table.

use std::fmt;
use std::str::FromStr;

use crate::error::TableError;
use crate::node::Section;

use Section::{Body, Footer, Head};

/// Every event the scheduler understands.
///
/// Events carry no data of their own; see [`Event`] for the kind plus its
/// payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `event:mount`
    Mount,
    /// `event:unmount`
    Unmount,
    /// `create:all`
    CreateAll,
    /// `create:{section}-rows`
    CreateRows(Section),
    /// `create:{section}-row`, carries [`Payload::Row`]
    CreateRow(Section),
    /// `create:{section}-cell`, carries [`Payload::Cell`]
    CreateCell(Section),
    /// `update:all`
    UpdateAll,
    /// `update:rows`
    UpdateRows,
    /// `update:plugins`
    UpdatePlugins,
    /// `update:config`
    UpdateConfig,
    /// `update:extensions`
    UpdateExtensions,
    /// `update:events`
    UpdateEvents,
    /// `update:custom-body`
    UpdateCustomBody,
    /// `update:data`
    UpdateData,
    /// `update:data-item`, carries [`Payload::DataItem`]
    UpdateDataItem,
    /// `update:columns`
    UpdateColumns,
    /// `update:column`, carries [`Payload::Column`]
    UpdateColumn,
    /// `update:{section}-rows`
    UpdateSectionRows(Section),
    /// `update:{section}-row`, carries [`Payload::Row`]
    UpdateSectionRow(Section),
    /// `update:{section}-cell`, carries [`Payload::Cell`]
    UpdateSectionCell(Section),
}

use EventKind::*;

const UPDATE_SECTION_EVENTS: [EventKind; 9] = [
    UpdateSectionRows(Head),
    UpdateSectionRow(Head),
    UpdateSectionCell(Head),
    UpdateSectionRows(Body),
    UpdateSectionRow(Body),
    UpdateSectionCell(Body),
    UpdateSectionRows(Footer),
    UpdateSectionRow(Footer),
    UpdateSectionCell(Footer),
];

const CANCELED_BY_CREATE_ALL: [EventKind; 20] = [
    CreateRows(Head),
    CreateRow(Head),
    CreateCell(Head),
    CreateRows(Body),
    CreateRow(Body),
    CreateCell(Body),
    CreateRows(Footer),
    CreateRow(Footer),
    CreateCell(Footer),
    UpdateColumns,
    UpdateColumn,
    UpdateSectionRows(Head),
    UpdateSectionRow(Head),
    UpdateSectionCell(Head),
    UpdateSectionRows(Body),
    UpdateSectionRow(Body),
    UpdateSectionCell(Body),
    UpdateSectionRows(Footer),
    UpdateSectionRow(Footer),
    UpdateSectionCell(Footer),
];

const CANCELED_BY_UPDATE_ALL: [EventKind; 17] = [
    UpdatePlugins,
    UpdateConfig,
    UpdateExtensions,
    UpdateEvents,
    UpdateData,
    UpdateDataItem,
    UpdateColumns,
    UpdateColumn,
    UpdateSectionRows(Head),
    UpdateSectionRow(Head),
    UpdateSectionCell(Head),
    UpdateSectionRows(Body),
    UpdateSectionRow(Body),
    UpdateSectionCell(Body),
    UpdateSectionRows(Footer),
    UpdateSectionRow(Footer),
    UpdateSectionCell(Footer),
];

impl EventKind {
    /// Every kind, in vocabulary order.
    pub const ALL: [EventKind; 32] = [
        Mount,
        Unmount,
        CreateAll,
        CreateRows(Head),
        CreateRow(Head),
        CreateCell(Head),
        CreateRows(Body),
        CreateRow(Body),
        CreateCell(Body),
        CreateRows(Footer),
        CreateRow(Footer),
        CreateCell(Footer),
        UpdateAll,
        UpdateRows,
        UpdatePlugins,
        UpdateConfig,
        UpdateExtensions,
        UpdateEvents,
        UpdateCustomBody,
        UpdateData,
        UpdateDataItem,
        UpdateColumns,
        UpdateColumn,
        UpdateSectionRows(Head),
        UpdateSectionRow(Head),
        UpdateSectionCell(Head),
        UpdateSectionRows(Body),
        UpdateSectionRow(Body),
        UpdateSectionCell(Body),
        UpdateSectionRows(Footer),
        UpdateSectionRow(Footer),
        UpdateSectionCell(Footer),
    ];

    /// Wire name, e.g. `update:body-row`.
    pub fn as_str(self) -> &'static str {
        match self {
            Mount => "event:mount",
            Unmount => "event:unmount",
            CreateAll => "create:all",
            CreateRows(Head) => "create:head-rows",
            CreateRows(Body) => "create:body-rows",
            CreateRows(Footer) => "create:footer-rows",
            CreateRow(Head) => "create:head-row",
            CreateRow(Body) => "create:body-row",
            CreateRow(Footer) => "create:footer-row",
            CreateCell(Head) => "create:head-cell",
            CreateCell(Body) => "create:body-cell",
            CreateCell(Footer) => "create:footer-cell",
            UpdateAll => "update:all",
            UpdateRows => "update:rows",
            UpdatePlugins => "update:plugins",
            UpdateConfig => "update:config",
            UpdateExtensions => "update:extensions",
            UpdateEvents => "update:events",
            UpdateCustomBody => "update:custom-body",
            UpdateData => "update:data",
            UpdateDataItem => "update:data-item",
            UpdateColumns => "update:columns",
            UpdateColumn => "update:column",
            UpdateSectionRows(Head) => "update:head-rows",
            UpdateSectionRows(Body) => "update:body-rows",
            UpdateSectionRows(Footer) => "update:footer-rows",
            UpdateSectionRow(Head) => "update:head-row",
            UpdateSectionRow(Body) => "update:body-row",
            UpdateSectionRow(Footer) => "update:footer-row",
            UpdateSectionCell(Head) => "update:head-cell",
            UpdateSectionCell(Body) => "update:body-cell",
            UpdateSectionCell(Footer) => "update:footer-cell",
        }
    }

    /// Narrower kinds removed from the queue when this kind is dispatched.
    pub fn cancels(self) -> &'static [EventKind] {
        match self {
            CreateAll => &CANCELED_BY_CREATE_ALL,
            UpdateAll => &CANCELED_BY_UPDATE_ALL,
            UpdateRows => &UPDATE_SECTION_EVENTS,
            UpdateData => &[UpdateDataItem],
            UpdateColumns => &[UpdateColumn],
            CreateRows(Head) => &[CreateRow(Head), CreateCell(Head)],
            CreateRows(Body) => &[CreateRow(Body), CreateCell(Body)],
            CreateRows(Footer) => &[CreateRow(Footer), CreateCell(Footer)],
            UpdateSectionRows(Head) => &[UpdateSectionRow(Head), UpdateSectionCell(Head)],
            UpdateSectionRows(Body) => &[UpdateSectionRow(Body), UpdateSectionCell(Body)],
            UpdateSectionRows(Footer) => &[UpdateSectionRow(Footer), UpdateSectionCell(Footer)],
            _ => &[],
        }
    }

    /// Whether dispatching this kind would remove `other` from the queue.
    pub fn subsumes(self, other: EventKind) -> bool {
        self.cancels().contains(&other)
    }

    /// Section targeted by a per-section kind.
    pub fn section(self) -> Option<Section> {
        match self {
            CreateRows(s)
            | CreateRow(s)
            | CreateCell(s)
            | UpdateSectionRows(s)
            | UpdateSectionRow(s)
            | UpdateSectionCell(s) => Some(s),
            _ => None,
        }
    }

    /// Payload shape this kind carries.
    pub fn payload_shape(self) -> PayloadShape {
        match self {
            CreateRow(_) | UpdateSectionRow(_) => PayloadShape::Row,
            CreateCell(_) | UpdateSectionCell(_) => PayloadShape::Cell,
            UpdateDataItem => PayloadShape::DataItem,
            UpdateColumn => PayloadShape::Column,
            _ => PayloadShape::None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| TableError::UnknownEvent(s.to_string()))
    }
}

/// The kind of data an event carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    None,
    Row,
    Cell,
    DataItem,
    Column,
}

impl PayloadShape {
    fn as_str(self) -> &'static str {
        match self {
            PayloadShape::None => "empty",
            PayloadShape::Row => "row",
            PayloadShape::Cell => "cell",
            PayloadShape::DataItem => "data-item",
            PayloadShape::Column => "column",
        }
    }
}

/// Data accompanying a dispatched event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Payload {
    #[default]
    None,
    Row {
        row_index: usize,
    },
    Cell {
        row_index: usize,
        column_index: usize,
    },
    DataItem {
        data_index: usize,
    },
    Column {
        column_index: usize,
    },
}

impl Payload {
    pub fn shape(&self) -> PayloadShape {
        match self {
            Payload::None => PayloadShape::None,
            Payload::Row { .. } => PayloadShape::Row,
            Payload::Cell { .. } => PayloadShape::Cell,
            Payload::DataItem { .. } => PayloadShape::DataItem,
            Payload::Column { .. } => PayloadShape::Column,
        }
    }
}

/// An event kind paired with its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    kind: EventKind,
    payload: Payload,
}

impl Event {
    /// An event without payload.
    ///
    /// Kinds that normally carry a payload are accepted too; the updater
    /// ignores their missing target.
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            payload: Payload::None,
        }
    }

    /// Pair a kind with a payload, checking the shape.
    pub fn from_parts(kind: EventKind, payload: Payload) -> Result<Self, TableError> {
        let expected = kind.payload_shape();
        if payload.shape() != PayloadShape::None && payload.shape() != expected {
            return Err(TableError::PayloadMismatch {
                event: kind.as_str(),
                expected: expected.as_str(),
            });
        }
        Ok(Self { kind, payload })
    }

    /// Parse a wire name and pair it with a payload.
    pub fn parse(name: &str, payload: Payload) -> Result<Self, TableError> {
        Self::from_parts(name.parse()?, payload)
    }

    /// `create:{section}-rows`
    pub fn create_rows(section: Section) -> Self {
        Self::new(CreateRows(section))
    }

    /// `create:{section}-row`
    pub fn create_row(section: Section, row_index: usize) -> Self {
        Self {
            kind: CreateRow(section),
            payload: Payload::Row { row_index },
        }
    }

    /// `create:{section}-cell`
    pub fn create_cell(section: Section, row_index: usize, column_index: usize) -> Self {
        Self {
            kind: CreateCell(section),
            payload: Payload::Cell {
                row_index,
                column_index,
            },
        }
    }

    /// `update:{section}-rows`
    pub fn update_rows(section: Section) -> Self {
        Self::new(UpdateSectionRows(section))
    }

    /// `update:{section}-row`
    pub fn update_row(section: Section, row_index: usize) -> Self {
        Self {
            kind: UpdateSectionRow(section),
            payload: Payload::Row { row_index },
        }
    }

    /// `update:{section}-cell`
    pub fn update_cell(section: Section, row_index: usize, column_index: usize) -> Self {
        Self {
            kind: UpdateSectionCell(section),
            payload: Payload::Cell {
                row_index,
                column_index,
            },
        }
    }

    /// `update:data-item`
    pub fn update_data_item(data_index: usize) -> Self {
        Self {
            kind: UpdateDataItem,
            payload: Payload::DataItem { data_index },
        }
    }

    /// `update:column`
    pub fn update_column(column_index: usize) -> Self {
        Self {
            kind: UpdateColumn,
            payload: Payload::Column { column_index },
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn payload(&self) -> Payload {
        self.payload
    }
}

impl From<EventKind> for Event {
    fn from(kind: EventKind) -> Self {
        Self::new(kind)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.payload {
            Payload::None => write!(f, "{}", self.kind),
            payload => write!(f, "{} {:?}", self.kind, payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().ok(), Some(kind));
        }
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = "update:everything".parse::<EventKind>();
        assert!(matches!(err, Err(TableError::UnknownEvent(name)) if name == "update:everything"));
    }

    #[test]
    fn update_all_subsumes_every_section_update() {
        for section in Section::ALL {
            assert!(UpdateAll.subsumes(UpdateSectionRow(section)));
            assert!(UpdateAll.subsumes(UpdateSectionCell(section)));
            assert!(UpdateAll.subsumes(UpdateSectionRows(section)));
        }
        assert!(!UpdateSectionRow(Body).subsumes(UpdateAll));
    }

    #[test]
    fn section_rows_only_subsume_their_own_section() {
        assert!(UpdateSectionRows(Body).subsumes(UpdateSectionRow(Body)));
        assert!(!UpdateSectionRows(Body).subsumes(UpdateSectionRow(Head)));
        assert!(CreateRows(Footer).subsumes(CreateCell(Footer)));
        assert!(!CreateRows(Footer).subsumes(UpdateSectionCell(Footer)));
    }

    #[test]
    fn payload_shape_is_checked() {
        let ok = Event::parse("update:body-row", Payload::Row { row_index: 2 });
        assert_eq!(ok.ok(), Some(Event::update_row(Body, 2)));

        let err = Event::from_parts(UpdateData, Payload::Row { row_index: 0 });
        assert!(matches!(err, Err(TableError::PayloadMismatch { event: "update:data", .. })));
    }
}
