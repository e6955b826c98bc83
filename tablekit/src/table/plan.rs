//! Classification of an event batch into rebuild work.
//!
//! Precedence, top to bottom:
//!
//! 1. `create:all`, `update:all`, `update:data`, `update:columns` or
//!    `update:plugins`: every section is rebuilt from data.
//! 2. `update:rows`, or a `*-rows` request for all three sections: every
//!    section is rebuilt.
//! 3. Otherwise each section takes its coarsest request: a `*-rows` request
//!    beats row targets, and row targets swallow cell targets on the same row.
//!
//! The order events arrived in does not matter; a broader request always wins.

use std::collections::BTreeSet;

use crate::events::{EventBatch, EventKind, Payload};
use crate::node::Section;

use EventKind::*;

const FULL_KINDS: [EventKind; 5] = [CreateAll, UpdateAll, UpdateData, UpdateColumns, UpdatePlugins];

/// Targets within one section, resolved against the rows by the executor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Targets {
    /// Row positions.
    pub rows: BTreeSet<usize>,
    /// `(row position, column index)` pairs.
    pub cells: BTreeSet<(usize, usize)>,
    /// Records whose body row must be rebuilt.
    pub data_items: BTreeSet<usize>,
    /// Columns whose cells must be rebuilt on every row.
    pub columns: BTreeSet<usize>,
}

impl Targets {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
            && self.cells.is_empty()
            && self.data_items.is_empty()
            && self.columns.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) enum SectionWork {
    #[default]
    Keep,
    All,
    Targets(Targets),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SectionPlan {
    pub work: SectionWork,
    /// Run the `on_update_*` hooks over the rebuilt nodes.
    pub notify: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct UpdatePlan {
    /// Every section is rebuilt from data.
    pub full: bool,
    pub recompose: bool,
    pub reconfigure: bool,
    pub extensions: bool,
    pub custom_body: bool,
    pub mount: bool,
    pub unmount: bool,
    pub notify_data: bool,
    pub notify_data_items: Vec<usize>,
    pub notify_columns: bool,
    pub notify_column_items: Vec<usize>,
    pub notify_plugins: bool,
    pub notify_events: bool,
    sections: [SectionPlan; 3],
}

impl UpdatePlan {
    pub fn from_batch(batch: &EventBatch) -> Self {
        let full = FULL_KINDS.iter().any(|k| batch.has(*k));
        let update_all = batch.has(UpdateAll);

        let mut plan = Self {
            full,
            recompose: batch.has(CreateAll) || update_all || batch.has(UpdateColumns) || batch.has(UpdateColumn),
            reconfigure: update_all || batch.has(UpdateConfig),
            extensions: full || batch.has(UpdateExtensions),
            custom_body: batch.has(UpdateCustomBody),
            mount: batch.has(Mount),
            unmount: batch.has(Unmount),
            notify_data: update_all || batch.has(UpdateData),
            notify_data_items: data_indices(batch.get(UpdateDataItem)),
            notify_columns: update_all || batch.has(UpdateColumns),
            notify_column_items: column_indices(batch.get(UpdateColumn)),
            notify_plugins: update_all || batch.has(UpdatePlugins),
            notify_events: batch.has(UpdateEvents),
            sections: Default::default(),
        };

        // `create:all` alone builds without the update hooks.
        let full_notify = full && FULL_KINDS[1..].iter().any(|k| batch.has(*k));
        let all_rows = batch.has(UpdateRows)
            || Section::ALL.iter().all(|s| batch.has(UpdateSectionRows(*s)))
            || Section::ALL.iter().all(|s| batch.has(CreateRows(*s)));

        for section in Section::ALL {
            let notify = full_notify || batch.has(UpdateRows) || requests_update(batch, section);
            let work = if full || all_rows {
                SectionWork::All
            } else {
                section_work(batch, section)
            };
            plan.sections[section.slot()] = SectionPlan { work, notify };
        }
        plan
    }

    pub fn section(&self, section: Section) -> &SectionPlan {
        &self.sections[section.slot()]
    }

    /// Escalate a section to a whole rebuild.
    pub fn escalate(&mut self, section: Section) {
        self.sections[section.slot()].work = SectionWork::All;
    }

    pub fn rebuilds(&self, section: Section) -> bool {
        self.section(section).work != SectionWork::Keep
    }
}

fn requests_update(batch: &EventBatch, section: Section) -> bool {
    batch.has(UpdateSectionRows(section))
        || batch.has(UpdateSectionRow(section))
        || batch.has(UpdateSectionCell(section))
        || batch.has(UpdateColumn)
        || (section == Section::Body && batch.has(UpdateDataItem))
}

fn section_work(batch: &EventBatch, section: Section) -> SectionWork {
    if batch.has(CreateRows(section)) || batch.has(UpdateSectionRows(section)) {
        return SectionWork::All;
    }

    let mut targets = Targets::default();
    for payload in batch
        .get(CreateRow(section))
        .iter()
        .chain(batch.get(UpdateSectionRow(section)))
    {
        if let Payload::Row { row_index } = payload {
            targets.rows.insert(*row_index);
        }
    }
    for payload in batch
        .get(CreateCell(section))
        .iter()
        .chain(batch.get(UpdateSectionCell(section)))
    {
        if let Payload::Cell {
            row_index,
            column_index,
        } = payload
            && !targets.rows.contains(row_index)
        {
            targets.cells.insert((*row_index, *column_index));
        }
    }
    if section == Section::Body {
        targets.data_items.extend(data_indices(batch.get(UpdateDataItem)));
    }
    targets.columns.extend(column_indices(batch.get(UpdateColumn)));

    if targets.is_empty() {
        SectionWork::Keep
    } else {
        SectionWork::Targets(targets)
    }
}

fn data_indices(payloads: &[Payload]) -> Vec<usize> {
    payloads
        .iter()
        .filter_map(|p| match p {
            Payload::DataItem { data_index } => Some(*data_index),
            _ => None,
        })
        .collect()
}

fn column_indices(payloads: &[Payload]) -> Vec<usize> {
    payloads
        .iter()
        .filter_map(|p| match p {
            Payload::Column { column_index } => Some(*column_index),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Event;

    fn plan(events: &[Event]) -> UpdatePlan {
        UpdatePlan::from_batch(&events.iter().copied().collect())
    }

    fn targets(plan: &UpdatePlan, section: Section) -> Targets {
        match &plan.section(section).work {
            SectionWork::Targets(t) => t.clone(),
            other => panic!("expected targets, got {other:?}"),
        }
    }

    #[test]
    fn data_change_rebuilds_everything_with_update_hooks() {
        let p = plan(&[Event::new(UpdateData), Event::update_row(Section::Body, 0)]);
        assert!(p.full);
        for section in Section::ALL {
            assert_eq!(p.section(section).work, SectionWork::All);
            assert!(p.section(section).notify);
        }
        assert!(p.extensions);
        assert!(!p.reconfigure);
    }

    #[test]
    fn create_all_skips_update_hooks() {
        let p = plan(&[Event::new(CreateAll)]);
        assert!(p.full);
        assert!(!p.section(Section::Body).notify);
    }

    #[test]
    fn section_rows_in_every_section_is_all_rows() {
        let p = plan(&[
            Event::update_rows(Section::Head),
            Event::update_rows(Section::Body),
            Event::update_rows(Section::Footer),
        ]);
        assert!(!p.full);
        assert!(Section::ALL.iter().all(|s| p.section(*s).work == SectionWork::All));
    }

    #[test]
    fn coarsest_request_wins_regardless_of_order() {
        let row_then_rows = plan(&[Event::update_row(Section::Body, 1), Event::update_rows(Section::Body)]);
        let rows_then_row = plan(&[Event::update_rows(Section::Body), Event::update_row(Section::Body, 1)]);
        assert_eq!(row_then_rows.section(Section::Body).work, SectionWork::All);
        assert_eq!(rows_then_row.section(Section::Body).work, SectionWork::All);
        assert_eq!(rows_then_row.section(Section::Head).work, SectionWork::Keep);
    }

    #[test]
    fn cells_on_targeted_rows_are_dropped() {
        let p = plan(&[
            Event::update_cell(Section::Body, 1, 0),
            Event::update_cell(Section::Body, 2, 1),
            Event::update_row(Section::Body, 1),
        ]);
        let t = targets(&p, Section::Body);
        assert_eq!(t.rows.iter().copied().collect::<Vec<_>>(), vec![1]);
        assert_eq!(t.cells.iter().copied().collect::<Vec<_>>(), vec![(2, 1)]);
        assert!(p.section(Section::Body).notify);
    }

    #[test]
    fn data_item_targets_the_body_only() {
        let p = plan(&[Event::update_data_item(3)]);
        assert_eq!(targets(&p, Section::Body).data_items.len(), 1);
        assert_eq!(p.section(Section::Head).work, SectionWork::Keep);
        assert_eq!(p.notify_data_items, vec![3]);
    }

    #[test]
    fn config_and_extensions_are_independent() {
        let p = plan(&[Event::new(UpdateConfig), Event::new(UpdateExtensions)]);
        assert!(p.reconfigure);
        assert!(p.extensions);
        assert!(Section::ALL.iter().all(|s| !p.rebuilds(*s)));
    }
}
