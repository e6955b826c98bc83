//! The flush executor.
//!
//! A flush runs in this order:
//!
//! 1. reconfigure (an error aborts the flush before anything is staged)
//! 2. mount / unmount hooks
//! 3. column composition
//! 4. change notifications
//! 5. body, then head, then footer
//! 6. custom body
//! 7. extensions
//! 8. commit, then `on_update_config` / `on_update_extensions`
//!
//! Rebuilt sections are staged as fresh `Vec<Arc<Row>>` and only swapped in at
//! the commit, so a panicking hook leaves the previous revision intact.
//!
//! Update hooks match the granularity of the rebuild: a section rebuild calls
//! `on_update_rows`, a row rebuild `on_update_row`, a cell rebuild
//! `on_update_cell`.

use std::sync::Arc;
use std::time::Instant;

use crate::column::{Composition, compose_columns};
use crate::error::TableError;
use crate::events::EventBatch;
use crate::extras::Extras;
use crate::node::{Row, Section};
use crate::observer::FlushReport;
use crate::plugin::{ConfigureContext, PluginRef, merge_by_priority};

use super::builder::Builder;
use super::plan::{SectionPlan, SectionWork, Targets, UpdatePlan};
use super::state::{TableState, TableView};
use super::{Shared, TableHandle};

const BUILD_ORDER: [Section; 3] = [Section::Body, Section::Head, Section::Footer];

/// Entry point handed to the scheduler.
pub(crate) fn process<T: Send + Sync + 'static>(shared: &Arc<Shared<T>>, batch: EventBatch) {
    let started = Instant::now();
    let plan = UpdatePlan::from_batch(&batch);
    let handle = TableHandle::from_shared(shared);

    let result = {
        let mut state = shared.write_state();
        run(&mut state, plan, &batch, &handle)
    };

    match result {
        Ok(report) => {
            shared.observer.on_flush_end(&report, started.elapsed());
            shared.notify_subscribers(report.revision);
        }
        Err(err) => shared.observer.on_flush_error(&err),
    }
}

/// Configure every plugin in hook order and merge their config.
pub(crate) fn configure_all<T>(
    plugins: &[PluginRef<T>],
    handle: &TableHandle<T>,
    data: &[T],
    columns: &[crate::column::Column<T>],
) -> Result<Extras, TableError> {
    let cx = ConfigureContext::new(handle, data, columns);
    let parts = plugins
        .iter()
        .map(|plugin| {
            plugin
                .configure(&cx)
                .map_err(|err| TableError::configure(plugin.name(), err))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(merge_by_priority(parts))
}

fn run<T>(
    state: &mut TableState<T>,
    mut plan: UpdatePlan,
    batch: &EventBatch,
    handle: &TableHandle<T>,
) -> Result<FlushReport, TableError> {
    let config = if plan.reconfigure {
        Some(configure_all(&state.plugins, handle, &state.data, &state.columns)?)
    } else {
        None
    };

    let mut mounted = state.mounted;
    if plan.mount {
        mounted = true;
        state.plugins.iter().for_each(|p| p.on_mount());
    }
    if plan.unmount {
        mounted = false;
        state.plugins.iter().for_each(|p| p.on_unmount());
    }

    let composition = plan.recompose.then(|| compose_columns(&state.columns));
    if let Some(next) = &composition {
        for section in [Section::Head, Section::Footer] {
            if next.shape(section) != state.composition.shape(section) {
                plan.escalate(section);
            }
        }
    }

    notify_changes(state, &plan, batch);

    let mut report = FlushReport {
        full: plan.full,
        ..FlushReport::default()
    };

    let (staged, custom_body, extensions) = {
        let config = config.as_ref().unwrap_or(&state.config);
        let composition = composition.as_ref().unwrap_or(&state.composition);
        stage(state, &plan, config, composition, &mut report)
    };

    // commit
    let [head, body, footer] = staged;
    state.head = head;
    state.body = body;
    state.footer = footer;
    if let Some(rows) = custom_body {
        state.custom_body = rows;
    }
    if let Some(composition) = composition {
        state.composition = composition;
    }
    let reconfigured = config.is_some();
    if let Some(config) = config {
        report.config_changed = config != state.config;
        state.config = config;
    }
    let extended = extensions.is_some();
    if let Some(extensions) = extensions {
        report.extensions_changed = extensions != state.extensions;
        state.extensions = extensions;
    }
    state.mounted = mounted;
    state.revision += 1;
    report.revision = state.revision;

    if reconfigured {
        state.plugins.iter().for_each(|p| p.on_update_config(&state.config));
    }
    if extended {
        state.plugins.iter().for_each(|p| p.on_update_extensions(&state.extensions));
    }
    Ok(report)
}

fn notify_changes<T>(state: &TableState<T>, plan: &UpdatePlan, batch: &EventBatch) {
    let plugins = &state.plugins;
    if plan.notify_data {
        plugins.iter().for_each(|p| p.on_update_data(&state.data));
    }
    for &data_index in &plan.notify_data_items {
        match state.data.get(data_index) {
            Some(item) => plugins.iter().for_each(|p| p.on_update_data_item(data_index, item)),
            None => log::trace!("update:data-item {data_index} is out of range"),
        }
    }
    if plan.notify_columns {
        plugins.iter().for_each(|p| p.on_update_columns(&state.columns));
    }
    for &column_index in &plan.notify_column_items {
        match state.columns.get(column_index) {
            Some(column) => plugins.iter().for_each(|p| p.on_update_column(column_index, column)),
            None => log::trace!("update:column {column_index} is out of range"),
        }
    }
    if plan.notify_plugins {
        plugins.iter().for_each(|p| p.on_update_plugins());
    }
    if plan.notify_events {
        plugins.iter().for_each(|p| p.on_update_events(batch));
    }
}

type Staged = [Vec<Arc<Row>>; 3];

fn staged_view<'a, T>(
    state: &'a TableState<T>,
    staged: &'a Staged,
    config: &'a Extras,
    custom_body: &'a [Arc<Row>],
) -> TableView<'a, T> {
    TableView {
        data: &state.data,
        columns: &state.columns,
        config,
        extensions: &state.extensions,
        head: &staged[Section::Head.slot()],
        body: &staged[Section::Body.slot()],
        footer: &staged[Section::Footer.slot()],
        custom_body,
        revision: state.revision,
    }
}

#[allow(clippy::type_complexity)]
fn stage<T>(
    state: &TableState<T>,
    plan: &UpdatePlan,
    config: &Extras,
    composition: &Composition<T>,
    report: &mut FlushReport,
) -> (Staged, Option<Vec<Arc<Row>>>, Option<Extras>) {
    let builder = Builder {
        plugins: &state.plugins,
        get_id: &state.get_id,
        data: &state.data,
        columns: &state.columns,
        composition,
    };

    let mut staged: Staged = [state.head.clone(), state.body.clone(), state.footer.clone()];
    for section in BUILD_ORDER {
        let next = {
            let view = staged_view(state, &staged, config, &state.custom_body);
            rebuild_section(
                &builder,
                section,
                plan.section(section),
                &staged[section.slot()],
                &view,
                report,
            )
        };
        if let Some(rows) = next {
            staged[section.slot()] = rows;
        }
    }

    let custom_body = (plan.custom_body || plan.rebuilds(Section::Body)).then(|| {
        let mut rows = staged[Section::Body.slot()].clone();
        for plugin in &state.plugins {
            plugin.on_update_custom_body(&mut rows, &state.data);
        }
        rows
    });

    let extensions = (plan.extensions || custom_body.is_some()).then(|| {
        let custom = custom_body.as_deref().unwrap_or(&state.custom_body[..]);
        let view = staged_view(state, &staged, config, custom);
        merge_by_priority(state.plugins.iter().map(|p| p.extend(&view)).collect())
    });

    (staged, custom_body, extensions)
}

fn rebuild_section<T>(
    builder: &Builder<'_, T>,
    section: Section,
    plan: &SectionPlan,
    current: &[Arc<Row>],
    view: &TableView<'_, T>,
    report: &mut FlushReport,
) -> Option<Vec<Arc<Row>>> {
    match &plan.work {
        SectionWork::Keep => None,
        SectionWork::All => {
            let mut rows = builder.rows(section, view);
            if plan.notify {
                for plugin in builder.plugins {
                    plugin.on_update_rows(section, &mut rows);
                }
            }
            report.rows_rebuilt += rows.len();
            Some(rows.into_iter().map(Arc::new).collect())
        }
        SectionWork::Targets(targets) => {
            let mut next = current.to_vec();
            let rows = target_rows(targets, current);

            for &position in &rows {
                let Some(old) = current.get(position) else {
                    log::trace!("skipping missing {section} row {position}");
                    continue;
                };
                let Some(mut row) = builder.rebuild_row(old, view) else {
                    log::trace!("skipping {section} row {position} without backing data");
                    continue;
                };
                if plan.notify {
                    for plugin in builder.plugins {
                        plugin.on_update_row(section, &mut row);
                    }
                }
                next[position] = Arc::new(row);
                report.rows_rebuilt += 1;
            }

            for (position, column_index) in target_cells(targets, current, &rows) {
                let Some(old) = current.get(position) else {
                    log::trace!("skipping cell on missing {section} row {position}");
                    continue;
                };
                let Some(slot) = old.cells.iter().position(|c| c.column_index == column_index) else {
                    log::trace!("skipping missing {section} cell {position}:{column_index}");
                    continue;
                };
                let Some(mut cell) = builder.rebuild_cell(old, column_index, view) else {
                    continue;
                };
                cell.index = old.cells[slot].index;
                if plan.notify {
                    for plugin in builder.plugins {
                        plugin.on_update_cell(section, &mut cell);
                    }
                }
                let mut row = Row::clone(&next[position]);
                row.cells[slot] = cell;
                next[position] = Arc::new(row);
                report.cells_rebuilt += 1;
            }
            Some(next)
        }
    }
}

/// Row positions from explicit targets plus rows backed by changed records.
fn target_rows(targets: &Targets, current: &[Arc<Row>]) -> std::collections::BTreeSet<usize> {
    let mut rows = targets.rows.clone();
    if !targets.data_items.is_empty() {
        rows.extend(current.iter().enumerate().filter_map(|(position, row)| {
            row.data_index
                .filter(|d| targets.data_items.contains(d))
                .map(|_| position)
        }));
    }
    rows
}

fn target_cells(
    targets: &Targets,
    current: &[Arc<Row>],
    rows: &std::collections::BTreeSet<usize>,
) -> Vec<(usize, usize)> {
    let mut cells = targets.cells.clone();
    for &column_index in &targets.columns {
        for (position, row) in current.iter().enumerate() {
            if row.cell_for_column(column_index).is_some() {
                cells.insert((position, column_index));
            }
        }
    }
    cells
        .into_iter()
        .filter(|(position, _)| !rows.contains(position))
        .collect()
}
