//! Tests for the table facade: building, batching and differential updates.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::json;
use tablekit::plugins::{HAS_SELECTED_ROWS, RowSelection, SELECTED, SELECTED_ROWS};
use tablekit::prelude::*;
use tablekit::{EventBatch, FlushReport, PluginRef, TableObserver};

// =============================================================================
// Fixtures
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
struct Person {
    id: u32,
    name: String,
    age: u32,
}

fn person(id: u32, name: &str, age: u32) -> Person {
    Person {
        id,
        name: name.to_string(),
        age,
    }
}

fn people() -> Vec<Person> {
    vec![person(1, "Ada", 36), person(2, "Grace", 45), person(3, "Linus", 28)]
}

fn columns() -> Vec<Column<Person>> {
    vec![
        Column::map(|p: &Person| p.name.clone()).head_text("Name"),
        Column::map(|p: &Person| p.age).head_text("Age"),
    ]
}

fn options() -> TableOptions<Person> {
    TableOptions::new()
        .data(people())
        .columns(columns())
        .get_id(|p: &Person| p.id.to_string())
}

#[derive(Default)]
struct Recorder {
    batches: Mutex<Vec<EventBatch>>,
    reports: Mutex<Vec<FlushReport>>,
    errors: Mutex<Vec<String>>,
}

impl Recorder {
    fn flushes(&self) -> usize {
        self.reports.lock().unwrap().len()
    }

    fn last_report(&self) -> FlushReport {
        self.reports.lock().unwrap().last().cloned().unwrap()
    }

    fn last_batch(&self) -> EventBatch {
        self.batches.lock().unwrap().last().cloned().unwrap()
    }
}

impl TableObserver for Recorder {
    fn on_flush_start(&self, batch: &EventBatch) {
        self.batches.lock().unwrap().push(batch.clone());
    }

    fn on_flush_end(&self, report: &FlushReport, _elapsed: std::time::Duration) {
        self.reports.lock().unwrap().push(report.clone());
    }

    fn on_flush_error(&self, error: &TableError) {
        self.errors.lock().unwrap().push(error.to_string());
    }
}

async fn observed(options: TableOptions<Person>) -> (Table<Person>, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let table = Table::new(options.observer(recorder.clone())).unwrap();
    table.wait_for_updates().await;
    (table, recorder)
}

/// Contributes a fixed value to config, extensions and every row.
struct Tagger {
    name: &'static str,
    priority: i32,
    key: Key<String>,
}

impl Tagger {
    fn new(name: &'static str, priority: i32, key: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            priority,
            key: Key::new(key),
        })
    }
}

impl Plugin<Person> for Tagger {
    fn name(&self) -> &str {
        self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn configure(&self, _cx: &ConfigureContext<'_, Person>) -> Result<Extras, PluginError> {
        Ok(Extras::new().with(self.key, self.name))
    }

    fn extend(&self, _view: &TableView<'_, Person>) -> Extras {
        Extras::new().with(self.key, self.name)
    }

    fn on_create_row(&self, _section: Section, _row: &Row) -> Extras {
        Extras::new().with(self.key, self.name)
    }
}

struct Failing;

impl Plugin<Person> for Failing {
    fn name(&self) -> &str {
        "failing"
    }

    fn configure(&self, _cx: &ConfigureContext<'_, Person>) -> Result<Extras, PluginError> {
        Err(PluginError::new("boom"))
    }
}

// =============================================================================
// Building
// =============================================================================

#[tokio::test]
async fn test_builds_every_section() {
    let table = Table::new(options()).unwrap();
    table.wait_for_updates().await;

    let head = table.head();
    assert_eq!(head.len(), 1);
    assert_eq!(head[0].cells[0].value, json!("Name"));
    assert_eq!(head[0].cells[1].value, json!("Age"));

    let body = table.body();
    assert_eq!(body.len(), 3);
    assert_eq!(body[1].cells[0].value, json!("Grace"));
    assert_eq!(body[1].cells[1].value, json!(45));
    assert_eq!(body[1].data_index, Some(1));

    assert!(table.footer().is_empty());
    assert_eq!(table.custom_body().len(), 3);
    assert_eq!(table.revision(), 1);
}

#[tokio::test]
async fn test_row_identity_follows_get_id() {
    let table = Table::new(options()).unwrap();
    table.wait_for_updates().await;

    let body = table.body();
    assert_eq!(body[0].raw_id, "1");
    assert_eq!(body[0].id, "row-0-1");
    assert_eq!(body[0].cells[1].id, "cell-1-1");

    let mut reversed = people();
    reversed.reverse();
    table.set_data(reversed);
    table.wait_for_updates().await;

    let body = table.body();
    assert_eq!(body[2].raw_id, "1");
    assert_eq!(body[2].id, "row-2-1");
    assert_eq!(body[2].cells[0].raw_id, "1");
    assert_eq!(body[2].cells[0].row_index, 2);
}

#[tokio::test]
async fn test_head_rows_follow_column_sequences() {
    let columns = vec![
        Column::map(|p: &Person| p.name.clone())
            .head_row(|_, _| json!("a0"))
            .head_row(|_, _| json!("a1")),
        Column::map(|p: &Person| p.age).head(|_, _| json!("b")),
    ];
    let table = Table::new(options().columns(columns)).unwrap();
    table.wait_for_updates().await;

    let head = table.head();
    assert_eq!(head.len(), 2);
    let values: Vec<_> = head[0].cells.iter().map(|c| c.value.clone()).collect();
    assert_eq!(values, vec![json!("a0"), json!("b")]);
    assert_eq!(head[1].cells.len(), 1);
    assert_eq!(head[1].cells[0].value, json!("a1"));
    assert_eq!(head[1].cells[0].column_index, 0);
    assert_eq!(head[1].cells[0].index, 0);
    assert!(table.footer().is_empty());
}

#[tokio::test]
async fn test_missing_get_id_is_rejected() {
    let err = Table::new(TableOptions::<Person>::new().data(people())).unwrap_err();
    assert!(matches!(err, TableError::MissingGetId));
}

#[tokio::test]
async fn test_configure_error_names_the_plugin() {
    let err = Table::new(options().plugin(Arc::new(Failing))).unwrap_err();
    match err {
        TableError::Configure { plugin, source } => {
            assert_eq!(plugin, "failing");
            assert_eq!(source.message, "boom");
        }
        other => panic!("unexpected error: {other}"),
    }
}

// =============================================================================
// Batching and cancellation
// =============================================================================

#[tokio::test]
async fn test_dispatches_in_one_tick_share_a_flush() {
    let (table, recorder) = observed(options()).await;
    let before = recorder.flushes();

    for row in [0, 1, 2, 0, 1] {
        table.dispatch(Event::update_row(Section::Body, row));
    }
    table.wait_for_updates().await;

    assert_eq!(recorder.flushes(), before + 1);
    let batch = recorder.last_batch();
    assert_eq!(batch.count(EventKind::UpdateSectionRow(Section::Body)), 5);
    assert_eq!(recorder.last_report().rows_rebuilt, 3);
    assert!(recorder.errors.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_update_all_cancels_queued_row_updates() {
    let (table, recorder) = observed(options()).await;

    table.dispatch(Event::update_row(Section::Body, 0));
    table.dispatch(EventKind::UpdateAll);
    table.wait_for_updates().await;

    let batch = recorder.last_batch();
    assert!(!batch.has(EventKind::UpdateSectionRow(Section::Body)));
    let report = recorder.last_report();
    assert!(report.full);
    assert_eq!(report.rows_rebuilt, 4);
}

#[tokio::test]
async fn test_update_all_wins_when_dispatched_first() {
    let (table, recorder) = observed(options()).await;

    table.dispatch(EventKind::UpdateAll);
    table.dispatch(Event::update_row(Section::Body, 0));
    table.wait_for_updates().await;

    let report = recorder.last_report();
    assert!(report.full);
    assert_eq!(report.rows_rebuilt, 4);
}

#[tokio::test]
async fn test_row_update_then_update_data_is_one_full_rebuild() {
    let (table, recorder) = observed(options()).await;
    let before = recorder.flushes();

    table.dispatch(Event::update_row(Section::Body, 0));
    table.dispatch(EventKind::UpdateData);
    table.wait_for_updates().await;

    assert_eq!(recorder.flushes(), before + 1);
    assert!(!recorder.last_batch().has(EventKind::UpdateSectionRow(Section::Body)));
    assert!(recorder.last_report().full);
}

#[tokio::test]
async fn test_update_data_then_row_update_is_one_full_rebuild() {
    let (table, recorder) = observed(options()).await;
    let before = recorder.flushes();

    table.dispatch(EventKind::UpdateData);
    table.dispatch(Event::update_row(Section::Body, 0));
    table.wait_for_updates().await;

    assert_eq!(recorder.flushes(), before + 1);
    // the narrow request survives in the batch; the full rebuild absorbs it
    assert!(recorder.last_batch().has(EventKind::UpdateSectionRow(Section::Body)));
    let report = recorder.last_report();
    assert!(report.full);
    assert_eq!(report.rows_rebuilt, 4);
}

#[tokio::test(flavor = "current_thread")]
async fn test_burst_with_work_between_dispatches_is_one_flush() {
    let (table, recorder) = observed(options()).await;
    let before = recorder.flushes();

    table.dispatch(EventKind::UpdateData);
    std::thread::sleep(std::time::Duration::from_millis(2));
    table.dispatch(Event::update_row(Section::Body, 0));
    assert_eq!(recorder.flushes(), before);
    table.wait_for_updates().await;

    assert_eq!(recorder.flushes(), before + 1);
    let report = recorder.last_report();
    assert!(report.full);
    assert_eq!(report.rows_rebuilt, 4);
}

#[tokio::test]
async fn test_flush_runs_pending_work_immediately() {
    let (table, _recorder) = observed(options()).await;
    let revision = table.revision();

    table.dispatch(EventKind::UpdateRows);
    assert!(table.is_pending());
    table.flush();

    assert!(!table.is_pending());
    assert_eq!(table.revision(), revision + 1);
}

// =============================================================================
// Differential updates
// =============================================================================

#[tokio::test]
async fn test_row_update_keeps_other_rows() {
    let (table, recorder) = observed(options()).await;
    let head = table.head();
    let body = table.body();

    table.dispatch(Event::update_row(Section::Body, 1));
    table.wait_for_updates().await;

    let next = table.body();
    assert!(Arc::ptr_eq(&body[0], &next[0]));
    assert!(!Arc::ptr_eq(&body[1], &next[1]));
    assert!(Arc::ptr_eq(&body[2], &next[2]));
    assert!(Arc::ptr_eq(&head[0], &table.head()[0]));
    assert!(!recorder.last_report().full);
}

#[tokio::test]
async fn test_update_data_item_rebuilds_its_row() {
    let (table, recorder) = observed(options()).await;
    let body = table.body();

    assert!(table.update_data_item(2, |p| p.age = 29));
    assert!(!table.update_data_item(7, |p| p.age = 0));
    table.wait_for_updates().await;

    let next = table.body();
    assert_eq!(next[2].cells[1].value, json!(29));
    assert!(Arc::ptr_eq(&body[0], &next[0]));
    assert_eq!(recorder.last_report().rows_rebuilt, 1);
}

#[tokio::test]
async fn test_cell_update_rebuilds_one_cell() {
    let (table, recorder) = observed(options()).await;
    let body = table.body();

    table.dispatch(Event::update_cell(Section::Body, 0, 1));
    table.wait_for_updates().await;

    let report = recorder.last_report();
    assert_eq!(report.cells_rebuilt, 1);
    assert_eq!(report.rows_rebuilt, 0);
    let next = table.body();
    assert_eq!(next[0].cells[0], body[0].cells[0]);
    assert!(Arc::ptr_eq(&body[1], &next[1]));
}

#[tokio::test]
async fn test_set_column_rebuilds_its_cells() {
    let (table, recorder) = observed(options()).await;

    let shouted = Column::map(|p: &Person| p.name.to_uppercase()).head_text("NAME");
    assert!(table.set_column(0, shouted));
    table.wait_for_updates().await;

    let report = recorder.last_report();
    assert!(!report.full);
    assert_eq!(report.cells_rebuilt, 4);
    assert_eq!(table.body()[0].cells[0].value, json!("ADA"));
    assert_eq!(table.head()[0].cells[0].value, json!("NAME"));
}

#[tokio::test]
async fn test_set_column_with_new_head_shape_rebuilds_head() {
    let (table, _recorder) = observed(options()).await;

    let grouped = Column::map(|p: &Person| p.name.clone())
        .head_row(|_, _| json!("Who"))
        .head_row(|_, _| json!("Name"));
    table.set_column(0, grouped);
    table.wait_for_updates().await;

    assert_eq!(table.head().len(), 2);
}

// =============================================================================
// Failure handling
// =============================================================================

/// Fails `configure` once `fail` is set.
struct Flaky {
    fail: AtomicBool,
}

impl Plugin<Person> for Flaky {
    fn name(&self) -> &str {
        "flaky"
    }

    fn configure(&self, _cx: &ConfigureContext<'_, Person>) -> Result<Extras, PluginError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(PluginError::new("config store unavailable"))
        } else {
            Ok(Extras::new())
        }
    }
}

/// Panics while building rows once `armed` is set.
struct Exploding {
    armed: AtomicBool,
}

impl Plugin<Person> for Exploding {
    fn name(&self) -> &str {
        "exploding"
    }

    fn configure(&self, _cx: &ConfigureContext<'_, Person>) -> Result<Extras, PluginError> {
        Ok(Extras::new())
    }

    fn on_create_row(&self, _section: Section, _row: &Row) -> Extras {
        if self.armed.load(Ordering::SeqCst) {
            panic!("row hook exploded");
        }
        Extras::new()
    }
}

#[tokio::test]
async fn test_missing_targets_are_skipped() {
    let (table, recorder) = observed(options()).await;
    let body = table.body();

    table.dispatch(Event::update_row(Section::Body, 99));
    table.dispatch(Event::update_cell(Section::Body, 0, 42));
    table.wait_for_updates().await;

    let report = recorder.last_report();
    assert_eq!(report.rows_rebuilt, 0);
    assert_eq!(report.cells_rebuilt, 0);
    let next = table.body();
    assert_eq!(next.len(), body.len());
    assert!(body.iter().zip(next.iter()).all(|(a, b)| Arc::ptr_eq(a, b)));
    assert!(recorder.errors.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_configure_error_in_flush_publishes_nothing() {
    let flaky = Arc::new(Flaky {
        fail: AtomicBool::new(false),
    });
    let (table, recorder) = observed(options().plugin(flaky.clone())).await;
    let revision = table.revision();
    let flushes = recorder.flushes();
    let body = table.body();

    flaky.fail.store(true, Ordering::SeqCst);
    table.dispatch(EventKind::UpdateConfig);
    table.wait_for_updates().await;

    let errors = recorder.errors.lock().unwrap().clone();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("flaky"));
    assert_eq!(table.revision(), revision);
    assert_eq!(recorder.flushes(), flushes);
    assert!(Arc::ptr_eq(&body[0], &table.body()[0]));
}

#[tokio::test]
async fn test_panicking_hook_keeps_committed_state() {
    let exploding = Arc::new(Exploding {
        armed: AtomicBool::new(false),
    });
    let (table, _recorder) = observed(options().plugin(exploding.clone())).await;
    let revision = table.revision();
    let body = table.body();

    exploding.armed.store(true, Ordering::SeqCst);
    table.dispatch(Event::update_row(Section::Body, 0));
    // waiters are released even though the flush panicked
    table.wait_for_updates().await;

    assert!(!table.is_pending());
    assert_eq!(table.revision(), revision);
    assert!(Arc::ptr_eq(&body[0], &table.body()[0]));

    exploding.armed.store(false, Ordering::SeqCst);
    table.dispatch(Event::update_row(Section::Body, 0));
    table.wait_for_updates().await;

    assert_eq!(table.revision(), revision + 1);
    assert!(!Arc::ptr_eq(&body[0], &table.body()[0]));
}

// =============================================================================
// Plugins
// =============================================================================

#[tokio::test]
async fn test_higher_priority_owns_contested_keys() {
    let table = Table::new(
        options()
            .plugin(Tagger::new("low", 5, "x"))
            .plugin(Tagger::new("high", 10, "x")),
    )
    .unwrap();
    table.wait_for_updates().await;

    let x = Key::<String>::new("x");
    assert_eq!(table.plugin_names(), vec!["high", "low"]);
    assert_eq!(table.config().get(x), Some("high".to_string()));
    assert_eq!(table.extensions().get(x), Some("high".to_string()));
    // row bags: last writer in hook order
    assert_eq!(table.body()[0].get(x), Some("low".to_string()));
}

#[tokio::test]
async fn test_set_plugins_drops_stale_extension_keys() {
    let table = Table::new(options().plugin(Tagger::new("a", 5, "a"))).unwrap();
    table.wait_for_updates().await;
    assert!(table.extensions().contains("a"));

    let plugins: Vec<PluginRef<Person>> = vec![Tagger::new("b", 5, "b")];
    table.set_plugins(plugins).unwrap();
    table.wait_for_updates().await;

    let extensions = table.extensions();
    assert!(!extensions.contains("a"));
    assert!(extensions.contains("b"));
    assert!(!table.config().contains("a"));
    assert!(!table.body()[0].extras.contains("a"));
}

#[tokio::test]
async fn test_failed_set_plugins_keeps_current_plugins() {
    let table = Table::new(options().plugin(Tagger::new("a", 5, "a"))).unwrap();
    table.wait_for_updates().await;

    let plugins: Vec<PluginRef<Person>> = vec![Tagger::new("b", 5, "b"), Arc::new(Failing)];
    let result = table.set_plugins(plugins);
    assert!(matches!(result, Err(TableError::Configure { .. })));
    assert_eq!(table.plugin_names(), vec!["a"]);
}

#[tokio::test]
async fn test_selection_toggle_updates_one_row() {
    let selection = Arc::new(RowSelection::new());
    let (table, recorder) = observed(options().plugin(selection.clone())).await;
    let body = table.body();
    let before = recorder.flushes();

    selection.toggle(&body[1], None);
    table.wait_for_updates().await;

    assert_eq!(recorder.flushes(), before + 1);
    let next = table.body();
    assert_eq!(next[1].get(SELECTED), Some(true));
    assert_eq!(next[0].get(SELECTED), Some(false));
    assert!(Arc::ptr_eq(&body[0], &next[0]));
    assert!(Arc::ptr_eq(&body[2], &next[2]));
    assert_eq!(table.head()[0].get(HAS_SELECTED_ROWS), Some(true));
    assert_eq!(table.extensions().get(SELECTED_ROWS), Some(vec!["2".to_string()]));
}

#[tokio::test]
async fn test_reset_clears_plugin_state() {
    let selection = Arc::new(RowSelection::new());
    let table = Table::new(options().plugin(selection.clone())).unwrap();
    table.wait_for_updates().await;

    selection.toggle(&table.body()[0], Some(true));
    table.wait_for_updates().await;
    assert!(selection.is_selected("1"));

    let revision = table.revision();
    table.reset();

    assert!(!selection.is_selected("1"));
    assert_eq!(table.body()[0].get(SELECTED), Some(false));
    assert!(table.revision() > revision);
}

// =============================================================================
// Lifecycle and subscriptions
// =============================================================================

struct MountCounter(AtomicUsize);

impl Plugin<Person> for MountCounter {
    fn name(&self) -> &str {
        "mount-counter"
    }

    fn configure(&self, _cx: &ConfigureContext<'_, Person>) -> Result<Extras, PluginError> {
        Ok(Extras::new())
    }

    fn on_mount(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    fn on_unmount(&self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_mount_and_unmount_reach_plugins() {
    let counter = Arc::new(MountCounter(AtomicUsize::new(0)));
    let table = Table::new(options().plugin(counter.clone())).unwrap();
    table.wait_for_updates().await;

    table.mount();
    table.wait_for_updates().await;
    assert!(table.is_mounted());
    assert_eq!(counter.0.load(Ordering::SeqCst), 1);

    table.unmount();
    table.wait_for_updates().await;
    assert!(!table.is_mounted());
    assert_eq!(counter.0.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_subscribers_see_every_revision() {
    let table = Table::new(options()).unwrap();
    let seen = Arc::new(AtomicU64::new(0));
    let sink = seen.clone();
    let id = table.subscribe(move |revision| sink.store(revision, Ordering::SeqCst));
    table.wait_for_updates().await;
    assert_eq!(seen.load(Ordering::SeqCst), 1);

    table.dispatch(EventKind::UpdateRows);
    table.wait_for_updates().await;
    assert_eq!(seen.load(Ordering::SeqCst), 2);

    assert!(table.unsubscribe(id));
    table.dispatch(EventKind::UpdateRows);
    table.wait_for_updates().await;
    assert_eq!(seen.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_handle_is_inert_after_drop() {
    let table = Table::new(options()).unwrap();
    table.wait_for_updates().await;
    let handle = table.handle();
    assert!(handle.is_alive());
    assert_eq!(handle.read(|view| view.body().len()), Some(3));

    drop(table);
    assert!(!handle.is_alive());
    assert!(handle.read(|view| view.body().len()).is_none());
    handle.dispatch(EventKind::UpdateAll);
}

// =============================================================================
// Events
// =============================================================================

#[test]
fn test_event_names_parse() {
    let event = Event::parse("update:body-row", Payload::Row { row_index: 2 }).unwrap();
    assert_eq!(event.kind(), EventKind::UpdateSectionRow(Section::Body));
    assert_eq!(event.kind().to_string(), "update:body-row");

    assert!(matches!(
        Event::parse("update:nothing", Payload::None),
        Err(TableError::UnknownEvent(_))
    ));
    assert!(matches!(
        Event::parse("update:body-row", Payload::Column { column_index: 0 }),
        Err(TableError::PayloadMismatch { .. })
    ));
}

#[test]
fn test_flush_without_runtime() {
    let table = Table::new(options()).unwrap();
    assert!(table.is_pending());
    assert!(table.body().is_empty());

    table.flush();
    assert_eq!(table.body().len(), 3);
    assert!(!table.is_pending());
}
