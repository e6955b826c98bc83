//! Batching event scheduler.
//!
//! Dispatches accumulate into an [`EventBatch`]. The first dispatch after a
//! flush spawns a single flush task on the ambient tokio runtime; everything
//! dispatched before that task runs lands in the same batch.
//!
//! Coalescing a synchronous burst relies on the flush task not running until
//! the dispatching task yields. That holds on a `current_thread` runtime. On a
//! multi-thread runtime another worker may pick the flush up mid-burst and the
//! burst is split across flushes; each flush is still correct on its own.
//!
//! The flush takes the batch out of the queue before processing it, so events
//! dispatched while `process` runs form the next batch.

use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::batch::EventBatch;
use super::kind::{Event, EventKind, Payload};
use crate::observer::TableObserver;

type ProcessFn = Box<dyn Fn(EventBatch) + Send + Sync>;

#[derive(Default)]
struct SchedulerInner {
    queue: EventBatch,
    /// A flush is owed for the current queue.
    scheduled: bool,
    task: Option<JoinHandle<()>>,
    /// Flushes currently executing `process`.
    running: usize,
    waiters: Vec<oneshot::Sender<()>>,
}

impl SchedulerInner {
    fn is_idle(&self) -> bool {
        !self.scheduled && self.running == 0
    }

    fn take_waiters_if_idle(&mut self) -> Vec<oneshot::Sender<()>> {
        if self.is_idle() {
            mem::take(&mut self.waiters)
        } else {
            Vec::new()
        }
    }
}

/// Per-table event queue with single-flush batching.
pub struct EventScheduler {
    inner: Mutex<SchedulerInner>,
    process: ProcessFn,
    observer: Arc<dyn TableObserver>,
}

impl EventScheduler {
    /// Create a scheduler that hands every flushed batch to `process`.
    pub fn new<F>(process: F, observer: Arc<dyn TableObserver>) -> Arc<Self>
    where
        F: Fn(EventBatch) + Send + Sync + 'static,
    {
        Arc::new(Self {
            inner: Mutex::new(SchedulerInner::default()),
            process: Box::new(process),
            observer,
        })
    }

    fn lock(&self) -> MutexGuard<'_, SchedulerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue an event and make sure a flush is scheduled.
    ///
    /// Outside a tokio runtime the flush stays pending until [`flush`] is
    /// called or [`wait_idle`] is awaited inside a runtime.
    ///
    /// [`flush`]: EventScheduler::flush
    /// [`wait_idle`]: EventScheduler::wait_idle
    pub fn dispatch(self: &Arc<Self>, event: Event) {
        self.observer.on_dispatch(&event);
        let mut inner = self.lock();
        inner.queue.record(event);
        if !inner.scheduled {
            inner.scheduled = true;
            inner.task = self.spawn_flush();
        }
    }

    fn spawn_flush(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let handle = Handle::try_current().ok()?;
        let scheduler = Arc::clone(self);
        Some(handle.spawn(async move {
            // Let the dispatching task finish its synchronous burst first.
            tokio::task::yield_now().await;
            scheduler.run_flush(false);
        }))
    }

    fn run_flush(self: &Arc<Self>, forced: bool) {
        let batch = {
            let mut inner = self.lock();
            if !inner.scheduled && !forced {
                return;
            }
            inner.scheduled = false;
            if let Some(task) = inner.task.take()
                && forced
            {
                task.abort();
            }
            inner.running += 1;
            mem::take(&mut inner.queue)
        };

        let _guard = FlushGuard { scheduler: self };
        if batch.is_empty() {
            return;
        }
        self.observer.on_flush_start(&batch);
        (self.process)(batch);
    }

    /// Run a pending flush now, on the calling thread.
    pub fn flush(self: &Arc<Self>) {
        self.run_flush(true);
    }

    /// Abort a scheduled flush that has not started yet.
    ///
    /// Queued events are kept; the next dispatch or [`flush`] processes them.
    /// A flush that is already running completes normally.
    ///
    /// [`flush`]: EventScheduler::flush
    pub fn cancel_next_process(&self) {
        let waiters = {
            let mut inner = self.lock();
            if let Some(task) = inner.task.take() {
                task.abort();
            }
            inner.scheduled = false;
            inner.take_waiters_if_idle()
        };
        resolve(waiters);
    }

    /// Drop every queued event.
    pub fn clear(&self) {
        self.lock().queue.clear();
    }

    /// Whether a flush is scheduled or running.
    pub fn is_pending(&self) -> bool {
        !self.lock().is_idle()
    }

    /// Whether `kind` is queued for the next flush.
    pub fn has(&self, kind: EventKind) -> bool {
        self.lock().queue.has(kind)
    }

    /// Payloads queued for `kind`.
    pub fn get(&self, kind: EventKind) -> Vec<Payload> {
        self.lock().queue.get(kind).to_vec()
    }

    /// Resolve once no flush is scheduled or running.
    ///
    /// Events dispatched by a flush schedule another one; the wait covers
    /// those as well.
    pub async fn wait_idle(self: &Arc<Self>) {
        let rx = {
            let mut inner = self.lock();
            if inner.is_idle() {
                return;
            }
            if inner.scheduled && inner.task.is_none() {
                inner.task = self.spawn_flush();
            }
            let (tx, rx) = oneshot::channel();
            inner.waiters.push(tx);
            rx
        };
        let _ = rx.await;
    }
}

impl std::fmt::Debug for EventScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("EventScheduler")
            .field("queue", &inner.queue)
            .field("scheduled", &inner.scheduled)
            .field("running", &inner.running)
            .finish_non_exhaustive()
    }
}

/// Marks a flush finished, even if `process` panics.
struct FlushGuard<'a> {
    scheduler: &'a EventScheduler,
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        let waiters = {
            let mut inner = self.scheduler.lock();
            inner.running = inner.running.saturating_sub(1);
            inner.take_waiters_if_idle()
        };
        resolve(waiters);
    }
}

fn resolve(waiters: Vec<oneshot::Sender<()>>) {
    for waiter in waiters {
        let _ = waiter.send(());
    }
}

/// Cloneable dispatch handle.
///
/// Plugins keep one to request rebuilds from inside hooks without touching the
/// table's state lock.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    scheduler: Arc<EventScheduler>,
}

impl Dispatcher {
    pub(crate) fn new(scheduler: Arc<EventScheduler>) -> Self {
        Self { scheduler }
    }

    pub fn dispatch(&self, event: impl Into<Event>) {
        self.scheduler.dispatch(event.into());
    }

    /// Resolve once every queued flush has completed.
    pub async fn wait_for_updates(&self) {
        self.scheduler.wait_idle().await;
    }

    pub fn is_pending(&self) -> bool {
        self.scheduler.is_pending()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::node::Section;
    use crate::observer::LogObserver;

    fn recording() -> (Arc<EventScheduler>, Arc<Mutex<Vec<EventBatch>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let scheduler = EventScheduler::new(
            move |batch| sink.lock().unwrap().push(batch),
            Arc::new(LogObserver::default()),
        );
        (scheduler, seen)
    }

    #[tokio::test]
    async fn dispatches_in_one_tick_share_a_flush() {
        let (scheduler, seen) = recording();
        for _ in 0..5 {
            scheduler.dispatch(Event::new(EventKind::UpdateExtensions));
        }
        assert!(scheduler.is_pending());
        scheduler.wait_idle().await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].count(EventKind::UpdateExtensions), 5);
    }

    #[tokio::test]
    async fn cancel_next_process_skips_the_scheduled_flush() {
        let (scheduler, seen) = recording();
        scheduler.dispatch(Event::update_row(Section::Body, 0));
        scheduler.cancel_next_process();
        assert!(!scheduler.is_pending());
        scheduler.wait_idle().await;
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        assert!(seen.lock().unwrap().is_empty());

        // the queued event is still delivered with the next flush
        scheduler.dispatch(Event::new(EventKind::UpdateConfig));
        scheduler.wait_idle().await;
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].has(EventKind::UpdateSectionRow(Section::Body)));
        assert!(seen[0].has(EventKind::UpdateConfig));
    }

    #[test]
    fn without_runtime_flush_is_manual() {
        let (scheduler, seen) = recording();
        scheduler.dispatch(Event::new(EventKind::UpdateAll));
        assert!(scheduler.is_pending());
        assert!(scheduler.has(EventKind::UpdateAll));

        scheduler.flush();
        assert!(!scheduler.is_pending());
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dispatch_during_process_lands_in_next_flush() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let slot: Arc<Mutex<Option<Dispatcher>>> = Arc::new(Mutex::new(None));
        let inner_slot = Arc::clone(&slot);
        let scheduler = EventScheduler::new(
            move |batch: EventBatch| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    assert!(batch.has(EventKind::UpdateData));
                    if let Some(dispatcher) = inner_slot.lock().unwrap().as_ref() {
                        dispatcher.dispatch(EventKind::UpdateExtensions);
                    }
                } else {
                    assert!(batch.has(EventKind::UpdateExtensions));
                    assert!(!batch.has(EventKind::UpdateData));
                }
            },
            Arc::new(LogObserver::default()),
        );
        *slot.lock().unwrap() = Some(Dispatcher::new(Arc::clone(&scheduler)));

        scheduler.dispatch(Event::new(EventKind::UpdateData));
        scheduler.wait_idle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
