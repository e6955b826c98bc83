//! Per-row flag bookkeeping shared by the selection and hidden-row plugins.
//!
//! Flags are keyed by `raw_id` so they survive rebuilds, reordering and data
//! replacement as long as the record keeps its identity.

use std::collections::HashSet;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::events::{Dispatcher, Event, EventKind};
use crate::extras::{Extras, Key};
use crate::node::{Row, Section};

/// Set of row identities.
#[derive(Debug, Clone, Default)]
pub struct RowSet {
    ids: HashSet<String>,
}

impl RowSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, raw_id: &str) -> bool {
        self.ids.contains(raw_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Set or unset `raw_id`. Returns whether membership changed.
    pub fn set(&mut self, raw_id: &str, value: bool) -> bool {
        if value {
            self.ids.insert(raw_id.to_string())
        } else {
            self.ids.remove(raw_id)
        }
    }

    /// Flip `raw_id`. Returns the new membership.
    pub fn toggle(&mut self, raw_id: &str) -> bool {
        let next = !self.contains(raw_id);
        self.set(raw_id, next);
        next
    }

    /// Clear the set. Returns the removed IDs.
    pub fn clear(&mut self) -> Vec<String> {
        self.ids.drain().collect()
    }

    /// Keep only IDs present in `existing`.
    pub fn retain_existing<'a>(&mut self, existing: impl IntoIterator<Item = &'a str>) {
        let existing: HashSet<&str> = existing.into_iter().collect();
        self.ids.retain(|id| existing.contains(id.as_str()));
    }

    /// Members of `rows`, in row order.
    pub fn in_order(&self, rows: &[Arc<Row>]) -> Vec<String> {
        rows.iter()
            .filter(|row| self.contains(&row.raw_id))
            .map(|row| row.raw_id.clone())
            .collect()
    }
}

/// Extension keys used by one flag family.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FlagKeys {
    /// On body rows.
    pub row: Key<bool>,
    /// On head rows and in extensions.
    pub all: Key<bool>,
    /// On head rows and in extensions.
    pub any: Key<bool>,
    /// In extensions: flagged raw IDs in body order.
    pub list: Key<Vec<String>>,
}

#[derive(Debug, Default)]
struct FlagState {
    set: RowSet,
    body_ids: Vec<String>,
    any: bool,
    all: bool,
    /// Summaries changed in a body rebuild and the head has not been rebuilt since.
    head_stale: bool,
    dispatcher: Option<Dispatcher>,
}

impl FlagState {
    /// Recompute the summary flags. Returns whether either changed.
    fn refresh(&mut self) -> bool {
        let any = !self.set.is_empty();
        let all = any && self.set.len() >= self.body_ids.len();
        let changed = any != self.any || all != self.all;
        self.any = any;
        self.all = all;
        changed
    }
}

/// Body-row flags with head-row summaries.
#[derive(Debug)]
pub(crate) struct RowFlags {
    keys: FlagKeys,
    state: Mutex<FlagState>,
}

impl RowFlags {
    pub fn new(keys: FlagKeys) -> Self {
        Self {
            keys,
            state: Mutex::new(FlagState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FlagState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn attach(&self, dispatcher: Option<Dispatcher>) {
        self.lock().dispatcher = dispatcher;
    }

    pub fn contains(&self, raw_id: &str) -> bool {
        self.lock().set.contains(raw_id)
    }

    pub fn ids(&self) -> Vec<String> {
        let state = self.lock();
        state
            .body_ids
            .iter()
            .filter(|id| state.set.contains(id))
            .cloned()
            .collect()
    }

    pub fn any(&self) -> bool {
        self.lock().any
    }

    pub fn all(&self) -> bool {
        self.lock().all
    }

    /// Flip (or set) one body row's flag and request the matching rebuilds.
    pub fn toggle(&self, row: &Row, value: Option<bool>) -> bool {
        let (next, flags_changed, dispatcher) = {
            let mut state = self.lock();
            let next = value.unwrap_or(!state.set.contains(&row.raw_id));
            state.set.set(&row.raw_id, next);
            let flags_changed = state.refresh();
            (next, flags_changed, state.dispatcher.clone())
        };
        if let Some(dispatcher) = dispatcher {
            dispatcher.dispatch(Event::update_row(Section::Body, row.index));
            if flags_changed {
                dispatcher.dispatch(Event::update_rows(Section::Head));
            }
            dispatcher.dispatch(EventKind::UpdateExtensions);
        }
        next
    }

    /// Flag every body row.
    pub fn set_all(&self) {
        let dispatcher = {
            let mut state = self.lock();
            let ids = state.body_ids.clone();
            for id in &ids {
                state.set.set(id, true);
            }
            state.refresh();
            state.dispatcher.clone()
        };
        Self::dispatch_everything(dispatcher);
    }

    /// Clear every flag.
    pub fn reset(&self) {
        let dispatcher = {
            let mut state = self.lock();
            state.set.clear();
            state.refresh();
            state.dispatcher.clone()
        };
        Self::dispatch_everything(dispatcher);
    }

    pub fn clear_silently(&self) {
        let mut state = self.lock();
        state.set.clear();
        state.refresh();
    }

    fn dispatch_everything(dispatcher: Option<Dispatcher>) {
        if let Some(dispatcher) = dispatcher {
            dispatcher.dispatch(Event::update_rows(Section::Body));
            dispatcher.dispatch(Event::update_rows(Section::Head));
            dispatcher.dispatch(EventKind::UpdateExtensions);
        }
    }

    pub fn row_extras(&self, section: Section, row: &Row) -> Extras {
        let state = self.lock();
        match section {
            Section::Body => Extras::new().with(self.keys.row, state.set.contains(&row.raw_id)),
            Section::Head => Extras::new()
                .with(self.keys.all, state.all)
                .with(self.keys.any, state.any),
            Section::Footer => Extras::new(),
        }
    }

    /// Forget flags of records that are gone and track the body size.
    pub fn after_body_rebuilt(&self, rows: &[Row]) {
        let mut state = self.lock();
        state.set.retain_existing(rows.iter().map(|row| row.raw_id.as_str()));
        state.body_ids = rows.iter().map(|row| row.raw_id.clone()).collect();
        if state.refresh() {
            state.head_stale = true;
        }
    }

    /// A full head rebuild picks up the current summaries.
    pub fn before_rows(&self, section: Section) {
        if section == Section::Head {
            self.lock().head_stale = false;
        }
    }

    /// Summaries for extensions.
    ///
    /// Runs after every section of a flush that rebuilt the body, so a head
    /// left stale by that flush is requested here.
    pub fn extend(&self, body: &[Arc<Row>]) -> Extras {
        let (extras, dispatcher) = {
            let mut state = self.lock();
            let extras = Extras::new()
                .with(self.keys.list, state.set.in_order(body))
                .with(self.keys.any, state.any)
                .with(self.keys.all, state.all);
            let stale = mem::take(&mut state.head_stale);
            (extras, stale.then(|| state.dispatcher.clone()).flatten())
        };
        if let Some(dispatcher) = dispatcher {
            dispatcher.dispatch(Event::update_rows(Section::Head));
        }
        extras
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventScheduler;
    use crate::observer::LogObserver;

    const KEYS: FlagKeys = FlagKeys {
        row: Key::new("flag"),
        all: Key::new("all-flagged"),
        any: Key::new("any-flagged"),
        list: Key::new("flagged"),
    };

    fn body(ids: &[&str]) -> Vec<Row> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| Row::new(Section::Body, id.to_string(), i, Some(i)))
            .collect()
    }

    fn attached() -> (RowFlags, Arc<EventScheduler>) {
        let scheduler = EventScheduler::new(|_| {}, Arc::new(LogObserver::default()));
        let flags = RowFlags::new(KEYS);
        flags.after_body_rebuilt(&body(&["a", "b"]));
        flags.lock().set.set("a", true);
        flags.lock().refresh();
        flags.attach(Some(Dispatcher::new(Arc::clone(&scheduler))));
        (flags, scheduler)
    }

    #[test]
    fn head_rebuilt_in_the_same_flush_is_not_requested_again() {
        let (flags, scheduler) = attached();
        flags.after_body_rebuilt(&body(&["b"]));
        flags.before_rows(Section::Head);
        flags.extend(&[]);
        assert!(!scheduler.has(EventKind::UpdateSectionRows(Section::Head)));
        assert!(!flags.any());
    }

    #[test]
    fn stale_head_is_requested_after_the_flush() {
        let (flags, scheduler) = attached();
        flags.after_body_rebuilt(&body(&["b"]));
        flags.extend(&[]);
        assert!(scheduler.has(EventKind::UpdateSectionRows(Section::Head)));
    }

    #[test]
    fn toggle_flips_membership() {
        let mut set = RowSet::new();
        assert!(set.toggle("a"));
        assert!(set.contains("a"));
        assert!(!set.toggle("a"));
        assert!(set.is_empty());
    }

    #[test]
    fn retain_existing_prunes_stale_ids() {
        let mut set = RowSet::new();
        set.set("a", true);
        set.set("b", true);
        set.retain_existing(["b", "c"]);
        assert!(!set.contains("a"));
        assert!(set.contains("b"));
        assert_eq!(set.len(), 1);
    }
}
