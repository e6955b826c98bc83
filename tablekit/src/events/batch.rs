use super::kind::{Event, EventKind, Payload};

/// The events accumulated between two flushes.
///
/// Kinds keep their first-arrival order; payloads of the same kind append to
/// one list. Recording a kind first drops every queued kind it cancels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventBatch {
    entries: Vec<(EventKind, Vec<Payload>)>,
}

impl EventBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event, cancelling the narrower kinds it subsumes.
    pub fn record(&mut self, event: Event) {
        let kind = event.kind();
        let cancels = kind.cancels();
        if !cancels.is_empty() {
            self.entries.retain(|(queued, _)| !cancels.contains(queued));
        }
        match self.entries.iter_mut().find(|(queued, _)| *queued == kind) {
            Some((_, payloads)) => payloads.push(event.payload()),
            None => self.entries.push((kind, vec![event.payload()])),
        }
    }

    pub fn has(&self, kind: EventKind) -> bool {
        self.entries.iter().any(|(queued, _)| *queued == kind)
    }

    /// Payloads recorded for `kind`, in dispatch order.
    pub fn get(&self, kind: EventKind) -> &[Payload] {
        self.entries
            .iter()
            .find(|(queued, _)| *queued == kind)
            .map(|(_, payloads)| payloads.as_slice())
            .unwrap_or_default()
    }

    /// Number of times `kind` was dispatched since it was last cancelled.
    pub fn count(&self, kind: EventKind) -> usize {
        self.get(kind).len()
    }

    pub fn kinds(&self) -> impl Iterator<Item = EventKind> + '_ {
        self.entries.iter().map(|(kind, _)| *kind)
    }

    /// Number of distinct kinds.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl FromIterator<Event> for EventBatch {
    fn from_iter<I: IntoIterator<Item = Event>>(iter: I) -> Self {
        let mut batch = Self::new();
        for event in iter {
            batch.record(event);
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Section;

    #[test]
    fn same_kind_accumulates_payloads() {
        let batch: EventBatch = (0..4).map(|_| Event::new(EventKind::UpdateConfig)).collect();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.count(EventKind::UpdateConfig), 4);
    }

    #[test]
    fn broader_event_cancels_queued_narrower_ones() {
        let batch: EventBatch = [
            Event::update_row(Section::Body, 1),
            Event::update_cell(Section::Head, 0, 0),
            Event::new(EventKind::UpdateAll),
        ]
        .into_iter()
        .collect();
        assert_eq!(batch.kinds().collect::<Vec<_>>(), vec![EventKind::UpdateAll]);
    }

    #[test]
    fn narrower_event_after_broader_one_is_kept() {
        let batch: EventBatch = [
            Event::new(EventKind::UpdateAll),
            Event::update_row(Section::Body, 1),
        ]
        .into_iter()
        .collect();
        assert!(batch.has(EventKind::UpdateAll));
        assert_eq!(
            batch.get(EventKind::UpdateSectionRow(Section::Body)),
            &[Payload::Row { row_index: 1 }]
        );
    }

    #[test]
    fn missing_kind_reads_empty() {
        let batch = EventBatch::new();
        assert!(batch.get(EventKind::UpdateData).is_empty());
        assert!(!batch.has(EventKind::UpdateData));
    }
}
