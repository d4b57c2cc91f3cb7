//! Translation of raw native events into [`DomainEvent`]s.

use crate::types::{DomainEvent, EventFilter, KindTable, RawEvent, RawPayload, SourceId};

/// Maps a raw native record to at most one domain event.
///
/// Implementations are called on the native callback thread: they must be
/// pure, must not block and must not call into the native subsystem.
pub trait EventTranslator: Send + Sync {
    fn translate(&self, source: SourceId, raw: &RawEvent) -> Option<DomainEvent>;
}

impl<F> EventTranslator for F
where
    F: Fn(SourceId, &RawEvent) -> Option<DomainEvent> + Send + Sync,
{
    fn translate(&self, source: SourceId, raw: &RawEvent) -> Option<DomainEvent> {
        self(source, raw)
    }
}

/// Translator for the list player event taxonomy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListPlayerTranslator {
    filter: EventFilter,
    kinds: KindTable,
}

impl ListPlayerTranslator {
    pub fn new(filter: EventFilter, kinds: KindTable) -> Self {
        Self { filter, kinds }
    }

    pub fn filter(&self) -> EventFilter {
        self.filter
    }
}

impl EventTranslator for ListPlayerTranslator {
    fn translate(&self, source: SourceId, raw: &RawEvent) -> Option<DomainEvent> {
        if !self.filter.contains(raw.kind) {
            return None;
        }

        if raw.kind == self.kinds.finished {
            Some(DomainEvent::Finished { source })
        } else if raw.kind == self.kinds.advanced {
            match raw.payload {
                RawPayload::Index(index) => Some(DomainEvent::SequenceAdvanced {
                    source,
                    index,
                    item: None,
                }),
                RawPayload::Item { index, item } => Some(DomainEvent::SequenceAdvanced {
                    source,
                    index,
                    item: Some(item),
                }),
                RawPayload::Empty => None,
            }
        } else if raw.kind == self.kinds.stopped {
            Some(DomainEvent::Stopped { source })
        } else {
            None
        }
    }
}

impl Default for ListPlayerTranslator {
    fn default() -> Self {
        let kinds = KindTable::default();
        Self::new(EventFilter::new(kinds.finished, kinds.stopped), kinds)
    }
}
