//! Handler capabilities.
//!
//! A consumer implements only the traits it cares about and registers each
//! one with a listener; every method has a no-op default. Book, level and
//! entry references passed to a callback are borrowed for that call only.

use chrono::{DateTime, Utc};
use depthcast_book::{BasicDelta, BookEntry, DeltaList, LevelSnapshot, OrderBook, PriceLevel};
use depthcast_types::{DepthcastError, FieldMsg, MsgType, Quality};

use crate::atomic::{AtomicEntry, AtomicLevel};
use crate::sequence::SeqGap;

/// Context of the inbound message being dispatched.
#[derive(Debug, Clone, Copy)]
pub struct BookEvent<'a> {
    pub symbol: &'a str,
    pub msg: &'a FieldMsg,
    pub msg_type: MsgType,
    /// Zero when the message carried no sequence number.
    pub seq_num: u64,
    pub event_time: Option<DateTime<Utc>>,
}

// =====================================================================
// Structured listener
// =====================================================================

pub trait BookHandler {
    /// The book was rebuilt from a full-state message.
    fn on_book_recap(&mut self, _event: &BookEvent<'_>, _book: &OrderBook) {}

    /// One level and at most one entry changed.
    fn on_book_delta(&mut self, _event: &BookEvent<'_>, _delta: &BasicDelta, _book: &OrderBook) {}

    fn on_book_complex_delta(
        &mut self,
        _event: &BookEvent<'_>,
        _deltas: &DeltaList,
        _book: &OrderBook,
    ) {
    }

    fn on_book_clear(&mut self, _event: &BookEvent<'_>, _book: &OrderBook) {}

    /// Messages were missed; the book is left as it was and marked
    /// inconsistent until the next recap.
    fn on_book_gap(&mut self, _event: &BookEvent<'_>, _gap: SeqGap, _book: &OrderBook) {}
}

pub trait LevelHandler {
    fn on_level_recap(&mut self, _event: &BookEvent<'_>, _level: &PriceLevel) {}

    /// The level after the change. A pruned level is reported with action
    /// `Delete`.
    fn on_level_delta(&mut self, _event: &BookEvent<'_>, _level: &LevelSnapshot) {}
}

pub trait EntryHandler {
    fn on_entry_recap(&mut self, _event: &BookEvent<'_>, _level: &PriceLevel, _entry: &BookEntry) {}

    fn on_entry_delta(&mut self, _event: &BookEvent<'_>, _delta: &BasicDelta) {}
}

pub trait ErrorHandler {
    fn on_book_error(&mut self, _symbol: &str, _error: &DepthcastError) {}
}

pub trait QualityHandler {
    fn on_quality_change(&mut self, _symbol: &str, _old: Quality, _new: Quality) {}
}

// =====================================================================
// Atomic listener
// =====================================================================

pub trait AtomicBookHandler {
    fn on_book_atomic_begin(&mut self, _event: &BookEvent<'_>, _is_recap: bool) {}

    fn on_book_atomic_end(&mut self, _event: &BookEvent<'_>) {}

    fn on_book_atomic_clear(&mut self, _event: &BookEvent<'_>) {}

    fn on_book_atomic_gap(&mut self, _event: &BookEvent<'_>, _gap: SeqGap) {}
}

pub trait AtomicLevelHandler {
    fn on_atomic_level_recap(&mut self, _event: &BookEvent<'_>, _level: &AtomicLevel) {}

    fn on_atomic_level_delta(&mut self, _event: &BookEvent<'_>, _level: &AtomicLevel) {}
}

pub trait AtomicEntryHandler {
    fn on_atomic_entry_recap(
        &mut self,
        _event: &BookEvent<'_>,
        _level: &AtomicLevel,
        _entry: &AtomicEntry,
    ) {
    }

    fn on_atomic_entry_delta(
        &mut self,
        _event: &BookEvent<'_>,
        _level: &AtomicLevel,
        _entry: &AtomicEntry,
    ) {
    }
}
