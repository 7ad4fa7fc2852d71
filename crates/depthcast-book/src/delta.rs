//! Change records produced by book mutations.
//!
//! A [`BasicDelta`] captures one level (and optionally one entry) as it was
//! right after a mutation, plus the actions that describe the change. The
//! book keeps a [`DeltaList`] of pending deltas for publication; the
//! structured listener keeps another one per inbound message for its
//! callbacks.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use depthcast_types::{BookAction, LevelOrderType, Side};
use rust_decimal::Decimal;

use crate::entry::BookEntry;

/// Opaque caller data threaded from a delete to publication and callbacks.
pub type DeltaClosure = Arc<dyn Any + Send + Sync>;

/// Scalar state of a price level, without its entries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelSnapshot {
    pub price: Decimal,
    pub side: Side,
    pub size: Decimal,
    pub size_change: Decimal,
    pub action: BookAction,
    pub order_type: LevelOrderType,
    pub time: Option<DateTime<Utc>>,
    pub num_entries: u32,
}

impl LevelSnapshot {
    /// `(side, price)` identity of the level.
    #[must_use]
    pub fn key(&self) -> (Side, Decimal) {
        (self.side, self.price)
    }
}

/// One recorded change.
#[derive(Clone)]
pub struct BasicDelta {
    pub level: LevelSnapshot,
    /// The touched entry, if the change was entry-level.
    pub entry: Option<BookEntry>,
    /// Level size movement caused by this change.
    pub pl_delta_size: Decimal,
    pub pl_action: BookAction,
    pub entry_action: Option<BookAction>,
    pub closure: Option<DeltaClosure>,
}

impl BasicDelta {
    /// A level-only change.
    #[must_use]
    pub fn level(level: LevelSnapshot, pl_delta_size: Decimal, pl_action: BookAction) -> Self {
        Self {
            level,
            entry: None,
            pl_delta_size,
            pl_action,
            entry_action: None,
            closure: None,
        }
    }

    /// An entry change at `level`.
    #[must_use]
    pub fn entry(
        level: LevelSnapshot,
        entry: BookEntry,
        pl_delta_size: Decimal,
        pl_action: BookAction,
        entry_action: BookAction,
    ) -> Self {
        Self {
            level,
            entry: Some(entry),
            pl_delta_size,
            pl_action,
            entry_action: Some(entry_action),
            closure: None,
        }
    }

    #[must_use]
    pub fn with_closure(mut self, closure: Option<DeltaClosure>) -> Self {
        self.closure = closure;
        self
    }

    /// Removal of a whole level (not caused by its last entry leaving).
    #[must_use]
    pub fn is_level_delete(&self) -> bool {
        self.entry.is_none() && self.pl_action == BookAction::Delete
    }

    /// Closure downcast to a concrete type.
    #[must_use]
    pub fn closure_as<T: Any>(&self) -> Option<&T> {
        self.closure.as_deref().and_then(|c| c.downcast_ref::<T>())
    }
}

impl fmt::Debug for BasicDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicDelta")
            .field("level", &self.level)
            .field("entry", &self.entry)
            .field("pl_delta_size", &self.pl_delta_size)
            .field("pl_action", &self.pl_action)
            .field("entry_action", &self.entry_action)
            .field("has_closure", &self.closure.is_some())
            .finish()
    }
}

/// An ordered, reusable list of deltas.
#[derive(Debug, Clone, Default)]
pub struct DeltaList {
    deltas: Vec<BasicDelta>,
}

impl DeltaList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, delta: BasicDelta) {
        self.deltas.push(delta);
    }

    /// Forget every delta, keeping the allocation.
    pub fn clear(&mut self) {
        self.deltas.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BasicDelta> {
        self.deltas.iter()
    }

    #[must_use]
    pub fn first(&self) -> Option<&BasicDelta> {
        self.deltas.first()
    }

    /// Runs of consecutive deltas on the same level, in recording order. A
    /// level delete closes its run, so a level re-created at the same price
    /// starts a new one.
    pub fn level_groups(&self) -> impl Iterator<Item = &[BasicDelta]> {
        self.deltas
            .chunk_by(|a, b| a.level.key() == b.level.key() && !a.is_level_delete())
    }

    #[must_use]
    pub fn level_count(&self) -> usize {
        self.level_groups().count()
    }

    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.deltas.iter().filter(|d| d.entry.is_some()).count()
    }

    /// Exactly one level and at most one entry touched.
    #[must_use]
    pub fn is_simple(&self) -> bool {
        self.level_count() == 1 && self.entry_count() <= 1
    }

    /// The delta that best represents a simple change: its entry delta if it
    /// has one, otherwise its last level delta.
    #[must_use]
    pub fn simple_delta(&self) -> Option<&BasicDelta> {
        self.deltas
            .iter()
            .find(|d| d.entry.is_some())
            .or_else(|| self.deltas.last())
    }
}

impl<'a> IntoIterator for &'a DeltaList {
    type Item = &'a BasicDelta;
    type IntoIter = std::slice::Iter<'a, BasicDelta>;

    fn into_iter(self) -> Self::IntoIter {
        self.deltas.iter()
    }
}
