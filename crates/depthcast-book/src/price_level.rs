//! A single price level in the order book.
//!
//! Entries at one level share its price and are kept in arrival order in a
//! `Vec`. The aggregate size is cached and adjusted incrementally; entry
//! operations here are structural only and never touch delta tracking (see
//! the book-level methods on [`OrderBook`](crate::OrderBook) for the
//! recording variants).

use chrono::{DateTime, Utc};
use depthcast_types::{BookAction, DepthcastError, LevelOrderType, Result, Side};
use rust_decimal::Decimal;

use crate::delta::LevelSnapshot;
use crate::entry::BookEntry;

/// One price point on one side of the book.
///
/// Invariants while entries are tracked:
/// - `size == sum(entry.size)`
/// - `num_entries == entries.len()`
#[derive(Debug, Clone, PartialEq)]
pub struct PriceLevel {
    price: Decimal,
    side: Side,
    size: Decimal,
    size_change: Decimal,
    action: BookAction,
    order_type: LevelOrderType,
    time: Option<DateTime<Utc>>,
    num_entries: u32,
    entries: Vec<BookEntry>,
}

impl PriceLevel {
    /// Create a new empty price level.
    #[must_use]
    pub fn new(price: Decimal, side: Side) -> Self {
        Self {
            price,
            side,
            size: Decimal::ZERO,
            size_change: Decimal::ZERO,
            action: BookAction::Add,
            order_type: LevelOrderType::Limit,
            time: None,
            num_entries: 0,
            entries: Vec::new(),
        }
    }

    // =================================================================
    // Accessors
    // =================================================================

    #[must_use]
    pub fn price(&self) -> Decimal {
        self.price
    }

    #[must_use]
    pub fn side(&self) -> Side {
        self.side
    }

    #[must_use]
    pub fn size(&self) -> Decimal {
        self.size
    }

    #[must_use]
    pub fn size_change(&self) -> Decimal {
        self.size_change
    }

    #[must_use]
    pub fn action(&self) -> BookAction {
        self.action
    }

    #[must_use]
    pub fn order_type(&self) -> LevelOrderType {
        self.order_type
    }

    #[must_use]
    pub fn time(&self) -> Option<DateTime<Utc>> {
        self.time
    }

    #[must_use]
    pub fn num_entries(&self) -> u32 {
        self.num_entries
    }

    /// Entries in arrival order.
    #[must_use]
    pub fn entries(&self) -> &[BookEntry] {
        &self.entries
    }

    /// No entries and no aggregate size.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_entries == 0 && self.size.is_zero()
    }

    /// Scalar state without the entries.
    #[must_use]
    pub fn summary(&self) -> LevelSnapshot {
        LevelSnapshot {
            price: self.price,
            side: self.side,
            size: self.size,
            size_change: self.size_change,
            action: self.action,
            order_type: self.order_type,
            time: self.time,
            num_entries: self.num_entries,
        }
    }

    pub fn set_action(&mut self, action: BookAction) {
        self.action = action;
    }

    pub fn set_size_change(&mut self, size_change: Decimal) {
        self.size_change = size_change;
    }

    pub fn set_time(&mut self, time: Option<DateTime<Utc>>) {
        self.time = time;
    }

    pub fn set_order_type(&mut self, order_type: LevelOrderType) {
        self.order_type = order_type;
    }

    /// Set size and entry count directly. Only meaningful for books that
    /// carry level aggregates without entries.
    pub fn set_aggregate(&mut self, size: Decimal, num_entries: u32) {
        self.size = size;
        self.num_entries = num_entries;
    }

    /// Copy the mutable scalars of `other` (size change, action, time, order
    /// type). Size and entry count are copied only when this level tracks no
    /// entries, so a tracked level keeps summing its own entries.
    pub fn copy_details(&mut self, other: &PriceLevel) {
        self.size_change = other.size_change;
        self.action = other.action;
        self.time = other.time;
        self.order_type = other.order_type;
        if self.entries.is_empty() {
            self.size = other.size;
            self.num_entries = other.num_entries;
        }
    }

    // =================================================================
    // Entries
    // =================================================================

    #[must_use]
    pub fn find_entry(&self, id: &str) -> Option<&BookEntry> {
        self.entries.iter().find(|e| e.id == *id)
    }

    #[must_use]
    pub fn contains_entry(&self, id: &str) -> bool {
        self.find_entry(id).is_some()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.id == *id)
    }

    fn sync_count(&mut self) {
        self.num_entries = u32::try_from(self.entries.len()).unwrap_or(u32::MAX);
    }

    /// A level fed by aggregates alone starts summing its entries from zero
    /// once the first one is tracked.
    fn begin_tracking(&mut self) {
        if self.entries.is_empty() {
            self.size = Decimal::ZERO;
            self.num_entries = 0;
        }
    }

    /// Return the entry with this id, appending a zero-size one if absent.
    /// The flag is `true` when the entry was created.
    pub fn find_or_create_entry(&mut self, id: &str) -> (&BookEntry, bool) {
        let (pos, created) = match self.position(id) {
            Some(pos) => (pos, false),
            None => {
                self.begin_tracking();
                self.entries
                    .push(BookEntry::new(id, Decimal::ZERO, self.time));
                self.sync_count();
                (self.entries.len() - 1, true)
            }
        };
        (&self.entries[pos], created)
    }

    /// Append an entry. Fails if an entry with the same id is present.
    pub fn add_entry(&mut self, entry: BookEntry) -> Result<()> {
        if self.contains_entry(entry.id.as_str()) {
            tracing::warn!(
                entry = %entry.id,
                price = %self.price,
                side = %self.side,
                "duplicate entry add ignored"
            );
            return Err(DepthcastError::DuplicateEntry {
                id: entry.id,
                price: self.price,
            });
        }
        self.begin_tracking();
        self.size += entry.size;
        self.entries.push(entry);
        self.sync_count();
        self.debug_verify();
        Ok(())
    }

    /// Change the size and time of an entry already at this level. Returns
    /// the size movement. A size of zero does not remove the entry.
    pub fn update_entry(
        &mut self,
        id: &str,
        size: Decimal,
        time: Option<DateTime<Utc>>,
    ) -> Result<Decimal> {
        let price = self.price;
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.id == *id)
            .ok_or_else(|| DepthcastError::EntryNotFound {
                id: id.into(),
                price,
            })?;
        let change = size - entry.size;
        entry.action = BookAction::Update;
        entry.time = time;
        if change.is_zero() {
            return Ok(change);
        }
        entry.size = size;
        self.size += change;
        self.debug_verify();
        Ok(change)
    }

    pub fn set_entry_status(&mut self, id: &str, status: u16) -> Result<()> {
        let price = self.price;
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.id == *id)
            .ok_or_else(|| DepthcastError::EntryNotFound {
                id: id.into(),
                price,
            })?;
        entry.status = status;
        Ok(())
    }

    /// Structural removal with no change tracking.
    pub fn remove_entry_by_id(&mut self, id: &str) -> Option<BookEntry> {
        let pos = self.position(id)?;
        let entry = self.entries.remove(pos);
        self.size -= entry.size;
        self.sync_count();
        self.debug_verify();
        Some(entry)
    }

    pub fn remove_entry(&mut self, entry: &BookEntry) -> Option<BookEntry> {
        self.remove_entry_by_id(entry.id.as_str())
    }

    /// Drop every entry and zero the aggregates.
    pub fn clear_entries(&mut self) {
        self.entries.clear();
        self.size = Decimal::ZERO;
        self.num_entries = 0;
    }

    #[cfg(debug_assertions)]
    fn debug_verify(&self) {
        let sum: Decimal = self.entries.iter().map(|e| e.size).sum();
        debug_assert_eq!(self.size, sum, "level size out of sync at {}", self.price);
        debug_assert_eq!(self.num_entries as usize, self.entries.len());
    }

    #[cfg(not(debug_assertions))]
    #[inline]
    fn debug_verify(&self) {}
}
