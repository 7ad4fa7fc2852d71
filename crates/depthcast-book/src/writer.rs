//! Book publication: recap, delta and clear messages.
//!
//! Output follows the compact layout consumers expect:
//! - a level touching exactly one entry carries that entry's fields inline,
//!   more than one goes into a `wPlEntries` vector
//! - a message with exactly one level carries that level's fields inline,
//!   more than one goes into a `wPriceLevels` vector
//! - fields equal to their reader-side default are omitted (level action
//!   `Add`, side `Bid`, one entry, one attached entry, level time equal to
//!   book time, entry time equal to level time, entry status zero)
//!
//! Sub-messages are built in [`MsgBuffer`]s that keep their allocations
//! between publish cycles.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use depthcast_types::{
    BookAction, BookFields, DepthcastError, FieldDescriptor, FieldMsg, LevelOrderType, MsgType,
    Result, Side, constants,
};
use rust_decimal::Decimal;

use crate::delta::{BasicDelta, LevelSnapshot};
use crate::entry::BookEntry;
use crate::orderbook::OrderBook;

// ---------------------------------------------------------------------------
// MsgBuffer
// ---------------------------------------------------------------------------

/// Reusable holder of sub-messages.
///
/// `reset` forgets the filled length but keeps every allocated message, so a
/// steady publish rate stops allocating after the first cycles.
#[derive(Debug, Clone, Default)]
pub struct MsgBuffer {
    msgs: Vec<FieldMsg>,
    len: usize,
    grow_count: u32,
}

impl MsgBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let mut msgs = Vec::with_capacity(capacity);
        msgs.resize_with(capacity, FieldMsg::new);
        Self {
            msgs,
            len: 0,
            grow_count: 0,
        }
    }

    /// Make at least `capacity` sub-messages available.
    pub fn ensure_capacity(&mut self, capacity: usize) -> Result<()> {
        if capacity <= self.msgs.len() {
            return Ok(());
        }
        self.msgs
            .try_reserve(capacity - self.msgs.len())
            .map_err(|_| DepthcastError::Capacity {
                requested: capacity,
            })?;
        self.msgs.resize_with(capacity, FieldMsg::new);
        self.grow_count += 1;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.len = 0;
    }

    /// Claim the next sub-message, cleared. Grows by doubling when full.
    pub fn next_slot(&mut self) -> Result<&mut FieldMsg> {
        if self.len == self.msgs.len() {
            self.ensure_capacity((self.len * 2).max(1))?;
        }
        let slot = &mut self.msgs[self.len];
        slot.clear();
        self.len += 1;
        Ok(slot)
    }

    /// Sub-messages claimed since the last reset.
    #[must_use]
    pub fn filled(&self) -> &[FieldMsg] {
        &self.msgs[..self.len]
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.msgs.len()
    }

    /// Number of times the buffer had to grow.
    #[must_use]
    pub fn grow_count(&self) -> u32 {
        self.grow_count
    }
}

// ---------------------------------------------------------------------------
// BookWriter
// ---------------------------------------------------------------------------

/// Serialises an [`OrderBook`] into field messages and numbers them.
#[derive(Debug, Clone)]
pub struct BookWriter {
    fields: Arc<BookFields>,
    levels: MsgBuffer,
    entries: MsgBuffer,
    seq_num: u64,
}

impl BookWriter {
    #[must_use]
    pub fn new(fields: Arc<BookFields>) -> Self {
        Self {
            fields,
            levels: MsgBuffer::with_capacity(constants::DEFAULT_LEVEL_BUFFER_CAPACITY),
            entries: MsgBuffer::with_capacity(constants::DEFAULT_ENTRY_BUFFER_CAPACITY),
            seq_num: 0,
        }
    }

    /// Sequence number stamped on the last populated message.
    #[must_use]
    pub fn seq_num(&self) -> u64 {
        self.seq_num
    }

    /// The next message is stamped `seq_num + 1`.
    pub fn set_seq_num(&mut self, seq_num: u64) {
        self.seq_num = seq_num;
    }

    #[must_use]
    pub fn level_buffer(&self) -> &MsgBuffer {
        &self.levels
    }

    #[must_use]
    pub fn entry_buffer(&self) -> &MsgBuffer {
        &self.entries
    }

    /// Write every level (bids best-first, then asks best-first) with its
    /// non-empty entries. An empty book produces the header only.
    pub fn populate_recap(&mut self, msg: &mut FieldMsg, book: &OrderBook) -> Result<()> {
        let fields = Arc::clone(&self.fields);
        let book_time = book.book_time();
        self.levels.reset();
        self.levels.ensure_capacity(book.total_num_levels())?;

        for level in book.bid_levels().chain(book.ask_levels()) {
            self.entries.reset();
            self.entries.ensure_capacity(level.entries().len())?;
            for entry in level.entries().iter().filter(|e| !e.size.is_zero()) {
                let slot = self.entries.next_slot()?;
                write_entry(&fields, slot, entry, BookAction::Add, level.time());
            }
            let attached = self.entries.filled().len();
            let declared = if level.entries().is_empty() {
                level.num_entries()
            } else {
                count_u32(attached)
            };
            let slot = self.levels.next_slot()?;
            write_level(
                &fields,
                slot,
                &level.summary(),
                Decimal::ZERO,
                BookAction::Add,
                book_time,
                declared,
            );
            attach(slot, self.entries.filled(), &fields.pl_entries, &fields.pl_num_attach, true);
        }

        let num_levels = count_u32(self.levels.filled().len());
        attach(msg, self.levels.filled(), &fields.price_levels, &fields.pl_num_attach, false);
        self.write_header(msg, MsgType::Initial, num_levels, book);
        tracing::trace!(
            symbol = %book.id(),
            levels = num_levels,
            seq = self.seq_num,
            "recap populated"
        );
        Ok(())
    }

    /// Write the book's pending deltas. Returns `false` (and leaves `msg`
    /// alone) when nothing is pending.
    ///
    /// Consecutive deltas on one level become one level message: its action
    /// is that of the first delta (or `Delete` if the level is gone), its
    /// size change the sum over the run, and its size, entry count and time
    /// come from the level as it stands now.
    pub fn populate_delta(&mut self, msg: &mut FieldMsg, book: &OrderBook) -> Result<bool> {
        let deltas = book.pending_deltas();
        if deltas.is_empty() {
            return Ok(false);
        }
        let fields = Arc::clone(&self.fields);
        let book_time = book.book_time();
        self.levels.reset();
        self.levels.ensure_capacity(deltas.level_count())?;

        for group in deltas.level_groups() {
            let Some((snapshot, action)) = resolve_group(group, book) else {
                continue;
            };
            let size_change: Decimal = group.iter().map(|d| d.pl_delta_size).sum();

            self.entries.reset();
            self.entries.ensure_capacity(group.len())?;
            for delta in group {
                if let Some(entry) = &delta.entry {
                    let entry_action = delta.entry_action.unwrap_or(entry.action);
                    let slot = self.entries.next_slot()?;
                    write_entry(&fields, slot, entry, entry_action, snapshot.time);
                }
            }

            let slot = self.levels.next_slot()?;
            write_level(
                &fields,
                slot,
                &snapshot,
                size_change,
                action,
                book_time,
                snapshot.num_entries,
            );
            attach(slot, self.entries.filled(), &fields.pl_entries, &fields.pl_num_attach, true);
        }

        let num_levels = count_u32(self.levels.filled().len());
        attach(msg, self.levels.filled(), &fields.price_levels, &fields.pl_num_attach, false);
        self.write_header(msg, MsgType::Update, num_levels, book);
        tracing::trace!(
            symbol = %book.id(),
            levels = num_levels,
            deltas = deltas.len(),
            seq = self.seq_num,
            "delta populated"
        );
        Ok(true)
    }

    /// Write a clear message for `book`.
    pub fn populate_clear(&mut self, msg: &mut FieldMsg, book: &OrderBook) {
        self.write_header(msg, MsgType::Clear, 0, book);
    }

    fn write_header(
        &mut self,
        msg: &mut FieldMsg,
        msg_type: MsgType,
        num_levels: u32,
        book: &OrderBook,
    ) {
        self.seq_num += 1;
        let fields = &self.fields;
        msg.update(&fields.msg_type, msg_type.code());
        msg.update(&fields.seq_num, self.seq_num);
        msg.update(&fields.num_levels, num_levels);
        msg.update(&fields.symbol, book.symbol());
        if let Some(part_id) = book.part_id() {
            msg.update(&fields.part_id, part_id);
        }
        if let Some(time) = book.book_time() {
            msg.update(&fields.book_time, time);
        }
    }
}

/// Level state and action to publish for one run of deltas.
fn resolve_group(group: &[BasicDelta], book: &OrderBook) -> Option<(LevelSnapshot, BookAction)> {
    let (first, last) = (group.first()?, group.last()?);
    if last.is_level_delete() {
        return Some((last.level, BookAction::Delete));
    }
    let (side, price) = last.level.key();
    let resolved = match book.find_level(side, price) {
        None => (last.level, BookAction::Delete),
        Some(live) => {
            let action = match first.pl_action {
                BookAction::Delete => BookAction::Update,
                other => other,
            };
            (live.summary(), action)
        }
    };
    Some(resolved)
}

/// Place sub-messages on `parent`: one is merged inline, several become a
/// vector. For entries the attached count is written when it is not one.
fn attach(
    parent: &mut FieldMsg,
    subs: &[FieldMsg],
    vector: &FieldDescriptor,
    num_attach: &FieldDescriptor,
    count_attached: bool,
) {
    match subs {
        [] => {}
        [one] => parent.merge(one),
        many => parent.update(vector, many.to_vec()),
    }
    if count_attached && subs.len() != constants::DEFAULT_NUM_ATTACH as usize {
        parent.update(num_attach, count_u32(subs.len()));
    }
}

fn write_level(
    fields: &BookFields,
    msg: &mut FieldMsg,
    level: &LevelSnapshot,
    size_change: Decimal,
    action: BookAction,
    book_time: Option<DateTime<Utc>>,
    num_entries: u32,
) {
    msg.add(&fields.pl_price, level.price);
    if action != BookAction::Add {
        msg.add(&fields.pl_action, wire_code(action.code()));
    }
    if level.side != Side::Bid {
        msg.add(&fields.pl_side, wire_code(level.side.code()));
    }
    msg.add(&fields.pl_size, level.size);
    msg.add(&fields.pl_size_change, size_change);
    if level.time != book_time {
        if let Some(time) = level.time {
            msg.add(&fields.pl_time, time);
        }
    }
    if num_entries != constants::DEFAULT_NUM_ENTRIES {
        msg.add(&fields.pl_num_entries, num_entries);
    }
    if level.order_type != LevelOrderType::Limit {
        msg.add(&fields.pl_order_type, wire_code(level.order_type.code()));
    }
}

fn write_entry(
    fields: &BookFields,
    msg: &mut FieldMsg,
    entry: &BookEntry,
    action: BookAction,
    level_time: Option<DateTime<Utc>>,
) {
    msg.add(&fields.entry_id, entry.id.as_str());
    msg.add(&fields.entry_action, wire_code(action.code()));
    msg.add(&fields.entry_size, entry.size);
    if entry.time != level_time {
        if let Some(time) = entry.time {
            msg.add(&fields.entry_time, time);
        }
    }
    if entry.status != constants::DEFAULT_ENTRY_STATUS {
        msg.add(&fields.entry_status, entry.status);
    }
}

/// Single-byte codes travel as `I8`.
fn wire_code(code: char) -> i8 {
    i8::try_from(u32::from(code)).unwrap_or_default()
}

fn count_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
