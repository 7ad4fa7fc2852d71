//! The order book for a single instrument.
//!
//! Uses `BTreeMap` for price-level ordering:
//! - **Bids**: `BTreeMap<Reverse<Decimal>, PriceLevel>` -- highest price first
//! - **Asks**: `BTreeMap<Decimal, PriceLevel>` -- lowest price first
//!
//! Book-level mutations (`add_entry`, `update_entry`, `delete_entry`,
//! `add_level`, `update_level`, `delete_level`, and level creation through
//! `find_or_create_level`) return the [`BasicDelta`] describing the change
//! and, when delta generation is on, append it to the pending list that
//! `populate_delta` publishes.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use depthcast_types::{
    BookAction, BookConfig, BookFields, BookId, DepthcastError, FieldMsg, LevelPruning, Quality,
    Result, Side,
};
use rust_decimal::Decimal;

use crate::delta::{BasicDelta, DeltaClosure, DeltaList};
use crate::entry::BookEntry;
use crate::price_level::PriceLevel;
use crate::writer::BookWriter;

/// The order book for a single instrument.
#[derive(Debug)]
pub struct OrderBook {
    id: BookId,
    config: BookConfig,
    fields: Arc<BookFields>,
    /// Buy side: highest price first (`Reverse` key).
    bids: BTreeMap<Reverse<Decimal>, PriceLevel>,
    /// Sell side: lowest price first.
    asks: BTreeMap<Decimal, PriceLevel>,
    book_time: Option<DateTime<Utc>>,
    quality: Quality,
    consistent: bool,
    /// Changes recorded since the last `clear_delta_list`.
    deltas: DeltaList,
    writer: Option<BookWriter>,
}

impl OrderBook {
    /// Create an empty, non-publishing book with the built-in dictionary.
    #[must_use]
    pub fn new(id: BookId) -> Self {
        Self::with_config(id, BookConfig::default(), Arc::new(BookFields::default()))
    }

    #[must_use]
    pub fn with_config(id: BookId, config: BookConfig, fields: Arc<BookFields>) -> Self {
        let writer = config
            .generate_deltas
            .then(|| BookWriter::new(Arc::clone(&fields)));
        Self {
            id,
            config,
            fields,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            book_time: None,
            quality: Quality::Ok,
            consistent: true,
            deltas: DeltaList::new(),
            writer,
        }
    }

    // =================================================================
    // Metadata
    // =================================================================

    #[must_use]
    pub fn id(&self) -> &BookId {
        &self.id
    }

    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.id.symbol
    }

    #[must_use]
    pub fn part_id(&self) -> Option<&str> {
        self.id.part_id.as_deref()
    }

    pub fn set_symbol(&mut self, symbol: impl Into<String>) {
        self.id.symbol = symbol.into();
    }

    pub fn set_part_id(&mut self, part_id: Option<String>) {
        self.id.part_id = part_id;
    }

    #[must_use]
    pub fn config(&self) -> &BookConfig {
        &self.config
    }

    #[must_use]
    pub fn fields(&self) -> &Arc<BookFields> {
        &self.fields
    }

    #[must_use]
    pub fn book_time(&self) -> Option<DateTime<Utc>> {
        self.book_time
    }

    pub fn set_book_time(&mut self, time: Option<DateTime<Utc>>) {
        self.book_time = time;
    }

    #[must_use]
    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn set_quality(&mut self, quality: Quality) {
        self.quality = quality;
    }

    /// `false` between a detected sequence gap and the next recap.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.consistent
    }

    pub fn set_consistent(&mut self, consistent: bool) {
        self.consistent = consistent;
    }

    // =================================================================
    // Side dispatch
    // =================================================================

    fn level_ref(&self, side: Side, price: Decimal) -> Option<&PriceLevel> {
        match side {
            Side::Bid => self.bids.get(&Reverse(price)),
            Side::Ask => self.asks.get(&price),
        }
    }

    fn level_slot(&mut self, side: Side, price: Decimal) -> &mut PriceLevel {
        match side {
            Side::Bid => self
                .bids
                .entry(Reverse(price))
                .or_insert_with(|| PriceLevel::new(price, side)),
            Side::Ask => self
                .asks
                .entry(price)
                .or_insert_with(|| PriceLevel::new(price, side)),
        }
    }

    fn take_level(&mut self, side: Side, price: Decimal) -> Option<PriceLevel> {
        match side {
            Side::Bid => self.bids.remove(&Reverse(price)),
            Side::Ask => self.asks.remove(&price),
        }
    }

    fn record(&mut self, delta: &BasicDelta) {
        if self.config.generate_deltas {
            self.deltas.push(delta.clone());
        }
    }

    // =================================================================
    // Levels
    // =================================================================

    #[must_use]
    pub fn find_level(&self, side: Side, price: Decimal) -> Option<&PriceLevel> {
        self.level_ref(side, price)
    }

    /// Mutable access without change tracking, for local repair.
    pub fn find_level_mut(&mut self, side: Side, price: Decimal) -> Option<&mut PriceLevel> {
        match side {
            Side::Bid => self.bids.get_mut(&Reverse(price)),
            Side::Ask => self.asks.get_mut(&price),
        }
    }

    /// Return the level at `price`, inserting an empty one in price order if
    /// absent. The action is `Add` when the level was created (and recorded
    /// as such), `Update` otherwise.
    pub fn find_or_create_level(
        &mut self,
        price: Decimal,
        side: Side,
    ) -> (&mut PriceLevel, BookAction) {
        let created = self.level_ref(side, price).is_none();
        if created && self.config.generate_deltas {
            self.deltas.push(BasicDelta::level(
                PriceLevel::new(price, side).summary(),
                Decimal::ZERO,
                BookAction::Add,
            ));
        }
        let action = if created {
            BookAction::Add
        } else {
            BookAction::Update
        };
        (self.level_slot(side, price), action)
    }

    /// Insert a fully formed level.
    ///
    /// An existing level at the same price is an error under
    /// `strict_checking`; otherwise the call is turned into `update_level`.
    pub fn add_level(&mut self, level: PriceLevel) -> Result<BasicDelta> {
        let (side, price) = (level.side(), level.price());
        if self.level_ref(side, price).is_some() {
            if self.config.strict_checking {
                return Err(DepthcastError::DuplicateLevel { side, price });
            }
            tracing::warn!(
                symbol = %self.id,
                side = %side,
                price = %price,
                "add_level on existing price, updating instead"
            );
            return self.update_level(&level);
        }
        let delta = BasicDelta::level(level.summary(), level.size_change(), BookAction::Add);
        *self.level_slot(side, price) = level;
        self.record(&delta);
        Ok(delta)
    }

    /// Replace size change, action, time (and size for levels without
    /// entries) of the level at the same price.
    ///
    /// A missing level is an error under `strict_checking`; otherwise the
    /// level is added.
    pub fn update_level(&mut self, level: &PriceLevel) -> Result<BasicDelta> {
        let (side, price) = (level.side(), level.price());
        let Some(existing) = self.find_level_mut(side, price) else {
            if self.config.strict_checking {
                return Err(DepthcastError::LevelNotFound { side, price });
            }
            tracing::warn!(
                symbol = %self.id,
                side = %side,
                price = %price,
                "update_level on missing price, adding instead"
            );
            return self.add_level(level.clone());
        };
        existing.copy_details(level);
        let delta = BasicDelta::level(existing.summary(), level.size_change(), BookAction::Update);
        self.record(&delta);
        Ok(delta)
    }

    /// Remove a level and everything resting on it.
    pub fn delete_level(&mut self, side: Side, price: Decimal) -> Result<BasicDelta> {
        let mut level = self
            .take_level(side, price)
            .ok_or(DepthcastError::LevelNotFound { side, price })?;
        let removed = -level.size();
        level.set_action(BookAction::Delete);
        level.set_size_change(removed);
        let delta = BasicDelta::level(level.summary(), removed, BookAction::Delete);
        self.record(&delta);
        Ok(delta)
    }

    // =================================================================
    // Entries
    // =================================================================

    /// Add an entry at `price`, creating the level if needed.
    pub fn add_entry(
        &mut self,
        side: Side,
        price: Decimal,
        entry: BookEntry,
        time: Option<DateTime<Utc>>,
    ) -> Result<BasicDelta> {
        let level = self.level_slot(side, price);
        let pl_action = if level.num_entries() == 0 {
            BookAction::Add
        } else {
            BookAction::Update
        };
        let before = level.size();
        let snapshot = entry.clone();
        level.add_entry(entry)?;
        let change = level.size() - before;
        level.set_size_change(change);
        level.set_time(time);
        level.set_action(pl_action);
        let delta =
            BasicDelta::entry(level.summary(), snapshot, change, pl_action, BookAction::Add);
        self.record(&delta);
        Ok(delta)
    }

    /// Change an existing entry's size. The change is recorded even when the
    /// size is unchanged.
    pub fn update_entry(
        &mut self,
        side: Side,
        price: Decimal,
        id: &str,
        size: Decimal,
        time: Option<DateTime<Utc>>,
    ) -> Result<BasicDelta> {
        let level = self
            .find_level_mut(side, price)
            .ok_or(DepthcastError::LevelNotFound { side, price })?;
        let change = level.update_entry(id, size, time)?;
        if !change.is_zero() {
            level.set_size_change(change);
            level.set_time(time);
        }
        level.set_action(BookAction::Update);
        let entry = level
            .find_entry(id)
            .cloned()
            .ok_or_else(|| DepthcastError::EntryNotFound {
                id: id.into(),
                price,
            })?;
        let delta = BasicDelta::entry(
            level.summary(),
            entry,
            change,
            BookAction::Update,
            BookAction::Update,
        );
        self.record(&delta);
        Ok(delta)
    }

    /// Remove an entry and record the deletion, carrying `closure` to
    /// publication and callbacks. A level left without entries is pruned
    /// according to the book's [`LevelPruning`] policy.
    pub fn delete_entry(
        &mut self,
        side: Side,
        price: Decimal,
        id: &str,
        time: Option<DateTime<Utc>>,
        closure: Option<DeltaClosure>,
    ) -> Result<BasicDelta> {
        let pruning = self.config.level_pruning;
        let level = self
            .find_level_mut(side, price)
            .ok_or(DepthcastError::LevelNotFound { side, price })?;
        let mut entry = level
            .remove_entry_by_id(id)
            .ok_or_else(|| DepthcastError::EntryNotFound {
                id: id.into(),
                price,
            })?;
        entry.action = BookAction::Delete;
        let removed = -entry.size;
        level.set_size_change(removed);
        level.set_time(time);
        let prune = level.num_entries() == 0 && pruning == LevelPruning::Immediate;
        let pl_action = if prune {
            BookAction::Delete
        } else {
            BookAction::Update
        };
        level.set_action(pl_action);
        let snapshot = level.summary();
        if prune {
            self.take_level(side, price);
        }
        let delta = BasicDelta::entry(snapshot, entry, removed, pl_action, BookAction::Delete)
            .with_closure(closure);
        self.record(&delta);
        Ok(delta)
    }

    // =================================================================
    // Maintenance
    // =================================================================

    /// Remove every level. Pending deltas are left alone.
    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
    }

    /// Forget pending deltas without touching book state; call after a
    /// successful publication.
    pub fn clear_delta_list(&mut self) {
        self.deltas.clear();
    }

    #[must_use]
    pub fn pending_deltas(&self) -> &DeltaList {
        &self.deltas
    }

    /// Turn delta recording (and publication) on or off. Turning it off
    /// drops the pending list and the writer's buffers.
    pub fn generate_delta_msgs(&mut self, generate: bool) {
        self.config.generate_deltas = generate;
        if generate {
            if self.writer.is_none() {
                self.writer = Some(BookWriter::new(Arc::clone(&self.fields)));
            }
        } else {
            self.writer = None;
            self.deltas.clear();
        }
    }

    #[must_use]
    pub fn generates_deltas(&self) -> bool {
        self.config.generate_deltas
    }

    /// Independent deep copy of the levels and metadata, without pending
    /// deltas and with publication off.
    #[must_use]
    pub fn snapshot(&self) -> OrderBook {
        OrderBook {
            id: self.id.clone(),
            config: BookConfig {
                generate_deltas: false,
                ..self.config.clone()
            },
            fields: Arc::clone(&self.fields),
            bids: self.bids.clone(),
            asks: self.asks.clone(),
            book_time: self.book_time,
            quality: self.quality,
            consistent: self.consistent,
            deltas: DeltaList::new(),
            writer: None,
        }
    }

    // =================================================================
    // Publication
    // =================================================================

    fn take_writer(&mut self) -> BookWriter {
        self.writer
            .take()
            .unwrap_or_else(|| BookWriter::new(Arc::clone(&self.fields)))
    }

    /// Write the full book into `msg`. With publication off the message is
    /// left untouched.
    pub fn populate_recap(&mut self, msg: &mut FieldMsg) -> Result<()> {
        if !self.config.generate_deltas {
            tracing::warn!(symbol = %self.id, "populate_recap: book publishing not enabled");
            return Ok(());
        }
        let mut writer = self.take_writer();
        let result = writer.populate_recap(msg, self);
        self.writer = Some(writer);
        result
    }

    /// Write the pending deltas into `msg`. Returns `false` when there is
    /// nothing to publish. The pending list is kept until
    /// [`clear_delta_list`](Self::clear_delta_list).
    pub fn populate_delta(&mut self, msg: &mut FieldMsg) -> Result<bool> {
        if !self.config.generate_deltas {
            tracing::warn!(symbol = %self.id, "populate_delta: book publishing not enabled");
            return Ok(false);
        }
        if self.deltas.is_empty() {
            tracing::trace!(symbol = %self.id, "populate_delta: nothing pending");
            return Ok(false);
        }
        let mut writer = self.take_writer();
        let result = writer.populate_delta(msg, self);
        self.writer = Some(writer);
        result
    }

    /// Write a clear message into `msg`.
    pub fn populate_clear(&mut self, msg: &mut FieldMsg) -> Result<()> {
        if !self.config.generate_deltas {
            return Err(DepthcastError::PublishingDisabled);
        }
        let mut writer = self.take_writer();
        writer.populate_clear(msg, self);
        self.writer = Some(writer);
        Ok(())
    }

    /// Writer state, for inspecting buffer reuse.
    #[must_use]
    pub fn writer(&self) -> Option<&BookWriter> {
        self.writer.as_ref()
    }

    // =================================================================
    // Queries
    // =================================================================

    /// Best (highest) bid price, or `None` if no bids.
    #[must_use]
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.keys().next().map(|r| r.0)
    }

    /// Best (lowest) ask price, or `None` if no asks.
    #[must_use]
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.keys().next().copied()
    }

    /// Spread = `best_ask - best_bid`. `None` if either side is empty.
    #[must_use]
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    #[must_use]
    pub fn bid_depth(&self) -> usize {
        self.bids.len()
    }

    #[must_use]
    pub fn ask_depth(&self) -> usize {
        self.asks.len()
    }

    #[must_use]
    pub fn total_num_levels(&self) -> usize {
        self.bids.len() + self.asks.len()
    }

    /// Sum of level entry counts on both sides.
    #[must_use]
    pub fn total_num_entries(&self) -> usize {
        self.bid_levels()
            .chain(self.ask_levels())
            .map(|l| l.num_entries() as usize)
            .sum()
    }

    /// Returns `true` if the book has no levels on either side.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Zero-based position from the best price.
    #[must_use]
    pub fn level_at_position(&self, side: Side, position: usize) -> Option<&PriceLevel> {
        match side {
            Side::Bid => self.bids.values().nth(position),
            Side::Ask => self.asks.values().nth(position),
        }
    }

    /// Iterate bid levels from best (highest) to worst.
    pub fn bid_levels(&self) -> impl Iterator<Item = &PriceLevel> {
        self.bids.values()
    }

    /// Iterate ask levels from best (lowest) to worst.
    pub fn ask_levels(&self) -> impl Iterator<Item = &PriceLevel> {
        self.asks.values()
    }
}
