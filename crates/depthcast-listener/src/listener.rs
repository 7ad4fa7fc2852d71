//! Structured listener: rebuilds an [`OrderBook`] from inbound messages.
//!
//! ## Message flow
//!
//! ```text
//! on_msg(msg) -> header (type, seq, time)
//!   Clear   -> book.clear()                 -> on_book_clear
//!   Recap   -> book.clear() + apply levels  -> on_book_recap / level / entry recaps
//!   Update  -> sequence check
//!                duplicate -> ignored
//!                gap       -> book marked inconsistent, message skipped -> on_book_gap
//!                in order  -> apply levels  -> simple or complex delta callbacks
//! ```
//!
//! Every level and entry of a message is parsed before the book is touched,
//! so a malformed message leaves the book as it was. Problems with individual
//! mutations (an entry added twice, say) are reported to error handlers and
//! the rest of the message is still applied.

use std::collections::HashSet;
use std::sync::Arc;

use depthcast_book::{BasicDelta, BookEntry, DeltaList, OrderBook};
use depthcast_types::{
    BookAction, BookConfig, BookFields, BookId, DepthcastError, FieldMsg, ListenerConfig, MsgType,
    Quality, Result,
};

use crate::handler::{
    BookEvent, BookHandler, EntryHandler, ErrorHandler, LevelHandler, QualityHandler,
};
use crate::reader::{self, LevelFields, MsgHeader};
use crate::sequence::{SeqCheck, SeqTracker};

/// Consumes book messages for one instrument and keeps its book current.
pub struct OrderBookListener {
    config: ListenerConfig,
    fields: Arc<BookFields>,
    book: OrderBook,
    seq: SeqTracker,
    have_initial: bool,
    /// Changes applied by the current message.
    deltas: DeltaList,
    ignored_entries: HashSet<String>,
    book_handlers: Vec<Box<dyn BookHandler>>,
    level_handlers: Vec<Box<dyn LevelHandler>>,
    entry_handlers: Vec<Box<dyn EntryHandler>>,
    error_handlers: Vec<Box<dyn ErrorHandler>>,
    quality_handlers: Vec<Box<dyn QualityHandler>>,
}

impl OrderBookListener {
    #[must_use]
    pub fn new(symbol: impl Into<String>) -> Self {
        Self::with_config(
            BookId::new(symbol),
            ListenerConfig::default(),
            Arc::new(BookFields::default()),
        )
    }

    #[must_use]
    pub fn with_config(id: BookId, config: ListenerConfig, fields: Arc<BookFields>) -> Self {
        let book_config = BookConfig {
            generate_deltas: false,
            level_pruning: config.level_pruning,
            strict_checking: false,
        };
        Self {
            book: OrderBook::with_config(id, book_config, Arc::clone(&fields)),
            config,
            fields,
            seq: SeqTracker::new(),
            have_initial: false,
            deltas: DeltaList::new(),
            ignored_entries: HashSet::new(),
            book_handlers: Vec::new(),
            level_handlers: Vec::new(),
            entry_handlers: Vec::new(),
            error_handlers: Vec::new(),
            quality_handlers: Vec::new(),
        }
    }

    // =================================================================
    // Registration
    // =================================================================

    pub fn add_book_handler(&mut self, handler: Box<dyn BookHandler>) {
        self.book_handlers.push(handler);
    }

    pub fn add_level_handler(&mut self, handler: Box<dyn LevelHandler>) {
        self.level_handlers.push(handler);
    }

    pub fn add_entry_handler(&mut self, handler: Box<dyn EntryHandler>) {
        self.entry_handlers.push(handler);
    }

    pub fn add_error_handler(&mut self, handler: Box<dyn ErrorHandler>) {
        self.error_handlers.push(handler);
    }

    pub fn add_quality_handler(&mut self, handler: Box<dyn QualityHandler>) {
        self.quality_handlers.push(handler);
    }

    /// Drop every registered handler.
    pub fn remove_handlers(&mut self) {
        self.book_handlers.clear();
        self.level_handlers.clear();
        self.entry_handlers.clear();
        self.error_handlers.clear();
        self.quality_handlers.clear();
    }

    /// Entries with this id are never applied to the book.
    pub fn add_ignore_entry_id(&mut self, id: impl Into<String>) {
        self.ignored_entries.insert(id.into());
    }

    pub fn remove_ignore_entry_id(&mut self, id: &str) {
        self.ignored_entries.remove(id);
    }

    // =================================================================
    // State
    // =================================================================

    #[must_use]
    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    /// Mutable book access, e.g. to turn on delta generation and
    /// re-publish what this listener applies.
    pub fn book_mut(&mut self) -> &mut OrderBook {
        &mut self.book
    }

    #[must_use]
    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    #[must_use]
    pub fn have_initial(&self) -> bool {
        self.have_initial
    }

    /// Set the book quality, notifying quality handlers on change.
    pub fn set_quality(&mut self, quality: Quality) {
        let old = self.book.quality();
        if old == quality {
            return;
        }
        self.book.set_quality(quality);
        tracing::info!(symbol = %self.book.id(), %old, new = %quality, "book quality changed");
        for handler in &mut self.quality_handlers {
            handler.on_quality_change(self.book.symbol(), old, quality);
        }
    }

    /// Forget the book and the stream position. The next update is
    /// rejected until a recap arrives.
    pub fn clear(&mut self) {
        self.book.clear();
        self.book.set_consistent(true);
        self.book.set_quality(Quality::Ok);
        self.deltas.clear();
        self.seq.reset();
        self.have_initial = false;
    }

    // =================================================================
    // Dispatch
    // =================================================================

    /// Apply one inbound message. Failures are logged and reported to the
    /// error handlers; they never leave the book unordered.
    pub fn on_msg(&mut self, msg: &FieldMsg) {
        if let Err(error) = self.process(msg) {
            tracing::warn!(symbol = %self.book.id(), %error, "book message rejected");
            self.report_error(&error);
        }
    }

    fn process(&mut self, msg: &FieldMsg) -> Result<()> {
        let header = reader::read_header(&self.fields, msg)?;
        match header.msg_type {
            MsgType::Clear => {
                self.handle_clear(msg, header);
                Ok(())
            }
            MsgType::Initial | MsgType::Recap | MsgType::Snapshot => {
                self.handle_recap(msg, header)
            }
            MsgType::Update => self.handle_update(msg, header),
        }
    }

    fn handle_clear(&mut self, msg: &FieldMsg, header: MsgHeader) {
        self.book.clear();
        self.book.set_book_time(header.event_time);
        self.book.set_consistent(true);
        self.deltas.clear();
        self.seq.reset_to(header.seq_num);
        self.have_initial = true;
        tracing::info!(symbol = %self.book.id(), seq = header.seq_num, "book cleared");

        let event = event(self.book.symbol(), msg, header);
        for handler in &mut self.book_handlers {
            handler.on_book_clear(&event, &self.book);
        }
    }

    fn handle_recap(&mut self, msg: &FieldMsg, header: MsgHeader) -> Result<()> {
        let levels = reader::read_levels(&self.fields, msg, header.event_time)?;

        self.book.clear();
        if let Some(symbol) = msg.try_str(&self.fields.symbol)? {
            if self.book.symbol().is_empty() {
                self.book.set_symbol(symbol);
            }
        }
        if let Some(part_id) = msg.try_str(&self.fields.part_id)? {
            self.book.set_part_id(Some(part_id.to_string()));
        }
        self.book.set_book_time(header.event_time);
        for (level, level_msg) in &levels {
            self.apply_recap_level(level, level_msg)?;
        }
        self.deltas.clear();
        self.seq.reset_to(header.seq_num);
        self.have_initial = true;
        self.book.set_consistent(true);
        self.set_quality(Quality::Ok);
        tracing::info!(
            symbol = %self.book.id(),
            levels = self.book.total_num_levels(),
            entries = self.book.total_num_entries(),
            seq = header.seq_num,
            "book recap applied"
        );

        let event = event(self.book.symbol(), msg, header);
        for handler in &mut self.book_handlers {
            handler.on_book_recap(&event, &self.book);
        }
        for handler in &mut self.level_handlers {
            for level in self.book.bid_levels().chain(self.book.ask_levels()) {
                handler.on_level_recap(&event, level);
            }
        }
        for handler in &mut self.entry_handlers {
            for level in self.book.bid_levels().chain(self.book.ask_levels()) {
                for entry in level.entries() {
                    handler.on_entry_recap(&event, level, entry);
                }
            }
        }
        Ok(())
    }

    fn handle_update(&mut self, msg: &FieldMsg, header: MsgHeader) -> Result<()> {
        if !self.have_initial {
            return Err(DepthcastError::UpdateBeforeInitial {
                symbol: self.book.symbol().to_string(),
            });
        }
        if self.book.quality() != Quality::Ok && !self.config.update_stale_book {
            tracing::debug!(
                symbol = %self.book.id(),
                quality = %self.book.quality(),
                "update dropped on stale book"
            );
            return Ok(());
        }
        match self.seq.observe(header.seq_num) {
            SeqCheck::InOrder => {}
            SeqCheck::Duplicate => {
                tracing::debug!(
                    symbol = %self.book.id(),
                    seq = header.seq_num,
                    "duplicate update ignored"
                );
                return Ok(());
            }
            SeqCheck::Gap(gap) => {
                tracing::info!(
                    symbol = %self.book.id(),
                    begin = gap.begin,
                    end = gap.end,
                    "sequence gap detected"
                );
                self.book.set_consistent(false);
                let event = event(self.book.symbol(), msg, header);
                for handler in &mut self.book_handlers {
                    handler.on_book_gap(&event, gap, &self.book);
                }
                return Ok(());
            }
        }

        let levels = reader::read_levels(&self.fields, msg, header.event_time)?;

        self.deltas.clear();
        if header.event_time.is_some() {
            self.book.set_book_time(header.event_time);
        }
        for (level, level_msg) in &levels {
            if self.config.process_entries {
                self.apply_entry_level(level, level_msg)?;
            } else {
                self.apply_aggregate_level(level);
            }
        }
        tracing::trace!(
            symbol = %self.book.id(),
            seq = header.seq_num,
            deltas = self.deltas.len(),
            "update applied"
        );
        self.dispatch_deltas(msg, header);
        Ok(())
    }

    fn dispatch_deltas(&mut self, msg: &FieldMsg, header: MsgHeader) {
        if self.deltas.is_empty() {
            return;
        }
        if !self.book.is_consistent() && !self.config.update_inconsistent_book {
            tracing::trace!(symbol = %self.book.id(), "delta callbacks held until recap");
            return;
        }
        let event = event(self.book.symbol(), msg, header);
        let simple = self.deltas.simple_delta().filter(|_| self.deltas.is_simple());
        for handler in &mut self.book_handlers {
            match simple {
                Some(delta) => handler.on_book_delta(&event, delta, &self.book),
                None => handler.on_book_complex_delta(&event, &self.deltas, &self.book),
            }
        }
        for handler in &mut self.level_handlers {
            for group in self.deltas.level_groups() {
                if let Some(last) = group.last() {
                    handler.on_level_delta(&event, &last.level);
                }
            }
        }
        for handler in &mut self.entry_handlers {
            for delta in self.deltas.iter().filter(|d| d.entry.is_some()) {
                handler.on_entry_delta(&event, delta);
            }
        }
    }

    // =================================================================
    // Applying levels
    // =================================================================

    fn apply_recap_level(&mut self, level: &LevelFields, level_msg: &FieldMsg) -> Result<()> {
        let fields = Arc::clone(&self.fields);
        let entry_msgs = reader::entry_msgs(&fields, level_msg)?;
        if !self.config.process_entries || entry_msgs.is_empty() {
            let mut aggregate = level.to_price_level();
            aggregate.set_action(BookAction::Add);
            let result = self.book.add_level(aggregate);
            self.record(result);
            return Ok(());
        }
        for entry_msg in entry_msgs {
            let Some(entry) = reader::read_entry(&fields, entry_msg, level.time)? else {
                continue;
            };
            if self.ignored_entries.contains(entry.id) {
                continue;
            }
            let book_entry =
                BookEntry::new(entry.id, entry.size, entry.time).with_status(entry.status);
            let result = self
                .book
                .add_entry(level.side, level.price, book_entry, level.time);
            self.record(result);
        }
        if let Some(rebuilt) = self.book.find_level_mut(level.side, level.price) {
            rebuilt.set_order_type(level.order_type);
        }
        Ok(())
    }

    /// Level-granularity update: aggregates only, no entries.
    fn apply_aggregate_level(&mut self, level: &LevelFields) {
        let exists = self.book.find_level(level.side, level.price).is_some();
        let result = match (level.action, exists) {
            (BookAction::Delete, true) => self.book.delete_level(level.side, level.price),
            (BookAction::Delete, false) => {
                tracing::debug!(
                    symbol = %self.book.id(),
                    side = %level.side,
                    price = %level.price,
                    "delete for unknown level skipped"
                );
                return;
            }
            (_, true) => self.book.update_level(&level.to_price_level()),
            (_, false) => self.book.add_level(level.to_price_level()),
        };
        self.record(result);
    }

    /// Entry-granularity update: apply each attached entry, then remove the
    /// level itself if it was deleted.
    fn apply_entry_level(&mut self, level: &LevelFields, level_msg: &FieldMsg) -> Result<()> {
        let fields = Arc::clone(&self.fields);
        let (side, price) = (level.side, level.price);
        let entry_msgs = reader::entry_msgs(&fields, level_msg)?;

        if entry_msgs.is_empty() {
            self.apply_aggregate_level(level);
            return Ok(());
        }

        for entry_msg in entry_msgs {
            let Some(entry) = reader::read_entry(&fields, entry_msg, level.time)? else {
                tracing::debug!(symbol = %self.book.id(), %price, "entry without id skipped");
                continue;
            };
            if self.ignored_entries.contains(entry.id) {
                continue;
            }
            let known = self
                .book
                .find_level(side, price)
                .is_some_and(|l| l.contains_entry(entry.id));
            let result = match (entry.action, known) {
                (BookAction::Delete, true) => {
                    self.book.delete_entry(side, price, entry.id, entry.time, None)
                }
                (BookAction::Delete, false) => {
                    tracing::debug!(
                        symbol = %self.book.id(),
                        entry = entry.id,
                        price = %price,
                        "delete for unknown entry skipped"
                    );
                    continue;
                }
                (_, true) => {
                    if let Some(resting) = self.book.find_level_mut(side, price) {
                        resting.set_entry_status(entry.id, entry.status)?;
                    }
                    self.book
                        .update_entry(side, price, entry.id, entry.size, entry.time)
                }
                (action, false) => {
                    if action == BookAction::Update {
                        tracing::debug!(
                            symbol = %self.book.id(),
                            entry = entry.id,
                            "update for unknown entry applied as add"
                        );
                    }
                    let book_entry =
                        BookEntry::new(entry.id, entry.size, entry.time).with_status(entry.status);
                    self.book.add_entry(side, price, book_entry, entry.time)
                }
            };
            self.record(result);
        }

        if level.action == BookAction::Delete && self.book.find_level(side, price).is_some() {
            let result = self.book.delete_level(side, price);
            self.record(result);
        }
        Ok(())
    }

    fn record(&mut self, result: Result<BasicDelta>) {
        match result {
            Ok(delta) => self.deltas.push(delta),
            Err(error) => {
                tracing::debug!(symbol = %self.book.id(), %error, "book mutation failed");
                self.report_error(&error);
            }
        }
    }

    fn report_error(&mut self, error: &DepthcastError) {
        for handler in &mut self.error_handlers {
            handler.on_book_error(self.book.symbol(), error);
        }
    }
}

fn event<'a>(symbol: &'a str, msg: &'a FieldMsg, header: MsgHeader) -> BookEvent<'a> {
    BookEvent {
        symbol,
        msg,
        msg_type: header.msg_type,
        seq_num: header.seq_num,
        event_time: header.event_time,
    }
}

impl std::fmt::Debug for OrderBookListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderBookListener")
            .field("book", &self.book.id())
            .field("config", &self.config)
            .field("have_initial", &self.have_initial)
            .field("last_seq", &self.seq.last())
            .field("handlers", &(self.book_handlers.len() + self.level_handlers.len()))
            .finish_non_exhaustive()
    }
}
