//! Streaming listener: walks a book message and reports what it carries
//! without building a book.
//!
//! Every book message is bracketed:
//!
//! ```text
//! begin(is_recap)
//!   level 1
//!     entry 1.1 .. entry 1.n
//!   level 2
//!     ...
//! end
//! ```
//!
//! Clear messages and sequence gaps are reported as their own events outside
//! the bracket. The level and entry views are overwritten in place for each
//! event, so a handler that wants to keep one must copy it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use depthcast_types::{
    BookAction, BookFields, DepthcastError, FieldMsg, LevelOrderType, MsgType, Result, Side,
};
use rust_decimal::Decimal;

use crate::handler::{
    AtomicBookHandler, AtomicEntryHandler, AtomicLevelHandler, BookEvent, ErrorHandler,
};
use crate::reader::{self, EntryFields, LevelFields, MsgHeader};
use crate::sequence::{SeqCheck, SeqTracker};

/// The level currently being streamed.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomicLevel {
    pub price: Decimal,
    pub side: Side,
    pub action: BookAction,
    pub size: Decimal,
    pub size_change: Decimal,
    pub time: Option<DateTime<Utc>>,
    /// Entries resting at the level.
    pub num_entries: u32,
    /// Entries carried by this message.
    pub num_attached: u32,
    pub order_type: LevelOrderType,
    /// 1-based position of the level within the message.
    pub position: usize,
    pub total_levels: usize,
}

impl Default for AtomicLevel {
    fn default() -> Self {
        Self {
            price: Decimal::ZERO,
            side: Side::Bid,
            action: BookAction::Add,
            size: Decimal::ZERO,
            size_change: Decimal::ZERO,
            time: None,
            num_entries: 0,
            num_attached: 0,
            order_type: LevelOrderType::Limit,
            position: 0,
            total_levels: 0,
        }
    }
}

impl AtomicLevel {
    fn load(&mut self, level: &LevelFields, position: usize, total_levels: usize) {
        self.price = level.price;
        self.side = level.side;
        self.action = level.action;
        self.size = level.size;
        self.size_change = level.size_change;
        self.time = level.time;
        self.num_entries = level.num_entries;
        self.num_attached = level.num_attached;
        self.order_type = level.order_type;
        self.position = position;
        self.total_levels = total_levels;
    }
}

/// The entry currently being streamed.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomicEntry {
    pub id: String,
    pub action: BookAction,
    pub size: Decimal,
    pub time: Option<DateTime<Utc>>,
    pub status: u16,
}

impl Default for AtomicEntry {
    fn default() -> Self {
        Self {
            id: String::new(),
            action: BookAction::Add,
            size: Decimal::ZERO,
            time: None,
            status: 0,
        }
    }
}

impl AtomicEntry {
    fn load(&mut self, entry: &EntryFields<'_>) {
        self.id.clear();
        self.id.push_str(entry.id);
        self.action = entry.action;
        self.size = entry.size;
        self.time = entry.time;
        self.status = entry.status;
    }
}

/// Streaming consumer for one instrument.
pub struct BookAtomicListener {
    fields: Arc<BookFields>,
    seq: SeqTracker,
    symbol: String,
    level: AtomicLevel,
    entry: AtomicEntry,
    book_handlers: Vec<Box<dyn AtomicBookHandler>>,
    level_handlers: Vec<Box<dyn AtomicLevelHandler>>,
    entry_handlers: Vec<Box<dyn AtomicEntryHandler>>,
    error_handlers: Vec<Box<dyn ErrorHandler>>,
}

impl BookAtomicListener {
    #[must_use]
    pub fn new(symbol: impl Into<String>) -> Self {
        Self::with_fields(symbol, Arc::new(BookFields::default()))
    }

    #[must_use]
    pub fn with_fields(symbol: impl Into<String>, fields: Arc<BookFields>) -> Self {
        Self {
            fields,
            seq: SeqTracker::new(),
            symbol: symbol.into(),
            level: AtomicLevel::default(),
            entry: AtomicEntry::default(),
            book_handlers: Vec::new(),
            level_handlers: Vec::new(),
            entry_handlers: Vec::new(),
            error_handlers: Vec::new(),
        }
    }

    pub fn add_book_handler(&mut self, handler: Box<dyn AtomicBookHandler>) {
        self.book_handlers.push(handler);
    }

    pub fn add_level_handler(&mut self, handler: Box<dyn AtomicLevelHandler>) {
        self.level_handlers.push(handler);
    }

    pub fn add_entry_handler(&mut self, handler: Box<dyn AtomicEntryHandler>) {
        self.entry_handlers.push(handler);
    }

    pub fn add_error_handler(&mut self, handler: Box<dyn ErrorHandler>) {
        self.error_handlers.push(handler);
    }

    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    #[must_use]
    pub fn last_seq_num(&self) -> Option<u64> {
        self.seq.last()
    }

    /// Forget the stream position.
    pub fn clear(&mut self) {
        self.seq.reset();
    }

    pub fn on_msg(&mut self, msg: &FieldMsg) {
        if let Err(error) = self.process(msg) {
            tracing::warn!(symbol = %self.symbol, %error, "book message rejected");
            for handler in &mut self.error_handlers {
                handler.on_book_error(&self.symbol, &error);
            }
        }
    }

    fn process(&mut self, msg: &FieldMsg) -> Result<()> {
        let header = reader::read_header(&self.fields, msg)?;
        if self.symbol.is_empty() {
            if let Some(symbol) = msg.try_str(&self.fields.symbol)? {
                self.symbol.push_str(symbol);
            }
        }
        let event = BookEvent {
            symbol: &self.symbol,
            msg,
            msg_type: header.msg_type,
            seq_num: header.seq_num,
            event_time: header.event_time,
        };

        match header.msg_type {
            MsgType::Clear => {
                self.seq.reset_to(header.seq_num);
                for handler in &mut self.book_handlers {
                    handler.on_book_atomic_clear(&event);
                }
                return Ok(());
            }
            MsgType::Update => match self.seq.observe(header.seq_num) {
                SeqCheck::InOrder => {}
                SeqCheck::Duplicate => {
                    tracing::debug!(
                        symbol = %self.symbol,
                        seq = header.seq_num,
                        "duplicate update ignored"
                    );
                    return Ok(());
                }
                SeqCheck::Gap(gap) => {
                    tracing::info!(
                        symbol = %self.symbol,
                        begin = gap.begin,
                        end = gap.end,
                        "sequence gap detected"
                    );
                    for handler in &mut self.book_handlers {
                        handler.on_book_atomic_gap(&event, gap);
                    }
                }
            },
            MsgType::Initial | MsgType::Recap | MsgType::Snapshot => {
                self.seq.reset_to(header.seq_num);
            }
        }

        let is_recap = header.msg_type.is_recap();
        for handler in &mut self.book_handlers {
            handler.on_book_atomic_begin(&event, is_recap);
        }
        let streamed = stream_levels(
            &self.fields,
            msg,
            &header,
            &event,
            &mut self.level,
            &mut self.entry,
            &mut self.level_handlers,
            &mut self.entry_handlers,
        );
        for handler in &mut self.book_handlers {
            handler.on_book_atomic_end(&event);
        }
        streamed
    }
}

#[allow(clippy::too_many_arguments)]
fn stream_levels(
    fields: &BookFields,
    msg: &FieldMsg,
    header: &MsgHeader,
    event: &BookEvent<'_>,
    level: &mut AtomicLevel,
    entry: &mut AtomicEntry,
    level_handlers: &mut [Box<dyn AtomicLevelHandler>],
    entry_handlers: &mut [Box<dyn AtomicEntryHandler>],
) -> Result<()> {
    let is_recap = header.msg_type.is_recap();
    let level_msgs = reader::level_msgs(fields, msg)?;
    let total = level_msgs.len();

    for (index, level_msg) in level_msgs.iter().enumerate() {
        let fields_read = reader::read_level(fields, level_msg, header.event_time)?;
        level.load(&fields_read, index + 1, total);
        for handler in level_handlers.iter_mut() {
            if is_recap {
                handler.on_atomic_level_recap(event, level);
            } else {
                handler.on_atomic_level_delta(event, level);
            }
        }
        if entry_handlers.is_empty() {
            continue;
        }
        for entry_msg in reader::entry_msgs(fields, level_msg)? {
            let Some(entry_read) = reader::read_entry(fields, entry_msg, level.time)? else {
                continue;
            };
            entry.load(&entry_read);
            for handler in entry_handlers.iter_mut() {
                if is_recap {
                    handler.on_atomic_entry_recap(event, level, entry);
                } else {
                    handler.on_atomic_entry_delta(event, level, entry);
                }
            }
        }
    }
    if total == 0 && msg.try_u32(&fields.num_levels)?.is_some_and(|n| n > 0) {
        return Err(DepthcastError::MalformedLevel {
            reason: "levels declared but none attached".to_string(),
        });
    }
    Ok(())
}

impl std::fmt::Debug for BookAtomicListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookAtomicListener")
            .field("symbol", &self.symbol)
            .field("last_seq", &self.seq.last())
            .field("level", &self.level)
            .finish_non_exhaustive()
    }
}
