//! Field readers for inbound book messages.
//!
//! Levels arrive either inline on the top-level message (exactly one level)
//! or as a `wPriceLevels` vector; entries likewise arrive inline on their
//! level or as a `wPlEntries` vector. [`level_msgs`] and [`entry_msgs`] hide
//! that difference by returning a slice in both cases, so readers never copy
//! sub-messages. Absent optional fields take the defaults the writer relies
//! on when it omits them.

use chrono::{DateTime, Utc};
use depthcast_book::PriceLevel;
use depthcast_types::{
    BookAction, BookFields, DepthcastError, FieldDescriptor, FieldMsg, LevelOrderType, MsgType,
    Result, Side, constants,
};
use rust_decimal::Decimal;

/// Fields every book message starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgHeader {
    pub msg_type: MsgType,
    /// Zero when absent.
    pub seq_num: u64,
    /// Book time, falling back to source time.
    pub event_time: Option<DateTime<Utc>>,
}

/// Read the message type, sequence number and event time.
pub fn read_header(fields: &BookFields, msg: &FieldMsg) -> Result<MsgHeader> {
    let code = msg
        .try_u8(&fields.msg_type)?
        .ok_or_else(|| DepthcastError::MissingField {
            field: fields.msg_type.name.clone(),
        })?;
    let src_time = msg.try_time(&fields.src_time)?;
    Ok(MsgHeader {
        msg_type: MsgType::from_code(code)?,
        seq_num: msg.try_u64(&fields.seq_num)?.unwrap_or(0),
        event_time: msg.try_time(&fields.book_time)?.or(src_time),
    })
}

/// Scalar content of one level message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelFields {
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
}

impl LevelFields {
    /// A detached level carrying these aggregates, for level-only books.
    #[must_use]
    pub fn to_price_level(&self) -> PriceLevel {
        let mut level = PriceLevel::new(self.price, self.side);
        level.set_aggregate(self.size, self.num_entries);
        level.set_size_change(self.size_change);
        level.set_action(self.action);
        level.set_time(self.time);
        level.set_order_type(self.order_type);
        level
    }
}

/// Content of one entry message. The id borrows from the message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryFields<'a> {
    pub id: &'a str,
    pub action: BookAction,
    pub size: Decimal,
    pub time: Option<DateTime<Utc>>,
    pub status: u16,
}

fn sub_msgs<'a>(
    parent: &'a FieldMsg,
    vector: &FieldDescriptor,
    inline_marker: &FieldDescriptor,
) -> Result<&'a [FieldMsg]> {
    if let Some(msgs) = parent.try_vec_msg(vector)? {
        return Ok(msgs);
    }
    if parent.contains(inline_marker) {
        Ok(std::slice::from_ref(parent))
    } else {
        Ok(&[])
    }
}

/// Level messages of a book message.
pub fn level_msgs<'a>(fields: &BookFields, msg: &'a FieldMsg) -> Result<&'a [FieldMsg]> {
    sub_msgs(msg, &fields.price_levels, &fields.pl_price)
}

/// Entry messages of a level message.
pub fn entry_msgs<'a>(fields: &BookFields, level: &'a FieldMsg) -> Result<&'a [FieldMsg]> {
    sub_msgs(level, &fields.pl_entries, &fields.entry_id)
}

fn code<T>(
    msg: &FieldMsg,
    desc: &FieldDescriptor,
    parse: impl FnOnce(char) -> Result<T>,
) -> Result<Option<T>> {
    msg.try_char(desc)?.map(parse).transpose()
}

/// Read a level's scalar fields. Level time defaults to `book_time`.
pub fn read_level(
    fields: &BookFields,
    msg: &FieldMsg,
    book_time: Option<DateTime<Utc>>,
) -> Result<LevelFields> {
    let price = msg
        .try_decimal(&fields.pl_price)?
        .ok_or_else(|| DepthcastError::MissingField {
            field: fields.pl_price.name.clone(),
        })?;
    let attached = entry_msgs(fields, msg)?.len();
    let num_attached = match msg.try_u32(&fields.pl_num_attach)? {
        Some(n) => n,
        None => u32::try_from(attached).map_err(|_| DepthcastError::MalformedLevel {
            reason: format!("{attached} attached entries at {price}"),
        })?,
    };
    Ok(LevelFields {
        price,
        side: code(msg, &fields.pl_side, Side::from_code)?.unwrap_or(Side::Bid),
        action: code(msg, &fields.pl_action, BookAction::from_code)?.unwrap_or(BookAction::Add),
        size: msg.try_decimal(&fields.pl_size)?.unwrap_or(Decimal::ZERO),
        size_change: msg
            .try_decimal(&fields.pl_size_change)?
            .unwrap_or(Decimal::ZERO),
        time: msg.try_time(&fields.pl_time)?.or(book_time),
        num_entries: msg
            .try_u32(&fields.pl_num_entries)?
            .unwrap_or(constants::DEFAULT_NUM_ENTRIES),
        num_attached,
        order_type: code(msg, &fields.pl_order_type, LevelOrderType::from_code)?
            .unwrap_or_default(),
    })
}

/// Read every level of a book message and check that each of its entries
/// parses, so a caller can apply the result without failing halfway.
pub fn read_levels<'a>(
    fields: &BookFields,
    msg: &'a FieldMsg,
    book_time: Option<DateTime<Utc>>,
) -> Result<Vec<(LevelFields, &'a FieldMsg)>> {
    let level_msgs = level_msgs(fields, msg)?;
    let mut levels = Vec::with_capacity(level_msgs.len());
    for level_msg in level_msgs {
        let level = read_level(fields, level_msg, book_time)?;
        for entry_msg in entry_msgs(fields, level_msg)? {
            read_entry(fields, entry_msg, level.time)?;
        }
        levels.push((level, level_msg));
    }
    Ok(levels)
}

/// Read an entry. `None` when the message carries no entry id.
pub fn read_entry<'a>(
    fields: &BookFields,
    msg: &'a FieldMsg,
    level_time: Option<DateTime<Utc>>,
) -> Result<Option<EntryFields<'a>>> {
    let Some(id) = msg.try_str(&fields.entry_id)? else {
        return Ok(None);
    };
    Ok(Some(EntryFields {
        id,
        action: code(msg, &fields.entry_action, BookAction::from_code)?
            .unwrap_or(BookAction::Add),
        size: msg.try_decimal(&fields.entry_size)?.unwrap_or(Decimal::ZERO),
        time: msg.try_time(&fields.entry_time)?.or(level_time),
        status: msg
            .try_u16(&fields.entry_status)?
            .unwrap_or(constants::DEFAULT_ENTRY_STATUS),
    }))
}
