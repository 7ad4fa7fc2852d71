//! Book vocabulary shared by the book, the writer and the listeners.
//!
//! Every enum that travels on the wire carries its single-character (or
//! numeric) code so that readers and writers agree on one table.

use serde::{Deserialize, Serialize};

use crate::{constants, DepthcastError, Result};

/// Which side of the book a price level sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    /// Wire code (`B` / `A`).
    #[must_use]
    pub fn code(self) -> char {
        match self {
            Self::Bid => 'B',
            Self::Ask => 'A',
        }
    }

    pub fn from_code(code: char) -> Result<Self> {
        match code {
            'B' => Ok(Self::Bid),
            'A' => Ok(Self::Ask),
            other => Err(DepthcastError::InvalidSide(other)),
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bid => write!(f, "BID"),
            Self::Ask => write!(f, "ASK"),
        }
    }
}

/// What happened to a level or an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookAction {
    Add,
    Update,
    Delete,
}

impl BookAction {
    /// Wire code (`A` / `U` / `D`).
    #[must_use]
    pub fn code(self) -> char {
        match self {
            Self::Add => 'A',
            Self::Update => 'U',
            Self::Delete => 'D',
        }
    }

    pub fn from_code(code: char) -> Result<Self> {
        match code {
            'A' => Ok(Self::Add),
            'U' => Ok(Self::Update),
            'D' => Ok(Self::Delete),
            other => Err(DepthcastError::InvalidAction(other)),
        }
    }
}

impl std::fmt::Display for BookAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Add => write!(f, "ADD"),
            Self::Update => write!(f, "UPDATE"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

/// Order type carried by a price level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LevelOrderType {
    #[default]
    Limit,
    Market,
}

impl LevelOrderType {
    #[must_use]
    pub fn code(self) -> char {
        match self {
            Self::Limit => 'L',
            Self::Market => 'M',
        }
    }

    pub fn from_code(code: char) -> Result<Self> {
        match code {
            'L' => Ok(Self::Limit),
            'M' => Ok(Self::Market),
            other => Err(DepthcastError::InvalidOrderType(other)),
        }
    }
}

/// Declared kind of an inbound or outbound book message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MsgType {
    Initial,
    Update,
    Clear,
    Recap,
    Snapshot,
}

impl MsgType {
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Initial => constants::MSG_TYPE_BOOK_INITIAL,
            Self::Update => constants::MSG_TYPE_BOOK_UPDATE,
            Self::Clear => constants::MSG_TYPE_BOOK_CLEAR,
            Self::Recap => constants::MSG_TYPE_BOOK_RECAP,
            Self::Snapshot => constants::MSG_TYPE_BOOK_SNAPSHOT,
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            constants::MSG_TYPE_BOOK_INITIAL => Ok(Self::Initial),
            constants::MSG_TYPE_BOOK_UPDATE => Ok(Self::Update),
            constants::MSG_TYPE_BOOK_CLEAR => Ok(Self::Clear),
            constants::MSG_TYPE_BOOK_RECAP => Ok(Self::Recap),
            constants::MSG_TYPE_BOOK_SNAPSHOT => Ok(Self::Snapshot),
            other => Err(DepthcastError::UnknownMsgType(other)),
        }
    }

    /// Initial images, recaps and snapshots all resynchronise the book.
    #[must_use]
    pub fn is_recap(self) -> bool {
        matches!(self, Self::Initial | Self::Recap | Self::Snapshot)
    }
}

impl std::fmt::Display for MsgType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initial => write!(f, "INITIAL"),
            Self::Update => write!(f, "UPDATE"),
            Self::Clear => write!(f, "CLEAR"),
            Self::Recap => write!(f, "RECAP"),
            Self::Snapshot => write!(f, "SNAPSHOT"),
        }
    }
}

/// Data quality of a book as seen by its consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Quality {
    #[default]
    Ok,
    MaybeStale,
    PartialStale,
    Stale,
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::MaybeStale => write!(f, "MAYBE_STALE"),
            Self::PartialStale => write!(f, "PARTIAL_STALE"),
            Self::Stale => write!(f, "STALE"),
        }
    }
}
