//! One resting order (or aggregated anonymous quantity) at a price level.

use chrono::{DateTime, Utc};
use depthcast_types::{BookAction, EntryId, constants};
use rust_decimal::Decimal;

/// A single entry. Its price and side are those of the owning level; moving
/// an entry to another price is a delete plus an add.
#[derive(Debug, Clone, PartialEq)]
pub struct BookEntry {
    pub id: EntryId,
    pub size: Decimal,
    /// Last action applied to this entry.
    pub action: BookAction,
    pub status: u16,
    pub time: Option<DateTime<Utc>>,
}

impl BookEntry {
    #[must_use]
    pub fn new(id: impl Into<EntryId>, size: Decimal, time: Option<DateTime<Utc>>) -> Self {
        Self {
            id: id.into(),
            size,
            action: BookAction::Add,
            status: constants::DEFAULT_ENTRY_STATUS,
            time,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_action(mut self, action: BookAction) -> Self {
        self.action = action;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entry_defaults() {
        let entry = BookEntry::new("jmg", Decimal::new(500, 0), None);
        assert_eq!(entry.id.as_str(), "jmg");
        assert_eq!(entry.action, BookAction::Add);
        assert_eq!(entry.status, 0);
        assert!(entry.time.is_none());
    }

    #[test]
    fn builders() {
        let entry = BookEntry::new("a", Decimal::ONE, None)
            .with_status(3)
            .with_action(BookAction::Update);
        assert_eq!(entry.status, 3);
        assert_eq!(entry.action, BookAction::Update);
    }
}
