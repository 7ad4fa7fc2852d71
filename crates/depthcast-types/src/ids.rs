//! Identifiers used throughout depthcast.
//!
//! Entry ids are opaque strings chosen by the upstream feed; they are only
//! unique within one price level.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// EntryId
// ---------------------------------------------------------------------------

/// Opaque identifier of one resting order (or aggregated quantity) at a level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Default, Serialize, Deserialize)]
pub struct EntryId(pub String);

impl EntryId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Deterministic id for fixtures: `"e{n}"`.
    #[cfg(any(test, feature = "test-helpers"))]
    #[must_use]
    pub fn numbered(n: usize) -> Self {
        Self(format!("e{n}"))
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntryId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for EntryId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl PartialEq<str> for EntryId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

// ---------------------------------------------------------------------------
// BookId
// ---------------------------------------------------------------------------

/// Identity of one book: instrument symbol plus optional participant/venue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BookId {
    pub symbol: String,
    pub part_id: Option<String>,
}

impl BookId {
    #[must_use]
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            part_id: None,
        }
    }

    #[must_use]
    pub fn with_part_id(mut self, part_id: impl Into<String>) -> Self {
        self.part_id = Some(part_id.into());
        self
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.part_id {
            Some(part) => write!(f, "{}.{}", self.symbol, part),
            None => f.write_str(&self.symbol),
        }
    }
}
