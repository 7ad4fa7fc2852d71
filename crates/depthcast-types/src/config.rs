//! Configuration types for books and listeners.

use serde::{Deserialize, Serialize};

use crate::constants;

/// When a price level that has lost its last entry leaves the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelPruning {
    /// Remove the level as soon as its entry count reaches zero and publish
    /// it with action `Delete`.
    #[default]
    Immediate,
    /// Keep the empty level until the next recap or clear; it is published
    /// with action `Update` and size zero.
    Retain,
}

/// Per-book configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BookConfig {
    /// Record pending deltas and allow `populate_*` publication.
    pub generate_deltas: bool,
    /// Pruning policy for emptied levels.
    pub level_pruning: LevelPruning,
    /// Reject `add_level` on an existing price and `update_level` on a
    /// missing one instead of degrading to an upsert.
    pub strict_checking: bool,
}

impl Default for BookConfig {
    fn default() -> Self {
        Self {
            generate_deltas: constants::DEFAULT_GENERATE_DELTAS,
            level_pruning: LevelPruning::default(),
            strict_checking: false,
        }
    }
}

impl BookConfig {
    /// A book that publishes its changes.
    #[must_use]
    pub fn publishing() -> Self {
        Self {
            generate_deltas: true,
            ..Self::default()
        }
    }
}

/// Structured listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Build entry objects and fire entry callbacks. When false only level
    /// aggregates are maintained.
    pub process_entries: bool,
    /// Keep firing delta callbacks after a sequence gap, before the next recap.
    pub update_inconsistent_book: bool,
    /// Keep applying updates while the book quality is not OK.
    pub update_stale_book: bool,
    /// Pruning policy for the listener-owned book.
    pub level_pruning: LevelPruning,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            process_entries: constants::DEFAULT_PROCESS_ENTRIES,
            update_inconsistent_book: constants::DEFAULT_UPDATE_INCONSISTENT_BOOK,
            update_stale_book: constants::DEFAULT_UPDATE_STALE_BOOK,
            level_pruning: LevelPruning::default(),
        }
    }
}

impl ListenerConfig {
    /// Level-aggregate-only consumption.
    #[must_use]
    pub fn levels_only() -> Self {
        Self {
            process_entries: false,
            ..Self::default()
        }
    }
}
