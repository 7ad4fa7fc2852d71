//! # depthcast-listener
//!
//! **Inbound consumption of book messages.**
//!
//! Two consumers share the same field readers and sequence tracking:
//!
//! - [`OrderBookListener`] applies recaps and updates to an owned
//!   [`OrderBook`](depthcast_book::OrderBook) and reports what changed to
//!   book, level, entry, error and quality handlers
//! - [`BookAtomicListener`] streams level and entry views straight off the
//!   message and never builds a book
//!
//! A [`BookDepthFilter`] registered as a book handler narrows the structured
//! listener's events to the best few levels of each side.
//!
//! Handlers are registered per capability as boxed trait objects; a consumer
//! implements only the traits it needs.

pub mod atomic;
pub mod depth_filter;
pub mod handler;
pub mod listener;
pub mod reader;
pub mod sequence;

pub use atomic::{AtomicEntry, AtomicLevel, BookAtomicListener};
pub use depth_filter::BookDepthFilter;
pub use handler::{
    AtomicBookHandler, AtomicEntryHandler, AtomicLevelHandler, BookEvent, BookHandler,
    EntryHandler, ErrorHandler, LevelHandler, QualityHandler,
};
pub use listener::OrderBookListener;
pub use sequence::{SeqCheck, SeqGap, SeqTracker};
