//! # depthcast-book
//!
//! **The authoritative order book and its publisher.**
//!
//! An [`OrderBook`] holds two price-ordered sides of [`PriceLevel`]s, each
//! owning its [`BookEntry`]s in arrival order. Book-level mutations record
//! [`BasicDelta`]s on a pending list; a [`BookWriter`] turns either the whole
//! book (recap) or the pending list (delta) into a compact [`FieldMsg`].
//!
//! - **Single owner**: one thread drives one book; there is no locking
//! - **Exact sizes**: `Decimal` arithmetic keeps level size equal to the sum
//!   of its entries
//! - **Grow-once publication**: writer sub-message buffers are reused across
//!   publish cycles
//!
//! [`FieldMsg`]: depthcast_types::FieldMsg

pub mod checker;
pub mod delta;
pub mod entry;
pub mod orderbook;
pub mod price_level;
pub mod writer;

pub use checker::{book_digest, books_equal, digest_hex, first_difference};
pub use delta::{BasicDelta, DeltaClosure, DeltaList, LevelSnapshot};
pub use entry::BookEntry;
pub use orderbook::OrderBook;
pub use price_level::PriceLevel;
pub use writer::{BookWriter, MsgBuffer};
