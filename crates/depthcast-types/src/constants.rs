//! System-wide constants for the depthcast book engine.

/// Wire code for an initial book image.
pub const MSG_TYPE_BOOK_INITIAL: u8 = 16;

/// Wire code for an incremental book update.
pub const MSG_TYPE_BOOK_UPDATE: u8 = 17;

/// Wire code for a book clear.
pub const MSG_TYPE_BOOK_CLEAR: u8 = 18;

/// Wire code for a solicited or unsolicited book recap.
pub const MSG_TYPE_BOOK_RECAP: u8 = 19;

/// Wire code for a snapshot (treated like a recap by listeners).
pub const MSG_TYPE_BOOK_SNAPSHOT: u8 = 20;

/// Message status written when the book quality is OK.
pub const MSG_STATUS_OK: u8 = 0;

/// Level entry count assumed when `wPlNumEntries` is absent.
pub const DEFAULT_NUM_ENTRIES: u32 = 1;

/// Attached entry count assumed when `wPlNumAttach` is absent.
pub const DEFAULT_NUM_ATTACH: u32 = 1;

/// Entry status assumed when `wEntryStatus` is absent.
pub const DEFAULT_ENTRY_STATUS: u16 = 0;

/// Initial number of reusable level sub-messages held by a writer.
pub const DEFAULT_LEVEL_BUFFER_CAPACITY: usize = 8;

/// Initial number of reusable entry sub-messages held by a writer.
pub const DEFAULT_ENTRY_BUFFER_CAPACITY: usize = 16;

/// Books do not publish unless asked to.
pub const DEFAULT_GENERATE_DELTAS: bool = false;

/// Listeners build entry-level state by default.
pub const DEFAULT_PROCESS_ENTRIES: bool = true;

/// Delta callbacks are withheld while a book is inconsistent.
pub const DEFAULT_UPDATE_INCONSISTENT_BOOK: bool = false;

/// Updates are dropped while the book quality is not OK.
pub const DEFAULT_UPDATE_STALE_BOOK: bool = false;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "depthcast";
