//! Error types for the depthcast book engine.
//!
//! All errors use the `DC_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Book structure errors
//! - 2xx: Inbound message errors
//! - 3xx: Publication errors
//! - 9xx: General / internal errors

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{EntryId, Side};

/// Central error enum for all depthcast operations.
#[derive(Debug, Error)]
pub enum DepthcastError {
    // =================================================================
    // Book Structure Errors (1xx)
    // =================================================================
    /// No level exists at this side and price.
    #[error("DC_ERR_100: Level not found: {side} {price}")]
    LevelNotFound { side: Side, price: Decimal },

    /// The level exists but holds no entry with this id.
    #[error("DC_ERR_101: Entry not found: {id} at {price}")]
    EntryNotFound { id: EntryId, price: Decimal },

    /// An entry with this id already rests at the level.
    #[error("DC_ERR_102: Entry already exists: {id} at {price}")]
    DuplicateEntry { id: EntryId, price: Decimal },

    /// A level already exists at this side and price.
    #[error("DC_ERR_103: Level already exists: {side} {price}")]
    DuplicateLevel { side: Side, price: Decimal },

    #[error("DC_ERR_104: Invalid side code: {0:?}")]
    InvalidSide(char),

    #[error("DC_ERR_105: Invalid action code: {0:?}")]
    InvalidAction(char),

    #[error("DC_ERR_106: Invalid order type code: {0:?}")]
    InvalidOrderType(char),

    // =================================================================
    // Inbound Message Errors (2xx)
    // =================================================================
    /// A field the message kind requires is absent.
    #[error("DC_ERR_200: Missing field: {field}")]
    MissingField { field: String },

    /// A field is present but holds an incompatible value.
    #[error("DC_ERR_201: Wrong field type for {field}: expected {expected}, got {found}")]
    WrongFieldType {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("DC_ERR_202: Unknown message type: {0}")]
    UnknownMsgType(u8),

    /// An update arrived before any initial image or recap.
    #[error("DC_ERR_203: Update received before initial value for {symbol}")]
    UpdateBeforeInitial { symbol: String },

    /// A level sub-message could not be applied.
    #[error("DC_ERR_204: Malformed level: {reason}")]
    MalformedLevel { reason: String },

    // =================================================================
    // Publication Errors (3xx)
    // =================================================================
    /// The book was not configured to generate publications.
    #[error("DC_ERR_300: Book publishing not enabled")]
    PublishingDisabled,

    /// A reusable message buffer could not grow.
    #[error("DC_ERR_301: Cannot allocate {requested} sub-messages")]
    Capacity { requested: usize },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("DC_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("DC_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (bad dictionary file, missing fields, etc.).
    #[error("DC_ERR_902: Configuration error: {0}")]
    Configuration(String),

    /// I/O error.
    #[error("DC_ERR_903: I/O error: {0}")]
    Io(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, DepthcastError>;

// Conversion from std::io::Error
impl From<std::io::Error> for DepthcastError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for DepthcastError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
