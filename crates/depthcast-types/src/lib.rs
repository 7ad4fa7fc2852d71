//! # depthcast-types
//!
//! Shared types, errors, and configuration for the **depthcast** order-book
//! engine.
//!
//! This crate is the leaf dependency of the workspace. It defines:
//!
//! - **Identifiers**: [`EntryId`], [`BookId`]
//! - **Book vocabulary**: [`Side`], [`BookAction`], [`LevelOrderType`], [`MsgType`], [`Quality`]
//! - **Field messages**: [`FieldMsg`], [`FieldValue`], [`Field`]
//! - **Wire dictionary**: [`BookFields`], [`FieldDescriptor`]
//! - **Configuration**: [`BookConfig`], [`ListenerConfig`], [`LevelPruning`]
//! - **Errors**: [`DepthcastError`] with `DC_ERR_` prefix codes
//! - **Constants**: wire defaults and message type codes

pub mod book;
pub mod config;
pub mod constants;
pub mod error;
pub mod fields;
pub mod ids;
pub mod msg;

// Re-export all primary types at crate root for ergonomic imports:
//   use depthcast_types::{Side, BookAction, FieldMsg, BookFields, ...};

pub use book::*;
pub use config::*;
pub use error::*;
pub use fields::*;
pub use ids::*;
pub use msg::*;

// Constants are accessed via `depthcast_types::constants::FOO`
// (not re-exported to avoid name collisions).
