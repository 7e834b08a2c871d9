//! Object identity for gitup.
//!
//! Provides the 20-byte [`ObjectId`] content address (with its 40-character
//! hex form) and a streaming [`Hasher`] that knows the `"<kind> <len>\0"`
//! object header rule.

mod error;
pub mod hasher;
mod oid;

pub use error::HashError;
pub use hasher::Hasher;
pub use oid::ObjectId;
