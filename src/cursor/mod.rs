//! Token cursors: the format-specific readers the object decoder drives.
//!
//! A cursor exposes primitive token reads only; it knows nothing about
//! declared types, dispatch tables, or redirection. Both cursors hash
//! field names with the same FNV-1a function, so one dispatch table
//! serves both wire formats.

pub(crate) mod binary;
pub(crate) mod text;

use serde_json::Value;

use crate::Result;

pub use binary::{BinaryCursor, BinaryTokenWriter};
pub use text::TextCursor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    Text,
    Binary,
}

/// Opaque restorable cursor position. Restoring reproduces the exact
/// subsequent token stream, as if nothing had been read since `mark`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavePoint {
    pub(crate) offset: usize,
}

pub trait TokenCursor {
    fn format(&self) -> WireFormat;

    /// Byte offset of the next unread token, for error context.
    fn offset(&self) -> usize;

    fn next_if_null(&mut self) -> bool;
    fn next_if_object_start(&mut self) -> bool;
    fn next_if_object_end(&mut self) -> bool;
    fn next_if_array_start(&mut self) -> bool;
    fn next_if_array_end(&mut self) -> bool;
    fn next_if_comma(&mut self) -> bool;

    fn is_array_start(&self) -> bool;
    fn is_string(&self) -> bool;
    fn is_number(&self) -> bool;
    fn is_bool(&self) -> bool;

    /// True when the cursor sits where a field name or object end could
    /// follow. Lets a delegated decode pick up mid-object after a type
    /// redirect that consumed the leading discriminator.
    fn is_field_boundary(&self) -> bool;

    /// Read one field name and return its 64-bit hash, recording the
    /// raw name and its case-insensitive hash. Returns
    /// [`crate::utils::NO_FIELD_HASH`] for malformed separators.
    fn next_field_name_hash(&mut self) -> Result<u64>;

    /// Case-insensitive hash of the last field name read.
    fn lcase_hash(&self) -> u64;

    /// Last field name or hashed string value read.
    fn last_string(&self) -> &str;

    /// If the next token is a string, consume it and return its hash
    /// (the raw text stays available via [`Self::last_string`]).
    /// Leaves the cursor untouched and yields `None` otherwise.
    fn read_value_hash(&mut self) -> Result<Option<u64>>;

    /// Read any one value as a tree. Used for spillover into extras
    /// sinks and for buffering values before an instance exists.
    fn read_any(&mut self) -> Result<Value>;

    fn read_bool(&mut self) -> Result<bool>;

    fn mark(&self) -> SavePoint;
    fn restore(&mut self, save: SavePoint);
}
