//! Error types for layout compilation, identifier handling and encoding.
//!
//! Decoding an advertisement that is not the expected beacon type is not an
//! error: [`crate::codec::decode`] returns `None` for that.

use alloc::string::String;

use thiserror::Error;

/// Failure to compile a layout description.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// A term matched none of the five field patterns.
    #[error("layout term '{0}' does not match any field pattern")]
    InvalidTerm(String),

    /// An offset was not an integer in `0..=MAX_OFFSET`.
    #[error("layout term '{0}' has an offset out of range")]
    InvalidOffset(String),

    /// Start offset is greater than end offset.
    #[error("layout term '{term}' has start {start} after end {end}")]
    InvalidRange { term: String, start: usize, end: usize },

    /// The `=<hex>` value is not valid hex.
    #[error("layout term '{0}' has an invalid hex value")]
    InvalidHex(String),

    /// The `=<hex>` value does not fit the declared field width.
    #[error("layout term '{0}' has a value wider than its field")]
    ValueTooWide(String),

    #[error("layout has no matcher (m:) field")]
    MissingMatcher,

    #[error("layout has no power (p:) field")]
    MissingPower,

    #[error("layout has no identifier (i:) field")]
    MissingIdentifier,

    #[error("layout declares more than one matcher (m:) field")]
    DuplicateMatcher,

    #[error("layout declares more than one power (p:) field")]
    DuplicatePower,

    #[error("layout declares more than one service UUID (s:) field")]
    DuplicateServiceUuid,
}

/// Identifier text in none of the accepted forms.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unable to parse identifier '{0}'")]
pub struct ParseError(pub String);

/// Out-of-bounds byte range when building an identifier from a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("byte range {start}..{end} is invalid for a buffer of {len} bytes")]
pub struct RangeError {
    pub start: usize,
    pub end: usize,
    pub len: usize,
}

/// An identifier cannot be rendered in the requested form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("identifier is {0} bytes, a UUID needs 16")]
    NotUuid(usize),

    #[error("identifier is {0} bytes, an integer needs 2")]
    NotInteger(usize),
}

/// A record does not fit the layout it is being encoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("layout has {expected} identifier fields but record has {actual}")]
    IdentifierCount { expected: usize, actual: usize },

    #[error("layout has {expected} data fields but record has {actual}")]
    DataCount { expected: usize, actual: usize },

    /// A payload field starts inside the 2-byte company code.
    #[error("field at offset {0} overlaps the company code")]
    FieldOverlapsHeader(usize),

    /// An AD section would exceed the 254 data bytes its length byte allows.
    #[error("AD section of {0} bytes does not fit a length byte")]
    PayloadTooLong(usize),
}

/// Invalid arguments to [`crate::beacon::BeaconRecord::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("a beacon record needs at least one identifier")]
    NoIdentifiers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DistanceError {
    #[error("no distance calculator configured")]
    NoCalculator,
}
