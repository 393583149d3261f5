//! Error types for the mythrec replay parser.
//!
//! Every decoding layer returns either a value or one of these typed
//! errors. Nothing is retried and partial outputs are never returned:
//! a failure at any layer aborts the file's decoding.

use thiserror::Error;

/// The main error type for mythrec replay parsing operations.
///
/// Variants carry the offsets and values relevant to the failure so a
/// malformed replay can be diagnosed from the error string alone.
#[derive(Error, Debug)]
pub enum ParserError {
    /// An I/O error occurred while reading or renaming a replay file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The `l33t` container magic was not found in the input.
    #[error("data is not l33t compressed, no l33t magic found")]
    NotL33t,

    /// The gzip or zlib stream was malformed.
    #[error("decompression failed: {reason}")]
    DecompressionFailed {
        /// A description of the decompression failure.
        reason: String,
    },

    /// A function expecting the header root received a non-root node.
    #[error("{token:?} is not a root node, root node must be \"BG\"")]
    NotRootNode {
        /// The token of the node that was supplied.
        token: String,
    },

    /// A header-tree lookup found no node for the given path.
    #[error("no child node found searching for: {path}")]
    NoChildNodes {
        /// The `/`-joined token path that was searched.
        path: String,
    },

    /// A header-tree lookup found several nodes where exactly one was
    /// expected.
    #[error("multiple child nodes found for {path}, but expected only 1")]
    MultipleChildNodes {
        /// The `/`-joined token path that was searched.
        path: String,
    },

    /// An XMB magic or constant did not have its expected value.
    #[error("XMB data invalid at offset {offset}: found {found}, expected {expected}")]
    XmbInvalid {
        /// Absolute offset of the mismatching value.
        offset: usize,
        /// The value actually read.
        found: u32,
        /// The value the format requires.
        expected: u32,
    },

    /// An XMB file referenced by name is not present in the replay.
    #[error("XMB file {name:?} not present in replay")]
    XmbFileMissing {
        /// The requested XMB file name.
        name: String,
    },

    /// The profile-key table contained an unsupported value type code.
    #[error("unknown profile key type code {code}")]
    UnknownProfileKeyType {
        /// The type code that has no decoder.
        code: u32,
    },

    /// The `sv` command-region marker was not found in the raw buffer.
    #[error("command region marker \"sv\" not found")]
    CommandRegionNotFound,

    /// No command-list footer could be located from the given offset.
    #[error("footer not found searching at offset {offset}")]
    FooterNotFound {
        /// Offset the search started from.
        offset: usize,
    },

    /// The footer integrity byte did not equal 1.
    #[error("the unknown byte in footer search did not equal 1 at offset {offset}")]
    UnkNotEqualTo1 {
        /// Offset of the offending byte.
        offset: usize,
    },

    /// A command-list bitmask was outside the allowed set.
    #[error("bad entry type {value}, valid bits are 1|32|64|128 and 96 is rejected")]
    BadEntryType {
        /// The bitmask that was read.
        value: u32,
    },

    /// The fixed `3` marker inside a game command was missing.
    #[error("expected three while parsing game command at offset {offset}, got {got}")]
    ExpectedThree {
        /// Offset of the value.
        offset: usize,
        /// The value actually read.
        got: u32,
    },

    /// The fixed `1` marker inside a game command was missing.
    #[error("expected one while parsing game command at offset {offset}, got {got}")]
    ExpectedOne {
        /// Offset of the value.
        offset: usize,
        /// The value actually read.
        got: u16,
    },

    /// A decoded player id fell outside 1..=12.
    #[error("player id must be 12 or less, got {id}")]
    PlayerIdOutOfRange {
        /// The out-of-range player id.
        id: u16,
    },

    /// The byte after a command-list entry index was nonzero.
    #[error("final byte after entry index doesn't equal 0, got {value}")]
    FinalByteNotZero {
        /// The byte actually read.
        value: u8,
    },

    /// Command-list entry indices were not sequential.
    #[error("entry index not sequential, expected {expected}, got {got}")]
    EntryIdxNonSequential {
        /// The index the stream position requires.
        expected: u32,
        /// The index actually read.
        got: u32,
    },

    /// A command type code has no registered refiner.
    #[error("refiner not defined for command type {type_code}")]
    RefinerMissing {
        /// The unsupported command type code.
        type_code: u8,
    },

    /// The data ended before the required bytes could be read.
    #[error("unexpected end of data: expected {expected} bytes, but only {available} available")]
    UnexpectedEof {
        /// The number of bytes that were expected to be available.
        expected: usize,
        /// The actual number of bytes available.
        available: usize,
    },
}

impl ParserError {
    /// Creates an `UnexpectedEof` error with the given sizes.
    #[must_use]
    pub fn unexpected_eof(expected: usize, available: usize) -> Self {
        ParserError::UnexpectedEof {
            expected,
            available,
        }
    }
}

/// A specialized Result type for mythrec parsing operations.
pub type Result<T> = std::result::Result<T, ParserError>;
